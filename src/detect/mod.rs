//! Save-event detection.
//!
//! [`SaveDetector::install`] replaces a document's request primitive with an
//! intercepting decorator, once per document. The shape (fetch or legacy) is
//! whatever the adapter declares; the detector never guesses it.

mod intercept;
mod transport;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use self::intercept::{InterceptedFetch, InterceptedLegacy, SaveObserver};
pub use self::transport::{
    FetchTransport, LegacyTransport, OnLoad, OutgoingRequest, Response, TransportError,
};
use crate::builder::BuilderAdapter;
use crate::utils::poll;

/// A save happened. Nothing is carried besides the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveDetected {
    pub at: SystemTime,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectError {
    #[error("save detector already installed in `{0}`")]
    AlreadyInstalled(String),

    /// The editor has not set up its transport yet.
    #[error("`{context}` has no {transport} transport yet")]
    MissingTransport {
        context: String,
        transport: &'static str,
    },

    #[error("waiting for the editor was cancelled")]
    Cancelled(#[from] poll::Cancelled),
}

#[derive(Default)]
struct Slots {
    fetch: Option<Arc<dyn FetchTransport>>,
    legacy: Option<Arc<dyn LegacyTransport>>,
    intercepted: bool,
}

/// One document (top-level page or nested frame) and its request primitives.
pub struct DocumentContext {
    id: String,
    slots: RwLock<Slots>,
}

impl DocumentContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slots: RwLock::new(Slots::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Called by the host once its fetch primitive exists.
    pub fn provide_fetch(&self, transport: Arc<dyn FetchTransport>) {
        self.slots.write().fetch = Some(transport);
    }

    /// Called by the host once its legacy request object exists.
    pub fn provide_legacy(&self, transport: Arc<dyn LegacyTransport>) {
        self.slots.write().legacy = Some(transport);
    }

    /// Current fetch primitive, intercepted if a detector is installed.
    pub fn fetch(&self) -> Option<Arc<dyn FetchTransport>> {
        self.slots.read().fetch.clone()
    }

    pub fn legacy(&self) -> Option<Arc<dyn LegacyTransport>> {
        self.slots.read().legacy.clone()
    }

    pub fn is_intercepted(&self) -> bool {
        self.slots.read().intercepted
    }
}

pub struct SaveDetector;

impl SaveDetector {
    /// Wrap the adapter's transport in `context`.
    ///
    /// Fails with [`DetectError::MissingTransport`] while the host primitive
    /// is absent, and with [`DetectError::AlreadyInstalled`] on a second call.
    pub fn install(
        context: &DocumentContext,
        adapter: Arc<dyn BuilderAdapter>,
        events: mpsc::UnboundedSender<SaveDetected>,
    ) -> Result<(), DetectError> {
        let legacy = adapter.describe_environment().uses_legacy_transport;
        let mut slots = context.slots.write();
        if slots.intercepted {
            return Err(DetectError::AlreadyInstalled(context.id.clone()));
        }
        let missing = |transport| DetectError::MissingTransport {
            context: context.id.clone(),
            transport,
        };

        let observer = Arc::new(SaveObserver::new(adapter, events));
        if legacy {
            let inner = slots.legacy.take().ok_or_else(|| missing("legacy"))?;
            slots.legacy = Some(Arc::new(InterceptedLegacy { inner, observer }));
        } else {
            let inner = slots.fetch.take().ok_or_else(|| missing("fetch"))?;
            slots.fetch = Some(Arc::new(InterceptedFetch { inner, observer }));
        }
        slots.intercepted = true;
        Ok(())
    }

    /// Install as soon as the host transport shows up.
    ///
    /// Polls every `interval` without an attempt limit until cancelled.
    pub async fn attach(
        context: &DocumentContext,
        adapter: Arc<dyn BuilderAdapter>,
        events: mpsc::UnboundedSender<SaveDetected>,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), DetectError> {
        poll::until(
            || match Self::install(context, Arc::clone(&adapter), events.clone()) {
                Err(DetectError::MissingTransport { .. }) => None,
                other => Some(other),
            },
            interval,
            cancel,
        )
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Bricks, Environment, Gutenberg, RequestPayload};
    use parking_lot::Mutex;
    use url::Url;

    /// Fetch primitive answering every request with a fixed status.
    struct StaticFetch(u16);

    impl FetchTransport for StaticFetch {
        fn fetch(&self, _request: &OutgoingRequest) -> Result<Response, TransportError> {
            Ok(Response {
                status: self.0,
                body: "{}".to_string(),
            })
        }
    }

    /// Legacy primitive completing synchronously.
    struct ImmediateLegacy;

    impl LegacyTransport for ImmediateLegacy {
        fn send(&self, _request: OutgoingRequest, on_load: OnLoad) {
            on_load(&Response::ok("1"));
        }
    }

    struct Never;

    impl BuilderAdapter for Never {
        fn id(&self) -> &'static str {
            "never"
        }
        fn detect_save(&self, _url: &Url, _payload: &RequestPayload) -> bool {
            false
        }
        fn describe_environment(&self) -> Environment {
            Environment {
                uses_legacy_transport: true,
            }
        }
    }

    fn ajax_save() -> OutgoingRequest {
        OutgoingRequest::post(
            Url::parse("https://site.test/wp-admin/admin-ajax.php").unwrap(),
            Some("application/x-www-form-urlencoded"),
            "action=bricks_save_post&postId=3",
        )
    }

    fn rest_save() -> OutgoingRequest {
        OutgoingRequest::post(
            Url::parse("https://site.test/wp-json/wp/v2/pages/3").unwrap(),
            Some("application/json"),
            r#"{"content":""}"#,
        )
    }

    #[test]
    fn test_legacy_save_emits_once_and_original_runs() {
        let context = DocumentContext::new("main");
        context.provide_legacy(Arc::new(ImmediateLegacy));
        let (tx, mut rx) = mpsc::unbounded_channel();
        SaveDetector::install(&context, Arc::new(Bricks), tx).unwrap();

        let handled = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&handled);
        context.legacy().unwrap().send(
            ajax_save(),
            Box::new(move |response| {
                assert!(response.is_success());
                *counter.lock() += 1;
            }),
        );

        assert_eq!(*handled.lock(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fetch_response_passes_through() {
        let context = DocumentContext::new("main");
        context.provide_fetch(Arc::new(StaticFetch(200)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        SaveDetector::install(&context, Arc::new(Gutenberg), tx).unwrap();

        let response = context.fetch().unwrap().fetch(&rest_save()).unwrap();
        assert_eq!(response, Response::ok("{}"));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_failed_request_is_not_a_save() {
        let context = DocumentContext::new("main");
        context.provide_fetch(Arc::new(StaticFetch(500)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        SaveDetector::install(&context, Arc::new(Gutenberg), tx).unwrap();

        let response = context.fetch().unwrap().fetch(&rest_save()).unwrap();
        assert_eq!(response.status, 500);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_adapter_that_never_detects_never_fires() {
        let context = DocumentContext::new("main");
        context.provide_legacy(Arc::new(ImmediateLegacy));
        let (tx, mut rx) = mpsc::unbounded_channel();
        SaveDetector::install(&context, Arc::new(Never), tx).unwrap();

        let ran = Arc::new(Mutex::new(false));
        for _ in 0..5 {
            let ran = Arc::clone(&ran);
            context
                .legacy()
                .unwrap()
                .send(ajax_save(), Box::new(move |_| *ran.lock() = true));
        }
        assert!(*ran.lock());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_install_once() {
        let context = DocumentContext::new("main");
        context.provide_legacy(Arc::new(ImmediateLegacy));
        let (tx, _rx) = mpsc::unbounded_channel();
        SaveDetector::install(&context, Arc::new(Bricks), tx.clone()).unwrap();
        assert_eq!(
            SaveDetector::install(&context, Arc::new(Bricks), tx),
            Err(DetectError::AlreadyInstalled("main".to_string()))
        );
        assert!(context.is_intercepted());
    }

    #[test]
    fn test_shape_follows_adapter() {
        // Bricks is legacy: a fetch primitive alone is not enough
        let context = DocumentContext::new("frame");
        context.provide_fetch(Arc::new(StaticFetch(200)));
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            SaveDetector::install(&context, Arc::new(Bricks), tx),
            Err(DetectError::MissingTransport { transport: "legacy", .. })
        ));
        assert!(!context.is_intercepted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_waits_for_host() {
        let context = Arc::new(DocumentContext::new("main"));
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let late = Arc::clone(&context);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            late.provide_legacy(Arc::new(ImmediateLegacy));
        });

        SaveDetector::attach(&context, Arc::new(Bricks), tx, Duration::from_millis(250), &cancel)
            .await
            .unwrap();
        assert!(context.is_intercepted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_cancelled() {
        let context = DocumentContext::new("main");
        let (tx, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result =
            SaveDetector::attach(&context, Arc::new(Bricks), tx, Duration::from_millis(250), &cancel)
                .await;
        assert_eq!(result, Err(DetectError::Cancelled(poll::Cancelled)));
    }
}

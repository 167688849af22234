//! Decorators wrapping the host transports.
//!
//! Detection runs synchronously inside the completion path, after the
//! original handler, and never alters what the page sees.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;

use super::transport::{FetchTransport, LegacyTransport, OnLoad, OutgoingRequest, Response, TransportError};
use super::SaveDetected;
use crate::builder::BuilderAdapter;
use crate::debug;

/// Runs the adapter against completed requests.
pub(super) struct SaveObserver {
    adapter: Arc<dyn BuilderAdapter>,
    events: mpsc::UnboundedSender<SaveDetected>,
}

impl SaveObserver {
    pub(super) fn new(
        adapter: Arc<dyn BuilderAdapter>,
        events: mpsc::UnboundedSender<SaveDetected>,
    ) -> Self {
        Self { adapter, events }
    }

    fn observe(&self, request: &OutgoingRequest, response: &Response) {
        if !response.is_success() {
            return;
        }
        if !self.adapter.detect_save(&request.url, &request.payload()) {
            return;
        }
        debug!("detect"; "{} save via {}", self.adapter.id(), request.url.path());
        if self.events.send(SaveDetected { at: SystemTime::now() }).is_err() {
            debug!("detect"; "save listener gone, event dropped");
        }
    }
}

pub(super) struct InterceptedFetch {
    pub(super) inner: Arc<dyn FetchTransport>,
    pub(super) observer: Arc<SaveObserver>,
}

impl FetchTransport for InterceptedFetch {
    fn fetch(&self, request: &OutgoingRequest) -> Result<Response, TransportError> {
        let result = self.inner.fetch(request);
        if let Ok(response) = &result {
            self.observer.observe(request, response);
        }
        result
    }
}

pub(super) struct InterceptedLegacy {
    pub(super) inner: Arc<dyn LegacyTransport>,
    pub(super) observer: Arc<SaveObserver>,
}

impl LegacyTransport for InterceptedLegacy {
    fn send(&self, request: OutgoingRequest, on_load: OnLoad) {
        let observer = Arc::clone(&self.observer);
        let observed = request.clone();
        self.inner.send(
            request,
            Box::new(move |response: &Response| {
                on_load(response);
                observer.observe(&observed, response);
            }),
        );
    }
}

//! Replay captured editor traffic through a builder's save detector.
//!
//! Each line of the capture file is one request:
//!
//! ```json
//! {"url": "https://site.test/wp-admin/admin-ajax.php",
//!  "content_type": "application/x-www-form-urlencoded",
//!  "body": "action=bricks_save_post&postId=7", "status": 200}
//! ```
//!
//! Requests go through the same primitive the editor would use, so the
//! output is exactly the build requests a live session would have produced.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tungstenite::Message;
use url::Url;

use crate::actor::integration::EditorIntegration;
use crate::builder::{Capability, Integration, Registry};
use crate::bus::{COMPILER, Origin, TaskEnvelope};
use crate::config::{BridgeConfig, ProjectConfig};
use crate::detect::{
    DocumentContext, FetchTransport, LegacyTransport, OnLoad, OutgoingRequest, Response,
    TransportError,
};
use crate::utils::poll;
use crate::{debug, log};

/// Upper bound for the detector to come up in the replay document.
const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
struct CapturedRequest {
    url: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default = "default_status")]
    status: u16,
}

fn default_status() -> u16 {
    200
}

impl CapturedRequest {
    fn outgoing(&self) -> Result<OutgoingRequest> {
        let url = Url::parse(&self.url).with_context(|| format!("invalid url `{}`", self.url))?;
        Ok(OutgoingRequest::post(url, self.content_type.as_deref(), self.body.clone()))
    }
}

/// Host primitive answering with the captured status.
#[derive(Default)]
struct ReplayTransport {
    status: AtomicU16,
}

impl ReplayTransport {
    fn respond(&self) -> Response {
        Response {
            status: self.status.load(Ordering::SeqCst),
            body: String::new(),
        }
    }
}

impl FetchTransport for ReplayTransport {
    fn fetch(&self, _request: &OutgoingRequest) -> Result<Response, TransportError> {
        Ok(self.respond())
    }
}

impl LegacyTransport for ReplayTransport {
    fn send(&self, _request: OutgoingRequest, on_load: OnLoad) {
        on_load(&self.respond());
    }
}

/// Returns the number of build requests produced.
pub fn replay(config: &ProjectConfig, builder: &str, file: &Path, publish: bool) -> Result<usize> {
    let enabled = config.integrations.resolve(&Registry::builtin())?;
    let integration = enabled.iter().find(|i| i.id == builder).cloned().ok_or_else(|| {
        anyhow!(
            "`{}` is not an enabled builder (enabled: {})",
            builder,
            enabled.iter().map(|i| i.id).collect::<Vec<_>>().join(", ")
        )
    })?;
    if !integration.has(Capability::SaveDetector) {
        bail!("`{}` has no save detection", builder);
    }

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let captured = parse_capture(&content)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    let envelopes = rt.block_on(detect_saves(
        &integration,
        &captured,
        config.integrations.poll_interval(),
    ))?;
    log!("detect"; "{} of {} requests were saves", envelopes.len(), captured.len());

    if publish {
        publish_remote(&config.bridge, &envelopes)?;
    } else {
        for envelope in &envelopes {
            println!("{}", envelope.to_json()?);
        }
    }
    Ok(envelopes.len())
}

fn parse_capture(content: &str) -> Result<Vec<CapturedRequest>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: malformed request", i + 1))
        })
        .collect()
}

/// Run `integration` in a replay document and send `captured` through it.
///
/// Returns the build requests the integration published, in order.
async fn detect_saves(
    integration: &Integration,
    captured: &[CapturedRequest],
    poll_interval: Duration,
) -> Result<Vec<TaskEnvelope>> {
    let origin = Origin::new(format!("replay/{}", integration.id));
    let mut compiler = origin.bus().subscribe(COMPILER);
    let collector = tokio::spawn(async move {
        let mut envelopes = Vec::new();
        while let Some(envelope) = compiler.recv().await {
            envelopes.push(envelope);
        }
        envelopes
    });

    let transport = Arc::new(ReplayTransport::default());
    let context = Arc::new(DocumentContext::new(format!("replay/{}", integration.id)));
    context.provide_fetch(transport.clone());
    context.provide_legacy(transport.clone());

    let cancel = CancellationToken::new();
    let editor = tokio::spawn(
        EditorIntegration::new(integration.clone(), origin.bus(), Arc::clone(&context))
            .with_poll_interval(poll_interval)
            .run(cancel.clone()),
    );
    let attached = poll::until(
        || context.is_intercepted().then_some(()),
        Duration::from_millis(1),
        &cancel,
    );
    if tokio::time::timeout(ATTACH_TIMEOUT, attached).await.is_err() {
        cancel.cancel();
        bail!("save detector for `{}` did not attach", integration.id);
    }

    let legacy = integration.adapter.describe_environment().uses_legacy_transport;
    for request in captured {
        transport.status.store(request.status, Ordering::SeqCst);
        let outgoing = request.outgoing()?;
        if legacy {
            let primitive = context.legacy().context("legacy transport missing")?;
            primitive.send(outgoing, Box::new(|_| {}));
        } else {
            let primitive = context.fetch().context("fetch transport missing")?;
            primitive.fetch(&outgoing)?;
        }
        // let the integration publish before the next request
        tokio::task::yield_now().await;
    }

    // closing the document ends the integration once every save is published
    drop(context);
    let published = editor.await??;
    drop(origin);
    let envelopes = collector.await?;
    debug!("detect"; "{} published, {} collected", published, envelopes.len());
    Ok(envelopes)
}

fn publish_remote(bridge: &BridgeConfig, envelopes: &[TaskEnvelope]) -> Result<()> {
    let endpoint = format!("ws://{}", SocketAddr::new(bridge.interface, bridge.port));
    let (mut ws, _) = tungstenite::connect(&endpoint)
        .with_context(|| format!("cannot reach bridge at {endpoint}"))?;
    for envelope in envelopes {
        ws.send(Message::Text(envelope.to_json()?.into()))?;
    }
    let _ = ws.close(None);
    log!("bridge"; "sent {} requests to {}", envelopes.len(), endpoint);
    Ok(())
}

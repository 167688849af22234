//! Editor Integration
//!
//! Bootstraps one builder inside one document: waits for the editor's request
//! primitive, installs the save detector, and turns every detected save into
//! a `generate-cache` request for the compiler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::builder::{Capability, Integration};
use crate::bus::{TaskBus, TaskEnvelope};
use crate::detect::{DetectError, DocumentContext, SaveDetector};
use crate::{debug, log};

pub struct EditorIntegration {
    integration: Integration,
    bus: TaskBus,
    context: Arc<DocumentContext>,
    poll: Duration,
}

impl EditorIntegration {
    pub fn new(integration: Integration, bus: TaskBus, context: Arc<DocumentContext>) -> Self {
        Self {
            integration,
            bus,
            context,
            poll: Duration::from_millis(500),
        }
    }

    /// Interval between readiness checks while the editor loads.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Run until cancelled or until the document goes away.
    ///
    /// Returns the number of build requests published.
    pub async fn run(self, cancel: CancellationToken) -> Result<usize, DetectError> {
        let Self {
            integration,
            bus,
            context,
            poll,
        } = self;
        let id = integration.id;
        if !integration.has(Capability::SaveDetector) {
            debug!("detect"; "{} has no save detection", id);
            return Ok(0);
        }

        let (tx, mut saves) = mpsc::unbounded_channel();
        match SaveDetector::attach(&context, Arc::clone(&integration.adapter), tx, poll, &cancel).await {
            Ok(()) => {}
            Err(DetectError::Cancelled(_)) => return Ok(0),
            Err(e) => return Err(e),
        }
        log!("detect"; "{} save detection active in {}", id, context.id());
        // the detector lives in the document; saves stop once it is dropped
        drop(context);

        let mut published = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                save = saves.recv() => {
                    let Some(save) = save else { break };
                    debug!("detect"; "{} saved at {:?}", id, save.at);
                    match bus.publish(&TaskEnvelope::generate_cache(id)) {
                        Ok(_) => published += 1,
                        Err(e) => log!("error"; "cannot request build: {}", e),
                    }
                }
            }
        }
        Ok(published)
    }
}

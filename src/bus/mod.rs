//! Cross-context task bus.
//!
//! A broadcast channel per name, shared by every context of one [`Origin`].
//! Envelopes travel as JSON text and are delivered at most once to each
//! subscriber that is alive when they are published. There is no request /
//! response correlation: consumers look at `target` and `task` only.
//!
//! Like a browser `BroadcastChannel`, a handle never hears its own messages.

pub mod bridge;
mod envelope;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;

pub use envelope::{
    ANY, BuildKind, COMPILER, CacheReady, GenerateCache, TaskEnvelope, TaskKind,
};

use crate::{debug, log};

/// Well-known channel name.
pub const CHANNEL_NAME: &str = "windsync.tasks";

/// Per-channel buffer; slower subscribers lose the oldest envelopes.
const CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid envelope: {0}")]
    Invalid(String),

    #[error("failed to encode envelope")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct Delivery {
    publisher: u64,
    text: Arc<str>,
}

/// Process-wide bus registry. Create one at startup and pass it around.
pub struct Origin {
    name: String,
    channels: DashMap<String, broadcast::Sender<Delivery>>,
    handles: AtomicU64,
}

impl Origin {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            channels: DashMap::new(),
            handles: AtomicU64::new(0),
        })
    }

    /// Open a new handle on the well-known channel.
    pub fn bus(self: &Arc<Self>) -> TaskBus {
        self.channel(CHANNEL_NAME)
    }

    /// Open a new handle on a named channel.
    pub fn channel(self: &Arc<Self>, name: &str) -> TaskBus {
        let sender = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("bus"; "{} opened {}", self.name, name);
                broadcast::channel(CAPACITY).0
            })
            .clone();
        TaskBus {
            sender,
            handle: self.handles.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// One context's handle on a channel. Clones share the handle identity.
///
/// Handles keep the channel open, not the origin: a subscription ends once
/// the origin and every handle are gone.
#[derive(Clone)]
pub struct TaskBus {
    sender: broadcast::Sender<Delivery>,
    handle: u64,
}

impl TaskBus {
    /// Publish to every other handle. Returns how many subscribers got it.
    ///
    /// Publishing with nobody listening is not an error.
    pub fn publish(&self, envelope: &TaskEnvelope) -> Result<usize, BusError> {
        envelope.validate()?;
        let text: Arc<str> = envelope.to_json()?.into();
        debug!("bus"; "{} {} -> {}", envelope.task, envelope.source, envelope.target);
        Ok(self
            .sender
            .send(Delivery {
                publisher: self.handle,
                text,
            })
            .unwrap_or(0))
    }

    /// Receive envelopes addressed to `identity` or to [`ANY`].
    pub fn subscribe(&self, identity: impl Into<String>) -> Subscription {
        self.subscription(Some(identity.into()))
    }

    /// Receive every envelope regardless of target.
    pub fn subscribe_all(&self) -> Subscription {
        self.subscription(None)
    }

    fn subscription(&self, identity: Option<String>) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            handle: self.handle,
            identity,
        }
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<Delivery>,
    handle: u64,
    identity: Option<String>,
}

impl Subscription {
    /// Next relevant envelope; `None` once the channel is gone.
    ///
    /// Undecodable messages and envelopes for other targets are skipped.
    pub async fn recv(&mut self) -> Option<TaskEnvelope> {
        loop {
            let delivery = match self.receiver.recv().await {
                Ok(delivery) => delivery,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log!("bus"; "subscriber fell behind, {} envelopes dropped", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };
            if delivery.publisher == self.handle {
                continue;
            }
            let envelope = match TaskEnvelope::from_json(&delivery.text) {
                Ok(envelope) => envelope,
                Err(e) => {
                    debug!("bus"; "skipping malformed envelope: {}", e);
                    continue;
                }
            };
            if let Some(identity) = &self.identity
                && !envelope.is_for(identity)
            {
                continue;
            }
            return Some(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;

    use super::*;

    async fn next(sub: &mut Subscription) -> Option<TaskEnvelope> {
        tokio::time::timeout(Duration::from_millis(50), sub.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_delivery_by_target() {
        let origin = Origin::new("https://site.test");
        let editor = origin.bus();
        let mut compiler = origin.bus().subscribe(COMPILER);
        let mut panel = origin.bus().subscribe("ui-panel");

        editor.publish(&TaskEnvelope::generate_cache("bricks")).unwrap();

        assert_eq!(next(&mut compiler).await.unwrap().task, TaskKind::GenerateCache);
        assert!(next(&mut panel).await.is_none());
    }

    #[tokio::test]
    async fn test_any_reaches_everyone() {
        let origin = Origin::new("o");
        let compiler = origin.bus();
        let mut a = origin.bus().subscribe("a");
        let mut b = origin.bus().subscribe("b");
        compiler
            .publish(&TaskEnvelope::new(TaskKind::CacheGenerated, COMPILER, ANY, Value::Null))
            .unwrap();
        assert!(next(&mut a).await.is_some());
        assert!(next(&mut b).await.is_some());
    }

    #[tokio::test]
    async fn test_no_self_delivery() {
        let origin = Origin::new("o");
        let bus = origin.bus();
        let mut own = bus.subscribe(COMPILER);
        let mut other = origin.bus().subscribe(COMPILER);
        bus.publish(&TaskEnvelope::generate_cache("bricks")).unwrap();
        assert!(next(&mut own).await.is_none());
        assert!(next(&mut other).await.is_some());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let origin = Origin::new("o");
        let sent = origin
            .bus()
            .publish(&TaskEnvelope::generate_cache("bricks"))
            .unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_invalid_envelope_rejected() {
        let origin = Origin::new("o");
        let envelope = TaskEnvelope::new(TaskKind::GenerateCache, "", COMPILER, Value::Null);
        assert!(matches!(
            origin.bus().publish(&envelope),
            Err(BusError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_subscription_ends_with_origin() {
        let origin = Origin::new("o");
        let editor = origin.bus();
        let mut sub = origin.bus().subscribe(COMPILER);
        editor.publish(&TaskEnvelope::generate_cache("bricks")).unwrap();
        drop(editor);
        drop(origin);
        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_channels_are_separate() {
        let origin = Origin::new("o");
        let mut listener = origin.channel("other").subscribe(COMPILER);
        origin
            .bus()
            .publish(&TaskEnvelope::generate_cache("bricks"))
            .unwrap();
        assert!(next(&mut listener).await.is_none());
    }

    #[tokio::test]
    async fn test_per_publisher_order() {
        let origin = Origin::new("o");
        let editor = origin.bus();
        let mut sub = origin.bus().subscribe(COMPILER);
        for builder in ["a", "b", "c"] {
            editor.publish(&TaskEnvelope::generate_cache(builder)).unwrap();
        }
        let mut sources = Vec::new();
        while let Some(env) = next(&mut sub).await {
            sources.push(env.source);
        }
        assert_eq!(sources, ["integration/a", "integration/b", "integration/c"]);
    }
}

//! Variable Sync
//!
//! Keeps one dedicated stylesheet of design tokens current in every attached
//! document. On a completion signal the generated cache is re-read, its
//! `:root` variables extracted, and the stylesheet rewritten in place.
//!
//! `cache-generated` carries the cache path and a content hash: the file is
//! re-read until its hash matches. Signals without one (editor saves) wait a
//! fixed settle delay instead.

mod document;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
pub use document::StyleDocument;
pub use document::{FileStyleRoot, StyleRoot};

use crate::bus::{CacheReady, Subscription, TaskBus, TaskEnvelope};
use crate::compiler::{extract_variables, render_variables};
use crate::storage::{Storage, StorageError};
use crate::utils::hash::ContentHash;
use crate::{debug, log};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage failed")]
    Storage(#[from] StorageError),

    #[error("`{0}` does not exist yet")]
    Missing(String),

    #[error("`{path}` still stale after {attempts} reads")]
    Stale { path: String, attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Id of the dedicated style element.
    pub style_id: String,
    /// Cache read after signals that carry no location.
    pub cache_path: String,
    /// Delay before re-reading after an unacknowledged signal.
    pub settle: Duration,
    /// Delay between hash-checked reads.
    pub retry: Duration,
    pub max_attempts: u32,
}

pub struct VariableSync {
    subscription: Subscription,
    storage: Arc<dyn Storage>,
    roots: Vec<Arc<dyn StyleRoot>>,
    settings: SyncSettings,
}

impl VariableSync {
    pub fn new(
        bus: &TaskBus,
        identity: &str,
        storage: Arc<dyn Storage>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            subscription: bus.subscribe(identity),
            storage,
            roots: Vec::new(),
            settings,
        }
    }

    pub fn with_root(mut self, root: Arc<dyn StyleRoot>) -> Self {
        self.roots.push(root);
        self
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let envelope = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                envelope = self.subscription.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };
            if !envelope.task.is_completion() {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.refresh(&envelope) => {
                    if let Err(e) = result {
                        log!("sync"; "refresh failed: {}", e);
                    }
                }
            }
        }
        debug!("sync"; "stopped");
    }

    /// Re-read the cache for `signal` and rewrite the stylesheet.
    ///
    /// Returns the number of variables written.
    pub async fn refresh(&self, signal: &TaskEnvelope) -> Result<usize, SyncError> {
        let css = match signal.payload::<CacheReady>() {
            Ok(ready) => self.read_acknowledged(&ready).await?,
            Err(_) => {
                debug!("sync"; "{} without acknowledgment, settling", signal.task);
                tokio::time::sleep(self.settings.settle).await;
                let path = &self.settings.cache_path;
                self.storage
                    .read(path)?
                    .ok_or_else(|| SyncError::Missing(path.clone()))?
            }
        };
        self.apply(&css)
    }

    async fn read_acknowledged(&self, ready: &CacheReady) -> Result<String, SyncError> {
        for attempt in 1..=self.settings.max_attempts {
            if let Some(css) = self.storage.read(&ready.path)?
                && ContentHash::matches_hex(&css, &ready.hash)
            {
                return Ok(css);
            }
            debug!("sync"; "{} not current yet (attempt {})", ready.path, attempt);
            tokio::time::sleep(self.settings.retry).await;
        }
        Err(SyncError::Stale {
            path: ready.path.clone(),
            attempts: self.settings.max_attempts,
        })
    }

    fn apply(&self, css: &str) -> Result<usize, SyncError> {
        let variables = extract_variables(css);
        let text = render_variables(&variables);
        for root in &self.roots {
            root.apply(&self.settings.style_id, &text)?;
        }
        debug!("sync"; "{} variables -> {} roots", variables.len(), self.roots.len());
        Ok(variables.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bus::{ANY, BuildKind, COMPILER, Origin, TaskKind};
    use crate::storage::MemoryStorage;

    const CACHE: &str = "cache/windsync.css";
    const STYLE: &str = "windsync-variables";

    fn settings() -> SyncSettings {
        SyncSettings {
            style_id: STYLE.into(),
            cache_path: CACHE.into(),
            settle: Duration::from_secs(1),
            retry: Duration::from_millis(100),
            max_attempts: 5,
        }
    }

    fn ready(css: &str) -> TaskEnvelope {
        TaskEnvelope::cache_generated(&CacheReady {
            kind: BuildKind::Incremental,
            providers: vec!["bricks".into()],
            path: CACHE.into(),
            hash: ContentHash::of(css).to_hex(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_writes_variables_everywhere() {
        let origin = Origin::new("o");
        let storage = Arc::new(MemoryStorage::new());
        let css = ":root{--brand:#0af;--gap:4px}\n.flex{display:flex}";
        storage.put(CACHE, css);

        let doc = StyleDocument::new("main");
        let frame = StyleDocument::new("canvas");
        doc.add_frame(frame.clone());
        let sync = VariableSync::new(&origin.bus(), "sync/bricks", storage, settings())
            .with_root(doc.clone());

        assert_eq!(sync.refresh(&ready(css)).await.unwrap(), 2);
        assert_eq!(sync.refresh(&ready(css)).await.unwrap(), 2);
        let expected = ":root {\n  --brand: #0af;\n  --gap: 4px;\n}\n";
        assert_eq!(doc.style_text(STYLE).as_deref(), Some(expected));
        assert_eq!(frame.style_text(STYLE).as_deref(), Some(expected));
        assert_eq!(doc.count(STYLE), 1);
        assert_eq!(frame.count(STYLE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_matching_hash() {
        let origin = Origin::new("o");
        let storage = Arc::new(MemoryStorage::new());
        storage.put(CACHE, ":root{--a:old}");
        let doc = StyleDocument::new("main");
        let sync = VariableSync::new(&origin.bus(), "sync", storage.clone(), settings())
            .with_root(doc.clone());

        let fresh = ":root{--a:new}";
        let writer = storage.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            writer.put(CACHE, fresh);
        });

        sync.refresh(&ready(fresh)).await.unwrap();
        assert!(doc.style_text(STYLE).unwrap().contains("--a: new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_when_never_current() {
        let origin = Origin::new("o");
        let storage = Arc::new(MemoryStorage::new());
        storage.put(CACHE, ":root{--a:old}");
        let doc = StyleDocument::new("main");
        let sync = VariableSync::new(&origin.bus(), "sync", storage, settings())
            .with_root(doc.clone());

        let result = sync.refresh(&ready(":root{--a:new}")).await;
        assert!(matches!(result, Err(SyncError::Stale { attempts: 5, .. })));
        assert!(doc.style_text(STYLE).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_signal_settles_first() {
        let origin = Origin::new("o");
        let storage = Arc::new(MemoryStorage::new());
        storage.put(CACHE, ":root{--a:1}");
        let doc = StyleDocument::new("main");
        let sync = VariableSync::new(&origin.bus(), "sync", storage, settings())
            .with_root(doc.clone());

        let signal = TaskEnvelope::new(TaskKind::IntellisenseSaved, "editor", ANY, json!({}));
        let started = tokio::time::Instant::now();
        sync.refresh(&signal).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(doc.style_text(STYLE).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_cache_keeps_variables() {
        let origin = Origin::new("o");
        let storage = Arc::new(MemoryStorage::new());
        let doc = StyleDocument::new("main");
        doc.apply(STYLE, ":root {\n  --brand: #0af;\n}\n").unwrap();
        let sync = VariableSync::new(&origin.bus(), "sync", storage, settings())
            .with_root(doc.clone());

        let signal = TaskEnvelope::new(TaskKind::CodeEditorSaved, "editor", ANY, json!({}));
        assert!(matches!(sync.refresh(&signal).await, Err(SyncError::Missing(_))));
        assert_eq!(
            doc.style_text(STYLE).as_deref(),
            Some(":root {\n  --brand: #0af;\n}\n")
        );
    }

    #[tokio::test]
    async fn test_run_reacts_to_completion_only() {
        let origin = Origin::new("o");
        let storage = Arc::new(MemoryStorage::new());
        let css = ":root{--a:1}";
        storage.put(CACHE, css);
        let doc = StyleDocument::new("main");
        let cancel = CancellationToken::new();

        let sync = VariableSync::new(&origin.bus(), "sync", storage, settings())
            .with_root(doc.clone());
        let handle = tokio::spawn(sync.run(cancel.clone()));

        let compiler = origin.bus();
        compiler
            .publish(&TaskEnvelope::new(TaskKind::GenerateCache, "ui", COMPILER, json!({})))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(doc.style_text(STYLE).is_none());

        compiler.publish(&ready(css)).unwrap();
        for _ in 0..50 {
            if doc.style_text(STYLE).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(doc.style_text(STYLE).is_some());

        cancel.cancel();
        handle.await.unwrap();
    }
}

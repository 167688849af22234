//! Actor Coordinator - Wires up the Actor System
//!
//! The Coordinator is a thin orchestrator that:
//! - Opens the bus origin and storage
//! - Resolves the enabled builders once
//! - Wires up actors
//! - Runs them until Ctrl+C

mod runtime;

use std::sync::Arc;

use anyhow::Result;
use crossbeam::channel::Receiver;
use tokio_util::sync::CancellationToken;

use super::orchestrator::{CacheBuilder, CompilerOrchestrator, OrchestratorSettings};
use super::sync::{FileStyleRoot, StyleRoot, SyncSettings, VariableSync};
use crate::builder::{Capability, Integration, Registry};
use crate::bus::bridge::Bridge;
use crate::bus::{Origin, TaskEnvelope};
use crate::compiler::Compiler;
use crate::config::ProjectConfig;
use crate::storage::{FsStorage, Storage};
use crate::vfs::PackageLoader;

/// Bus identity of the file-backed variables documents.
const SYNC_IDENTITY: &str = "sync/files";

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator {
    config: Arc<ProjectConfig>,
    origin: Arc<Origin>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn with_config(config: Arc<ProjectConfig>) -> Self {
        let origin = Origin::new(config.root.display().to_string());
        Self {
            config,
            origin,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system.
    pub async fn run(mut self) -> Result<()> {
        let cancel = CancellationToken::new();
        let storage = open_storage(&self.config);

        let orchestrator = CompilerOrchestrator::new(
            self.origin.bus(),
            cache_builder(&self.config, Arc::clone(&storage)),
        );

        let integrations = self.config.integrations.resolve(&Registry::builtin())?;
        let roots = style_roots(&self.config, &storage, &integrations);
        if roots.is_empty() {
            crate::debug!("sync"; "no enabled builder syncs variables");
        }
        let sync = VariableSync::new(
            &self.origin.bus(),
            SYNC_IDENTITY,
            Arc::clone(&storage),
            sync_settings(&self.config),
        );
        let sync = roots.into_iter().fold(sync, VariableSync::with_root);

        let bridge = if self.config.bridge.enable {
            let bridge = Bridge::bind(
                self.origin.bus(),
                self.config.bridge.interface,
                self.config.bridge.port,
                &cancel,
            )?;
            crate::log!(
                "bridge";
                "editors connect to ws://{}:{}",
                self.config.bridge.interface,
                bridge.port()
            );
            Some(bridge)
        } else {
            None
        };

        // the orchestrator already listens, so the startup build is not lost
        self.origin.bus().publish(&TaskEnvelope::full_build("serve"))?;

        crate::debug!("actor"; "start");
        let shutdown_rx = self.shutdown_rx.take();
        runtime::run_actors(orchestrator, sync, bridge, shutdown_rx, cancel).await?;
        crate::debug!("actor"; "stopped");
        Ok(())
    }
}

// =============================================================================
// Wiring shared with one-shot commands
// =============================================================================

pub fn open_storage(config: &ProjectConfig) -> Arc<dyn Storage> {
    Arc::new(FsStorage::new(
        &config.root,
        &config.storage.volume,
        config.storage.providers.clone(),
    ))
}

pub fn cache_builder(config: &ProjectConfig, storage: Arc<dyn Storage>) -> CacheBuilder {
    let mut compiler = Compiler::default();
    if let Some(packages) = &config.compiler.packages {
        compiler = compiler.with_packages(Arc::new(PackageLoader::new(config.root_join(packages))));
    }
    let settings = OrchestratorSettings {
        entrypoint: config.compiler.entrypoint.clone(),
        cache_path: config.compiler.cache.clone(),
        minify: config.compiler.minify,
        coalesce: config.compiler.coalesce(),
    };
    CacheBuilder::new(storage, compiler, settings)
}

/// One variables stylesheet per builder that syncs them, under
/// `<sync.output>/<builder>/`.
fn style_roots(
    config: &ProjectConfig,
    storage: &Arc<dyn Storage>,
    integrations: &[Integration],
) -> Vec<Arc<dyn StyleRoot>> {
    let output = config.sync.output.trim_end_matches('/');
    integrations
        .iter()
        .filter(|integration| integration.has(Capability::VariableSync))
        .map(|integration| {
            let dir = format!("{}/{}", output, integration.id);
            Arc::new(FileStyleRoot::new(Arc::clone(storage), dir)) as Arc<dyn StyleRoot>
        })
        .collect()
}

fn sync_settings(config: &ProjectConfig) -> SyncSettings {
    SyncSettings {
        style_id: config.sync.style_id.clone(),
        cache_path: config.compiler.cache.clone(),
        settle: config.sync.settle(),
        retry: config.sync.retry(),
        max_attempts: config.sync.attempts,
    }
}

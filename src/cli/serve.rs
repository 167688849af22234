//! Long-running mode: compiler orchestrator, variable sync and bridge.

use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel;

use crate::actor::Coordinator;
use crate::config::ProjectConfig;
use crate::{core, log};

pub fn serve(config: ProjectConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    core::register_shutdown(shutdown_tx);

    let providers: Vec<&str> = config.storage.providers.keys().map(String::as_str).collect();
    log!(
        "serve";
        "{} -> {} (sources: {})",
        config.compiler.entrypoint,
        config.root_join(&config.compiler.cache).display(),
        if providers.is_empty() { "none".to_string() } else { providers.join(", ") }
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(
        Coordinator::with_config(Arc::new(config))
            .with_shutdown_signal(shutdown_rx)
            .run(),
    )
}

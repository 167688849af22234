//! One-shot cache build.
//!
//! Without providers every content source is scanned (full build). With
//! providers only their sources are scanned, starting from an empty candidate
//! set since nothing survives between invocations.

use anyhow::{Result, bail};

use crate::actor::coordinator::{cache_builder, open_storage};
use crate::actor::orchestrator::PendingBuild;
use crate::builder::Registry;
use crate::bus::CacheReady;
use crate::config::ProjectConfig;
use crate::log;

pub fn build_cache(config: &ProjectConfig, providers: &[String]) -> Result<CacheReady> {
    let registry = Registry::builtin();
    if let Some(unknown) = providers.iter().find(|id| registry.get(id).is_none()) {
        bail!(
            "unknown builder `{}` (known: {})",
            unknown,
            registry.ids().collect::<Vec<_>>().join(", ")
        );
    }

    let build = if providers.is_empty() {
        PendingBuild::full()
    } else {
        PendingBuild::incremental(providers.iter().cloned())
    };

    let storage = open_storage(config);
    let mut builder = cache_builder(config, storage);
    let ready = builder.execute(&build)?;
    log!(
        "compiler";
        "{} build, {} candidates -> {}",
        ready.kind,
        builder.candidates().len(),
        config.root_join(&ready.path).display()
    );
    Ok(ready)
}

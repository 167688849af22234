//! Compiler Orchestrator
//!
//! Listens for `generate-cache` requests addressed to the compiler, coalesces
//! bursts into one build, persists the result and announces it.
//!
//! ```text
//! TaskBus --generate-cache--> Coalescer --PendingBuild--> CacheBuilder (blocking)
//!    ^                                                          |
//!    +---------------------cache-generated----------------------+
//! ```
//!
//! Builds never overlap: while one runs, requests keep accumulating in the
//! coalescer and are released once the builder is back.

mod coalesce;


use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use coalesce::PendingBuild;
use coalesce::Coalescer;

use crate::bus::{BuildKind, CacheReady, COMPILER, GenerateCache, Subscription, TaskBus, TaskEnvelope, TaskKind};
use crate::compiler::{BuildInput, CandidateSet, CompileError, Compiler, Volume, optimize, scan_sources};
use crate::storage::{Selector, Storage, StorageError};
use crate::utils::hash::ContentHash;
use crate::vfs::{VfsError, VfsSnapshot};
use crate::{debug, log};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("storage failed")]
    Storage(#[from] StorageError),

    #[error("invalid design-system volume")]
    Volume(#[from] VfsError),
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Entrypoint module inside the volume.
    pub entrypoint: String,
    /// Storage path of the generated stylesheet.
    pub cache_path: String,
    pub minify: bool,
    /// Coalescing window for build requests.
    pub coalesce: Duration,
}

// =============================================================================
// Build state
// =============================================================================

/// Everything a build mutates. Owned by exactly one build at a time.
pub struct CacheBuilder {
    storage: Arc<dyn Storage>,
    compiler: Compiler,
    settings: OrchestratorSettings,
    candidates: CandidateSet,
    /// Encoded volume last sent by an editor; storage is used when absent.
    volume: Option<String>,
}

impl CacheBuilder {
    pub fn new(storage: Arc<dyn Storage>, compiler: Compiler, settings: OrchestratorSettings) -> Self {
        Self {
            storage,
            compiler,
            settings,
            candidates: CandidateSet::new(),
            volume: None,
        }
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Run one build and persist it.
    ///
    /// State is staged locally and committed only once the cache is written,
    /// so a failed build leaves candidates, volume and cache as they were.
    pub fn execute(&mut self, build: &PendingBuild) -> Result<CacheReady, BuildError> {
        let candidates = match build.kind {
            BuildKind::Full => scan_sources(&self.storage.list(&Selector::All)?),
            BuildKind::Incremental => {
                let mut candidates = self.candidates.clone();
                for provider in &build.providers {
                    match self.storage.list(&Selector::Provider(provider.clone())) {
                        Ok(sources) => {
                            let added = candidates.extend(scan_sources(&sources).iter());
                            debug!("compiler"; "{}: {} new candidates", provider, added);
                        }
                        Err(StorageError::UnknownProvider(_)) => {
                            debug!("compiler"; "no sources configured for {}", provider);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                candidates
            }
        };

        let volume = match build.kind {
            BuildKind::Full => build.volume.clone(),
            BuildKind::Incremental => build.volume.clone().or_else(|| self.volume.clone()),
        };
        let stored;
        let input = match &volume {
            Some(blob) => Volume::Encoded(blob),
            None => {
                stored = VfsSnapshot::from_sources(self.storage.list(&Selector::Volume)?)?;
                Volume::Snapshot(&stored)
            }
        };

        let css = self.compiler.build(BuildInput {
            candidates: &candidates,
            entrypoint: &self.settings.entrypoint,
            volume: input,
        })?;
        let optimized = optimize(&css, self.settings.minify)?;
        for warning in &optimized.warnings {
            log!("warning"; "{}", warning);
        }

        self.storage.save(&self.settings.cache_path, &optimized.css)?;

        self.candidates = candidates;
        self.volume = volume;

        Ok(CacheReady {
            kind: build.kind,
            providers: build.providers.clone(),
            path: self.settings.cache_path.clone(),
            hash: ContentHash::of(&optimized.css).to_hex(),
        })
    }
}

// =============================================================================
// Actor
// =============================================================================

type InFlight = JoinHandle<(CacheBuilder, Result<CacheReady, BuildError>)>;

pub struct CompilerOrchestrator {
    bus: TaskBus,
    subscription: Subscription,
    coalescer: Coalescer,
    builder: CacheBuilder,
}

impl CompilerOrchestrator {
    /// Subscribes immediately, so requests published before [`run`](Self::run)
    /// are not lost.
    pub fn new(bus: TaskBus, builder: CacheBuilder) -> Self {
        let subscription = bus.subscribe(COMPILER);
        let coalescer = Coalescer::new(builder.settings.coalesce);
        Self {
            bus,
            subscription,
            coalescer,
            builder,
        }
    }

    /// Queue a build if `envelope` is a valid request for the compiler.
    pub fn accept(&mut self, envelope: &TaskEnvelope) -> bool {
        accept_into(&mut self.coalescer, envelope)
    }

    /// Build right away and announce the result. Returns whether it succeeded.
    #[cfg(test)]
    pub fn dispatch(&mut self, build: &PendingBuild) -> bool {
        let result = self.builder.execute(build);
        announce(&self.bus, result)
    }

    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            bus,
            mut subscription,
            mut coalescer,
            builder,
        } = self;
        let mut idle = Some(builder);
        let mut in_flight: Option<InFlight> = None;

        loop {
            let wait = coalescer.sleep_duration(in_flight.is_some());
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                joined = finished(&mut in_flight) => {
                    in_flight = None;
                    match joined {
                        Ok((builder, result)) => {
                            announce(&bus, result);
                            idle = Some(builder);
                        }
                        Err(e) => {
                            log!("error"; "build task aborted: {}", e);
                            break;
                        }
                    }
                }

                envelope = subscription.recv() => {
                    let Some(envelope) = envelope else { break };
                    accept_into(&mut coalescer, &envelope);
                }

                _ = tokio::time::sleep(wait) => {}
            }

            if idle.is_some()
                && let Some(build) = coalescer.take_if_ready()
                && let Some(mut builder) = idle.take()
            {
                in_flight = Some(tokio::task::spawn_blocking(move || {
                    let result = builder.execute(&build);
                    (builder, result)
                }));
            }
        }

        if let Some(handle) = in_flight {
            // let a running build finish writing before shutdown
            if let Ok((_, result)) = handle.await {
                announce(&bus, result);
            }
        }
        debug!("compiler"; "orchestrator stopped");
    }
}

fn accept_into(coalescer: &mut Coalescer, envelope: &TaskEnvelope) -> bool {
    if envelope.target != COMPILER {
        return false;
    }
    if envelope.task != TaskKind::GenerateCache {
        debug!("compiler"; "ignoring task {}", envelope.task);
        return false;
    }
    let request: GenerateCache = match envelope.payload() {
        Ok(request) => request,
        Err(e) => {
            log!("compiler"; "malformed request from {}: {}", envelope.source, e);
            return false;
        }
    };
    if let Err(e) = request.validate() {
        log!("compiler"; "rejected request from {}: {}", envelope.source, e);
        return false;
    }
    debug!("compiler"; "{} request from {}", request.options.kind(), envelope.source);
    coalescer.add(request.into());
    true
}

async fn finished(
    in_flight: &mut Option<InFlight>,
) -> Result<(CacheBuilder, Result<CacheReady, BuildError>), tokio::task::JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Publish a successful build. Failures are logged and announce nothing.
fn announce(bus: &TaskBus, result: Result<CacheReady, BuildError>) -> bool {
    match result {
        Ok(ready) => {
            let scope = if ready.providers.is_empty() {
                String::new()
            } else {
                format!(" ({})", ready.providers.join(", "))
            };
            log!("compiler"; "{} build{} -> {}", ready.kind, scope, ready.path);
            if let Err(e) = bus.publish(&TaskEnvelope::cache_generated(&ready)) {
                log!("error"; "cannot announce build: {}", e);
            }
            true
        }
        Err(e) => {
            log!("error"; "build failed: {:#}", anyhow::Error::new(e));
            false
        }
    }
}

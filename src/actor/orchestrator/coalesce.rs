use std::time::Duration;

use tokio::time::Instant;

use crate::bus::{BuildKind, GenerateCache};

/// Wake-up interval with nothing to release.
const IDLE_SLEEP: Duration = Duration::from_secs(86400);

/// A build waiting for its coalescing window to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBuild {
    pub kind: BuildKind,
    /// Deduplicated, first-seen order.
    pub providers: Vec<String>,
    /// Encoded volume sent with the latest request, if any.
    pub volume: Option<String>,
}

impl PendingBuild {
    pub fn full() -> Self {
        Self {
            kind: BuildKind::Full,
            providers: Vec::new(),
            volume: None,
        }
    }

    pub fn incremental<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut build = Self {
            kind: BuildKind::Incremental,
            providers: Vec::new(),
            volume: None,
        };
        build.add_providers(providers.into_iter().map(Into::into));
        build
    }

    /// Fold a later request into this one. A full build absorbs everything.
    pub fn merge(&mut self, later: PendingBuild) {
        if later.kind == BuildKind::Full {
            self.kind = BuildKind::Full;
        }
        self.add_providers(later.providers);
        if later.volume.is_some() {
            self.volume = later.volume;
        }
    }

    fn add_providers(&mut self, providers: impl IntoIterator<Item = String>) {
        for provider in providers {
            if !self.providers.contains(&provider) {
                self.providers.push(provider);
            }
        }
    }
}

impl From<GenerateCache> for PendingBuild {
    fn from(request: GenerateCache) -> Self {
        let mut build = match request.options.kind() {
            BuildKind::Full => Self::full(),
            BuildKind::Incremental => Self::incremental(request.options.providers().iter().cloned()),
        };
        build.volume = request.volume;
        build
    }
}

/// Pure coalescer: timing and merging only.
///
/// Every request restarts the window; the pending build is released once the
/// window has passed without new requests.
pub(super) struct Coalescer {
    pending: Option<PendingBuild>,
    last_request: Option<Instant>,
    window: Duration,
}

impl Coalescer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            pending: None,
            last_request: None,
            window,
        }
    }

    pub(super) fn add(&mut self, build: PendingBuild) {
        match &mut self.pending {
            Some(pending) => {
                crate::debug!("compiler"; "coalescing {} request", build.kind);
                pending.merge(build);
            }
            None => self.pending = Some(build),
        }
        self.last_request = Some(Instant::now());
    }

    pub(super) fn is_ready(&self) -> bool {
        match self.last_request {
            Some(last) => self.pending.is_some() && last.elapsed() >= self.window,
            None => false,
        }
    }

    pub(super) fn take_if_ready(&mut self) -> Option<PendingBuild> {
        if !self.is_ready() {
            return None;
        }
        self.last_request = None;
        self.pending.take()
    }

    /// Time until the pending build could be released.
    ///
    /// While a build runs nothing can be released, so the loop only wakes for
    /// new requests or the build finishing.
    pub(super) fn sleep_duration(&self, building: bool) -> Duration {
        let Some(last) = self.last_request.filter(|_| !building) else {
            return IDLE_SLEEP;
        };
        self.window
            .saturating_sub(last.elapsed())
            .max(Duration::from_millis(1))
    }
}

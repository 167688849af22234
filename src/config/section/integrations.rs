//! `[integrations]` section configuration.
//!
//! ```toml
//! [integrations]
//! enabled = ["bricks", "gutenberg"]   # Empty: every built-in builder
//! poll_ms = 500                       # Readiness check while an editor loads
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::builder::{Integration, Registry, RegistryError};
use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    pub enabled: Vec<String>,
    pub poll_ms: u64,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            poll_ms: 500,
        }
    }
}

impl IntegrationsConfig {
    pub const ENABLED: FieldPath = FieldPath::new("integrations.enabled");
    pub const POLL: FieldPath = FieldPath::new("integrations.poll_ms");

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn resolve(&self, registry: &Registry) -> Result<Vec<Integration>, RegistryError> {
        registry.resolve(&self.enabled)
    }

    pub fn validate(&self, registry: &Registry, diag: &mut ConfigDiagnostics) {
        if let Err(RegistryError::Unknown(id)) = self.resolve(registry) {
            diag.error_with_hint(
                Self::ENABLED,
                format!("unknown builder `{id}`"),
                format!("known builders: {}", registry.ids().collect::<Vec<_>>().join(", ")),
            );
        }
        if self.poll_ms == 0 {
            diag.error(Self::POLL, "poll interval must be positive");
        }
    }
}

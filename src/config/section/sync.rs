//! `[sync]` section configuration.
//!
//! ```toml
//! [sync]
//! style_id = "windsync-variables"     # Id of the dedicated style element
//! output = "cache/variables"          # Where file-backed documents live
//! settle_ms = 1000                    # Wait after saves without a hash
//! retry_ms = 100
//! attempts = 5
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub style_id: String,
    pub output: String,
    pub settle_ms: u64,
    pub retry_ms: u64,
    pub attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            style_id: "windsync-variables".to_string(),
            output: "cache/variables".to_string(),
            settle_ms: 1000,
            retry_ms: 100,
            attempts: 5,
        }
    }
}

impl SyncConfig {
    pub const STYLE_ID: FieldPath = FieldPath::new("sync.style_id");
    pub const ATTEMPTS: FieldPath = FieldPath::new("sync.attempts");

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        let valid_id = !self.style_id.is_empty()
            && self
                .style_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_id {
            diag.error_with_hint(
                Self::STYLE_ID,
                format!("`{}` is not a valid element id", self.style_id),
                "use letters, digits, `-` and `_`",
            );
        }
        if self.attempts == 0 {
            diag.error(Self::ATTEMPTS, "at least one read attempt is required");
        }
    }
}

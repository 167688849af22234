//! `[storage]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [storage]
//! root = "."                      # Relative to the config file
//! volume = "design-system"        # Design-system files, served as `/...`
//!
//! [storage.providers]
//! bricks = ["templates/bricks"]
//! gutenberg = ["wp-content/themes/site/templates", "patterns"]
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::builder::Registry;
use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,

    /// Directory holding the design-system volume, relative to `root`.
    pub volume: PathBuf,

    /// Builder id → content directories scanned for candidates.
    pub providers: BTreeMap<String, Vec<PathBuf>>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            volume: PathBuf::from("design-system"),
            providers: BTreeMap::new(),
        }
    }
}

impl StorageConfig {
    pub const VOLUME: FieldPath = FieldPath::new("storage.volume");
    pub const PROVIDERS: FieldPath = FieldPath::new("storage.providers");

    pub fn validate(&self, registry: &Registry, diag: &mut ConfigDiagnostics) {
        if self.volume.is_absolute() {
            diag.error(Self::VOLUME, "volume must be relative to the storage root");
        }
        if self.providers.is_empty() {
            diag.warn(Self::PROVIDERS, "no content sources, builds will have no candidates");
        }
        for (id, dirs) in &self.providers {
            if registry.get(id).is_none() {
                diag.error_with_hint(
                    Self::PROVIDERS,
                    format!("unknown builder `{id}`"),
                    format!("known builders: {}", registry.ids().collect::<Vec<_>>().join(", ")),
                );
            }
            if dirs.iter().any(|d| d.is_absolute()) {
                diag.error(
                    Self::PROVIDERS,
                    format!("`{id}` directories must be relative to the storage root"),
                );
            }
        }
    }
}

//! `[compiler]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [compiler]
//! entrypoint = "/main.css"            # Entry module inside the volume
//! cache = "cache/windsync.css"        # Generated stylesheet (relative to root)
//! minify = true
//! coalesce_ms = 150                   # Window for merging build requests
//! packages = "node_modules"           # Root for bare `@import` specifiers
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Absolute virtual path of the entry stylesheet.
    pub entrypoint: String,

    /// Storage path of the generated cache.
    pub cache: String,

    pub minify: bool,

    /// Requests arriving within this window share one build.
    pub coalesce_ms: u64,

    /// Package root for the resolver fallback. Disabled when absent.
    pub packages: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            entrypoint: "/main.css".to_string(),
            cache: "cache/windsync.css".to_string(),
            minify: true,
            coalesce_ms: 150,
            packages: None,
        }
    }
}

impl CompilerConfig {
    pub const ENTRYPOINT: FieldPath = FieldPath::new("compiler.entrypoint");
    pub const CACHE: FieldPath = FieldPath::new("compiler.cache");
    pub const COALESCE: FieldPath = FieldPath::new("compiler.coalesce_ms");

    pub fn coalesce(&self) -> Duration {
        Duration::from_millis(self.coalesce_ms)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.entrypoint.starts_with('/') {
            diag.error_with_hint(
                Self::ENTRYPOINT,
                format!("`{}` is not an absolute volume path", self.entrypoint),
                format!("use \"/{}\"", self.entrypoint.trim_start_matches("./")),
            );
        }
        if self.cache.is_empty() || self.cache.starts_with('/') || self.cache.contains("..") {
            diag.error_with_hint(
                Self::CACHE,
                "cache must be a path inside the project root",
                "e.g. \"cache/windsync.css\"",
            );
        }
        if self.coalesce_ms > 10_000 {
            diag.warn(Self::COALESCE, "builds will wait more than 10s after a save");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_compiler_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.compiler.entrypoint, "/main.css");
        assert_eq!(config.compiler.cache, "cache/windsync.css");
        assert!(config.compiler.minify);
        assert_eq!(config.compiler.coalesce().as_millis(), 150);
        assert!(config.compiler.packages.is_none());
    }

    #[test]
    fn test_compiler_config_override() {
        let config = test_parse_config(
            "[compiler]\nentrypoint = \"/app.css\"\nminify = false\npackages = \"node_modules\"",
        );
        assert_eq!(config.compiler.entrypoint, "/app.css");
        assert!(!config.compiler.minify);
        assert_eq!(
            config.compiler.packages.as_deref(),
            Some(std::path::Path::new("node_modules"))
        );
    }

    #[test]
    fn test_relative_entrypoint_rejected() {
        let mut config = test_parse_config("[compiler]\nentrypoint = \"main.css\"");
        let mut diag = crate::config::ConfigDiagnostics::new();
        config.compiler.validate(&mut diag);
        assert_eq!(diag.len(), 1);
        assert_eq!(diag.errors()[0].hint.as_deref(), Some("use \"/main.css\""));

        config.compiler.cache = "../outside.css".into();
        let mut diag = crate::config::ConfigDiagnostics::new();
        config.compiler.validate(&mut diag);
        assert_eq!(diag.len(), 2);
    }
}

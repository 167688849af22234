//! Project configuration for `windsync.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # One module per TOML section
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! ├── util.rs        # find_config_file
//! └── mod.rs         # ProjectConfig (this file)
//! ```
//!
//! Every section is optional; a project without a config file runs on the
//! defaults, rooted at the working directory.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{BridgeConfig, CompilerConfig, IntegrationsConfig, StorageConfig, SyncConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::builder::Registry;
use crate::cli::{Cli, Commands};
use crate::{debug, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name, searched upward from the working directory.
pub const CONFIG_NAME: &str = "windsync.toml";

// ============================================================================
// root configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path to the config file, empty when running on defaults.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root: parent of the config file joined with `storage.root`.
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub integrations: IntegrationsConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl ProjectConfig {
    /// Load, apply command-line overrides and validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = path;
                config
            }
            None if cli.config != Path::new(CONFIG_NAME) => {
                return Err(ConfigError::NotFound(cli.config.clone()).into());
            }
            None => {
                debug!("config"; "no {} found, using defaults", CONFIG_NAME);
                Self::default()
            }
        };

        let base = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);
        config.root = base.join(&config.storage.root);
        config.apply_command_options(&cli.command);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    fn apply_command_options(&mut self, command: &Commands) {
        match command {
            Commands::Build { minify, .. } => {
                Self::update_option(&mut self.compiler.minify, minify.as_ref());
            }
            Commands::Serve { interface, port } => {
                Self::update_option(&mut self.bridge.interface, interface.as_ref());
                Self::update_option(&mut self.bridge.port, port.as_ref());
            }
            Commands::Pack { .. } | Commands::Replay { .. } => {}
        }
    }

    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate every section, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let registry = Registry::builtin();
        let mut diag = ConfigDiagnostics::new();

        self.compiler.validate(&mut diag);
        self.storage.validate(&registry, &mut diag);
        self.integrations.validate(&registry, &mut diag);
        self.sync.validate(&mut diag);
        self.bridge.validate(&mut diag);

        diag.print_warnings();
        diag.into_result().map_err(ConfigError::Diagnostics)
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

/// Parse a config snippet, panicking on unknown fields to catch typos.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(ProjectConfig::from_str("[compiler\nminify = true").is_err());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = ProjectConfig::from_str("").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[compiler]\nminify = false\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
        assert!(!config.compiler.minify);
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_validation_collects_every_section() {
        let config = test_parse_config(
            "[compiler]\nentrypoint = \"main.css\"\n[sync]\nattempts = 0\n[bridge]\nport = 0",
        );
        match config.validate() {
            Err(ConfigError::Diagnostics(diag)) => assert_eq!(diag.len(), 3),
            other => panic!("expected diagnostics, got {other:?}"),
        }
    }

    #[test]
    fn test_command_overrides() {
        let mut config = ProjectConfig::default();
        config.apply_command_options(&Commands::Build {
            providers: vec![],
            minify: Some(false),
        });
        assert!(!config.compiler.minify);

        config.apply_command_options(&Commands::Serve {
            interface: None,
            port: Some(7000),
        });
        assert_eq!(config.bridge.port, 7000);
        assert!(config.bridge.interface.is_loopback());
    }
}

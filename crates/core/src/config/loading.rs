//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `TREEWATCH_` and use double underscores
    /// for nested values. For example:
    /// - `TREEWATCH_WATCH__RECURSIVE=true`
    /// - `TREEWATCH_WATCH__QUEUE_CAPACITY=5000`
    /// - `TREEWATCH_WATCH__FILENAME_SUBSTRINGS=first,second` (lists are comma separated)
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        // The config crate does not apply serde defaults for missing sections
        let builder = set_config_default(builder, "watch.recursive", default_recursive())?;
        let builder = set_config_default(
            builder,
            "watch.queue_capacity",
            default_queue_capacity() as i64,
        )?;
        let builder = set_config_default(
            builder,
            "watch.raw_event_capacity",
            default_raw_event_capacity() as i64,
        )?;
        let mut builder = set_config_default(
            builder,
            "watch.shutdown_timeout_ms",
            default_shutdown_timeout_ms() as i64,
        )?;

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("TREEWATCH")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("watch.filename_substrings")
                .with_list_parse_key("watch.filename_patterns")
                .with_list_parse_key("watch.file_types")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.treewatch/config.toml or custom --config path)
    /// 3. Environment variables (TREEWATCH_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        let config = Self::from_file(&path)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

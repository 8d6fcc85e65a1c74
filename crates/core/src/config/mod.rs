//! Configuration module for treewatch
//!
//! This module provides configuration structures and loading mechanisms.
//! Configuration can be loaded from TOML files and/or environment variables.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.treewatch/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".treewatch").join("config.toml"))
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// What to watch and how
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration for a monitored tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Root directory to monitor (the CLI argument takes precedence)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Descend into subdirectories
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Filename substrings, any of which must occur in the file name
    #[serde(default)]
    pub filename_substrings: Vec<String>,

    /// Regular expressions, any of which must match the whole file name
    #[serde(default)]
    pub filename_patterns: Vec<String>,

    /// File types to accept: regular, directory, link, other
    #[serde(default)]
    pub file_types: Vec<String>,

    /// Capacity of the queue between event producer and consumer
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Capacity of the channel fed by the native watcher backend
    #[serde(default = "default_raw_event_capacity")]
    pub raw_event_capacity: usize,

    /// How long stop waits for the background tasks before aborting them
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: None,
            recursive: default_recursive(),
            filename_substrings: Vec::new(),
            filename_patterns: Vec::new(),
            file_types: Vec::new(),
            queue_capacity: default_queue_capacity(),
            raw_event_capacity: default_raw_event_capacity(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let watch = &self.watch;

        if watch.queue_capacity == 0 {
            return Err(Error::config(
                "watch.queue_capacity must be greater than 0".to_string(),
            ));
        }

        if watch.raw_event_capacity == 0 {
            return Err(Error::config(
                "watch.raw_event_capacity must be greater than 0".to_string(),
            ));
        }

        for file_type in &watch.file_types {
            if !VALID_FILE_TYPES.contains(&file_type.to_lowercase().as_str()) {
                return Err(Error::config(format!(
                    "Invalid file type '{file_type}'. Must be one of: {VALID_FILE_TYPES:?}"
                )));
            }
        }

        for pattern in &watch.filename_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(Error::config(format!(
                    "Invalid filename pattern '{pattern}': {e}"
                )));
            }
        }

        if let Some(root) = &watch.root {
            if root.as_os_str().is_empty() {
                return Err(Error::config("watch.root must not be empty".to_string()));
            }
        }

        Ok(())
    }
}

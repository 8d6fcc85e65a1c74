//! Library interface for the treewatch CLI
//!
//! Argument merging and output formatting live here so they can be tested
//! without running the binary.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::PathBuf;
use treewatch_core::config::Config;
use treewatch_watcher::{Constraints, FilesystemEvent, WatcherConfig};

/// Watch options given on the command line
///
/// Every option that is set replaces the matching configuration value.
#[derive(Args, Debug, Default, Clone)]
pub struct WatchArgs {
    /// Directory to watch (defaults to watch.root from the configuration)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Watch subdirectories too
    #[arg(short, long)]
    pub recursive: bool,

    /// Only report files whose name contains this text (repeatable)
    #[arg(short, long = "substring", value_name = "TEXT")]
    pub substrings: Vec<String>,

    /// Only report files whose whole name matches this regex (repeatable)
    #[arg(short, long = "pattern", value_name = "REGEX")]
    pub patterns: Vec<String>,

    /// Only report these file types: regular, directory, link, other
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub file_types: Vec<String>,
}

/// Everything needed to build a monitor
#[derive(Debug)]
pub struct WatchPlan {
    pub root: PathBuf,
    pub constraints: Constraints,
    pub config: WatcherConfig,
}

/// Overlay command line options on a loaded configuration
pub fn apply_args(mut config: Config, args: &WatchArgs) -> Config {
    let watch = &mut config.watch;
    if let Some(path) = &args.path {
        watch.root = Some(path.clone());
    }
    if args.recursive {
        watch.recursive = true;
    }
    if !args.substrings.is_empty() {
        watch.filename_substrings = args.substrings.clone();
    }
    if !args.patterns.is_empty() {
        watch.filename_patterns = args.patterns.clone();
    }
    if !args.file_types.is_empty() {
        watch.file_types = args.file_types.clone();
    }
    config
}

/// Validate the merged configuration and turn it into a watch plan
pub fn plan(config: &Config) -> Result<WatchPlan> {
    config.validate().context("Invalid configuration")?;

    let root = config
        .watch
        .root
        .clone()
        .ok_or_else(|| anyhow!("No directory to watch: pass PATH or set watch.root"))?;
    let constraints =
        Constraints::try_from(&config.watch).context("Invalid watch constraints")?;

    Ok(WatchPlan {
        root,
        constraints,
        config: WatcherConfig::from(&config.watch),
    })
}

/// Log filter used when `RUST_LOG` is not set
pub fn default_log_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("treewatch_watcher={level},treewatch_core={level},treewatch={level}")
}

/// Render one event as a line of output
pub fn format_event(event: &FilesystemEvent, json: bool) -> Result<String> {
    if json {
        serde_json::to_string(event).context("Failed to serialize event")
    } else {
        Ok(event.to_string())
    }
}

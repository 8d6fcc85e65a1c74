//! treewatch CLI - recursive file system monitor
//!
//! Prints one line per change under a directory until interrupted.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use treewatch::{apply_args, default_log_filter, format_event, plan, WatchArgs, WatchPlan};
use treewatch_core::config::Config;
use treewatch_watcher::{FilesystemEvent, Monitor, TreeScanner};

#[derive(Parser)]
#[command(name = "treewatch")]
#[command(about = "Report file system changes under a directory")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    watch: WatchArgs,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Print the existing entries and exit without watching
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let plan = plan(&apply_args(config, &cli.watch))?;

    if cli.once {
        list_existing(plan, cli.json)
    } else {
        watch(plan, cli.json).await
    }
}

/// Initialize logging system
///
/// Logs go to stderr so that stdout carries only events. `RUST_LOG` takes
/// precedence over `--verbose`.
fn init_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose)));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    Ok(())
}

fn print_event(event: &FilesystemEvent, json: bool) {
    match format_event(event, json) {
        Ok(line) => println!("{line}"),
        Err(e) => error!("{e:#}"),
    }
}

/// Print what exists right now
fn list_existing(plan: WatchPlan, json: bool) -> Result<()> {
    let root = std::fs::canonicalize(&plan.root)
        .with_context(|| format!("Cannot resolve {}", plan.root.display()))?;
    let scanner = TreeScanner::new(root, Arc::new(plan.constraints));

    for event in scanner.initial_events()? {
        print_event(&event, json);
    }
    Ok(())
}

/// Watch until Ctrl+C
async fn watch(plan: WatchPlan, json: bool) -> Result<()> {
    let mut monitor = Monitor::builder()
        .root(plan.root)
        .constraints(plan.constraints)
        .config(plan.config)
        .subscriber(move |event| print_event(&event, json))
        .build()?;

    monitor.start().await?;
    info!("Watching {}, press Ctrl+C to stop", monitor.root().display());

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, stopping");
        }
        Err(e) => {
            error!("Error setting up signal handler: {e}");
        }
    }

    monitor.stop().await?;
    Ok(())
}

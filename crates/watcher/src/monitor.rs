//! Monitor: initial scan plus live watching behind one lifecycle
//!
//! The engine is started first, then the existing tree is walked on the
//! engine's consumer task. Entries found by the walk are reported as
//! `Initial`; anything created while the walk runs is reported once, as
//! either `Initial` or `Created`.

use crate::config::WatcherConfig;
use crate::constraints::Constraints;
use crate::engine::{Subscriber, WatcherEngine};
use crate::events::FilesystemEvent;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use treewatch_core::error::{Error, Result};

/// Recursive file system monitor
pub struct Monitor {
    engine: WatcherEngine,
}

impl Monitor {
    /// Create with builder pattern
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::default()
    }

    /// Start live watching, then report what already exists
    ///
    /// Returns once every existing entry has been delivered, with the number
    /// of `Initial` events.
    pub async fn start(&mut self) -> Result<usize> {
        self.engine.start().await?;
        let initial = self.engine.scan_existing().await?;
        info!(
            "Reported {} existing entries under {}",
            initial,
            self.engine.root().display()
        );
        Ok(initial)
    }

    /// Stop watching
    pub async fn stop(&mut self) -> Result<()> {
        self.engine.stop().await
    }

    /// Root of the monitored tree, canonical once started
    pub fn root(&self) -> &Path {
        self.engine.root()
    }

    pub fn constraints(&self) -> &Constraints {
        self.engine.constraints()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }
}

/// Builder for Monitor
#[derive(Default)]
pub struct MonitorBuilder {
    root: Option<PathBuf>,
    subscriber: Option<Subscriber>,
    constraints: Constraints,
    config: WatcherConfig,
}

impl MonitorBuilder {
    /// Set the directory to monitor
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set the callback receiving events
    pub fn subscriber<F>(mut self, subscriber: F) -> Self
    where
        F: Fn(FilesystemEvent) + Send + Sync + 'static,
    {
        self.subscriber = Some(Arc::new(subscriber));
        self
    }

    /// Set the constraints (default: accept everything, non-recursive)
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Set the engine configuration
    pub fn config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the monitor
    pub fn build(self) -> Result<Monitor> {
        let root = self
            .root
            .ok_or_else(|| Error::invalid_input("Monitor requires a root path"))?;
        let subscriber = self
            .subscriber
            .ok_or_else(|| Error::invalid_input("Monitor requires a subscriber"))?;

        Ok(Monitor {
            engine: WatcherEngine::new(root, subscriber, self.constraints, self.config),
        })
    }
}

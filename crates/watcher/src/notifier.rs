//! Start/stop lifecycle shared by the monitor and the engine

use async_trait::async_trait;
use treewatch_core::error::Result;

use crate::engine::WatcherEngine;
use crate::monitor::Monitor;

/// Something that reports file system changes between start and stop
///
/// Starting twice, stopping before start or stopping twice fails with an
/// illegal state error.
#[async_trait]
pub trait Notifier: Send {
    /// Begin watching
    async fn start_watching(&mut self) -> Result<()>;

    /// Stop watching and release native resources
    async fn stop_watching(&mut self) -> Result<()>;
}

#[async_trait]
impl Notifier for WatcherEngine {
    async fn start_watching(&mut self) -> Result<()> {
        self.start().await
    }

    async fn stop_watching(&mut self) -> Result<()> {
        self.stop().await
    }
}

#[async_trait]
impl Notifier for Monitor {
    async fn start_watching(&mut self) -> Result<()> {
        self.start().await.map(|_| ())
    }

    async fn stop_watching(&mut self) -> Result<()> {
        self.stop().await
    }
}

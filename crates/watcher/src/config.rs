//! Runtime configuration for the watcher engine
//!
//! Immutable sizing and timing knobs. What to watch (root, recursion,
//! filters) lives in [`crate::Constraints`] and the monitor builder.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use treewatch_core::config::WatchConfig;

/// Immutable configuration for the watcher engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Capacity of the queue between producer and consumer (default: 100000)
    pub queue_capacity: usize,
    /// Capacity of the channel fed by the native backend (default: 4096)
    pub raw_event_capacity: usize,
    /// How long stop waits for background tasks in milliseconds (default: 5000ms)
    pub shutdown_timeout_ms: u64,
}

impl WatcherConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from builder
    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder::default()
    }

    /// Get the shutdown timeout
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100_000,
            raw_event_capacity: 4096,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl From<&WatchConfig> for WatcherConfig {
    fn from(config: &WatchConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            raw_event_capacity: config.raw_event_capacity,
            shutdown_timeout_ms: config.shutdown_timeout_ms,
        }
    }
}

/// Builder for WatcherConfig
#[derive(Debug, Default)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    /// Set the producer/consumer queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the native event channel capacity
    pub fn raw_event_capacity(mut self, capacity: usize) -> Self {
        self.config.raw_event_capacity = capacity;
        self
    }

    /// Set the shutdown timeout in milliseconds
    pub fn shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_timeout_ms = ms;
        self
    }

    /// Build the configuration
    ///
    /// Zero capacities are raised to one since tokio channels reject them.
    pub fn build(mut self) -> WatcherConfig {
        self.config.queue_capacity = self.config.queue_capacity.max(1);
        self.config.raw_event_capacity = self.config.raw_event_capacity.max(1);
        self.config
    }
}

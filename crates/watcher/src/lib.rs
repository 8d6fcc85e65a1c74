#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Recursive file system watching on top of non-recursive native watches
//!
//! This crate provides:
//! - An event model of initial, created, deleted and modified paths
//! - Constraint filtering by filename substring, pattern and file type
//! - A watcher engine that registers and cancels one native watch per
//!   directory as the tree changes
//! - A monitor that reports the existing tree and live changes exactly once
//!
//! # Example
//!
//! ```no_run
//! use treewatch_watcher::{Constraints, Monitor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut monitor = Monitor::builder()
//!     .root("/path/to/tree")
//!     .constraints(Constraints::new().with_recursive(true))
//!     .subscriber(|event| println!("{event}"))
//!     .build()?;
//!
//! monitor.start().await?;
//! // ...
//! monitor.stop().await?;
//! # Ok(())
//! # }
//! ```

// Private implementation modules
mod config;
mod constraints;
mod engine;
mod events;
mod monitor;
mod notifier;
mod registry;
mod scanner;
mod watched;

// Public exports - minimal API surface
pub use config::{WatcherConfig, WatcherConfigBuilder};
pub use constraints::{Constraints, FileType};
pub use engine::{Subscriber, WatcherEngine};
pub use events::{EventKind, FilesystemEvent};
pub use monitor::{Monitor, MonitorBuilder};
pub use notifier::Notifier;
pub use registry::{NativeRegistry, RawEvent, RawEvents, RawKind, WatchHandle};
pub use scanner::{ScanEntry, TreeScanner};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::constraints::{Constraints, FileType};
    pub use crate::events::{EventKind, FilesystemEvent};
    pub use crate::monitor::Monitor;
    pub use crate::notifier::Notifier;
}

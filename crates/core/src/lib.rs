//! Core types for the treewatch recursive file system monitor
//!
//! This crate provides the foundational pieces shared by the watcher
//! library and the command-line interface:
//!
//! - **Configuration**: file and environment backed settings
//! - **Error handling**: unified error types
//!

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{Config, WatchConfig};
pub use error::{Error, Result, ResultExt};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Result, ResultExt};
}

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for treewatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for treewatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors (stat, directory walk)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A directory could not be registered with the native watch primitive
    #[error("Failed to register watch on {}: {message}", path.display())]
    Registration { path: PathBuf, message: String },

    /// The native watch registry was closed while waiting for events
    #[error("Watch registry closed")]
    Closed,

    /// Lifecycle misuse (stop before start, double start, double stop)
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Invalid filename pattern
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Native watcher backend errors
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a registration error for `path`
    pub fn registration(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Registration {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates an illegal state error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    /// Creates a pattern error
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Creates a watcher error
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::Watcher(msg.into())
    }

    /// Creates an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error is a per-event race that callers should absorb
    ///
    /// Registration failures and missing paths happen when a directory is
    /// removed between discovery and handling.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Registration { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}

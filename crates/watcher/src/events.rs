//! File system event types
//!
//! Events are immutable values: a path and the kind of change observed
//! at that path. Two events are equal when both path and kind are equal.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of change reported for a path
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EventKind {
    /// The path already existed when monitoring started
    Initial,
    /// The path was created
    Created,
    /// The path was deleted or moved away
    Deleted,
    /// The contents or attributes of the path changed
    Modified,
}

impl EventKind {
    /// Whether this kind reports that the path exists
    ///
    /// Only these kinds can lead to a new directory registration.
    pub fn announces_existence(&self) -> bool {
        matches!(self, Self::Initial | Self::Created)
    }
}

/// A change observed at a single path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilesystemEvent {
    path: PathBuf,
    kind: EventKind,
}

impl FilesystemEvent {
    /// Create a new event
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Create an event for `name` inside the watched `directory`
    pub fn in_directory(directory: &Path, name: &OsStr, kind: EventKind) -> Self {
        Self::new(directory.join(name), kind)
    }

    /// Path the event refers to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of change
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Last path segment, empty when the path has none
    pub fn file_name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or(Cow::Borrowed(""))
    }

    /// Same path, different kind
    pub fn with_kind(&self, kind: EventKind) -> Self {
        Self::new(self.path.clone(), kind)
    }
}

impl fmt::Display for FilesystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path.display())
    }
}

//! One-shot tree scanner
//!
//! Walks a directory once and reports every entry below it, without
//! following symbolic links. Entries are reported whether or not they pass
//! the constraints so that callers can still descend into directories the
//! subscriber is not interested in.

use crate::constraints::Constraints;
use crate::events::{EventKind, FilesystemEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use treewatch_core::error::{Error, Result};
use walkdir::WalkDir;

/// One entry found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub event: FilesystemEvent,
    /// Entry is a real directory, not a link to one
    pub is_dir: bool,
    /// Entry passes the constraints
    pub accepted: bool,
}

/// Walks a subtree once
#[derive(Debug, Clone)]
pub struct TreeScanner {
    root: PathBuf,
    constraints: Arc<Constraints>,
    max_depth: Option<usize>,
}

impl TreeScanner {
    /// Scanner that descends as far as the constraints allow
    pub fn new(root: impl Into<PathBuf>, constraints: Arc<Constraints>) -> Self {
        let max_depth = if constraints.is_recursive() {
            None
        } else {
            Some(1)
        };
        Self {
            root: root.into(),
            constraints,
            max_depth,
        }
    }

    /// Only list the direct children of the root
    pub fn shallow(mut self) -> Self {
        self.max_depth = Some(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree, reporting every entry with the given event kind
    ///
    /// Fails if the root itself cannot be read. Entries that vanish during
    /// the walk are skipped.
    pub fn scan(&self, kind: EventKind) -> Result<Vec<ScanEntry>> {
        let metadata = std::fs::symlink_metadata(&self.root)?;
        if !metadata.is_dir() {
            return Err(Error::invalid_input(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let mut walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(Error::Io(e.into())),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let event = FilesystemEvent::new(entry.path(), kind);
            let accepted = match self.constraints.accepts(&event) {
                Ok(accepted) => accepted,
                Err(e) if e.is_transient() => {
                    debug!("{} vanished during scan", entry.path().display());
                    continue;
                }
                Err(e) => {
                    warn!("Failed to evaluate {}: {}", entry.path().display(), e);
                    false
                }
            };

            entries.push(ScanEntry {
                event,
                is_dir: entry.file_type().is_dir(),
                accepted,
            });
        }

        Ok(entries)
    }

    /// Events for every accepted entry that exists right now
    pub fn initial_events(&self) -> Result<Vec<FilesystemEvent>> {
        Ok(self
            .scan(EventKind::Initial)?
            .into_iter()
            .filter(|entry| entry.accepted)
            .map(|entry| entry.event)
            .collect())
    }
}

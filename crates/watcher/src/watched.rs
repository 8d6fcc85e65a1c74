//! Consumer-owned bookkeeping
//!
//! Both structures are owned by the consumer task alone and need no locking.
//! They are ordered maps so that all descendants of a directory form one
//! contiguous range.

use crate::registry::WatchHandle;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

fn subtree<'a, V>(
    map: &'a BTreeMap<PathBuf, V>,
    top: &'a Path,
) -> impl Iterator<Item = &'a PathBuf> + 'a {
    map.range::<Path, _>((Bound::Included(top), Bound::Unbounded))
        .map(|(path, _)| path)
        .take_while(move |path| path.starts_with(top))
}

/// Directories that currently hold a native registration
#[derive(Debug, Default)]
pub struct WatchedDirectories {
    handles: BTreeMap<PathBuf, WatchHandle>,
}

impl WatchedDirectories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, directory: &Path) -> bool {
        self.handles.contains_key(directory)
    }

    /// Record a registration
    ///
    /// Returns the handle back if the directory is already watched, so the
    /// caller can release the duplicate.
    pub fn insert(&mut self, directory: PathBuf, handle: WatchHandle) -> Option<WatchHandle> {
        if self.handles.contains_key(&directory) {
            return Some(handle);
        }
        self.handles.insert(directory, handle);
        None
    }

    /// Remove a directory and every watched directory below it
    pub fn remove_subtree(&mut self, top: &Path) -> Vec<WatchHandle> {
        let doomed: Vec<PathBuf> = subtree(&self.handles, top).cloned().collect();
        doomed
            .iter()
            .filter_map(|path| self.handles.remove(path))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Remove every registration
    pub fn drain(&mut self) -> Vec<WatchHandle> {
        std::mem::take(&mut self.handles).into_values().collect()
    }
}

/// Paths whose existence has already been reported
///
/// Guards against announcing a path twice when the initial walk, a
/// directory listing and the native backend all observe the same entry.
/// Each path remembers whether its announcement reached the subscriber, so
/// a later removal is reported only for paths the subscriber has seen.
#[derive(Debug, Default)]
pub struct AnnouncedPaths {
    paths: BTreeMap<PathBuf, bool>,
}

impl AnnouncedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains_key(path)
    }

    /// Record a path, returning false if it was already known
    pub fn insert(&mut self, path: &Path, delivered: bool) -> bool {
        if self.paths.contains_key(path) {
            return false;
        }
        self.paths.insert(path.to_path_buf(), delivered);
        true
    }

    /// Forget a path and everything below it
    ///
    /// Returns whether the path itself was delivered, or `None` if it was
    /// never recorded.
    pub fn forget_subtree(&mut self, top: &Path) -> Option<bool> {
        let doomed: Vec<PathBuf> = subtree(&self.paths, top).cloned().collect();
        let mut top_delivered = None;
        for path in &doomed {
            let delivered = self.paths.remove(path);
            if path == top {
                top_delivered = delivered;
            }
        }
        top_delivered
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

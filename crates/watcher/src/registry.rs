//! Native watch registry
//!
//! Wraps the platform watcher from the notify crate in non-recursive mode:
//! every directory is registered on its own and reports changes to its direct
//! children only. Raw events flow from the notify callback thread into a
//! bounded channel that the producer task drains through [`RawEvents`].
//!
//! The callback never blocks. On Linux, registering a watch round-trips
//! through the same thread that runs the callback, so a callback waiting on a
//! full channel while the consumer registers a directory would deadlock.
//! Events that do not fit are counted and surface as [`RawEvent::Overflow`].

use notify::event::{ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, EventKind as NotifyEventKind,
    RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher,
};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, trace};
use treewatch_core::error::{Error, Result};

use crate::events::EventKind;

/// Classification of a native notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Created,
    /// Renamed into place, possibly over an existing entry
    MovedIn,
    Deleted,
    Modified,
}

impl From<RawKind> for EventKind {
    fn from(kind: RawKind) -> Self {
        match kind {
            RawKind::Created | RawKind::MovedIn => EventKind::Created,
            RawKind::Deleted => EventKind::Deleted,
            RawKind::Modified => EventKind::Modified,
        }
    }
}

/// Unfiltered notification paired with the directory it was observed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// A change to `name` inside `directory`
    Change {
        directory: PathBuf,
        kind: RawKind,
        name: OsString,
    },
    /// Events were lost, either by the OS or because the channel was full
    Overflow { dropped: Option<u64> },
}

/// Opaque token for one native registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHandle {
    path: PathBuf,
}

impl WatchHandle {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Directory this registration watches
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Registry of non-recursive native watches
///
/// Closing the registry drops the platform watcher, which in turn ends the
/// raw event stream.
pub struct NativeRegistry {
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl NativeRegistry {
    /// Create the platform watcher and the stream of raw events it feeds
    pub fn open(capacity: usize) -> Result<(Self, RawEvents)> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_in_callback = Arc::clone(&dropped);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => match tx.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped_in_callback.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Closed(_)) => {}
                },
                Err(e) => {
                    error!("Notify error: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::watcher(format!("Failed to create watcher: {e}")))?;

        let registry = Self {
            watcher: Mutex::new(Some(watcher)),
        };
        let events = RawEvents {
            rx,
            dropped,
            pending: VecDeque::new(),
        };
        Ok((registry, events))
    }

    /// Start watching the direct children of `directory`
    pub async fn register(&self, directory: &Path) -> Result<WatchHandle> {
        let mut guard = self.watcher.lock().await;
        let watcher = guard.as_mut().ok_or(Error::Closed)?;

        watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(|e| Error::registration(directory, e.to_string()))?;

        trace!("Registered watch on {}", directory.display());
        Ok(WatchHandle::new(directory.to_path_buf()))
    }

    /// Release a registration
    ///
    /// The OS drops watches on deleted directories by itself, so a handle
    /// that is no longer known to the backend is not an error.
    pub async fn cancel(&self, handle: WatchHandle) {
        let mut guard = self.watcher.lock().await;
        let Some(watcher) = guard.as_mut() else {
            return;
        };

        match watcher.unwatch(handle.path()) {
            Ok(()) => trace!("Cancelled watch on {}", handle.path().display()),
            Err(e) => debug!(
                "Watch on {} already gone: {}",
                handle.path().display(),
                e
            ),
        }
    }

    /// Drop the platform watcher and every registration it holds
    pub async fn close(&self) {
        if self.watcher.lock().await.take().is_some() {
            debug!("Native watch registry closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.watcher.lock().await.is_none()
    }
}

/// Receiving side of the native event stream
pub struct RawEvents {
    rx: mpsc::Receiver<NotifyEvent>,
    dropped: Arc<AtomicU64>,
    pending: VecDeque<RawEvent>,
}

impl RawEvents {
    /// Wait for the next raw event
    ///
    /// Fails with [`Error::Closed`] once the registry is closed and every
    /// buffered event has been handed out.
    pub async fn next_raw_event(&mut self) -> Result<RawEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            let dropped = self.dropped.swap(0, Ordering::Relaxed);
            if dropped > 0 {
                return Ok(RawEvent::Overflow {
                    dropped: Some(dropped),
                });
            }

            match self.rx.recv().await {
                Some(event) => self.pending.extend(convert_notify_event(&event)),
                None => return Err(Error::Closed),
            }
        }
    }
}

/// Translate one notify event into raw events
///
/// Each path is split into its parent directory and final name. Access
/// notifications and combined rename events are ignored: the backend also
/// reports the separate "from" and "to" halves of a rename.
pub(crate) fn convert_notify_event(event: &NotifyEvent) -> Vec<RawEvent> {
    if event.need_rescan() {
        return vec![RawEvent::Overflow { dropped: None }];
    }

    let kind = match event.kind {
        NotifyEventKind::Create(_) => Some(RawKind::Created),
        NotifyEventKind::Remove(_) => Some(RawKind::Deleted),
        NotifyEventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(RawKind::Deleted),
        NotifyEventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(RawKind::MovedIn),
        NotifyEventKind::Modify(ModifyKind::Name(RenameMode::Both)) => return Vec::new(),
        // half of a rename the backend could not pair up
        NotifyEventKind::Modify(ModifyKind::Name(_)) => None,
        NotifyEventKind::Modify(_) => Some(RawKind::Modified),
        NotifyEventKind::Access(_) | NotifyEventKind::Any | NotifyEventKind::Other => {
            return Vec::new()
        }
    };

    event
        .paths
        .iter()
        .filter_map(|path| {
            let directory = path.parent()?;
            let name = path.file_name()?;
            let kind = kind.unwrap_or_else(|| {
                if std::fs::symlink_metadata(path).is_ok() {
                    RawKind::MovedIn
                } else {
                    RawKind::Deleted
                }
            });
            Some(RawEvent::Change {
                directory: directory.to_path_buf(),
                kind,
                name: name.to_os_string(),
            })
        })
        .collect()
}

//! Watcher engine
//!
//! Reconstructs a recursive view of a directory tree from non-recursive
//! native watches. Two tasks share one bounded queue:
//!
//! - the producer drains raw events from the native registry, filters them
//!   and pushes them onto the queue, blocking while it is full
//! - the consumer pops events, keeps the set of watched directories current
//!   and calls the subscriber
//!
//! All registration after start happens on the consumer task, so the
//! watched-directory set has a single writer and needs no lock. A newly
//! discovered directory is registered before it is listed: anything created
//! in it after the listing is reported by the new watch, anything created
//! before is found by the listing, and the announced-path ledger drops the
//! overlap. An entry renamed onto an announced path replaces it and is
//! announced again. Listings and stats run on the blocking pool.

use crate::config::WatcherConfig;
use crate::constraints::Constraints;
use crate::events::{EventKind, FilesystemEvent};
use crate::registry::{NativeRegistry, RawEvent, RawEvents, RawKind};
use crate::scanner::TreeScanner;
use crate::watched::{AnnouncedPaths, WatchedDirectories};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use treewatch_core::error::{Error, Result};

/// Callback receiving every accepted event
///
/// Invoked from the consumer task only, so calls never overlap.
pub type Subscriber = Arc<dyn Fn(FilesystemEvent) + Send + Sync>;

/// Item carried by the queue between producer and consumer
#[derive(Debug)]
enum Queued {
    /// A filtered event. Events that fail the constraints are still queued
    /// when they affect the set of watched directories, with `deliver`
    /// unset. `replaces` marks an entry renamed into place, which may stand
    /// in for one announced earlier.
    Event {
        event: FilesystemEvent,
        deliver: bool,
        replaces: bool,
    },
    /// Walk the existing tree and report what the walk announced
    InitialScan { done: oneshot::Sender<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum EngineState {
    Created,
    Running,
    Stopped,
}

/// Recursive watcher built on non-recursive native watches
///
/// Lifecycle is `Created -> Running -> Stopped`; an engine cannot be
/// restarted.
pub struct WatcherEngine {
    root: PathBuf,
    constraints: Arc<Constraints>,
    config: WatcherConfig,
    subscriber: Subscriber,
    state: EngineState,
    cancellation_token: CancellationToken,
    registry: Option<Arc<NativeRegistry>>,
    queue: Option<mpsc::Sender<Queued>>,
    producer: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl WatcherEngine {
    /// Create an engine; nothing is watched until [`WatcherEngine::start`]
    pub fn new(
        root: impl Into<PathBuf>,
        subscriber: Subscriber,
        constraints: Constraints,
        config: WatcherConfig,
    ) -> Self {
        Self {
            root: root.into(),
            constraints: Arc::new(constraints),
            config,
            subscriber,
            state: EngineState::Created,
            cancellation_token: CancellationToken::new(),
            registry: None,
            queue: None,
            producer: None,
            consumer: None,
        }
    }

    /// Root of the watched tree, canonical once started
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    /// Register the root and launch the producer and consumer tasks
    pub async fn start(&mut self) -> Result<()> {
        if self.state != EngineState::Created {
            return Err(Error::illegal_state(format!(
                "Cannot start a watcher engine that is {}",
                self.state
            )));
        }

        let root = std::fs::canonicalize(&self.root).map_err(|e| {
            Error::with_context(format!("Cannot resolve {}", self.root.display()), e)
        })?;
        if !root.is_dir() {
            return Err(Error::invalid_input(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let (registry, raw_events) = NativeRegistry::open(self.config.raw_event_capacity)?;
        let registry = Arc::new(registry);
        let root_handle = registry.register(&root).await?;

        let mut watched = WatchedDirectories::new();
        watched.insert(root.clone(), root_handle);

        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));

        let producer = Producer {
            root: root.clone(),
            constraints: Arc::clone(&self.constraints),
            raw_events,
            queue: tx.clone(),
            cancellation_token: self.cancellation_token.clone(),
        };
        let consumer = Consumer {
            root: root.clone(),
            constraints: Arc::clone(&self.constraints),
            registry: Arc::clone(&registry),
            subscriber: Arc::clone(&self.subscriber),
            watched,
            announced: AnnouncedPaths::new(),
            last_delivered: None,
            cancellation_token: self.cancellation_token.clone(),
        };

        self.producer = Some(tokio::spawn(producer.run()));
        self.consumer = Some(tokio::spawn(consumer.run(rx)));
        self.registry = Some(registry);
        self.queue = Some(tx);
        self.root = root;
        self.state = EngineState::Running;

        info!(
            "Watching {} (recursive: {})",
            self.root.display(),
            self.constraints.is_recursive()
        );
        Ok(())
    }

    /// Walk the existing tree on the consumer task
    ///
    /// Existing entries are reported as [`EventKind::Initial`]. Because the
    /// walk runs on the consumer, it is ordered with live events and shares
    /// their bookkeeping. Returns the number of entries delivered.
    pub(crate) async fn scan_existing(&self) -> Result<usize> {
        let queue = match (&self.state, &self.queue) {
            (EngineState::Running, Some(queue)) => queue,
            _ => {
                return Err(Error::illegal_state(format!(
                    "Cannot scan with a watcher engine that is {}",
                    self.state
                )))
            }
        };

        let (done, finished) = oneshot::channel();
        queue
            .send(Queued::InitialScan { done })
            .await
            .map_err(|_| Error::Closed)?;
        finished.await.map_err(|_| Error::Closed)
    }

    /// Close the native registry and stop both tasks
    ///
    /// Tasks that do not finish within the shutdown timeout are aborted.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            EngineState::Running => {}
            EngineState::Created => {
                return Err(Error::illegal_state("Watcher engine was never started"))
            }
            EngineState::Stopped => {
                return Err(Error::illegal_state("Watcher engine is already stopped"))
            }
        }
        self.state = EngineState::Stopped;

        self.cancellation_token.cancel();
        if let Some(registry) = self.registry.take() {
            registry.close().await;
        }
        self.queue = None;

        let timeout = self.config.shutdown_timeout();
        for (name, handle) in [
            ("producer", self.producer.take()),
            ("consumer", self.consumer.take()),
        ] {
            let Some(mut handle) = handle else {
                continue;
            };
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => trace!("{} task finished", name),
                Ok(Err(e)) => error!("{} task failed: {}", name, e),
                Err(_) => {
                    warn!("{} task did not stop within {:?}, aborting", name, timeout);
                    handle.abort();
                }
            }
        }

        info!("Stopped watching {}", self.root.display());
        Ok(())
    }
}

impl Drop for WatcherEngine {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
        for handle in [self.producer.take(), self.consumer.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

struct Producer {
    root: PathBuf,
    constraints: Arc<Constraints>,
    raw_events: RawEvents,
    queue: mpsc::Sender<Queued>,
    cancellation_token: CancellationToken,
}

impl Producer {
    async fn run(mut self) {
        debug!("Producer started");
        loop {
            let raw = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                raw = self.raw_events.next_raw_event() => raw,
            };

            let item = match raw {
                Ok(RawEvent::Change {
                    directory,
                    kind,
                    name,
                }) => {
                    let event = FilesystemEvent::in_directory(&directory, &name, kind.into());
                    match self.filter(event, kind) {
                        Some(item) => item,
                        None => continue,
                    }
                }
                Ok(RawEvent::Overflow { dropped }) => {
                    match dropped {
                        Some(count) => warn!("Event queue overflow, {} events lost", count),
                        None => warn!("Native event queue overflow, events may have been lost"),
                    }
                    continue;
                }
                Err(Error::Closed) => {
                    debug!("Native registry closed");
                    break;
                }
                Err(e) => {
                    error!("Failed to read native event: {}", e);
                    break;
                }
            };

            // blocks while the queue is full
            let sent = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                sent = self.queue.send(item) => sent,
            };
            if sent.is_err() {
                break;
            }
        }
        debug!("Producer stopped");
    }

    fn filter(&self, event: FilesystemEvent, kind: RawKind) -> Option<Queued> {
        if event.path() == self.root {
            if kind == RawKind::Deleted {
                warn!("Watched root {} was removed", self.root.display());
            }
            return None;
        }

        let deliver = match self.constraints.accepts(&event) {
            Ok(accepted) => accepted,
            Err(e) if e.is_transient() => {
                trace!("{} vanished before it could be checked", event.path().display());
                false
            }
            Err(e) => {
                warn!("Dropping {}: {}", event, e);
                false
            }
        };

        let replaces = kind == RawKind::MovedIn;
        let bookkeeping = replaces
            || (self.constraints.is_recursive()
                && matches!(kind, RawKind::Created | RawKind::Deleted));
        if deliver || bookkeeping {
            Some(Queued::Event {
                event,
                deliver,
                replaces,
            })
        } else {
            None
        }
    }
}

struct Consumer {
    root: PathBuf,
    constraints: Arc<Constraints>,
    registry: Arc<NativeRegistry>,
    subscriber: Subscriber,
    watched: WatchedDirectories,
    announced: AnnouncedPaths,
    last_delivered: Option<FilesystemEvent>,
    cancellation_token: CancellationToken,
}

impl Consumer {
    async fn run(mut self, mut queue: mpsc::Receiver<Queued>) {
        debug!("Consumer started");
        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                item = queue.recv() => item,
            };

            match item {
                Some(Queued::Event {
                    event,
                    deliver,
                    replaces,
                }) => self.handle(event, deliver, replaces).await,
                Some(Queued::InitialScan { done }) => {
                    let root = self.root.clone();
                    let delivered = self.walk(root, EventKind::Initial).await;
                    debug!("Initial scan announced {} entries", delivered);
                    let _ = done.send(delivered);
                }
                None => break,
            }
        }
        debug!(
            "Consumer stopped with {} watched directories and {} known paths",
            self.watched.len(),
            self.announced.len()
        );
        for handle in self.watched.drain() {
            self.registry.cancel(handle).await;
        }
    }

    async fn handle(&mut self, event: FilesystemEvent, deliver: bool, replaces: bool) {
        match event.kind() {
            EventKind::Created | EventKind::Initial => {
                if replaces && self.announced.contains(event.path()) {
                    debug!("{} was replaced", event.path().display());
                    self.forget(event.path()).await;
                }
                if !self.announced.insert(event.path(), deliver) {
                    trace!("{} already announced", event.path().display());
                    return;
                }
                let path = event.path().to_path_buf();
                let kind = event.kind();
                if deliver {
                    self.deliver(event);
                }
                if self.constraints.is_recursive() && is_directory(path.clone()).await {
                    self.walk(path, kind).await;
                }
            }
            EventKind::Deleted => {
                let was_delivered = self.forget(event.path()).await == Some(true);
                if deliver && was_delivered {
                    self.deliver(event);
                }
            }
            EventKind::Modified => {
                // a watched directory is reported by its parent's watch and its own
                let repeated = self.last_delivered.as_ref() == Some(&event)
                    && self.watched.contains(event.path());
                if deliver && !repeated {
                    self.deliver(event);
                }
            }
        }
    }

    /// Drop a path and its descendants from both ledgers
    ///
    /// Returns whether the path itself had been delivered.
    async fn forget(&mut self, top: &Path) -> Option<bool> {
        let delivered = self.announced.forget_subtree(top);
        for handle in self.watched.remove_subtree(top) {
            debug!("Cancelling watch on {}", handle.path().display());
            self.registry.cancel(handle).await;
        }
        delivered
    }

    /// Register `top` and everything below it, announcing each entry found
    ///
    /// Each directory is registered before it is listed. Returns the number
    /// of entries delivered.
    async fn walk(&mut self, top: PathBuf, kind: EventKind) -> usize {
        let mut delivered = 0;
        let mut pending = vec![top];

        while let Some(directory) = pending.pop() {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            if !self.watched.contains(&directory) {
                match self.registry.register(&directory).await {
                    Ok(handle) => {
                        if let Some(duplicate) = self.watched.insert(directory.clone(), handle) {
                            self.registry.cancel(duplicate).await;
                        }
                    }
                    Err(Error::Closed) => break,
                    Err(e) if e.is_transient() => {
                        debug!("Skipping {}: {}", directory.display(), e);
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to watch {}: {}", directory.display(), e);
                        continue;
                    }
                }
            }

            let scanner = TreeScanner::new(&directory, Arc::clone(&self.constraints)).shallow();
            let entries = match tokio::task::spawn_blocking(move || scanner.scan(kind)).await {
                Ok(Ok(entries)) => entries,
                Ok(Err(e)) => {
                    debug!("Failed to list {}: {}", directory.display(), e);
                    continue;
                }
                Err(e) => {
                    error!("Listing task for {} failed: {}", directory.display(), e);
                    continue;
                }
            };

            let mut subdirectories = Vec::new();
            for entry in entries {
                if !self.announced.insert(entry.event.path(), entry.accepted) {
                    continue;
                }
                if entry.is_dir && self.constraints.is_recursive() {
                    subdirectories.push(entry.event.path().to_path_buf());
                }
                if entry.accepted {
                    self.deliver(entry.event);
                    delivered += 1;
                }
            }
            // reversed so that the stack pops them in name order
            pending.extend(subdirectories.into_iter().rev());
        }

        delivered
    }

    fn deliver(&mut self, event: FilesystemEvent) {
        if self.cancellation_token.is_cancelled() {
            return;
        }

        let subscriber = &self.subscriber;
        let result = catch_unwind(AssertUnwindSafe(|| subscriber(event.clone())));
        if result.is_err() {
            error!("Subscriber panicked while handling {}", event);
        }
        self.last_delivered = Some(event);
    }
}

async fn is_directory(path: PathBuf) -> bool {
    tokio::task::spawn_blocking(move || {
        std::fs::symlink_metadata(&path)
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}

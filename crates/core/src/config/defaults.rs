//! Default values and functions for configuration

pub(crate) const DEFAULT_QUEUE_CAPACITY: usize = 100_000;
pub(crate) const DEFAULT_RAW_EVENT_CAPACITY: usize = 4096;
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// File type names accepted in `watch.file_types`
pub(crate) const VALID_FILE_TYPES: [&str; 4] = ["regular", "directory", "link", "other"];

pub(crate) fn default_recursive() -> bool {
    false
}

pub(crate) fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

pub(crate) fn default_raw_event_capacity() -> usize {
    DEFAULT_RAW_EVENT_CAPACITY
}

pub(crate) fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

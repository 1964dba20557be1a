//! Error types for the watch engine.

use thiserror::Error;

use crate::scheduler::JobId;

/// Errors surfaced by watcher creation and queue flushing.
///
/// Contract violations (`EmptySources`, `IgnoredOption`) are only returned
/// when [`WatchConfig::strict`](crate::WatchConfig) is set; otherwise they
/// are logged and the watcher is created anyway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("watch source list is empty, nothing can be observed")]
    EmptySources,

    #[error("`{option}` has no effect without a callback, use `watch` instead")]
    IgnoredOption { option: &'static str },

    #[error("job {job} was queued more than {limit} times in one flush")]
    RecursionLimit { job: JobId, limit: usize },
}

impl WatchError {
    /// Whether this error describes misuse by the caller rather than a
    /// runtime condition.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, WatchError::EmptySources | WatchError::IgnoredOption { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = WatchError> = std::result::Result<T, E>;

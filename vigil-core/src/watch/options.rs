//! Watch options.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::reactive::{DebuggerEvent, DebuggerHook};

/// When a stale watcher is allowed to re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Inline, inside the write that made the watcher stale.
    Sync,
    /// Queued, drained before the surrounding update pass.
    #[default]
    Pre,
    /// Queued, drained after the surrounding update pass.
    Post,
}

/// Options accepted by the watch entry points.
///
/// The plain fields round-trip through serde; trace hooks are skipped.
///
/// ```rust
/// use vigil_core::watch::{FlushMode, WatchOptions};
///
/// let options = WatchOptions::new().flush(FlushMode::Sync).deep(true);
/// assert!(options.deep);
/// assert!(!options.immediate);
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    pub flush: FlushMode,
    pub deep: bool,
    pub immediate: bool,
    #[serde(skip)]
    pub on_track: Option<DebuggerHook>,
    #[serde(skip)]
    pub on_trigger: Option<DebuggerHook>,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush(mut self, flush: FlushMode) -> Self {
        self.flush = flush;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn on_track<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DebuggerEvent) + Send + Sync + 'static,
    {
        self.on_track = Some(Arc::new(hook));
        self
    }

    pub fn on_trigger<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DebuggerEvent) + Send + Sync + 'static,
    {
        self.on_trigger = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for WatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchOptions")
            .field("flush", &self.flush)
            .field("deep", &self.deep)
            .field("immediate", &self.immediate)
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .finish()
    }
}

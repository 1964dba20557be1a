//! Engine configuration.
//!
//! Configuration is per thread, like the rest of the engine's ambient state.
//! Install a config before creating watchers; it is read at creation time
//! (strictness) and at flush time (recursion limit).

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// Default number of times one job may be re-queued within a single flush.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

thread_local! {
    static CONFIG: Cell<WatchConfig> = Cell::new(WatchConfig::default());
}

/// Tunables for the watch engine.
///
/// # Example
///
/// ```rust
/// use vigil_core::WatchConfig;
///
/// let previous = WatchConfig { strict: false, ..WatchConfig::default() }.install();
/// assert!(!WatchConfig::current().strict);
/// previous.install();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Reject malformed watch targets and ignored options with an error
    /// instead of logging a warning. Defaults to on in debug builds.
    pub strict: bool,

    /// See [`DEFAULT_RECURSION_LIMIT`].
    pub recursion_limit: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            strict: cfg!(debug_assertions),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl WatchConfig {
    /// A config that logs contract violations instead of failing.
    pub fn permissive() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// A config that fails on contract violations.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Make this the current thread's config, returning the previous one.
    pub fn install(self) -> WatchConfig {
        CONFIG.with(|config| config.replace(self))
    }

    /// The current thread's config.
    pub fn current() -> WatchConfig {
        CONFIG.with(Cell::get)
    }
}

/// Report a contract violation according to the current config.
pub(crate) fn report_violation(violation: WatchError) -> Result<()> {
    if WatchConfig::current().strict {
        return Err(violation);
    }
    tracing::warn!(%violation, "watch contract violation");
    Ok(())
}

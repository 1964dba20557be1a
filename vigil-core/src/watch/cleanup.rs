//! Invalidation and cleanup.
//!
//! Each watcher owns one cleanup slot. Bodies and callbacks receive an
//! [`OnInvalidate`] registrar; registering replaces whatever was in the slot.
//! The engine empties the slot right before the next invocation and when the
//! watcher is stopped.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::reactive::ReactiveContext;

/// A registered cleanup.
pub type CleanupFn = Box<dyn FnOnce() + Send>;

/// The single "latest cleanup" slot of a watcher.
#[derive(Default)]
pub(crate) struct CleanupSlot {
    current: Mutex<Option<CleanupFn>>,
}

impl CleanupSlot {
    /// Install `cleanup`, dropping any previous one unrun.
    fn set(&self, cleanup: CleanupFn) {
        *self.current.lock() = Some(cleanup);
    }

    /// Take and run the installed cleanup, if any.
    ///
    /// The slot is emptied before the cleanup runs, so a panicking cleanup is
    /// not retried and a cleanup may register its successor.
    pub(crate) fn run(&self) -> bool {
        let cleanup = self.current.lock().take();
        match cleanup {
            Some(cleanup) => {
                ReactiveContext::untracked(cleanup);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.current.lock().is_some()
    }
}

/// Registrar handed to watcher bodies and callbacks.
///
/// ```rust
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use vigil_core::watch::watch_effect;
///
/// let cancelled = Arc::new(AtomicBool::new(false));
/// let flag = cancelled.clone();
/// let handle = watch_effect(move |on_invalidate| {
///     let flag = flag.clone();
///     on_invalidate.register(move || flag.store(true, Ordering::SeqCst));
/// })
/// .unwrap();
///
/// handle.stop();
/// assert!(cancelled.load(Ordering::SeqCst));
/// ```
#[derive(Clone)]
pub struct OnInvalidate {
    slot: Arc<CleanupSlot>,
}

impl OnInvalidate {
    pub(crate) fn new(slot: Arc<CleanupSlot>) -> Self {
        Self { slot }
    }

    /// Install `cleanup` as the watcher's cleanup, replacing the previous one.
    pub fn register<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.slot.set(Box::new(cleanup));
    }
}

impl fmt::Debug for OnInvalidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnInvalidate")
            .field("pending", &self.slot.is_set())
            .finish()
    }
}

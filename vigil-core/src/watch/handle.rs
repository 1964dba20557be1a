//! Lifecycle: owner registration and the disposal handle.

use std::fmt;
use std::sync::Arc;

use crate::reactive::{AnyEffect, Owner, SubscriberId, WeakOwner};

/// Attach `runner` to the current owner, if any, and build its handle.
pub(crate) fn register(runner: Arc<dyn AnyEffect>) -> StopHandle {
    let owner = Owner::current();
    if let Some(owner) = &owner {
        owner.add_effect(Arc::clone(&runner));
    }
    StopHandle {
        runner,
        owner: owner.map(|owner| owner.downgrade()),
    }
}

/// Disposal handle returned by every watch entry point.
///
/// Dropping the handle leaves the watcher running; only [`StopHandle::stop`]
/// or disposing the owner it was created under stops it.
#[derive(Clone)]
pub struct StopHandle {
    runner: Arc<dyn AnyEffect>,
    owner: Option<WeakOwner>,
}

impl StopHandle {
    /// Stop the watcher: no further runs, the pending cleanup runs once, and
    /// the runner leaves its owner's effect list. Idempotent.
    pub fn stop(&self) {
        if !self.runner.is_active() {
            return;
        }
        self.runner.stop();
        if let Some(owner) = self.owner.as_ref().and_then(WeakOwner::upgrade) {
            owner.remove_effect(self.runner.id());
        }
    }

    pub fn is_stopped(&self) -> bool {
        !self.runner.is_active()
    }

    /// Id of the watcher's runner.
    pub fn id(&self) -> SubscriberId {
        self.runner.id()
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("id", &self.runner.id())
            .field("stopped", &self.is_stopped())
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

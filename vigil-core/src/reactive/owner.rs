//! Owning Context
//!
//! An `Owner` collects the effects created while it is current so they can
//! be stopped together when the owner is torn down (a component unmounting,
//! a request finishing, a test ending).
//!
//! The current owner is tracked with a thread-local stack, the same
//! push/pop-guard discipline as [`ReactiveContext`](super::ReactiveContext).
//! `Owner::run` pushes, the guard pops even if the closure panics.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::effect::AnyEffect;
use super::SubscriberId;

thread_local! {
    static OWNER_STACK: RefCell<Vec<Owner>> = const { RefCell::new(Vec::new()) };
}

/// Unique identifier for an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct OwnerInner {
    id: OwnerId,
    effects: Mutex<Vec<Arc<dyn AnyEffect>>>,
    disposed: AtomicBool,
}

/// A scope that owns effects for bulk disposal.
#[derive(Clone)]
pub struct Owner {
    inner: Arc<OwnerInner>,
}

/// Non-owning reference to an [`Owner`].
#[derive(Clone)]
pub struct WeakOwner(Weak<OwnerInner>);

impl WeakOwner {
    pub fn upgrade(&self) -> Option<Owner> {
        self.0.upgrade().map(|inner| Owner { inner })
    }
}

struct OwnerGuard;

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        OWNER_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Owner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(OwnerInner {
                id: OwnerId::new(),
                effects: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> OwnerId {
        self.inner.id
    }

    /// Run `f` with this owner as the current one.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        OWNER_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = OwnerGuard;
        f()
    }

    /// The innermost owner made current by [`Owner::run`], if any.
    pub fn current() -> Option<Owner> {
        OWNER_STACK.with(|stack| stack.borrow().last().cloned())
    }

    pub fn downgrade(&self) -> WeakOwner {
        WeakOwner(Arc::downgrade(&self.inner))
    }

    /// Append an effect to this owner's list.
    ///
    /// An owner that was already disposed stops the effect right away.
    pub fn add_effect(&self, effect: Arc<dyn AnyEffect>) {
        if self.is_disposed() {
            tracing::debug!(owner = ?self.inner.id, effect = %effect.id(), "owner disposed, stopping effect");
            effect.stop();
            return;
        }
        self.inner.effects.lock().push(effect);
    }

    /// Remove an effect from this owner's list, returning whether it was there.
    pub fn remove_effect(&self, id: SubscriberId) -> bool {
        let mut effects = self.inner.effects.lock();
        match effects.iter().position(|effect| effect.id() == id) {
            Some(index) => {
                effects.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn effect_count(&self) -> usize {
        self.inner.effects.lock().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Stop every owned effect, in creation order. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Stopping runs user cleanups, which may call back into this owner.
        let effects = std::mem::take(&mut *self.inner.effects.lock());
        tracing::debug!(owner = ?self.inner.id, effects = effects.len(), "disposing owner");
        for effect in effects {
            effect.stop();
        }
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.inner.id)
            .field("effect_count", &self.effect_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

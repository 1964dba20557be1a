//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change. To the watch engine it is a read-only source
//! handle.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked dirty and in turn
//!    notifies its own subscribers, without recomputing.
//!
//! 4. On next access, the memo recomputes.
//!
//! Subscribers are notified on every invalidation, not only on actual value
//! changes; deciding whether something changed is the reader's job.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::{SourceId, SubscriberId};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last computation.
    Dirty,
}

struct MemoInner<T> {
    /// Identity of the memo as a readable source.
    source_id: SourceId,

    /// Identity of the memo as a computation reading other sources.
    subscriber_id: SubscriberId,

    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    state: RwLock<MemoState>,
}

impl<T> MemoInner<T>
where
    T: Send + Sync + 'static,
{
    /// Recompute if dirty.
    fn refresh(&self) {
        if *self.state.read() == MemoState::Clean {
            return;
        }

        Runtime::clear_dependencies(self.subscriber_id);
        let new_value = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            (self.compute)()
        };

        *self.value.write() = Some(new_value);
        *self.state.write() = MemoState::Clean;
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn notify(&self, _source: SourceId) {
        {
            let mut state = self.state.write();
            if *state == MemoState::Dirty {
                return;
            }
            *state = MemoState::Dirty;
        }
        Runtime::notify_source_change(self.source_id);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use vigil_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let c = count.clone();
/// let doubled = Memo::new(move || c.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T>
where
    T: Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
    /// Keeps the runtime registration alive for as long as any clone exists.
    _handle: Arc<ReactiveHandle>,
}

impl<T> Memo<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            source_id: SourceId::new(),
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(MemoState::Dirty),
        });
        let as_reactive: Arc<dyn Reactive> = inner.clone();
        let handle = Runtime::register(&as_reactive);

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the memo's identity as a source.
    pub fn id(&self) -> SourceId {
        self.inner.source_id
    }

    /// Borrow the current value, recomputing first if necessary.
    ///
    /// The read lock is held while `f` runs. Use [`Memo::get`] when `f` may
    /// read or write reactive state.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.source_id);
        self.inner.refresh();
        let value = self.inner.value.read();
        f(value.as_ref().expect("clean memo should have a value"))
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.read()
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.state() == MemoState::Dirty
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.source_id)
    }
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T> Clone for Memo<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<T> PartialEq for Memo<T>
where
    T: Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.inner.source_id == other.inner.source_id
    }
}

impl<T> Eq for Memo<T> where T: Send + Sync + 'static {}

impl<T> Debug for Memo<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.source_id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn memo_computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert!(!memo.has_value());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memo_goes_dirty_when_source_changes() {
        let signal = Signal::new(3);
        let s = signal.clone();
        let memo = Memo::new(move || s.get() * 2);

        assert_eq!(memo.get(), 6);
        assert_eq!(memo.state(), MemoState::Clean);

        signal.set(4);
        assert!(memo.is_dirty());
        assert_eq!(memo.get(), 8);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn memo_chain_propagates_invalidation() {
        let base = Signal::new(5);
        let b = base.clone();
        let doubled = Memo::new(move || b.get() * 2);
        let d = doubled.clone();
        let plus_ten = Memo::new(move || d.get() + 10);

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert!(doubled.is_dirty());
        assert!(plus_ten.is_dirty());
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn memo_clone_shares_state() {
        let memo1 = Memo::new(|| 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1.clone();
        assert_eq!(memo1, memo2);
        assert!(memo2.has_value());
    }
}

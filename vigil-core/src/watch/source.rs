//! Source resolution.
//!
//! Every watcher runs one canonical zero-argument getter. This module turns
//! the caller's target into that getter.

use std::fmt;
use std::sync::Arc;

use super::cleanup::{CleanupSlot, OnInvalidate};
use crate::reactive::{Memo, Signal};

/// The canonical getter a watcher's runner evaluates.
pub type Getter<V> = Arc<dyn Fn() -> V + Send + Sync>;

/// Body of a callback-free watcher.
pub type EffectBody = Arc<dyn Fn(&OnInvalidate) + Send + Sync>;

/// One observable source.
pub enum WatchSource<T>
where
    T: Send + Sync + 'static,
{
    /// A writable signal, read through `get`.
    Signal(Signal<T>),
    /// A read-only derived handle.
    Memo(Memo<T>),
    /// Any function whose reads are tracked and whose result is watched.
    Getter(Getter<T>),
}

impl<T> WatchSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Watch the result of `f`.
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        WatchSource::Getter(Arc::new(f))
    }

    /// Read the source's current value, tracking the read.
    pub fn read(&self) -> T {
        match self {
            WatchSource::Signal(signal) => signal.get(),
            WatchSource::Memo(memo) => memo.get(),
            WatchSource::Getter(getter) => getter(),
        }
    }

    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WatchSource::Signal(_) => "signal",
            WatchSource::Memo(_) => "memo",
            WatchSource::Getter(_) => "getter",
        }
    }
}

impl<T> Clone for WatchSource<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        match self {
            WatchSource::Signal(signal) => WatchSource::Signal(signal.clone()),
            WatchSource::Memo(memo) => WatchSource::Memo(memo.clone()),
            WatchSource::Getter(getter) => WatchSource::Getter(Arc::clone(getter)),
        }
    }
}

impl<T> fmt::Debug for WatchSource<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Signal(signal) => f.debug_tuple("Signal").field(&signal.id()).finish(),
            WatchSource::Memo(memo) => f.debug_tuple("Memo").field(&memo.id()).finish(),
            WatchSource::Getter(_) => f.write_str("Getter"),
        }
    }
}

impl<T> From<Signal<T>> for WatchSource<T>
where
    T: Send + Sync + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        WatchSource::Signal(signal)
    }
}

impl<T> From<&Signal<T>> for WatchSource<T>
where
    T: Send + Sync + 'static,
{
    fn from(signal: &Signal<T>) -> Self {
        WatchSource::Signal(signal.clone())
    }
}

impl<T> From<Memo<T>> for WatchSource<T>
where
    T: Send + Sync + 'static,
{
    fn from(memo: Memo<T>) -> Self {
        WatchSource::Memo(memo)
    }
}

impl<T> From<&Memo<T>> for WatchSource<T>
where
    T: Send + Sync + 'static,
{
    fn from(memo: &Memo<T>) -> Self {
        WatchSource::Memo(memo.clone())
    }
}

/// Getter for a single source. Getter sources are used as-is.
pub(crate) fn resolve_single<T>(source: WatchSource<T>) -> Getter<T>
where
    T: Clone + Send + Sync + 'static,
{
    match source {
        WatchSource::Getter(getter) => getter,
        other => Arc::new(move || other.read()),
    }
}

/// Getter for a source sequence: every value, in source order.
pub(crate) fn resolve_many<T>(sources: Vec<WatchSource<T>>) -> Getter<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    Arc::new(move || sources.iter().map(WatchSource::read).collect())
}

/// Getter for an effect body: run the pending cleanup, then the body.
pub(crate) fn resolve_effect(body: EffectBody, slot: Arc<CleanupSlot>) -> Getter<()> {
    let on_invalidate = OnInvalidate::new(slot.clone());
    Arc::new(move || {
        slot.run();
        body(&on_invalidate);
    })
}

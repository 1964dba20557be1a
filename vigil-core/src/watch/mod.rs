//! Watchers
//!
//! A watcher binds a tracked computation to a reaction. There are two shapes:
//!
//! - [`watch_effect`] re-runs a side-effecting body whenever anything it read
//!   is written.
//! - [`watch`] and [`watch_many`] evaluate a source and hand the new and
//!   previous value to a callback when the value changes.
//!
//! # When Watchers Run
//!
//! [`FlushMode`] decides when a stale watcher re-runs. `Sync` re-runs inside
//! the write itself. `Pre` and `Post` queue the watcher's job in the
//! [`scheduler`](crate::scheduler); many writes before the next flush give one
//! re-run.
//!
//! # Cleanup
//!
//! Bodies and callbacks receive an [`OnInvalidate`] registrar. The last
//! registered cleanup runs once, right before the next invocation or when the
//! watcher is stopped.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use vigil_core::reactive::Signal;
//! use vigil_core::watch::{watch, FlushMode, OnInvalidate, WatchOptions};
//!
//! let count = Signal::new(1);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//!
//! let handle = watch(
//!     &count,
//!     move |new: &i32, old: Option<&i32>, _: &OnInvalidate| sink.lock().push((*new, old.copied())),
//!     WatchOptions::new().flush(FlushMode::Sync),
//! )
//! .unwrap();
//!
//! count.set(2);
//! count.set(2);
//! handle.stop();
//! count.set(3);
//!
//! assert_eq!(*seen.lock(), vec![(2, Some(1))]);
//! ```

mod cleanup;
mod equality;
mod flush;
mod handle;
mod options;
mod source;
mod traverse;
mod watcher;

use std::sync::Arc;

pub use cleanup::{CleanupFn, OnInvalidate};
pub use equality::{any_changed, has_changed};
pub use handle::StopHandle;
pub use options::{FlushMode, WatchOptions};
pub use source::{EffectBody, Getter, WatchSource};
pub use traverse::{traverse, Seen, Traverse};

use crate::config::report_violation;
use crate::error::{Result, WatchError};
use cleanup::CleanupSlot;
use watcher::Callback;

/// Run `body` now and again whenever anything it read is written.
///
/// Uses the default `Pre` flush: re-runs wait for the next
/// [`flush_jobs`](crate::scheduler::flush_jobs).
pub fn watch_effect<F>(body: F) -> Result<StopHandle>
where
    F: Fn(&OnInvalidate) + Send + Sync + 'static,
{
    watch_effect_with(body, WatchOptions::default())
}

/// [`watch_effect`] with explicit options.
///
/// `immediate` and `deep` only make sense with a callback. Passing either is
/// an error under a strict [`WatchConfig`](crate::WatchConfig) and is logged
/// and ignored otherwise.
pub fn watch_effect_with<F>(body: F, options: WatchOptions) -> Result<StopHandle>
where
    F: Fn(&OnInvalidate) + Send + Sync + 'static,
{
    if options.immediate {
        report_violation(WatchError::IgnoredOption { option: "immediate" })?;
    }
    if options.deep {
        report_violation(WatchError::IgnoredOption { option: "deep" })?;
    }

    let cleanup = Arc::new(CleanupSlot::default());
    let getter = source::resolve_effect(Arc::new(body), Arc::clone(&cleanup));
    Ok(watcher::spawn(
        getter,
        None,
        has_changed::<()>,
        cleanup,
        WatchOptions {
            deep: false,
            immediate: false,
            ..options
        },
    ))
}

/// Call `callback(new, previous, on_invalidate)` whenever `source` changes.
///
/// `previous` is `None` on the first call only. Without `immediate`, the
/// source is evaluated once at creation to record its value and nothing is
/// called until it changes. With `deep`, every reactive handle reachable from
/// the value is tracked and the callback fires on every re-run.
pub fn watch<T, S, C>(source: S, callback: C, options: WatchOptions) -> Result<StopHandle>
where
    T: PartialEq + Traverse + Clone + Send + Sync + 'static,
    S: Into<WatchSource<T>>,
    C: Fn(&T, Option<&T>, &OnInvalidate) + Send + Sync + 'static,
{
    let source = source.into();
    tracing::trace!(kind = source.kind(), "resolving watch source");

    let mut getter = source::resolve_single(source);
    if options.deep {
        getter = traverse::deep_getter(getter);
    }

    let cleanup = Arc::new(CleanupSlot::default());
    let callback: Callback<T> = Arc::new(callback);
    Ok(watcher::spawn(
        getter,
        Some(callback),
        has_changed::<T>,
        cleanup,
        options,
    ))
}

/// Watch several sources as one: the callback receives every current value
/// in source order, and the previous values with the same arity.
///
/// The first call, whether from `immediate` or the first change, gets `None`
/// as the previous values.
///
/// The callback fires when any element changed. An empty source list can
/// never change; it is an error under a strict
/// [`WatchConfig`](crate::WatchConfig) and is logged otherwise.
pub fn watch_many<T, C>(
    sources: Vec<WatchSource<T>>,
    callback: C,
    options: WatchOptions,
) -> Result<StopHandle>
where
    T: PartialEq + Traverse + Clone + Send + Sync + 'static,
    C: Fn(&[T], Option<&[T]>, &OnInvalidate) + Send + Sync + 'static,
{
    if sources.is_empty() {
        report_violation(WatchError::EmptySources)?;
    }

    let mut getter = source::resolve_many(sources);
    if options.deep {
        getter = traverse::deep_getter(getter);
    }

    let cleanup = Arc::new(CleanupSlot::default());
    let callback: Callback<Vec<T>> =
        Arc::new(move |new: &Vec<T>, old: Option<&Vec<T>>, on_invalidate: &OnInvalidate| {
            callback(new, old.map(Vec::as_slice), on_invalidate)
        });
    Ok(watcher::spawn(
        getter,
        Some(callback),
        any_changed::<T>,
        cleanup,
        options,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Memo, Owner, Signal};
    use crate::scheduler::{flush_jobs, flush_jobs_with};
    use crate::WatchConfig;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn sync() -> WatchOptions {
        WatchOptions::new().flush(FlushMode::Sync)
    }

    #[test]
    fn watch_effect_runs_now_and_after_flush() {
        let signal = Signal::new(0);
        let seen = Arc::new(AtomicI32::new(-1));
        let (s, seen_clone) = (signal.clone(), seen.clone());

        let _handle = watch_effect(move |_| seen_clone.store(s.get(), Ordering::SeqCst)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        signal.set(4);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        flush_jobs().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn effect_cleanup_runs_before_rerun_and_on_stop() {
        let signal = Signal::new(0);
        let cleanups = Arc::new(AtomicI32::new(0));
        let (s, counter) = (signal.clone(), cleanups.clone());

        let handle = watch_effect_with(
            move |on_invalidate| {
                s.get();
                let counter = counter.clone();
                on_invalidate.register(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            },
            sync(),
        )
        .unwrap();
        assert_eq!(cleanups.load(Ordering::SeqCst), 0);

        signal.set(1);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        handle.stop();
        handle.stop();
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn memo_source_fires_on_derived_change() {
        let signal = Signal::new(1);
        let s = signal.clone();
        let parity = Memo::new(move || s.get() % 2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let _handle = watch(
            &parity,
            move |new: &i32, old: Option<&i32>, _: &OnInvalidate| sink.lock().push((*new, old.copied())),
            sync(),
        )
        .unwrap();

        signal.set(3);
        signal.set(4);
        assert_eq!(*seen.lock(), vec![(0, Some(1))]);
    }

    #[test]
    fn getter_source_with_immediate() {
        let a = Signal::new(2);
        let b = Signal::new(3);
        let (a2, b2) = (a.clone(), b.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let _handle = watch(
            WatchSource::getter(move || a2.get() * b2.get()),
            move |new: &i32, old: Option<&i32>, _: &OnInvalidate| sink.lock().push((*new, old.copied())),
            sync().immediate(true),
        )
        .unwrap();

        b.set(4);
        a.set(4);
        assert_eq!(*seen.lock(), vec![(6, None), (8, Some(6)), (16, Some(8))]);
    }

    #[test]
    fn watch_many_passes_full_sequences() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let _handle = watch_many(
            vec![WatchSource::from(&a), WatchSource::from(&b)],
            move |new: &[i32], old: Option<&[i32]>, _: &OnInvalidate| {
                sink.lock().push((new.to_vec(), old.map(<[i32]>::to_vec)))
            },
            sync(),
        )
        .unwrap();

        b.set(5);
        assert_eq!(*seen.lock(), vec![(vec![1, 5], Some(vec![1, 2]))]);
    }

    #[test]
    fn strict_config_rejects_contract_violations() {
        let previous = WatchConfig::strict().install();

        let err = watch_effect_with(|_| {}, WatchOptions::new().deep(true)).unwrap_err();
        assert_eq!(err, WatchError::IgnoredOption { option: "deep" });

        let err = watch_many(
            Vec::<WatchSource<i32>>::new(),
            |_: &[i32], _: Option<&[i32]>, _: &OnInvalidate| {},
            WatchOptions::new(),
        )
        .unwrap_err();
        assert_eq!(err, WatchError::EmptySources);

        previous.install();
    }

    #[test]
    fn permissive_config_ignores_options() {
        let previous = WatchConfig::permissive().install();
        let runs = Arc::new(AtomicI32::new(0));
        let counter = runs.clone();

        let handle = watch_effect_with(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            WatchOptions::new().immediate(true).deep(true),
        )
        .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        handle.stop();
        previous.install();
    }

    #[test]
    fn owner_collects_watchers() {
        let owner = Owner::new();
        let signal = Signal::new(0);
        let fired = Arc::new(AtomicI32::new(0));
        let counter = fired.clone();

        let handle = owner
            .run(|| {
                watch(
                    &signal,
                    move |_: &i32, _: Option<&i32>, _: &OnInvalidate| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    },
                    WatchOptions::new(),
                )
            })
            .unwrap();
        assert_eq!(owner.effect_count(), 1);

        signal.set(1);
        owner.dispose();
        flush_jobs_with(|| {}).unwrap();

        assert!(handle.is_stopped());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}

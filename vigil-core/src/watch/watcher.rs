//! Staleness and callback policy.
//!
//! # How a Watcher Runs
//!
//! A watcher owns one lazy [`ReactiveEffect`] (the runner) around its
//! canonical getter. The runner's scheduler hook is the watcher's job, routed
//! by [`FlushMode`]. Each time the job runs:
//!
//! 1. Without a callback, the runner is simply re-run. The getter itself
//!    runs the pending cleanup before calling the body.
//! 2. With a callback, the runner is evaluated for the new value. The callback
//!    fires if the watcher is deep, if nothing was observed yet, or if the
//!    value changed. Before it fires the pending cleanup runs; after it
//!    returns the new value becomes the previous one.
//!
//! # Ownership
//!
//! The runtime retains the runner until it is stopped. The runner's scheduler
//! holds the job, the job holds the watcher, and the watcher only holds a weak
//! reference back to the runner, so stopping releases the whole chain.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::cleanup::{CleanupSlot, OnInvalidate};
use super::flush::scheduler_for;
use super::handle::{self, StopHandle};
use super::options::{FlushMode, WatchOptions};
use super::source::Getter;
use crate::config::WatchConfig;
use crate::reactive::{EffectOptions, FlagGuard, ReactiveContext, ReactiveEffect, WeakEffect};
use crate::scheduler::{queue_post_flush, Job, JobId};

/// Callback receiving `(new, previous, on_invalidate)`.
pub(crate) type Callback<V> = Arc<dyn Fn(&V, Option<&V>, &OnInvalidate) + Send + Sync>;

/// Change test between a new and a previous value.
pub(crate) type ChangeFn<V> = fn(&V, &V) -> bool;

pub(crate) struct Watcher<V> {
    runner: OnceLock<WeakEffect<V>>,
    callback: Option<Callback<V>>,
    deep: bool,
    changed: ChangeFn<V>,
    previous: Mutex<Option<Arc<V>>>,
    cleanup: Arc<CleanupSlot>,
    on_invalidate: OnInvalidate,
    running: AtomicBool,
    rerun: AtomicBool,
    callback_count: AtomicUsize,
}

impl<V> Watcher<V>
where
    V: Send + Sync + 'static,
{
    fn runner(&self) -> Option<ReactiveEffect<V>> {
        self.runner.get().and_then(WeakEffect::upgrade)
    }

    /// The scheduled unit of work.
    ///
    /// A trigger arriving while the job is already running (a callback
    /// writing to its own source under `Sync`) is folded into one more pass.
    fn run_job(&self) {
        let Some(runner) = self.runner().filter(ReactiveEffect::is_active) else {
            tracing::trace!("job of stopped watcher skipped");
            return;
        };
        let Some(_running) = FlagGuard::acquire(&self.running) else {
            self.rerun.store(true, Ordering::SeqCst);
            return;
        };

        let limit = WatchConfig::current().recursion_limit;
        let mut passes = 0;
        loop {
            self.rerun.store(false, Ordering::SeqCst);
            self.run_once(&runner);
            passes += 1;

            if !self.rerun.load(Ordering::SeqCst) || !runner.is_active() {
                break;
            }
            if passes >= limit {
                tracing::error!(watcher = %runner.id(), limit, "watcher re-triggered itself past the recursion limit");
                break;
            }
        }
    }

    fn run_once(&self, runner: &ReactiveEffect<V>) {
        let Some(callback) = &self.callback else {
            runner.run();
            return;
        };
        let Some(new) = runner.run() else {
            return;
        };

        let previous = self.previous.lock().clone();
        let fire = self.deep
            || match &previous {
                Some(old) => (self.changed)(&new, old),
                None => true,
            };
        if !fire {
            return;
        }

        self.cleanup.run();
        ReactiveContext::untracked(|| callback(&new, previous.as_deref(), &self.on_invalidate));
        self.callback_count.fetch_add(1, Ordering::SeqCst);
        *self.previous.lock() = Some(Arc::new(new));
    }
}

impl<V> fmt::Debug for Watcher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("callback", &self.callback.is_some())
            .field("deep", &self.deep)
            .field("observed", &self.previous.lock().is_some())
            .field("callback_count", &self.callback_count.load(Ordering::SeqCst))
            .finish()
    }
}

/// Build a watcher around `getter`, perform its initial run, and register it
/// with the current owner.
///
/// `getter` is already resolved (and wrapped for deep traversal if needed);
/// `cleanup` is the slot the getter and callback share.
pub(crate) fn spawn<V>(
    getter: Getter<V>,
    callback: Option<Callback<V>>,
    changed: ChangeFn<V>,
    cleanup: Arc<CleanupSlot>,
    options: WatchOptions,
) -> StopHandle
where
    V: Send + Sync + 'static,
{
    let WatchOptions {
        flush,
        deep,
        immediate,
        on_track,
        on_trigger,
    } = options;

    let watcher = Arc::new(Watcher {
        runner: OnceLock::new(),
        callback,
        deep,
        changed,
        previous: Mutex::new(None),
        cleanup: Arc::clone(&cleanup),
        on_invalidate: OnInvalidate::new(Arc::clone(&cleanup)),
        running: AtomicBool::new(false),
        rerun: AtomicBool::new(false),
        callback_count: AtomicUsize::new(0),
    });

    let job_watcher = Arc::clone(&watcher);
    let job = Job::new(JobId::next(), move || job_watcher.run_job());

    let runner = ReactiveEffect::new(
        move || getter(),
        EffectOptions {
            lazy: true,
            scheduler: Some(scheduler_for(flush, job.clone())),
            on_track,
            on_trigger,
            on_stop: Some(Arc::new(move || {
                cleanup.run();
            })),
        },
    );
    let _ = watcher.runner.set(runner.downgrade());

    tracing::debug!(
        watcher = %runner.id(),
        job = %job.id(),
        ?flush,
        deep,
        immediate,
        callback = watcher.callback.is_some(),
        "watcher created"
    );

    match (&watcher.callback, flush) {
        (Some(_), _) if immediate => job.run(),
        (Some(_), _) => {
            if let Some(value) = runner.run() {
                *watcher.previous.lock() = Some(Arc::new(value));
            }
        }
        (None, FlushMode::Post) => {
            queue_post_flush(job);
        }
        (None, _) => {
            runner.run();
        }
    }

    handle::register(Arc::new(runner))
}

//! Effect Implementation
//!
//! A `ReactiveEffect` is a tracked computation: it evaluates a getter while
//! recording which sources the getter reads, and reacts when any of them is
//! later written.
//!
//! # How Effects Work
//!
//! 1. Unless created lazily, the effect runs its getter immediately to
//!    establish initial dependencies.
//!
//! 2. When any dependency changes, the effect either re-runs itself or, if a
//!    scheduler hook was supplied, hands the decision to that hook.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! 4. Once stopped, the effect never runs again and the runtime forgets it.
//!
//! # Re-entrancy
//!
//! A write performed by the getter to one of its own sources does not
//! re-trigger the effect while it is running, and `run` called from inside the
//! getter returns `None`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use super::{SourceId, SubscriberId};

/// Re-run hook invoked instead of `run` when a dependency changes.
pub type Scheduler = Arc<dyn Fn() + Send + Sync>;

/// Trace hook receiving track/trigger events.
pub type DebuggerHook = Arc<dyn Fn(&DebuggerEvent) + Send + Sync>;

/// Hook invoked once when the effect is stopped.
pub type StopHook = Arc<dyn Fn() + Send + Sync>;

/// What a debugger event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerEventKind {
    /// The effect read `source` during a run.
    Track,
    /// A write to `source` reached the effect.
    Trigger,
}

/// A dependency event delivered to `on_track` / `on_trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebuggerEvent {
    pub effect: SubscriberId,
    pub source: SourceId,
    pub kind: DebuggerEventKind,
}

/// Creation options for a [`ReactiveEffect`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    pub scheduler: Option<Scheduler>,
    pub on_track: Option<DebuggerHook>,
    pub on_trigger: Option<DebuggerHook>,
    pub on_stop: Option<StopHook>,
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Type-erased view of an effect, used by owners to stop what they collected.
pub trait AnyEffect: Send + Sync {
    fn id(&self) -> SubscriberId;
    fn stop(&self);
    fn is_active(&self) -> bool;
}

/// Clears a flag on drop so a panic cannot leave it set.
pub(crate) struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    /// Set the flag, or return `None` if it was already set.
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct EffectInner<V> {
    subscriber_id: SubscriberId,
    getter: Box<dyn Fn() -> V + Send + Sync>,
    options: EffectOptions,
    active: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
}

impl<V> EffectInner<V>
where
    V: 'static,
{
    fn run(&self) -> Option<V> {
        if !self.active.load(Ordering::SeqCst) {
            return None;
        }
        let _running = FlagGuard::acquire(&self.running)?;

        Runtime::clear_dependencies(self.subscriber_id);
        let (value, tracked) = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            let value = (self.getter)();
            (value, ReactiveContext::get_dependencies())
        };

        if let Some(on_track) = &self.options.on_track {
            for source in tracked {
                on_track(&DebuggerEvent {
                    effect: self.subscriber_id,
                    source,
                    kind: DebuggerEventKind::Track,
                });
            }
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
        Some(value)
    }

    fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        Runtime::release(self.subscriber_id);
        tracing::debug!(effect = %self.subscriber_id, "effect stopped");
        if let Some(on_stop) = &self.options.on_stop {
            on_stop();
        }
    }
}

impl<V> Reactive for EffectInner<V>
where
    V: 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn notify(&self, source: SourceId) {
        if !self.active.load(Ordering::SeqCst) || self.running.load(Ordering::SeqCst) {
            return;
        }

        if let Some(on_trigger) = &self.options.on_trigger {
            on_trigger(&DebuggerEvent {
                effect: self.subscriber_id,
                source,
                kind: DebuggerEventKind::Trigger,
            });
        }

        match &self.options.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }
}

/// A tracked computation over a getter returning `V`.
///
/// # Example
///
/// ```rust
/// use vigil_core::reactive::{EffectOptions, ReactiveEffect, Signal};
///
/// let count = Signal::new(1);
/// let c = count.clone();
/// let effect = ReactiveEffect::new(move || c.get() * 10, EffectOptions::default());
///
/// count.set(2);
/// assert_eq!(effect.run_count(), 2);
/// assert_eq!(effect.run(), Some(20));
/// ```
pub struct ReactiveEffect<V> {
    inner: Arc<EffectInner<V>>,
}

impl<V> ReactiveEffect<V>
where
    V: 'static,
{
    /// Create a new effect. Runs immediately unless `options.lazy` is set.
    pub fn new<F>(getter: F, options: EffectOptions) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        let lazy = options.lazy;
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            getter: Box::new(getter),
            options,
            active: AtomicBool::new(true),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        Runtime::retain(inner.clone());

        let effect = Self { inner };
        if !lazy {
            effect.run();
        }
        effect
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the getter now, re-establishing dependencies.
    ///
    /// Returns `None` if the effect is stopped or already running.
    pub fn run(&self) -> Option<V> {
        self.inner.run()
    }

    /// Permanently deactivate the effect. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Whether the effect still reacts to writes.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Get the number of times the getter has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies recorded by the last run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.subscriber_id)
    }

    /// Non-owning reference, for holders the effect itself keeps alive.
    pub fn downgrade(&self) -> WeakEffect<V> {
        WeakEffect(Arc::downgrade(&self.inner))
    }
}

/// Non-owning reference to a [`ReactiveEffect`].
pub struct WeakEffect<V>(Weak<EffectInner<V>>);

impl<V> WeakEffect<V> {
    pub fn upgrade(&self) -> Option<ReactiveEffect<V>> {
        self.0.upgrade().map(|inner| ReactiveEffect { inner })
    }
}

impl<V> Clone for WeakEffect<V> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

impl<V> AnyEffect for ReactiveEffect<V>
where
    V: 'static,
{
    fn id(&self) -> SubscriberId {
        ReactiveEffect::id(self)
    }

    fn stop(&self) {
        ReactiveEffect::stop(self);
    }

    fn is_active(&self) -> bool {
        ReactiveEffect::is_active(self)
    }
}

impl<V> Clone for ReactiveEffect<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for ReactiveEffect<V>
where
    V: 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = ReactiveEffect::new(
            move || {
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            },
            EffectOptions::default(),
        );

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let effect = ReactiveEffect::new(
            || 7,
            EffectOptions {
                lazy: true,
                ..Default::default()
            },
        );

        assert_eq!(effect.run_count(), 0);
        assert_eq!(effect.run(), Some(7));
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_written() {
        let signal = Signal::new(0);
        let seen = Arc::new(AtomicI32::new(-1));
        let (s, seen_clone) = (signal.clone(), seen.clone());

        let effect = ReactiveEffect::new(
            move || seen_clone.store(s.get(), Ordering::SeqCst),
            EffectOptions::default(),
        );
        assert_eq!(effect.dependency_count(), 1);

        signal.set(42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let signal = Signal::new(0);
        let scheduled = Arc::new(AtomicI32::new(0));
        let (s, scheduled_clone) = (signal.clone(), scheduled.clone());

        let effect = ReactiveEffect::new(
            move || s.get(),
            EffectOptions {
                scheduler: Some(Arc::new(move || {
                    scheduled_clone.fetch_add(1, Ordering::SeqCst);
                })),
                ..Default::default()
            },
        );

        signal.set(1);
        signal.set(2);
        assert_eq!(scheduled.load(Ordering::SeqCst), 2);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.run(), Some(2));
    }

    #[test]
    fn stopped_effect_ignores_writes_and_runs() {
        let signal = Signal::new(0);
        let stops = Arc::new(AtomicI32::new(0));
        let (s, stops_clone) = (signal.clone(), stops.clone());

        let effect = ReactiveEffect::new(
            move || s.get(),
            EffectOptions {
                on_stop: Some(Arc::new(move || {
                    stops_clone.fetch_add(1, Ordering::SeqCst);
                })),
                ..Default::default()
            },
        );

        effect.stop();
        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.run(), None);
    }

    #[test]
    fn dependencies_follow_the_last_run() {
        let flag = Signal::new(true);
        let a = Signal::new(1);
        let b = Signal::new(2);
        let (f, a2, b2) = (flag.clone(), a.clone(), b.clone());

        let effect = ReactiveEffect::new(
            move || if f.get() { a2.get() } else { b2.get() },
            EffectOptions::default(),
        );
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        flag.set(false);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(effect.dependency_count(), 2);
    }

    #[test]
    fn self_write_does_not_recurse() {
        let signal = Signal::new(0);
        let s = signal.clone();

        let effect = ReactiveEffect::new(
            move || {
                let v = s.get();
                s.set(v + 1);
            },
            EffectOptions::default(),
        );

        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.get_untracked(), 1);
    }

    #[test]
    fn debugger_hooks_see_track_and_trigger() {
        let signal = Signal::new(0);
        let events = Arc::new(Mutex::new(Vec::new()));
        let (s, on_track_events, on_trigger_events) =
            (signal.clone(), events.clone(), events.clone());

        let effect = ReactiveEffect::new(
            move || s.get(),
            EffectOptions {
                on_track: Some(Arc::new(move |e: &DebuggerEvent| {
                    on_track_events.lock().push(e.kind)
                })),
                on_trigger: Some(Arc::new(move |e: &DebuggerEvent| {
                    on_trigger_events.lock().push(e.kind)
                })),
                ..Default::default()
            },
        );

        signal.set(1);
        assert_eq!(
            *events.lock(),
            vec![
                DebuggerEventKind::Track,
                DebuggerEventKind::Trigger,
                DebuggerEventKind::Track,
            ]
        );
        effect.stop();
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = ReactiveEffect::new(|| {}, EffectOptions::default());
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(!effect2.is_active());
    }

    #[test]
    fn weak_effect_upgrades_while_retained() {
        let effect = ReactiveEffect::new(|| 1, EffectOptions::default());
        let weak = effect.downgrade();
        drop(effect);

        // The runtime still retains the effect until it is stopped.
        let upgraded = weak.upgrade().unwrap();
        assert_eq!(upgraded.run(), Some(1));

        upgraded.stop();
        drop(upgraded);
        assert!(weak.upgrade().is_none());
    }
}

//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects sources (signals,
//! memos) with the computations that read them (memos, effects). It owns the
//! dependency map and fans out notifications when a source is written.
//!
//! # How It Works
//!
//! 1. A memo or effect registers with the runtime under its subscriber ID.
//!
//! 2. When it reads a source inside its reactive context, the runtime
//!    records the edge `source -> subscriber` (and the reverse edge, so a
//!    re-run can drop stale dependencies without scanning every source).
//!
//! 3. When a source is written, the runtime snapshots its subscribers,
//!    releases every map shard, and only then calls `notify` on each one.
//!    Notified computations are free to read, write and re-subscribe.
//!
//! # Thread Safety
//!
//! The maps are global `DashMap`s so handles can cross threads. The tracking
//! stack, owner stack and job queue stay thread-local.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::{SourceId, SubscriberId};

/// A computation that can be notified when one of its sources changes.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// A source this computation read during its last run was written.
    fn notify(&self, source: SourceId);
}

/// Handle to a weakly registered computation.
///
/// Dropping this handle unregisters the computation from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    /// The subscriber this handle keeps registered.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::release(self.subscriber_id);
    }
}

/// How the registry holds on to a computation.
enum Registration {
    /// Lives as long as its owner keeps it (memos).
    Weak(Weak<dyn Reactive>),
    /// Kept alive by the runtime until released (effects).
    Retained(Arc<dyn Reactive>),
}

impl Registration {
    fn upgrade(&self) -> Option<Arc<dyn Reactive>> {
        match self {
            Registration::Weak(weak) => weak.upgrade(),
            Registration::Retained(strong) => Some(Arc::clone(strong)),
        }
    }
}

type Subscribers = SmallVec<[Arc<dyn Reactive>; 8]>;

/// The global reactive runtime.
pub struct Runtime;

static REGISTRY: OnceLock<DashMap<SubscriberId, Registration>> = OnceLock::new();
static SOURCE_SUBSCRIBERS: OnceLock<DashMap<SourceId, IndexSet<SubscriberId>>> = OnceLock::new();
static SUBSCRIBER_SOURCES: OnceLock<DashMap<SubscriberId, IndexSet<SourceId>>> = OnceLock::new();

fn registry() -> &'static DashMap<SubscriberId, Registration> {
    REGISTRY.get_or_init(DashMap::new)
}

fn source_subscribers() -> &'static DashMap<SourceId, IndexSet<SubscriberId>> {
    SOURCE_SUBSCRIBERS.get_or_init(DashMap::new)
}

fn subscriber_sources() -> &'static DashMap<SubscriberId, IndexSet<SourceId>> {
    SUBSCRIBER_SOURCES.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a computation weakly.
    ///
    /// Returns a handle that unregisters the computation when dropped.
    pub fn register(reactive: &Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        registry().insert(id, Registration::Weak(Arc::downgrade(reactive)));
        ReactiveHandle { subscriber_id: id }
    }

    /// Register a computation and keep it alive until [`Runtime::release`].
    pub fn retain(reactive: Arc<dyn Reactive>) {
        let id = reactive.subscriber_id();
        registry().insert(id, Registration::Retained(reactive));
    }

    /// Unregister a computation and drop all of its dependency edges.
    pub fn release(id: SubscriberId) {
        registry().remove(&id);
        Self::clear_dependencies(id);
    }

    /// Whether `id` is currently registered.
    pub fn is_registered(id: SubscriberId) -> bool {
        registry().contains_key(&id)
    }

    /// Record that a subscriber depends on a source.
    pub fn add_dependency(source: SourceId, subscriber: SubscriberId) {
        source_subscribers().entry(source).or_default().insert(subscriber);
        subscriber_sources().entry(subscriber).or_default().insert(source);
    }

    /// Remove all dependencies for a subscriber.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn clear_dependencies(subscriber: SubscriberId) {
        let Some((_, sources)) = subscriber_sources().remove(&subscriber) else {
            return;
        };
        for source in sources {
            if let Some(mut subs) = source_subscribers().get_mut(&source) {
                subs.shift_remove(&subscriber);
            }
            source_subscribers().remove_if(&source, |_, subs| subs.is_empty());
        }
    }

    /// Number of sources `subscriber` currently depends on.
    pub fn dependency_count(subscriber: SubscriberId) -> usize {
        subscriber_sources()
            .get(&subscriber)
            .map(|sources| sources.len())
            .unwrap_or(0)
    }

    /// Number of live subscribers of `source`.
    pub fn subscriber_count(source: SourceId) -> usize {
        source_subscribers()
            .get(&source)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Track a read of `source` by the current computation, if any.
    ///
    /// Returns the subscriber that was charged with the read.
    pub fn track(source: SourceId) -> Option<SubscriberId> {
        let subscriber = ReactiveContext::current_subscriber()?;
        if ReactiveContext::track_dependency(source) {
            Self::add_dependency(source, subscriber);
        }
        Some(subscriber)
    }

    /// Notify all subscribers that a source changed.
    ///
    /// This is the core update propagation mechanism.
    pub fn notify_source_change(source: SourceId) {
        let subscriber_ids: SmallVec<[SubscriberId; 8]> = match source_subscribers().get(&source) {
            Some(subs) => subs.iter().copied().collect(),
            None => return,
        };

        let targets: Subscribers = subscriber_ids
            .iter()
            .filter_map(|id| registry().get(id).and_then(|entry| entry.upgrade()))
            .collect();

        tracing::trace!(%source, subscribers = targets.len(), "source changed");

        for target in targets {
            target.notify(source);
        }
    }
}

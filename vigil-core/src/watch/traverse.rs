//! Deep traversal.
//!
//! A tracked computation only depends on what it actually reads. A getter that
//! returns a structure holding reactive handles reads the handles, not what is
//! behind them, so writes to nested fields go unnoticed. A deep watcher wraps
//! its getter so every reachable handle is read once after the getter returns.
//!
//! # Identity
//!
//! Signals and memos are visited through a cloned snapshot of their value,
//! so no lock is held while nested handles are read.
//!
//! Nested handles can form cycles (a signal holding a structure that holds
//! the same signal). [`Seen`] records identities, not values: signals and
//! memos by source id, `Arc`s by address. Two equal but distinct values are
//! both visited; the same handle is visited once.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::BuildHasher;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use super::source::Getter;
use crate::reactive::{Memo, Signal, SourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Source(SourceId),
    Address(usize),
}

/// Identities already visited during one traversal.
#[derive(Debug, Default)]
pub struct Seen {
    visited: HashSet<Identity>,
}

impl Seen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `source` is offered.
    pub fn first_visit_source(&mut self, source: SourceId) -> bool {
        self.visited.insert(Identity::Source(source))
    }

    /// Returns `true` the first time the allocation behind `ptr` is offered.
    pub fn first_visit_ptr<T: ?Sized>(&mut self, ptr: *const T) -> bool {
        self.visited.insert(Identity::Address(ptr.cast::<()>() as usize))
    }

    /// Number of distinct identities visited.
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

/// Values whose nested reactive reads can be forced.
///
/// Leaf types do nothing. Containers visit their elements. Reactive handles
/// read themselves (registering the dependency) and then visit their value.
/// Use [`traverse_leaf!`](crate::traverse_leaf) for opaque types of your own.
pub trait Traverse {
    fn traverse(&self, seen: &mut Seen);
}

/// Traverse `value` with a fresh identity set.
pub fn traverse<T: Traverse + ?Sized>(value: &T) {
    value.traverse(&mut Seen::new());
}

/// Wrap `getter` so its result is fully traversed before being returned.
pub(crate) fn deep_getter<V>(getter: Getter<V>) -> Getter<V>
where
    V: Traverse + 'static,
{
    Arc::new(move || {
        let value = getter();
        traverse(&value);
        value
    })
}

/// Implement [`Traverse`](crate::watch::Traverse) as a no-op for the listed
/// types.
///
/// ```rust
/// #[derive(Clone, PartialEq)]
/// struct Color(u8, u8, u8);
///
/// vigil_core::traverse_leaf!(Color);
/// ```
#[macro_export]
macro_rules! traverse_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::watch::Traverse for $ty {
                fn traverse(&self, _seen: &mut $crate::watch::Seen) {}
            }
        )*
    };
}

traverse_leaf!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    str,
    String,
    std::time::Duration,
);

impl<T: Traverse + ?Sized> Traverse for &T {
    fn traverse(&self, seen: &mut Seen) {
        (**self).traverse(seen);
    }
}

impl<T: Traverse + ?Sized> Traverse for Box<T> {
    fn traverse(&self, seen: &mut Seen) {
        (**self).traverse(seen);
    }
}

impl<T: Traverse + ?Sized> Traverse for Arc<T> {
    fn traverse(&self, seen: &mut Seen) {
        if seen.first_visit_ptr(Arc::as_ptr(self)) {
            (**self).traverse(seen);
        }
    }
}

impl<T: Traverse> Traverse for Option<T> {
    fn traverse(&self, seen: &mut Seen) {
        if let Some(value) = self {
            value.traverse(seen);
        }
    }
}

impl<T: Traverse> Traverse for [T] {
    fn traverse(&self, seen: &mut Seen) {
        for item in self {
            item.traverse(seen);
        }
    }
}

impl<T: Traverse, const N: usize> Traverse for [T; N] {
    fn traverse(&self, seen: &mut Seen) {
        self.as_slice().traverse(seen);
    }
}

impl<T: Traverse> Traverse for Vec<T> {
    fn traverse(&self, seen: &mut Seen) {
        self.as_slice().traverse(seen);
    }
}

impl<T: Traverse> Traverse for VecDeque<T> {
    fn traverse(&self, seen: &mut Seen) {
        for item in self {
            item.traverse(seen);
        }
    }
}

impl<K: Traverse, V: Traverse, S: BuildHasher> Traverse for HashMap<K, V, S> {
    fn traverse(&self, seen: &mut Seen) {
        for (key, value) in self {
            key.traverse(seen);
            value.traverse(seen);
        }
    }
}

impl<K: Traverse, V: Traverse> Traverse for BTreeMap<K, V> {
    fn traverse(&self, seen: &mut Seen) {
        for (key, value) in self {
            key.traverse(seen);
            value.traverse(seen);
        }
    }
}

impl<K: Traverse, V: Traverse, S: BuildHasher> Traverse for IndexMap<K, V, S> {
    fn traverse(&self, seen: &mut Seen) {
        for (key, value) in self {
            key.traverse(seen);
            value.traverse(seen);
        }
    }
}

impl<T: Traverse, S: BuildHasher> Traverse for HashSet<T, S> {
    fn traverse(&self, seen: &mut Seen) {
        for member in self {
            member.traverse(seen);
        }
    }
}

impl<T: Traverse> Traverse for BTreeSet<T> {
    fn traverse(&self, seen: &mut Seen) {
        for member in self {
            member.traverse(seen);
        }
    }
}

impl<T: Traverse, S: BuildHasher> Traverse for IndexSet<T, S> {
    fn traverse(&self, seen: &mut Seen) {
        for member in self {
            member.traverse(seen);
        }
    }
}

macro_rules! traverse_tuple {
    ($($name:ident),+) => {
        impl<$($name: Traverse),+> Traverse for ($($name,)+) {
            #[allow(non_snake_case)]
            fn traverse(&self, seen: &mut Seen) {
                let ($($name,)+) = self;
                $($name.traverse(seen);)+
            }
        }
    };
}

traverse_tuple!(A);
traverse_tuple!(A, B);
traverse_tuple!(A, B, C);
traverse_tuple!(A, B, C, D);

impl<T> Traverse for Signal<T>
where
    T: Traverse + Clone + Send + Sync + 'static,
{
    fn traverse(&self, seen: &mut Seen) {
        if seen.first_visit_source(self.id()) {
            // Visit a snapshot so no lock is held while nested reads run.
            self.get().traverse(seen);
        }
    }
}

impl<T> Traverse for Memo<T>
where
    T: Traverse + Clone + Send + Sync + 'static,
{
    fn traverse(&self, seen: &mut Seen) {
        if seen.first_visit_source(self.id()) {
            // Visit a snapshot so no lock is held while nested reads run.
            self.get().traverse(seen);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ReactiveContext, SubscriberId};

    #[derive(Clone)]
    struct Link(Signal<Vec<Link>>);

    impl Traverse for Link {
        fn traverse(&self, seen: &mut Seen) {
            self.0.traverse(seen);
        }
    }

    #[test]
    fn nested_signals_are_read_inside_context() {
        let inner_a = Signal::new(1);
        let inner_b = Signal::new(2);
        let outer = Signal::new(vec![inner_a.clone(), inner_b.clone()]);
        let id = SubscriberId::new();

        {
            let _ctx = ReactiveContext::enter(id);
            traverse(&outer);
            assert_eq!(ReactiveContext::get_dependencies().len(), 3);
        }

        assert_eq!(inner_a.subscriber_count(), 1);
        assert_eq!(inner_b.subscriber_count(), 1);
        crate::reactive::Runtime::clear_dependencies(id);
    }

    #[test]
    fn cycles_terminate() {
        let head = Signal::new(Vec::new());
        let again = head.clone();
        head.update(|links| links.push(Link(again)));

        let mut seen = Seen::new();
        head.traverse(&mut seen);
        assert_eq!(seen.len(), 1);
    }

    #[derive(Clone)]
    struct Resetter(Signal<Option<Resetter>>);

    impl Traverse for Resetter {
        fn traverse(&self, _seen: &mut Seen) {
            self.0.set(None);
        }
    }

    #[test]
    fn nested_visit_may_write_the_outer_signal() {
        let slot = Signal::new(None);
        slot.set(Some(Resetter(slot.clone())));

        traverse(&slot);
        assert!(slot.get_untracked().is_none());
    }

    #[test]
    fn shared_arcs_visited_once() {
        let shared = Arc::new(Signal::new(5));
        let pair = (shared.clone(), shared.clone());

        let mut seen = Seen::new();
        pair.traverse(&mut seen);
        // One address plus one source.
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn equal_but_distinct_handles_are_both_visited() {
        let map: BTreeMap<&str, Signal<i32>> =
            [("a", Signal::new(0)), ("b", Signal::new(0))].into_iter().collect();

        let mut seen = Seen::new();
        map.traverse(&mut seen);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn leaves_record_nothing() {
        let mut seen = Seen::new();
        (1u8, "x".to_string(), vec![1.5f64], Some(true)).traverse(&mut seen);
        assert!(seen.is_empty());
    }

    #[test]
    fn deep_getter_returns_original_value() {
        let inner = Signal::new(3);
        let inner_clone = inner.clone();
        let getter: Getter<Vec<Signal<i32>>> = Arc::new(move || vec![inner_clone.clone()]);

        let wrapped = deep_getter(getter);
        assert_eq!(wrapped(), vec![inner]);
    }
}

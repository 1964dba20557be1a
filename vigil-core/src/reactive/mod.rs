//! Reactive Primitives
//!
//! This module implements the dependency-tracking layer the watch engine is
//! built on: signals, memos, tracked effects, and the owners that collect
//! effects for disposal.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the runtime
//! registers that context as a dependent. When the signal is written, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes, and is itself a readable source.
//!
//! ## Effects
//!
//! A `ReactiveEffect` evaluates a getter while recording its reads. When a
//! recorded source is written it re-runs, or defers to a scheduler hook.
//!
//! ## Owners
//!
//! An `Owner` is the ambient scope that collects effects created under it and
//! stops them all on `dispose`.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod context;
mod effect;
mod memo;
mod owner;
mod runtime;
mod signal;
mod subscriber;

pub use context::ReactiveContext;
pub(crate) use effect::FlagGuard;
pub use effect::{
    AnyEffect, DebuggerEvent, DebuggerEventKind, DebuggerHook, EffectOptions, ReactiveEffect,
    Scheduler, StopHook, WeakEffect,
};
pub use memo::{Memo, MemoState};
pub use owner::{Owner, OwnerId, WeakOwner};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::Signal;
pub use subscriber::{SourceId, SubscriberId};

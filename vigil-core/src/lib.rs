//! Vigil Core
//!
//! This crate provides the watch engine of the Vigil reactive runtime. It
//! implements:
//!
//! - Reactive primitives (signals, memos, tracked effects, owners)
//! - A batched job queue with `pre` and `post` tiers
//! - Watchers: side-effecting bodies and change callbacks over tracked state
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `scheduler`: Deferred job queue drained by the host
//! - `watch`: Source resolution, deep traversal, cleanup and the watch entry
//!   points
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//! use vigil_core::reactive::{Memo, Signal};
//! use vigil_core::scheduler::flush_jobs;
//! use vigil_core::watch_effect;
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let c = count.clone();
//! let doubled = Memo::new(move || c.get() * 2);
//!
//! // Create a watcher
//! let last = Arc::new(AtomicI32::new(-1));
//! let sink = last.clone();
//! let _handle = watch_effect(move |_| sink.store(doubled.get(), Ordering::SeqCst)).unwrap();
//!
//! // Update the signal and let the queued re-run happen
//! count.set(5);
//! flush_jobs().unwrap();
//! assert_eq!(last.load(Ordering::SeqCst), 10);
//! ```

pub mod reactive;
pub mod scheduler;
pub mod watch;

mod config;
mod error;

pub use config::{WatchConfig, DEFAULT_RECURSION_LIMIT};
pub use error::{Result, WatchError};
pub use watch::{
    watch, watch_effect, watch_effect_with, watch_many, FlushMode, OnInvalidate, StopHandle,
    WatchOptions, WatchSource,
};

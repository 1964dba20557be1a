//! Batched Job Queue
//!
//! This module implements the deferred queue that `pre` and `post` watchers
//! hand their re-runs to.
//!
//! # Overview
//!
//! A dependency write does not run a deferred watcher. It queues the
//! watcher's job, keyed by id, into one of two tiers:
//!
//! - `Pre` jobs run before the surrounding update pass
//! - `Post` jobs run after it
//!
//! Nothing runs until the host calls [`flush_jobs`] (or
//! [`flush_jobs_with`], passing its update pass). Many writes between two
//! flushes leave one pending job per watcher.
//!
//! There is no event loop here: the host decides when a "tick" ends.

mod job;
mod queue;

pub use job::{FlushTier, Job, JobId};
pub use queue::{
    clear_pending_jobs, flush_jobs, flush_jobs_with, has_pending_jobs, is_queued, pending_jobs,
    queue_job, queue_post_flush, queue_pre_flush,
};

//! Scheduler adapter.
//!
//! Turns a watcher's job into the re-run hook its runner calls when a
//! dependency is written: run it inline for `Sync`, queue it for `Pre` and
//! `Post`. Ordering between tiers belongs to the queue.

use std::sync::Arc;

use super::options::FlushMode;
use crate::reactive::Scheduler;
use crate::scheduler::{queue_post_flush, queue_pre_flush, Job};

/// Build the re-run hook for `job` under `flush`.
pub(crate) fn scheduler_for(flush: FlushMode, job: Job) -> Scheduler {
    match flush {
        FlushMode::Sync => Arc::new(move || job.run()),
        FlushMode::Pre => Arc::new(move || {
            queue_pre_flush(job.clone());
        }),
        FlushMode::Post => Arc::new(move || {
            queue_post_flush(job.clone());
        }),
    }
}

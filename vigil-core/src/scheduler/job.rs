//! Jobs
//!
//! A job is a zero-argument unit of deferred work. Jobs are identified so the
//! queue can de-duplicate them: queuing a job whose id is already pending is
//! a no-op, which is what turns N writes in one tick into one re-run.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// Allocate a fresh id from the process-wide counter.
    ///
    /// Counter ids start high so they never meet the small literal ids
    /// built with `From<u64>`.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1 << 32);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Which side of the update pass a job runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushTier {
    /// Before the surrounding update pass.
    Pre,
    /// After the surrounding update pass.
    Post,
}

/// A queued unit of work.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    run: Arc<dyn Fn() + Send + Sync>,
}

impl Job {
    pub fn new<F>(id: JobId, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            run: Arc::new(run),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn run(&self) {
        (self.run)();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

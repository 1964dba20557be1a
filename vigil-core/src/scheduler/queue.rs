//! Job Queue
//!
//! The queue holds two ordered, de-duplicated tiers of pending jobs and drains
//! them on `flush_jobs`.
//!
//! # Algorithm
//!
//! 1. Pop and run `Pre` jobs front to back until the tier is empty. Jobs
//!    queued while draining are appended and picked up in the same pass.
//! 2. Run the caller's update pass, once per flush.
//! 3. Pop and run `Post` jobs the same way.
//! 4. Repeat while either tier is non-empty (post jobs may queue pre jobs).
//!
//! A job that is re-queued more than the configured recursion limit within
//! one flush aborts the flush with [`WatchError::RecursionLimit`]; whatever is
//! still pending stays queued.
//!
//! The queue is thread-local and jobs never run while the queue is borrowed,
//! so a job can freely queue more work. A flush started from inside a job is
//! a no-op; the outer flush drains everything.

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;

use super::job::{FlushTier, Job, JobId};
use crate::config::WatchConfig;
use crate::error::{Result, WatchError};

#[derive(Default)]
struct JobQueue {
    pre: IndexMap<JobId, Job>,
    post: IndexMap<JobId, Job>,
    flushing: bool,
}

impl JobQueue {
    fn tier_mut(&mut self, tier: FlushTier) -> &mut IndexMap<JobId, Job> {
        match tier {
            FlushTier::Pre => &mut self.pre,
            FlushTier::Post => &mut self.post,
        }
    }

    fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

thread_local! {
    static QUEUE: RefCell<JobQueue> = RefCell::new(JobQueue::default());
}

/// Resets the flushing flag even if a job panics.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        QUEUE.with(|queue| queue.borrow_mut().flushing = false);
    }
}

/// Queue `job` in `tier` unless a job with the same id is already pending.
///
/// Returns `true` if the job was added.
pub fn queue_job(tier: FlushTier, job: Job) -> bool {
    let id = job.id();
    let added = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        let pending = queue.tier_mut(tier);
        if pending.contains_key(&id) {
            false
        } else {
            pending.insert(id, job);
            true
        }
    });
    tracing::trace!(%id, ?tier, added, "queue job");
    added
}

/// Queue a job to run before the update pass.
pub fn queue_pre_flush(job: Job) -> bool {
    queue_job(FlushTier::Pre, job)
}

/// Queue a job to run after the update pass.
pub fn queue_post_flush(job: Job) -> bool {
    queue_job(FlushTier::Post, job)
}

/// Whether any job is waiting in either tier.
pub fn has_pending_jobs() -> bool {
    QUEUE.with(|queue| !queue.borrow().is_empty())
}

/// Number of jobs waiting in `tier`.
pub fn pending_jobs(tier: FlushTier) -> usize {
    QUEUE.with(|queue| queue.borrow_mut().tier_mut(tier).len())
}

/// Whether `id` is waiting in `tier`.
pub fn is_queued(tier: FlushTier, id: JobId) -> bool {
    QUEUE.with(|queue| queue.borrow_mut().tier_mut(tier).contains_key(&id))
}

/// Drop every pending job without running it.
pub fn clear_pending_jobs() {
    QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.pre.clear();
        queue.post.clear();
    });
}

fn pop_front(tier: FlushTier) -> Option<Job> {
    QUEUE.with(|queue| {
        queue
            .borrow_mut()
            .tier_mut(tier)
            .shift_remove_index(0)
            .map(|(_, job)| job)
    })
}

/// Drain both tiers with no update pass in between.
pub fn flush_jobs() -> Result<()> {
    flush_jobs_with(|| {})
}

/// Drain pre jobs, run `update_pass`, then drain post jobs.
pub fn flush_jobs_with<F>(update_pass: F) -> Result<()>
where
    F: FnOnce(),
{
    let already_flushing = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        std::mem::replace(&mut queue.flushing, true)
    });
    if already_flushing {
        return Ok(());
    }
    let _guard = FlushGuard;

    let limit = WatchConfig::current().recursion_limit;
    let mut runs: HashMap<JobId, usize> = HashMap::new();
    let mut update_pass = Some(update_pass);

    loop {
        drain_tier(FlushTier::Pre, limit, &mut runs)?;
        if let Some(update) = update_pass.take() {
            update();
        }
        drain_tier(FlushTier::Post, limit, &mut runs)?;

        if !has_pending_jobs() {
            return Ok(());
        }
    }
}

fn drain_tier(tier: FlushTier, limit: usize, runs: &mut HashMap<JobId, usize>) -> Result<()> {
    while let Some(job) = pop_front(tier) {
        let count = runs.entry(job.id()).or_insert(0);
        *count += 1;
        if *count > limit {
            tracing::error!(job = %job.id(), limit, "recursive job updates exceeded limit");
            return Err(WatchError::RecursionLimit { job: job.id(), limit });
        }
        job.run();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push_job(id: u64, log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Job {
        let log = log.clone();
        Job::new(JobId::from(id), move || log.lock().push(name))
    }

    #[test]
    fn pre_runs_before_update_and_post_after() {
        let log = recorder();
        queue_post_flush(push_job(1, &log, "post"));
        queue_pre_flush(push_job(2, &log, "pre"));

        let update_log = log.clone();
        flush_jobs_with(move || update_log.lock().push("update")).unwrap();

        assert_eq!(*log.lock(), vec!["pre", "update", "post"]);
        assert!(!has_pending_jobs());
    }

    #[test]
    fn duplicate_ids_coalesce() {
        let log = recorder();
        assert!(queue_pre_flush(push_job(10, &log, "a")));
        assert!(!queue_pre_flush(push_job(10, &log, "a")));
        assert!(queue_pre_flush(push_job(11, &log, "b")));
        assert_eq!(pending_jobs(FlushTier::Pre), 2);

        flush_jobs().unwrap();
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn jobs_queued_during_flush_run_in_same_flush() {
        let log = recorder();
        let inner_log = log.clone();
        queue_post_flush(Job::new(JobId::from(20), move || {
            inner_log.lock().push("post");
            let nested_log = inner_log.clone();
            queue_pre_flush(Job::new(JobId::from(21), move || {
                nested_log.lock().push("pre-from-post")
            }));
        }));

        flush_jobs().unwrap();
        assert_eq!(*log.lock(), vec!["post", "pre-from-post"]);
    }

    #[test]
    fn self_requeueing_job_hits_recursion_limit() {
        let original = WatchConfig {
            recursion_limit: 5,
            ..WatchConfig::default()
        }
        .install();

        fn requeue() {
            queue_pre_flush(Job::new(JobId::from(30), requeue));
        }
        requeue();

        let err = flush_jobs().unwrap_err();
        assert_eq!(
            err,
            WatchError::RecursionLimit {
                job: JobId::from(30),
                limit: 5
            }
        );

        clear_pending_jobs();
        original.install();
    }

    #[test]
    fn nested_flush_is_a_no_op() {
        let log = recorder();
        let inner_log = log.clone();
        queue_pre_flush(Job::new(JobId::from(40), move || {
            inner_log.lock().push("outer");
            flush_jobs().unwrap();
        }));
        queue_pre_flush(push_job(41, &log, "second"));

        flush_jobs().unwrap();
        assert_eq!(*log.lock(), vec!["outer", "second"]);
    }
}

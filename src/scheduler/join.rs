//! Barrier synchronization over a fixed set of jobs.
//!
//! A [`Join`] watches the jobs it was registered on and reports
//! [`JoinState::Ready`] exactly once, after every registered job has
//! reached a terminal state. The decrement-and-check is atomic, so the
//! exactly-once guarantee holds even when completions are delivered
//! concurrently. A failed job poisons the barrier: it still counts down,
//! but the barrier reports failure so the pipeline aborts instead of
//! performing its stage action.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::problem::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// Registered jobs are still outstanding.
    Pending,
    /// All registered jobs are terminal and succeeded (or were fake runs);
    /// returned exactly once per join.
    Ready,
    /// All registered jobs are terminal but at least one failed.
    Failed,
}

#[derive(Debug)]
pub struct Join {
    label: String,
    jobs: HashSet<JobId>,
    pending: AtomicUsize,
    poisoned: AtomicBool,
    fired: AtomicBool,
}

impl Join {
    pub fn new(label: impl Into<String>, jobs: impl IntoIterator<Item = JobId>) -> Self {
        let jobs: HashSet<JobId> = jobs.into_iter().collect();
        let pending = jobs.len();
        Self {
            label: label.into(),
            jobs,
            pending: AtomicUsize::new(pending),
            poisoned: AtomicBool::new(false),
            fired: AtomicBool::new(false),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.contains(job_id)
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Notify the barrier that one of its jobs reached a terminal state.
    ///
    /// Returns [`JoinState::Ready`] for exactly one caller, on the
    /// notification that drops the pending count to zero with no failures
    /// observed. Notifications for jobs the barrier is not watching leave
    /// the count untouched.
    pub fn on_job_terminal(&self, job_id: &JobId, succeeded: bool) -> JoinState {
        if !self.jobs.contains(job_id) {
            return JoinState::Pending;
        }
        if !succeeded {
            self.poisoned.store(true, Ordering::SeqCst);
        }
        let prev = self.pending.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "join {} over-notified", self.label);
        if prev != 1 {
            return JoinState::Pending;
        }
        if self.poisoned.load(Ordering::SeqCst) {
            tracing::error!(join = %self.label, "Barrier poisoned by failed job");
            return JoinState::Failed;
        }
        if self
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!(join = %self.label, "Barrier complete");
            JoinState::Ready
        } else {
            JoinState::Pending
        }
    }
}

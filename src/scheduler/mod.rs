//! Job-dependency scheduling and barrier synchronization.
//!
//! - [`job`]: job lifecycle, the central job table, and execution specs
//! - [`pool`]: bounded dispatch of external-tool jobs with a completion
//!   channel
//! - [`join`]: at-most-once barriers over fixed job sets

pub mod job;
pub mod join;
pub mod pool;

pub use job::{JobExecSpec, JobKind, JobOutcome, JobStatus, JobTable, ToolInvocation, ToolJob};
pub use join::{Join, JoinState};
pub use pool::JobPool;

use crate::error::{PlacementError, Result};
use crate::problem::JobId;

/// Look a job up in the table and hand its execution spec to the pool.
/// Rejects jobs that were already enqueued.
pub fn enqueue_job(jobs: &mut JobTable, pool: &JobPool, id: &JobId) -> Result<()> {
    let job = jobs
        .get_mut(id)
        .ok_or_else(|| PlacementError::Internal(format!("unknown job {id}")))?;
    if job.enqueued {
        return Err(PlacementError::DoubleEnqueue(*id));
    }
    pool.enqueue(job.exec_spec())?;
    job.enqueued = true;
    job.status = JobStatus::Running;
    Ok(())
}

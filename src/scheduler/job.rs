use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::problem::{JobId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Type tag identifying which external tool a job wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Build,
    Search,
    Align,
    Place,
    Merge,
}

impl JobKind {
    /// Stage name used in job maps, logs, and failure messages.
    pub fn stage(&self) -> &'static str {
        match self {
            JobKind::Build => "build",
            JobKind::Search => "search",
            JobKind::Align => "align",
            JobKind::Place => "place",
            JobKind::Merge => "merge",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.stage())
    }
}

/// The external command a job runs: program, arguments, and optional data
/// piped to stdin.
#[derive(Debug, Clone, Default)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

/// Everything the pool needs to execute one job. Cloned out of the job
/// table at enqueue time; the pool never owns the job itself.
#[derive(Debug, Clone)]
pub struct JobExecSpec {
    pub job_id: JobId,
    pub kind: JobKind,
    pub invocation: ToolInvocation,
    /// Declared output artifact; must exist and be non-empty on success.
    pub output_file: PathBuf,
    /// Resolve to a trivial success without running anything external.
    pub fake_run: bool,
}

/// Completion message sent by the pool for every enqueued job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    /// The job resolved via `fake_run`; it has no output artifact.
    pub fake: bool,
    pub completed_at: DateTime<Utc>,
}

/// One unit of externally-executed work, owned by a problem node.
#[derive(Debug)]
pub struct ToolJob {
    pub id: JobId,
    pub kind: JobKind,
    pub node: NodeId,
    pub invocation: ToolInvocation,
    pub output_file: PathBuf,
    pub fake_run: bool,
    pub enqueued: bool,
    pub status: JobStatus,
    pub stdout: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolJob {
    pub fn new(kind: JobKind, node: NodeId, output_file: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            node,
            invocation: ToolInvocation::default(),
            output_file,
            fake_run: false,
            enqueued: false,
            status: JobStatus::Pending,
            stdout: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Execution spec handed to the pool.
    pub fn exec_spec(&self) -> JobExecSpec {
        JobExecSpec {
            job_id: self.id,
            kind: self.kind,
            invocation: self.invocation.clone(),
            output_file: self.output_file.clone(),
            fake_run: self.fake_run,
        }
    }

    /// The declared output artifact, available once the job succeeded and
    /// actually ran (fake runs produce nothing).
    pub fn result_path(&self) -> Option<&std::path::Path> {
        if self.status == JobStatus::Completed && !self.fake_run {
            Some(self.output_file.as_path())
        } else {
            None
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn apply_outcome(&mut self, outcome: &JobOutcome) {
        self.status = outcome.status;
        self.stdout = outcome.output.clone();
        self.error = outcome.error.clone();
        self.completed_at = Some(outcome.completed_at);
    }
}

/// Central store of all jobs, keyed by id. Nodes keep name → id maps into
/// this table.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: HashMap<JobId, ToolJob>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, job: ToolJob) -> JobId {
        let id = job.id;
        self.jobs.insert(id, job);
        id
    }

    pub fn get(&self, id: &JobId) -> Option<&ToolJob> {
        self.jobs.get(id)
    }

    pub fn get_mut(&mut self, id: &JobId) -> Option<&mut ToolJob> {
        self.jobs.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

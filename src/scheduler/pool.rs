//! Shared dispatch queue for external-tool jobs.
//!
//! The pool is an explicitly constructed instance, passed by reference to
//! whoever enqueues work; there is no process-wide singleton. Each enqueued
//! job runs on its own tokio task behind a semaphore that bounds how many
//! external processes run at once. Completion is reported as a
//! [`JobOutcome`] on an mpsc channel whose receiving end belongs to the
//! pipeline driver, so all downstream bookkeeping (dependency edges,
//! barrier countdowns) happens synchronously in one place.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{mpsc, Semaphore};

use crate::error::{PlacementError, Result};
use crate::problem::JobId;
use crate::scheduler::job::{JobExecSpec, JobOutcome, JobStatus};

pub struct JobPool {
    semaphore: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<JobOutcome>,
    enqueued: Mutex<HashSet<JobId>>,
}

impl JobPool {
    /// Create a pool with `max_workers` concurrent execution slots.
    /// Returns the pool and the completion channel's receiving end.
    pub fn new(max_workers: usize) -> (Self, mpsc::UnboundedReceiver<JobOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = Self {
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            tx,
            enqueued: Mutex::new(HashSet::new()),
        };
        (pool, rx)
    }

    /// Enqueue a job for execution. Each job may be enqueued at most once.
    ///
    /// A `fake_run` job never touches an external process: it resolves to a
    /// successful sentinel outcome immediately, so empty-input branches of
    /// the pipeline complete without wasted tool invocations while still
    /// satisfying any barrier awaiting them.
    pub fn enqueue(&self, spec: JobExecSpec) -> Result<()> {
        {
            let mut enqueued = self
                .enqueued
                .lock()
                .map_err(|_| PlacementError::Internal("pool lock poisoned".into()))?;
            if !enqueued.insert(spec.job_id) {
                return Err(PlacementError::DoubleEnqueue(spec.job_id));
            }
        }

        if spec.fake_run {
            tracing::debug!(job_id = %spec.job_id, kind = %spec.kind, "Fake run, resolving trivially");
            let _ = self.tx.send(JobOutcome {
                job_id: spec.job_id,
                kind: spec.kind,
                status: JobStatus::Completed,
                output: None,
                error: None,
                fake: true,
                completed_at: Utc::now(),
            });
            return Ok(());
        }

        tracing::info!(
            job_id = %spec.job_id,
            kind = %spec.kind,
            program = %spec.invocation.program.display(),
            "Job enqueued"
        );

        let semaphore = self.semaphore.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // The semaphore is never closed while the pool lives.
            let _permit = semaphore.acquire_owned().await;
            let outcome = execute(&spec).await;
            let _ = tx.send(outcome);
        });
        Ok(())
    }
}

/// Run one external tool to completion and map the result onto a terminal
/// outcome. Non-zero exit and a missing or empty declared output artifact
/// are both fatal for the job; there is no retry.
async fn execute(spec: &JobExecSpec) -> JobOutcome {
    let mut cmd = Command::new(&spec.invocation.program);
    cmd.args(&spec.invocation.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if spec.invocation.stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(job_id = %spec.job_id, kind = %spec.kind, error = %e, "Failed to spawn tool");
            return failure(spec, format!("failed to spawn {}: {e}", spec.invocation.program.display()));
        }
    };

    if let Some(data) = &spec.invocation.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(data.as_bytes()).await {
                return failure(spec, format!("failed to write tool stdin: {e}"));
            }
            // Dropping stdin closes the pipe so the tool sees EOF.
        }
    }

    let output = match child.wait_with_output().await {
        Ok(output) => output,
        Err(e) => return failure(spec, format!("failed to wait for tool: {e}")),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let code = output.status.code();
        tracing::error!(job_id = %spec.job_id, kind = %spec.kind, exit_code = ?code, "Tool failed");
        return failure(
            spec,
            format!("exited with code {:?}: {}", code, stderr),
        );
    }

    // Declared outputs must exist and be non-empty.
    match tokio::fs::metadata(&spec.output_file).await {
        Ok(meta) if meta.len() > 0 => {}
        _ => {
            tracing::error!(
                job_id = %spec.job_id,
                kind = %spec.kind,
                artifact = %spec.output_file.display(),
                "Declared output missing or empty"
            );
            return failure(
                spec,
                format!(
                    "declared output {} is missing or empty",
                    spec.output_file.display()
                ),
            );
        }
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    tracing::info!(job_id = %spec.job_id, kind = %spec.kind, "Job completed");
    JobOutcome {
        job_id: spec.job_id,
        kind: spec.kind,
        status: JobStatus::Completed,
        output: if stdout.is_empty() { None } else { Some(stdout) },
        error: None,
        fake: false,
        completed_at: Utc::now(),
    }
}

fn failure(spec: &JobExecSpec, detail: String) -> JobOutcome {
    JobOutcome {
        job_id: spec.job_id,
        kind: spec.kind,
        status: JobStatus::Failed,
        output: None,
        error: Some(detail),
        fake: false,
        completed_at: Utc::now(),
    }
}

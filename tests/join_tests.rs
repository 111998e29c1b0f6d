use std::path::PathBuf;
use std::sync::Arc;

use phyloplace::scheduler::{JobExecSpec, JobKind, JobPool, JobStatus, Join, JoinState, ToolInvocation};
use uuid::Uuid;

fn fake_spec(job_id: Uuid) -> JobExecSpec {
    JobExecSpec {
        job_id,
        kind: JobKind::Align,
        // A program that would fail instantly if anything tried to run it.
        invocation: ToolInvocation {
            program: PathBuf::from("/nonexistent/tool"),
            args: vec![],
            stdin: None,
        },
        output_file: PathBuf::from("/nonexistent/output"),
        fake_run: true,
    }
}

#[tokio::test]
async fn join_fires_once_under_concurrent_completion() {
    let ids: Vec<Uuid> = (0..32).map(|_| Uuid::new_v4()).collect();
    let join = Arc::new(Join::new("stress", ids.iter().copied()));

    let mut handles = Vec::new();
    for id in &ids {
        let join = join.clone();
        let id = *id;
        handles.push(tokio::spawn(async move { join.on_job_terminal(&id, true) }));
    }

    let mut ready = 0;
    for handle in handles {
        if handle.await.unwrap() == JoinState::Ready {
            ready += 1;
        }
    }
    assert_eq!(ready, 1);
    assert_eq!(join.pending(), 0);
}

#[tokio::test]
async fn fake_runs_satisfy_a_join_without_external_work() {
    let (pool, mut rx) = JobPool::new(2);
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let join = Join::new("fakes", ids.iter().copied());

    for id in &ids {
        pool.enqueue(fake_spec(*id)).unwrap();
    }

    let mut ready = 0;
    for _ in 0..ids.len() {
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.status, JobStatus::Completed);
        assert!(outcome.fake);
        assert!(outcome.output.is_none());
        if join.on_job_terminal(&outcome.job_id, true) == JoinState::Ready {
            ready += 1;
        }
    }
    assert_eq!(ready, 1);
}

#[tokio::test]
async fn failed_job_aborts_the_barrier() {
    let ok = Uuid::new_v4();
    let bad = Uuid::new_v4();
    let join = Join::new("mixed", [ok, bad]);

    assert_eq!(join.on_job_terminal(&ok, true), JoinState::Pending);
    assert_eq!(join.on_job_terminal(&bad, false), JoinState::Failed);
}

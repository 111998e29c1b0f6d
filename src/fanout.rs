//! Chunked fan-out of assigned fragments into alignment jobs.
//!
//! Once the assignment engine has populated each alignment subset's
//! fragment collection, the collection is divided into exactly as many
//! chunks as the subset has pre-allocated fragment-chunk children. Each
//! chunk is handed off to its node, written to the align job's input path,
//! and the job is enqueued, marked `fake_run` when the chunk is empty.

use crate::config::ToolPaths;
use crate::error::{PlacementError, Result};
use crate::fragments::FragmentSet;
use crate::pipeline::Layout;
use crate::problem::{NodeId, ProblemTree};
use crate::scheduler::{self, JobPool, JobTable, ToolInvocation};

/// Divide every alignment subset's fragments and enqueue its align jobs.
pub fn fanout_alignment_jobs(
    tree: &mut ProblemTree,
    jobs: &mut JobTable,
    pool: &JobPool,
    tools: &ToolPaths,
    layout: &Layout,
) -> Result<()> {
    let alignment_subsets: Vec<NodeId> = tree
        .placement_subsets()
        .iter()
        .flat_map(|&pp| tree.children_of(pp).to_vec())
        .collect();

    for subset in alignment_subsets {
        let chunk_nodes: Vec<NodeId> = tree.children_of(subset).to_vec();
        let fragments = tree.node(subset).fragments.clone().unwrap_or_default();
        let total = fragments.len();
        let chunks = fragments.divide_to_equal_chunks(chunk_nodes.len());
        tracing::info!(
            subset = %tree.node(subset).label,
            fragments = total,
            chunks = chunk_nodes.len(),
            "Fanning out alignment jobs"
        );

        let build_id = tree
            .job(subset, "build")
            .ok_or_else(|| PlacementError::Internal("alignment subset has no build job".into()))?;
        let model = jobs
            .get(&build_id)
            .and_then(|j| j.result_path())
            .ok_or_else(|| {
                PlacementError::Internal(format!(
                    "build result missing for subset {}",
                    tree.node(subset).label
                ))
            })?
            .to_path_buf();

        let pp_label = tree
            .parent_of(subset)
            .map(|pp| tree.node(pp).label.clone())
            .ok_or_else(|| PlacementError::Internal("alignment subset has no parent".into()))?;
        let subset_label = tree.node(subset).label.clone();

        for (i, (chunk, &chunk_node)) in chunks.into_iter().zip(&chunk_nodes).enumerate() {
            let align_id = tree.job(chunk_node, "align").ok_or_else(|| {
                PlacementError::Internal("fragment chunk has no align job".into())
            })?;
            let frag_path = layout.assigned_chunk(&pp_label, &subset_label, i);
            let empty = chunk.is_empty();
            if !empty {
                chunk.write_to_path(&frag_path)?;
            }
            tree.node_mut(chunk_node).fragments = Some(chunk);

            let job = jobs
                .get_mut(&align_id)
                .ok_or_else(|| PlacementError::Internal(format!("unknown job {align_id}")))?;
            job.fake_run = empty;
            job.invocation = ToolInvocation {
                program: tools.align.clone(),
                args: vec![
                    "--outformat".into(),
                    "afa".into(),
                    "-o".into(),
                    job.output_file.display().to_string(),
                    model.display().to_string(),
                    frag_path.display().to_string(),
                ],
                stdin: None,
            };
            scheduler::enqueue_job(jobs, pool, &align_id)?;
        }
    }
    Ok(())
}

/// Seed every alignment subset with an empty fragment collection so subsets
/// that end up with no assigned fragments still fan out (as fake runs).
pub fn init_subset_fragments(tree: &mut ProblemTree) {
    let subsets: Vec<NodeId> = tree
        .placement_subsets()
        .iter()
        .flat_map(|&pp| tree.children_of(pp).to_vec())
        .collect();
    for subset in subsets {
        let node = tree.node_mut(subset);
        if node.fragments.is_none() {
            node.fragments = Some(FragmentSet::new());
        }
    }
}

//! Reassembly of chunked per-subset results.
//!
//! Two layers: after one placement subset's align jobs finish, each chunk
//! index's aligned outputs are folded into an [`ExtendedAlignment`], split
//! into query/backbone files for the placer, and persisted as a JSON
//! sidecar. After every placement job across all subsets and chunks is
//! terminal, the sidecars are folded into one global alignment and the
//! external merge tool is invoked with a newline-delimited textual input
//! (root decomposition tree, then one tree/result pair per chunk with a
//! placement result).

use std::path::PathBuf;

use crate::config::{MergeConfig, ToolPaths};
use crate::error::{PlacementError, Result};
use crate::fragments::{ExtendedAlignment, FragmentSet};
use crate::pipeline::Layout;
use crate::problem::{NodeId, ProblemTree};
use crate::scheduler::{self, JobPool, JobTable, ToolInvocation};

/// Name of the `i`-th placement job on a placement subset.
pub fn placement_job_name(chunk: usize) -> String {
    format!("place_{chunk}")
}

/// Fold chunk `i`'s align outputs across one placement subset's alignment
/// subsets into one extended alignment per chunk index.
///
/// Rows named in the chunk's fragment collection are fragment rows; all
/// other rows in an aligned output are reference (base) rows. Align jobs
/// that were fake runs produced nothing and are skipped.
pub fn merge_subalignments(
    tree: &ProblemTree,
    jobs: &JobTable,
    pp: NodeId,
    chunk_count: usize,
) -> Result<Vec<ExtendedAlignment>> {
    let mut merged = Vec::with_capacity(chunk_count);
    for i in 0..chunk_count {
        let mut extended = ExtendedAlignment::new();
        for &subset in tree.children_of(pp) {
            let chunk_node = tree.children_of(subset)[i];
            let align_id = tree.job(chunk_node, "align").ok_or_else(|| {
                PlacementError::Internal("fragment chunk has no align job".into())
            })?;
            let job = jobs
                .get(&align_id)
                .ok_or_else(|| PlacementError::Internal(format!("unknown job {align_id}")))?;
            let path = match job.result_path() {
                Some(path) => path,
                None => continue, // fake run: empty chunk, nothing aligned
            };
            let aligned = FragmentSet::read_fasta(path)?;
            let empty = FragmentSet::new();
            let chunk_fragments = tree.node(chunk_node).fragments.as_ref().unwrap_or(&empty);
            for (name, seq) in aligned.iter() {
                if chunk_fragments.contains(name) {
                    extended.insert_fragment(name, seq);
                } else {
                    extended.insert_base(name, seq);
                }
            }
        }
        merged.push(extended);
    }
    Ok(merged)
}

/// Configure and enqueue one placement subset's placement jobs, one per
/// chunk index: write the query and backbone splits and the full sidecar
/// artifact, mark empty queries as fake runs.
#[allow(clippy::too_many_arguments)]
pub fn prepare_placement_jobs(
    tree: &ProblemTree,
    jobs: &mut JobTable,
    pool: &JobPool,
    tools: &ToolPaths,
    layout: &Layout,
    info_file: &std::path::Path,
    pp: NodeId,
    merged: Vec<ExtendedAlignment>,
) -> Result<()> {
    let pp_label = tree.node(pp).label.clone();
    let tree_file = layout.subset_tree(&pp_label);
    let newick = tree
        .node(pp)
        .tree_newick
        .clone()
        .ok_or_else(|| PlacementError::Internal(format!("subset {pp_label} has no tree")))?;
    std::fs::write(&tree_file, format!("{newick};\n"))?;

    for (i, extended) in merged.into_iter().enumerate() {
        let place_id = tree
            .job(pp, &placement_job_name(i))
            .ok_or_else(|| PlacementError::Internal("placement job missing".into()))?;

        let query_path = layout.query(&pp_label, i);
        let backbone_path = layout.backbone(&pp_label, i);
        let sidecar_path = layout.sidecar(&pp_label, i);

        let empty_query = extended.fragments().is_empty();
        if !empty_query {
            extended.fragments().write_to_path(&query_path)?;
            extended.base().write_to_path(&backbone_path)?;
        }
        // The sidecar is written even for fake runs so the merge stage can
        // fold every (subset, chunk) pair uniformly.
        extended.save(&sidecar_path)?;

        let job = jobs
            .get_mut(&place_id)
            .ok_or_else(|| PlacementError::Internal(format!("unknown job {place_id}")))?;
        job.fake_run = empty_query;
        job.invocation = ToolInvocation {
            program: tools.place.clone(),
            args: vec![
                "-t".into(),
                tree_file.display().to_string(),
                "-r".into(),
                backbone_path.display().to_string(),
                "-s".into(),
                info_file.display().to_string(),
                "-o".into(),
                job.output_file.display().to_string(),
                query_path.display().to_string(),
            ],
            stdin: None,
        };
        scheduler::enqueue_job(jobs, pool, &place_id)?;
    }
    Ok(())
}

/// Fold every (subset, chunk) sidecar into one global extended alignment.
pub fn fold_global_alignment(
    tree: &ProblemTree,
    layout: &Layout,
    chunk_count: usize,
) -> Result<ExtendedAlignment> {
    let mut global = ExtendedAlignment::new();
    for &pp in tree.placement_subsets() {
        let pp_label = &tree.node(pp).label;
        for i in 0..chunk_count {
            let sidecar = ExtendedAlignment::load(&layout.sidecar(pp_label, i))?;
            global.merge_in(sidecar);
        }
    }
    Ok(global)
}

/// Collect `(subset newick, placement result path)` pairs for every chunk
/// that produced a placement result. Fake-run chunks are skipped, not
/// treated as errors.
pub fn collect_merge_entries(
    tree: &ProblemTree,
    jobs: &JobTable,
    chunk_count: usize,
) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for &pp in tree.placement_subsets() {
        let newick = tree
            .node(pp)
            .tree_newick
            .clone()
            .ok_or_else(|| PlacementError::Internal("placement subset has no tree".into()))?;
        for i in 0..chunk_count {
            let place_id = tree
                .job(pp, &placement_job_name(i))
                .ok_or_else(|| PlacementError::Internal("placement job missing".into()))?;
            let job = jobs
                .get(&place_id)
                .ok_or_else(|| PlacementError::Internal(format!("unknown job {place_id}")))?;
            if let Some(path) = job.result_path() {
                entries.push((newick.clone(), path.to_path_buf()));
            }
        }
    }
    Ok(entries)
}

/// Build the textual merge input: the root decomposition tree, then one
/// `tree;\npath` pair per placement result, then two trailing empty lines.
pub fn build_merge_input(root_newick: &str, entries: &[(String, PathBuf)]) -> String {
    let mut parts = Vec::with_capacity(entries.len() + 3);
    parts.push(format!("{root_newick};"));
    for (newick, path) in entries {
        parts.push(format!("{newick};\n{}", path.display()));
    }
    parts.push(String::new());
    parts.push(String::new());
    parts.join("\n")
}

/// The merge/classification tool's invocation: placement input on stdin,
/// output path and taxonomy arguments positionally, `-d` in distribution
/// mode, `-u` when classifying up instead of pushing down.
pub fn merge_invocation(
    tools: &ToolPaths,
    cfg: &MergeConfig,
    placement_threshold: f64,
    input: String,
) -> ToolInvocation {
    let mut args: Vec<String> = vec![
        "-".into(),
        "-".into(),
        cfg.output_file.display().to_string(),
        "-r".into(),
        "4".into(),
    ];
    if let Some(taxonomy) = &cfg.taxonomy_file {
        args.push("-t".into());
        args.push(taxonomy.display().to_string());
    }
    if let Some(mapping) = &cfg.mapping_file {
        args.push("-m".into());
        args.push(mapping.display().to_string());
    }
    args.push("-p".into());
    args.push(placement_threshold.to_string());
    if let Some(classification) = &cfg.classification_file {
        args.push("-c".into());
        args.push(classification.display().to_string());
    }
    if cfg.distribution {
        args.push("-d".into());
    }
    if !cfg.push_down {
        args.push("-u".into());
    }
    args.push("-C".into());
    args.push(cfg.cutoff.to_string());

    ToolInvocation {
        program: tools.merge.clone(),
        args,
        stdin: Some(input),
    }
}

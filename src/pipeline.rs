//! Job-graph construction and the pipeline driver.
//!
//! The driver owns the pool's completion channel and is the single place
//! where job results are recorded, dependency edges fire, and barriers
//! count down. Stage order: build jobs run first; each build completion
//! enqueues that subset's search jobs; a barrier over all search jobs
//! triggers fragment distribution and the chunked align fan-out; a barrier
//! per placement subset over its align jobs triggers placement; a barrier
//! over all placement jobs triggers the final merge.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::assign::{self, ScoredHit};
use crate::checkpoint::CheckpointLog;
use crate::config::PipelineConfig;
use crate::error::{PlacementError, Result};
use crate::fanout;
use crate::fragments::{ExtendedAlignment, FragmentSet};
use crate::merge;
use crate::problem::{JobId, NodeId, NodeKind, ProblemTree};
use crate::scheduler::{
    self, JobKind, JobOutcome, JobPool, JobStatus, JobTable, Join, JoinState, ToolInvocation,
    ToolJob,
};

/// Checkpoint stage keys.
const DISTRIBUTION_DONE: &str = "fragments.distribution.done";
const MERGE_DONE: &str = "merge.done";

/// One alignment subset as supplied by the decomposition collaborator.
#[derive(Debug, Clone)]
pub struct AlignmentSubsetSpec {
    pub label: String,
    /// Reference alignment the subset's model is built from.
    pub reference_alignment: PathBuf,
}

/// One placement subset: its reference subtree and its alignment subsets.
#[derive(Debug, Clone)]
pub struct PlacementSubsetSpec {
    pub label: String,
    /// Newick, without the trailing semicolon.
    pub tree: String,
    pub alignment_subsets: Vec<AlignmentSubsetSpec>,
}

/// The decomposition of the overall problem, supplied before scheduling
/// begins.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Root decomposition tree, newick without the trailing semicolon.
    pub root_tree: String,
    pub placement_subsets: Vec<PlacementSubsetSpec>,
    /// Number of fragment chunks per alignment subset.
    pub fragment_chunks: usize,
}

/// On-disk layout of every intermediate artifact under the work directory.
#[derive(Debug, Clone)]
pub struct Layout {
    work_dir: PathBuf,
}

impl Layout {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn placement_dir(&self, pp: &str) -> PathBuf {
        self.work_dir.join(pp)
    }

    pub fn subset_dir(&self, pp: &str, subset: &str) -> PathBuf {
        self.work_dir.join(pp).join(subset)
    }

    pub fn model(&self, pp: &str, subset: &str) -> PathBuf {
        self.subset_dir(pp, subset).join("model.hmm")
    }

    /// Search-phase input: chunk `i` of the full fragment set.
    pub fn search_chunk(&self, pp: &str, subset: &str, i: usize) -> PathBuf {
        self.subset_dir(pp, subset).join(format!("chunk_{i}.frag.fasta"))
    }

    pub fn scores(&self, pp: &str, subset: &str, i: usize) -> PathBuf {
        self.subset_dir(pp, subset).join(format!("chunk_{i}.scores"))
    }

    /// Align-phase input: chunk `i` of the subset's assigned fragments.
    pub fn assigned_chunk(&self, pp: &str, subset: &str, i: usize) -> PathBuf {
        self.subset_dir(pp, subset)
            .join(format!("chunk_{i}.assigned.fasta"))
    }

    /// Full assigned fragment collection of one subset, persisted when the
    /// distribution stage completes so a resumed run can reload it.
    pub fn assigned_all(&self, pp: &str, subset: &str) -> PathBuf {
        self.subset_dir(pp, subset).join("assigned.fasta")
    }

    pub fn aligned(&self, pp: &str, subset: &str, i: usize) -> PathBuf {
        self.subset_dir(pp, subset)
            .join(format!("chunk_{i}.aligned.fasta"))
    }

    pub fn subset_tree(&self, pp: &str) -> PathBuf {
        self.placement_dir(pp).join("subset.tre")
    }

    pub fn query(&self, pp: &str, i: usize) -> PathBuf {
        self.placement_dir(pp).join(format!("chunk_{i}.query.fasta"))
    }

    pub fn backbone(&self, pp: &str, i: usize) -> PathBuf {
        self.placement_dir(pp)
            .join(format!("chunk_{i}.backbone.fasta"))
    }

    pub fn jplace(&self, pp: &str, i: usize) -> PathBuf {
        self.placement_dir(pp).join(format!("chunk_{i}.jplace"))
    }

    pub fn sidecar(&self, pp: &str, i: usize) -> PathBuf {
        self.placement_dir(pp)
            .join(format!("chunk_{i}.extended.json"))
    }
}

/// What a ready barrier triggers.
#[derive(Debug, Clone, Copy)]
enum JoinAction {
    /// All search jobs terminal: distribute fragments, fan out align jobs.
    DistributeFragments,
    /// One placement subset's align jobs terminal: merge subalignments and
    /// enqueue its placement jobs.
    MergeAlign { pp: NodeId },
    /// All placement jobs terminal: fold sidecars and run the merge tool.
    MergeResults,
}

struct JoinEntry {
    join: Arc<Join>,
    action: JoinAction,
}

/// Explicit dependency edge, fired when its upstream job completes.
#[derive(Debug, Clone, Copy)]
enum DepEdge {
    EnqueueSearch(JobId),
}

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Merged placement artifact produced by the external merge tool.
    pub placement_file: PathBuf,
    pub classification_file: Option<PathBuf>,
    /// Global extended alignment folded from every chunk sidecar.
    pub extended_alignment: ExtendedAlignment,
}

pub struct Pipeline {
    config: PipelineConfig,
    layout: Layout,
    tree: ProblemTree,
    jobs: JobTable,
    pool: JobPool,
    rx: mpsc::UnboundedReceiver<JobOutcome>,
    edges: HashMap<JobId, Vec<DepEdge>>,
    joins: Vec<JoinEntry>,
    checkpoints: CheckpointLog,
    root_fragments: FragmentSet,
    chunk_count: usize,
    build_job_ids: Vec<JobId>,
    merge_job: Option<JobId>,
}

impl Pipeline {
    /// Build the problem tree and the full job graph. Fatal
    /// misconfiguration (bad threshold, empty decomposition) surfaces here,
    /// before any job runs.
    pub fn new(
        config: PipelineConfig,
        decomposition: Decomposition,
        fragments: FragmentSet,
    ) -> Result<Self> {
        if !(config.alignment_threshold > 0.0 && config.alignment_threshold <= 1.0) {
            return Err(PlacementError::Internal(
                "alignment_threshold must be in (0, 1]".into(),
            ));
        }
        if decomposition.fragment_chunks == 0 {
            return Err(PlacementError::Internal(
                "decomposition must allocate at least one fragment chunk".into(),
            ));
        }
        if decomposition.placement_subsets.is_empty() {
            return Err(PlacementError::Internal(
                "decomposition has no placement subsets".into(),
            ));
        }
        // A subset without alignment subsets would register barriers over
        // zero jobs, which no completion can ever satisfy.
        for pp_spec in &decomposition.placement_subsets {
            if pp_spec.alignment_subsets.is_empty() {
                return Err(PlacementError::Internal(format!(
                    "placement subset {} has no alignment subsets",
                    pp_spec.label
                )));
            }
        }

        let layout = Layout::new(&config.work_dir);
        let checkpoints = CheckpointLog::load(&config.checkpoint_path)?;
        let (pool, rx) = JobPool::new(config.max_workers);

        let mut pipeline = Self {
            layout,
            tree: ProblemTree::new("root"),
            jobs: JobTable::new(),
            pool,
            rx,
            edges: HashMap::new(),
            joins: Vec::new(),
            checkpoints,
            root_fragments: fragments,
            chunk_count: decomposition.fragment_chunks,
            build_job_ids: Vec::new(),
            merge_job: None,
            config,
        };
        pipeline.build_tree(&decomposition);
        pipeline.seed_annotations();
        pipeline.build_jobs(&decomposition)?;
        pipeline.connect_jobs()?;
        Ok(pipeline)
    }

    fn build_tree(&mut self, decomposition: &Decomposition) {
        let root = self.tree.root();
        self.tree.node_mut(root).tree_newick = Some(decomposition.root_tree.clone());
        for pp_spec in &decomposition.placement_subsets {
            let pp = self
                .tree
                .add_child(root, NodeKind::PlacementSubset, pp_spec.label.clone());
            self.tree.node_mut(pp).tree_newick = Some(pp_spec.tree.clone());
            for subset_spec in &pp_spec.alignment_subsets {
                let subset = self.tree.add_child(
                    pp,
                    NodeKind::AlignmentSubset,
                    subset_spec.label.clone(),
                );
                for i in 0..decomposition.fragment_chunks {
                    self.tree.add_child(
                        subset,
                        NodeKind::FragmentChunk,
                        format!("{}_chunk_{}", subset_spec.label, i),
                    );
                }
            }
        }
    }

    /// Seed node annotations from the persisted checkpoint log so resumed
    /// runs skip completed stateful actions.
    fn seed_annotations(&mut self) {
        let completed: Vec<(String, String)> = self
            .checkpoints
            .completed()
            .map(|(n, s)| (n.to_string(), s.to_string()))
            .collect();
        if completed.is_empty() {
            return;
        }
        let mut by_label: HashMap<String, NodeId> = HashMap::new();
        for id in 0..self.tree.len() {
            by_label.insert(self.tree.node(id).label.clone(), id);
        }
        for (label, stage) in completed {
            if let Some(&node) = by_label.get(&label) {
                tracing::info!(node = %label, stage = %stage, "Resuming past checkpoint");
                self.tree.set_annotation(node, stage);
            }
        }
    }

    /// Create every job in the graph: placement jobs per (subset, chunk),
    /// one build job per alignment subset, and one search and one align job
    /// per fragment chunk. The global fragment set is divided into
    /// `fragment_chunks` chunks up front; every subset searches every chunk.
    fn build_jobs(&mut self, decomposition: &Decomposition) -> Result<()> {
        let search_chunks = self
            .root_fragments
            .clone()
            .divide_to_equal_chunks(self.chunk_count);

        let merge_id = self.jobs.add(ToolJob::new(
            JobKind::Merge,
            self.tree.root(),
            self.config.merge.output_file.clone(),
        ));
        let root = self.tree.root();
        self.tree.add_job(root, "merge", merge_id);
        self.merge_job = Some(merge_id);

        for &pp in self.tree.placement_subsets().to_vec().iter() {
            let pp_label = self.tree.node(pp).label.clone();
            fs::create_dir_all(self.layout.placement_dir(&pp_label))?;

            for i in 0..self.chunk_count {
                let place_id = self.jobs.add(ToolJob::new(
                    JobKind::Place,
                    pp,
                    self.layout.jplace(&pp_label, i),
                ));
                self.tree.add_job(pp, merge::placement_job_name(i), place_id);
            }

            for &subset in self.tree.children_of(pp).to_vec().iter() {
                let subset_label = self.tree.node(subset).label.clone();
                fs::create_dir_all(self.layout.subset_dir(&pp_label, &subset_label))?;
                let reference = decomposition
                    .placement_subsets
                    .iter()
                    .flat_map(|p| &p.alignment_subsets)
                    .find(|s| s.label == subset_label)
                    .map(|s| s.reference_alignment.clone())
                    .ok_or_else(|| {
                        PlacementError::Internal(format!("no spec for subset {subset_label}"))
                    })?;

                let model = self.layout.model(&pp_label, &subset_label);
                let mut build = ToolJob::new(JobKind::Build, subset, model.clone());
                build.invocation = ToolInvocation {
                    program: self.config.tools.build.clone(),
                    args: vec![
                        "--symfrac".into(),
                        "0.0".into(),
                        "--informat".into(),
                        "afa".into(),
                        model.display().to_string(),
                        reference.display().to_string(),
                    ],
                    stdin: None,
                };
                let build_id = self.jobs.add(build);
                self.tree.add_job(subset, "build", build_id);
                self.build_job_ids.push(build_id);

                for (i, chunk) in search_chunks.iter().enumerate() {
                    let chunk_node = self.tree.children_of(subset)[i];
                    let frag_path = self.layout.search_chunk(&pp_label, &subset_label, i);
                    if !chunk.is_empty() {
                        chunk.write_to_path(&frag_path)?;
                    }
                    self.tree.node_mut(chunk_node).fragments = Some(chunk.clone());

                    let scores = self.layout.scores(&pp_label, &subset_label, i);
                    let mut search = ToolJob::new(JobKind::Search, chunk_node, scores.clone());
                    search.fake_run = chunk.is_empty();
                    search.invocation = ToolInvocation {
                        program: self.config.tools.search.clone(),
                        args: vec![
                            "--noali".into(),
                            "-o".into(),
                            scores.display().to_string(),
                            model.display().to_string(),
                            frag_path.display().to_string(),
                        ],
                        stdin: None,
                    };
                    let search_id = self.jobs.add(search);
                    self.tree.add_job(chunk_node, "search", search_id);

                    // Align invocation and fake_run are configured by the
                    // fan-out once assigned fragments are known.
                    let align = ToolJob::new(
                        JobKind::Align,
                        chunk_node,
                        self.layout.aligned(&pp_label, &subset_label, i),
                    );
                    let align_id = self.jobs.add(align);
                    self.tree.add_job(chunk_node, "align", align_id);
                }
            }
        }
        Ok(())
    }

    /// Wire the dependency edges and barriers.
    fn connect_jobs(&mut self) -> Result<()> {
        let mut all_search = Vec::new();
        let mut all_place = Vec::new();

        for &pp in self.tree.placement_subsets().to_vec().iter() {
            let mut pp_aligns = Vec::new();
            for i in 0..self.chunk_count {
                if let Some(id) = self.tree.job(pp, &merge::placement_job_name(i)) {
                    all_place.push(id);
                }
            }
            for &subset in self.tree.children_of(pp).to_vec().iter() {
                let build_id = self
                    .tree
                    .job(subset, "build")
                    .ok_or_else(|| PlacementError::Internal("subset has no build job".into()))?;
                let mut edges = Vec::new();
                for &chunk_node in self.tree.children_of(subset).to_vec().iter() {
                    let search_id = self.tree.job(chunk_node, "search").ok_or_else(|| {
                        PlacementError::Internal("fragment chunk has no search job".into())
                    })?;
                    edges.push(DepEdge::EnqueueSearch(search_id));
                    all_search.push(search_id);
                    pp_aligns.push(self.tree.job(chunk_node, "align").ok_or_else(|| {
                        PlacementError::Internal("fragment chunk has no align job".into())
                    })?);
                }
                self.edges.insert(build_id, edges);
            }
            self.joins.push(JoinEntry {
                join: Arc::new(Join::new(
                    format!("align:{}", self.tree.node(pp).label),
                    pp_aligns,
                )),
                action: JoinAction::MergeAlign { pp },
            });
        }

        self.joins.push(JoinEntry {
            join: Arc::new(Join::new("search", all_search)),
            action: JoinAction::DistributeFragments,
        });
        self.joins.push(JoinEntry {
            join: Arc::new(Join::new("placement", all_place)),
            action: JoinAction::MergeResults,
        });
        Ok(())
    }

    /// Drive the job graph to completion.
    pub async fn run(mut self) -> Result<PipelineOutcome> {
        tracing::info!(
            jobs = self.jobs.len(),
            fragments = self.root_fragments.len(),
            chunks = self.chunk_count,
            "Pipeline starting"
        );
        for id in self.build_job_ids.clone() {
            scheduler::enqueue_job(&mut self.jobs, &self.pool, &id)?;
        }

        while let Some(outcome) = self.rx.recv().await {
            let succeeded = outcome.status == JobStatus::Completed;
            let (node, kind, artifact) = {
                let job = self.jobs.get_mut(&outcome.job_id).ok_or_else(|| {
                    PlacementError::Internal(format!("outcome for unknown job {}", outcome.job_id))
                })?;
                job.apply_outcome(&outcome);
                (job.node, job.kind, job.output_file.clone())
            };

            if !succeeded {
                let stage = format!("{} ({})", kind.stage(), self.tree.node(node).label);
                return Err(PlacementError::ToolFailed {
                    stage,
                    artifact,
                    detail: outcome.error.unwrap_or_else(|| "unknown failure".into()),
                });
            }

            if let Some(edges) = self.edges.remove(&outcome.job_id) {
                for DepEdge::EnqueueSearch(search_id) in edges {
                    scheduler::enqueue_job(&mut self.jobs, &self.pool, &search_id)?;
                }
            }

            let mut ready = Vec::new();
            for (idx, entry) in self.joins.iter().enumerate() {
                match entry.join.on_job_terminal(&outcome.job_id, succeeded) {
                    JoinState::Ready => ready.push(idx),
                    JoinState::Failed => {
                        return Err(PlacementError::JoinAborted {
                            stage: entry.join.label().to_string(),
                            detail: "a registered job failed".into(),
                        })
                    }
                    JoinState::Pending => {}
                }
            }
            for idx in ready {
                let action = self.joins[idx].action;
                if let Some(done) = self.perform(action)? {
                    return Ok(done);
                }
            }

            if Some(outcome.job_id) == self.merge_job {
                self.checkpoints.mark_done("root", MERGE_DONE)?;
                return self.finish();
            }
        }
        Err(PlacementError::Internal(
            "completion channel closed before the pipeline finished".into(),
        ))
    }

    fn perform(&mut self, action: JoinAction) -> Result<Option<PipelineOutcome>> {
        match action {
            JoinAction::DistributeFragments => {
                self.perform_distribution()?;
                Ok(None)
            }
            JoinAction::MergeAlign { pp } => {
                self.perform_align_merge(pp)?;
                Ok(None)
            }
            JoinAction::MergeResults => self.perform_merge(),
        }
    }

    /// Figure out which fragment goes to which subset, then fan out the
    /// align jobs. The probabilistic decision is checkpoint-guarded: a
    /// resumed run reloads the persisted assignment instead of redoing it.
    fn perform_distribution(&mut self) -> Result<()> {
        let root = self.tree.root();
        fanout::init_subset_fragments(&mut self.tree);

        if self.tree.has_annotation(root, DISTRIBUTION_DONE) {
            tracing::info!("Fragment distribution already done, reloading assignment");
            self.reload_assigned_fragments()?;
        } else {
            let bitscores = self.gather_bitscores()?;
            let assignments = assign::distribute_fragments(
                &mut self.tree,
                &self.root_fragments,
                &bitscores,
                self.config.alignment_threshold,
                self.config.weight_placement_by_alignment,
            );
            tracing::info!(assignments = assignments.len(), "Fragments distributed");
            self.persist_assigned_fragments()?;
            self.tree.set_annotation(root, DISTRIBUTION_DONE);
            self.checkpoints.mark_done("root", DISTRIBUTION_DONE)?;
        }

        fanout::fanout_alignment_jobs(
            &mut self.tree,
            &mut self.jobs,
            &self.pool,
            &self.config.tools,
            &self.layout,
        )
    }

    /// Scan every fragment-chunk search result into per-fragment hit lists.
    fn gather_bitscores(&self) -> Result<BTreeMap<String, Vec<ScoredHit>>> {
        let mut bitscores: BTreeMap<String, Vec<ScoredHit>> = self
            .root_fragments
            .keys()
            .map(|k| (k.to_string(), Vec::new()))
            .collect();
        for leaf in self.tree.leaves() {
            let subset = self
                .tree
                .parent_of(leaf)
                .ok_or_else(|| PlacementError::Internal("chunk without parent".into()))?;
            let search_id = self
                .tree
                .job(leaf, "search")
                .ok_or_else(|| PlacementError::Internal("chunk without search job".into()))?;
            let job = self
                .jobs
                .get(&search_id)
                .ok_or_else(|| PlacementError::Internal(format!("unknown job {search_id}")))?;
            let path = match job.result_path() {
                Some(path) => path,
                None => continue, // fake run over an empty chunk
            };
            let text = fs::read_to_string(path)?;
            for (fragment, bit_score) in assign::parse_score_table(&text) {
                match bitscores.get_mut(&fragment) {
                    Some(hits) => hits.push(ScoredHit { bit_score, subset }),
                    None => {
                        tracing::debug!(fragment = %fragment, "Hit for unknown fragment ignored")
                    }
                }
            }
        }
        Ok(bitscores)
    }

    fn subset_labels(&self) -> Vec<(NodeId, String, String)> {
        let mut out = Vec::new();
        for &pp in self.tree.placement_subsets() {
            let pp_label = self.tree.node(pp).label.clone();
            for &subset in self.tree.children_of(pp) {
                out.push((subset, pp_label.clone(), self.tree.node(subset).label.clone()));
            }
        }
        out
    }

    fn persist_assigned_fragments(&self) -> Result<()> {
        for (subset, pp_label, subset_label) in self.subset_labels() {
            if let Some(fragments) = &self.tree.node(subset).fragments {
                if !fragments.is_empty() {
                    fragments.write_to_path(&self.layout.assigned_all(&pp_label, &subset_label))?;
                }
            }
        }
        Ok(())
    }

    fn reload_assigned_fragments(&mut self) -> Result<()> {
        for (subset, pp_label, subset_label) in self.subset_labels() {
            let path = self.layout.assigned_all(&pp_label, &subset_label);
            if path.exists() {
                self.tree.node_mut(subset).fragments = Some(FragmentSet::read_fasta(&path)?);
            }
        }
        Ok(())
    }

    /// One placement subset's align jobs are all terminal: build its
    /// per-chunk extended alignments and enqueue its placement jobs.
    fn perform_align_merge(&mut self, pp: NodeId) -> Result<()> {
        let merged = merge::merge_subalignments(&self.tree, &self.jobs, pp, self.chunk_count)?;
        merge::prepare_placement_jobs(
            &self.tree,
            &mut self.jobs,
            &self.pool,
            &self.config.tools,
            &self.layout,
            &self.config.info_file,
            pp,
            merged,
        )
    }

    /// All placement jobs are terminal: build the merge input and invoke
    /// the external merge tool (or finish immediately on a resumed run
    /// whose merge already completed).
    fn perform_merge(&mut self) -> Result<Option<PipelineOutcome>> {
        if self.checkpoints.is_done("root", MERGE_DONE) {
            tracing::info!("Merge already done, skipping merge tool invocation");
            return self.finish().map(Some);
        }

        let root_newick = self
            .tree
            .node(self.tree.root())
            .tree_newick
            .clone()
            .ok_or_else(|| PlacementError::Internal("root has no decomposition tree".into()))?;
        let entries = merge::collect_merge_entries(&self.tree, &self.jobs, self.chunk_count)?;
        tracing::info!(results = entries.len(), "Invoking merge tool");
        let input = merge::build_merge_input(&root_newick, &entries);
        let invocation = merge::merge_invocation(
            &self.config.tools,
            &self.config.merge,
            self.config.placement_threshold,
            input,
        );

        let merge_id = self
            .merge_job
            .ok_or_else(|| PlacementError::Internal("merge job missing".into()))?;
        let job = self
            .jobs
            .get_mut(&merge_id)
            .ok_or_else(|| PlacementError::Internal(format!("unknown job {merge_id}")))?;
        job.invocation = invocation;
        scheduler::enqueue_job(&mut self.jobs, &self.pool, &merge_id)?;
        Ok(None)
    }

    fn finish(&self) -> Result<PipelineOutcome> {
        let extended_alignment =
            merge::fold_global_alignment(&self.tree, &self.layout, self.chunk_count)?;
        tracing::info!(
            placement = %self.config.merge.output_file.display(),
            fragments = extended_alignment.fragments().len(),
            "Pipeline complete"
        );
        Ok(PipelineOutcome {
            placement_file: self.config.merge.output_file.clone(),
            classification_file: self.config.merge.classification_file.clone(),
            extended_alignment,
        })
    }

    /// Test and diagnostic access to the problem tree.
    pub fn tree(&self) -> &ProblemTree {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use std::path::Path;

    fn tiny_decomposition() -> Decomposition {
        Decomposition {
            root_tree: "((a,b),(c,d))".into(),
            placement_subsets: vec![PlacementSubsetSpec {
                label: "P0".into(),
                tree: "(a,b)".into(),
                alignment_subsets: vec![
                    AlignmentSubsetSpec {
                        label: "A0".into(),
                        reference_alignment: PathBuf::from("a0.fasta"),
                    },
                    AlignmentSubsetSpec {
                        label: "A1".into(),
                        reference_alignment: PathBuf::from("a1.fasta"),
                    },
                ],
            }],
            fragment_chunks: 2,
        }
    }

    fn tiny_config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            work_dir: dir.to_path_buf(),
            checkpoint_path: dir.join("checkpoints.jsonl"),
            merge: MergeConfig {
                output_file: dir.join("placement.json"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn job_graph_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut fragments = FragmentSet::new();
        for i in 0..5 {
            fragments.insert(format!("q{i}"), "ACGT");
        }
        let pipeline =
            Pipeline::new(tiny_config(dir.path()), tiny_decomposition(), fragments).unwrap();

        // 1 merge + 2 placement + 2 build + 2 subsets * 2 chunks * (search+align).
        assert_eq!(pipeline.jobs.len(), 1 + 2 + 2 + 8);
        // root + 1 placement subset + 2 alignment subsets + 4 chunks.
        assert_eq!(pipeline.tree().len(), 8);
        // align barrier per placement subset + search + placement barriers.
        assert_eq!(pipeline.joins.len(), 3);
    }

    #[tokio::test]
    async fn rejects_bad_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = tiny_config(dir.path());
        config.alignment_threshold = 0.0;
        let err = Pipeline::new(config, tiny_decomposition(), FragmentSet::new());
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn rejects_placement_subset_without_alignment_subsets() {
        let dir = tempfile::tempdir().unwrap();
        let mut decomposition = tiny_decomposition();
        decomposition.placement_subsets[0].alignment_subsets.clear();
        let err = Pipeline::new(tiny_config(dir.path()), decomposition, FragmentSet::new());
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn rejects_zero_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mut decomposition = tiny_decomposition();
        decomposition.fragment_chunks = 0;
        let err = Pipeline::new(tiny_config(dir.path()), decomposition, FragmentSet::new());
        assert!(err.is_err());
    }
}

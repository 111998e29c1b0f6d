use std::path::PathBuf;

/// Closed set of supported placement backends.
///
/// The backend is resolved once when the pipeline is constructed; an
/// unsupported choice is a fatal setup error, never a mid-pipeline branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacerBackend {
    Pplacer,
}

impl PlacerBackend {
    /// Parse a backend name as it appears in run configuration.
    pub fn from_name(name: &str) -> crate::error::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pplacer" => Ok(PlacerBackend::Pplacer),
            other => Err(crate::error::PlacementError::UnsupportedBackend(
                other.to_string(),
            )),
        }
    }
}

/// Executable paths for the external tools the pipeline drives.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    /// Profile model builder (hmmbuild-compatible).
    pub build: PathBuf,
    /// Profile model search (hmmsearch-compatible).
    pub search: PathBuf,
    /// Profile model aligner (hmmalign-compatible).
    pub align: PathBuf,
    /// Phylogenetic placer (pplacer-compatible).
    pub place: PathBuf,
    /// Placement merger/classifier. Invoked directly; deployments that ship
    /// the merger as a jar wrap it in a launcher script.
    pub merge: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            build: PathBuf::from("hmmbuild"),
            search: PathBuf::from("hmmsearch"),
            align: PathBuf::from("hmmalign"),
            place: PathBuf::from("pplacer"),
            merge: PathBuf::from("run_merger"),
        }
    }
}

/// Inputs and flags for the final merge/classification invocation.
#[derive(Debug, Clone, Default)]
pub struct MergeConfig {
    /// Taxonomy table (comma-separated: taxon_id,parent_id,name,rank).
    pub taxonomy_file: Option<PathBuf>,
    /// Sequence-name to taxon-id mapping table.
    pub mapping_file: Option<PathBuf>,
    /// Merged placement output artifact.
    pub output_file: PathBuf,
    /// Classification table output.
    pub classification_file: Option<PathBuf>,
    /// Treat fragments as a distribution (`-d`).
    pub distribution: bool,
    /// Classify based on children below the insertion point; when off the
    /// merger is told to push up (`-u`).
    pub push_down: bool,
    /// Placement probability required to count toward the distribution.
    pub cutoff: f64,
}

/// Tuning and policy for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory for all intermediate artifacts (models, chunk files,
    /// score tables, sidecars).
    pub work_dir: PathBuf,
    /// Maximum number of concurrently running external-tool jobs.
    pub max_workers: usize,
    /// Cumulative probability a fragment's selected subsets must reach.
    /// Must be in (0, 1].
    pub alignment_threshold: f64,
    /// Cumulative probability forwarded to the merger (`-p`).
    pub placement_threshold: f64,
    /// Weight each fragment copy by its re-normalized assignment
    /// probability; when off every copy carries full weight.
    pub weight_placement_by_alignment: bool,
    /// Placement backend, resolved once at construction.
    pub placer: PlacerBackend,
    /// Reference statistics file handed to the placer.
    pub info_file: PathBuf,
    /// Stage-completion log enabling restart without redoing completed
    /// probabilistic decisions.
    pub checkpoint_path: PathBuf,
    pub tools: ToolPaths,
    pub merge: MergeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            max_workers: 4,
            alignment_threshold: 0.95,
            placement_threshold: 0.95,
            weight_placement_by_alignment: true,
            placer: PlacerBackend::Pplacer,
            info_file: PathBuf::new(),
            checkpoint_path: PathBuf::from("checkpoints.jsonl"),
            tools: ToolPaths::default(),
            merge: MergeConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parsing() {
        assert_eq!(
            PlacerBackend::from_name("pplacer").unwrap(),
            PlacerBackend::Pplacer
        );
        assert_eq!(
            PlacerBackend::from_name("PPLACER").unwrap(),
            PlacerBackend::Pplacer
        );
        assert!(PlacerBackend::from_name("epa").is_err());
    }
}

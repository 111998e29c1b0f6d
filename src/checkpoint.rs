//! Persisted stage-completion records.
//!
//! Every stateful, non-idempotent barrier action (fragment distribution,
//! the final merge) records its completion here, keyed by node label and
//! stage name. A resumed run loads the log before driving the job graph
//! and skips any stage that already completed, so probabilistic decisions
//! are never redone and fragment collections are never double-appended.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointRecord {
    node_label: String,
    stage: String,
    completed_at: DateTime<Utc>,
}

/// Append-only JSON-lines log of completed stages.
#[derive(Debug)]
pub struct CheckpointLog {
    path: PathBuf,
    done: HashSet<(String, String)>,
}

impl CheckpointLog {
    /// Load the log at `path`, or start empty when no log exists yet.
    pub fn load(path: &Path) -> Result<Self> {
        let mut done = HashSet::new();
        match File::open(path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record: CheckpointRecord = serde_json::from_str(&line)?;
                    done.insert((record.node_label, record.stage));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            path: path.to_path_buf(),
            done,
        })
    }

    pub fn is_done(&self, node_label: &str, stage: &str) -> bool {
        self.done
            .contains(&(node_label.to_string(), stage.to_string()))
    }

    /// Record completion of `stage` on `node_label` and persist it.
    pub fn mark_done(&mut self, node_label: &str, stage: &str) -> Result<()> {
        if !self
            .done
            .insert((node_label.to_string(), stage.to_string()))
        {
            return Ok(());
        }
        let record = CheckpointRecord {
            node_label: node_label.to_string(),
            stage: stage.to_string(),
            completed_at: Utc::now(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        serde_json::to_writer(&mut file, &record)?;
        file.write_all(b"\n")?;
        file.flush()?;
        tracing::info!(node = node_label, stage, "Checkpoint recorded");
        Ok(())
    }

    /// Labels of every node with at least one completed stage, paired with
    /// the stage name. Used to seed node annotations on startup.
    pub fn completed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.done.iter().map(|(n, s)| (n.as_str(), s.as_str()))
    }
}

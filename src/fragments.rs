//! Sequence containers used by the pipeline.
//!
//! [`FragmentSet`] holds unplaced query sequences keyed by name and supports
//! the operations the scheduler needs: emptiness checks, FASTA round trips,
//! key-union merging, and deterministic division into near-equal chunks.
//! [`ExtendedAlignment`] is the per-chunk merge artifact: reference (base)
//! rows plus the fragment rows that were aligned against them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An ordered collection of named sequences.
///
/// Backed by a `BTreeMap` so enumeration order is deterministic, which makes
/// chunk division reproducible across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSet {
    seqs: BTreeMap<String, String>,
}

impl FragmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, seq: impl Into<String>) {
        self.seqs.insert(name.into(), seq.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.seqs.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seqs.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.seqs.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.seqs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Merge another set in by key union. Existing keys keep their sequence.
    pub fn merge_in(&mut self, other: FragmentSet) {
        for (name, seq) in other.seqs {
            self.seqs.entry(name).or_insert(seq);
        }
    }

    /// Divide into exactly `k` chunks whose sizes differ by at most one and
    /// sum to `self.len()`. The first `len % k` chunks receive one extra
    /// fragment; distribution follows key order.
    pub fn divide_to_equal_chunks(self, k: usize) -> Vec<FragmentSet> {
        assert!(k > 0, "cannot divide into zero chunks");
        let total = self.seqs.len();
        let base = total / k;
        let extra = total % k;

        let mut chunks = Vec::with_capacity(k);
        let mut entries = self.seqs.into_iter();
        for i in 0..k {
            let size = base + usize::from(i < extra);
            let mut chunk = FragmentSet::new();
            for _ in 0..size {
                // Sizes sum to `total`, so the iterator cannot run dry here.
                if let Some((name, seq)) = entries.next() {
                    chunk.seqs.insert(name, seq);
                }
            }
            chunks.push(chunk);
        }
        chunks
    }

    /// Write the set to `path` in FASTA format.
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for (name, seq) in &self.seqs {
            out.push('>');
            out.push_str(name);
            out.push('\n');
            out.push_str(seq);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Read a FASTA file. Sequence data may span multiple lines; record
    /// names are taken up to the first whitespace.
    pub fn read_fasta(path: &Path) -> Result<FragmentSet> {
        let text = fs::read_to_string(path)?;
        let mut set = FragmentSet::new();
        let mut current: Option<(String, String)> = None;
        for line in text.lines() {
            let line = line.trim_end();
            if let Some(header) = line.strip_prefix('>') {
                if let Some((name, seq)) = current.take() {
                    set.seqs.insert(name, seq);
                }
                let name = header.split_whitespace().next().unwrap_or("").to_string();
                current = Some((name, String::new()));
            } else if let Some((_, seq)) = current.as_mut() {
                seq.push_str(line.trim());
            }
        }
        if let Some((name, seq)) = current {
            set.seqs.insert(name, seq);
        }
        Ok(set)
    }
}

/// A merged alignment artifact: reference rows plus aligned fragment rows.
///
/// One instance is produced per (placement subset, chunk index) pair and
/// persisted as JSON; the merge stage folds all of them into a single
/// global alignment by sequence-key union.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedAlignment {
    base: FragmentSet,
    fragments: FragmentSet,
}

impl ExtendedAlignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_base(&mut self, name: impl Into<String>, seq: impl Into<String>) {
        self.base.insert(name, seq);
    }

    pub fn insert_fragment(&mut self, name: impl Into<String>, seq: impl Into<String>) {
        self.fragments.insert(name, seq);
    }

    pub fn base(&self) -> &FragmentSet {
        &self.base
    }

    pub fn fragments(&self) -> &FragmentSet {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.fragments.is_empty()
    }

    /// Fold another artifact in by key union on both row classes. Fragment
    /// keys are globally unique (each fragment copy lands in exactly one
    /// chunk), so insertion is conflict-free.
    pub fn merge_in(&mut self, other: ExtendedAlignment) {
        self.base.merge_in(other.base);
        self.fragments.merge_in(other.fragments);
    }

    /// Persist as a JSON sidecar artifact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<ExtendedAlignment> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(n: usize) -> FragmentSet {
        let mut s = FragmentSet::new();
        for i in 0..n {
            s.insert(format!("frag{i:03}"), "ACGT");
        }
        s
    }

    #[test]
    fn divide_17_into_5() {
        let chunks = set_of(17).divide_to_equal_chunks(5);
        assert_eq!(chunks.len(), 5);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 17);
        assert!(sizes.iter().all(|&s| s == 3 || s == 4));
    }

    #[test]
    fn divide_is_a_disjoint_partition() {
        let original = set_of(10);
        let keys: Vec<String> = original.keys().map(str::to_string).collect();
        let chunks = original.divide_to_equal_chunks(3);
        let mut seen = Vec::new();
        for chunk in &chunks {
            for key in chunk.keys() {
                assert!(!seen.contains(&key.to_string()), "duplicate key {key}");
                seen.push(key.to_string());
            }
        }
        seen.sort();
        assert_eq!(seen, keys);
    }

    #[test]
    fn divide_more_chunks_than_fragments() {
        let chunks = set_of(2).divide_to_equal_chunks(4);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
    }

    #[test]
    fn fasta_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frags.fasta");
        let mut s = FragmentSet::new();
        s.insert("a", "ACGT");
        s.insert("b", "GGCC");
        s.write_to_path(&path).unwrap();
        let back = FragmentSet::read_fasta(&path).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn fasta_reader_handles_wrapped_sequences_and_descriptions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrapped.fasta");
        std::fs::write(&path, ">x some description\nACGT\nTTAA\n>y\nGG\n").unwrap();
        let set = FragmentSet::read_fasta(&path).unwrap();
        assert_eq!(set.get("x"), Some("ACGTTTAA"));
        assert_eq!(set.get("y"), Some("GG"));
    }

    #[test]
    fn extended_alignment_merge_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ext.json");

        let mut a = ExtendedAlignment::new();
        a.insert_base("ref1", "ACGT");
        a.insert_fragment("q1_s1_500000", "AC-T");
        let mut b = ExtendedAlignment::new();
        b.insert_base("ref2", "TTTT");
        b.insert_fragment("q2_s2_1000000", "TT-T");

        a.merge_in(b);
        assert_eq!(a.base().len(), 2);
        assert_eq!(a.fragments().len(), 2);

        a.save(&path).unwrap();
        let back = ExtendedAlignment::load(&path).unwrap();
        assert_eq!(back, a);
    }
}

//! The decomposition hierarchy the pipeline schedules over.
//!
//! A [`ProblemTree`] is a fixed-depth tree: root → placement subset →
//! alignment subset → fragment chunk. Nodes are stored in an arena and
//! addressed by [`NodeId`], which gives children an owning place in the
//! arena and parents a plain index back-reference. Each node carries its
//! named jobs, an optional fragment collection, the decomposition subtree
//! it corresponds to, and a string annotation map used as checkpoint flags.

use std::collections::HashMap;

use uuid::Uuid;

use crate::fragments::FragmentSet;

pub type NodeId = usize;
pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    PlacementSubset,
    AlignmentSubset,
    FragmentChunk,
}

#[derive(Debug)]
pub struct ProblemNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Job-name → job id for the jobs this node owns.
    pub jobs: HashMap<String, JobId>,
    /// None until fragments are assigned to this node.
    pub fragments: Option<FragmentSet>,
    /// Newick subtree for this node, supplied by the decomposition
    /// collaborator (root and placement-subset levels).
    pub tree_newick: Option<String>,
    /// Checkpoint flags and other string annotations.
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct ProblemTree {
    nodes: Vec<ProblemNode>,
}

impl ProblemTree {
    /// Create a tree containing only the root node.
    pub fn new(root_label: impl Into<String>) -> Self {
        let root = ProblemNode {
            id: 0,
            kind: NodeKind::Root,
            label: root_label.into(),
            parent: None,
            children: Vec::new(),
            jobs: HashMap::new(),
            fragments: None,
            tree_newick: None,
            annotations: HashMap::new(),
        };
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, label: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(ProblemNode {
            id,
            kind,
            label: label.into(),
            parent: Some(parent),
            children: Vec::new(),
            jobs: HashMap::new(),
            fragments: None,
            tree_newick: None,
            annotations: HashMap::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &ProblemNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ProblemNode {
        &mut self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// All fragment-chunk leaves, in creation order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::FragmentChunk)
            .map(|n| n.id)
            .collect()
    }

    pub fn placement_subsets(&self) -> &[NodeId] {
        self.children_of(self.root())
    }

    pub fn add_job(&mut self, node: NodeId, name: impl Into<String>, job: JobId) {
        self.nodes[node].jobs.insert(name.into(), job);
    }

    pub fn job(&self, node: NodeId, name: &str) -> Option<JobId> {
        self.nodes[node].jobs.get(name).copied()
    }

    pub fn set_annotation(&mut self, node: NodeId, key: impl Into<String>) {
        self.nodes[node].annotations.insert(key.into(), "1".into());
    }

    pub fn has_annotation(&self, node: NodeId, key: &str) -> bool {
        self.nodes[node].annotations.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_depth_hierarchy() {
        let mut tree = ProblemTree::new("root");
        let pp = tree.add_child(tree.root(), NodeKind::PlacementSubset, "P0");
        let ap = tree.add_child(pp, NodeKind::AlignmentSubset, "A0");
        let fc = tree.add_child(ap, NodeKind::FragmentChunk, "A0/c0");

        assert_eq!(tree.parent_of(fc), Some(ap));
        assert_eq!(tree.parent_of(ap), Some(pp));
        assert_eq!(tree.parent_of(pp), Some(tree.root()));
        assert_eq!(tree.parent_of(tree.root()), None);
        assert_eq!(tree.leaves(), vec![fc]);
        assert_eq!(tree.placement_subsets(), &[pp]);
    }

    #[test]
    fn annotations_flag_once() {
        let mut tree = ProblemTree::new("root");
        let root = tree.root();
        assert!(!tree.has_annotation(root, "fragments.distribution.done"));
        tree.set_annotation(root, "fragments.distribution.done");
        assert!(tree.has_annotation(root, "fragments.distribution.done"));
    }
}

use std::collections::BTreeMap;

use phyloplace::assign::{distribute_fragments, ScoredHit, FIXED_POINT_ONE};
use phyloplace::fragments::FragmentSet;
use phyloplace::problem::{NodeId, NodeKind, ProblemTree};

/// Root with one placement subset holding alignment subsets A0 and A1.
fn two_subset_tree() -> (ProblemTree, NodeId, NodeId) {
    let mut tree = ProblemTree::new("root");
    let pp = tree.add_child(tree.root(), NodeKind::PlacementSubset, "P0");
    let a0 = tree.add_child(pp, NodeKind::AlignmentSubset, "A0");
    let a1 = tree.add_child(pp, NodeKind::AlignmentSubset, "A1");
    (tree, a0, a1)
}

fn fragments(names: &[&str]) -> FragmentSet {
    let mut set = FragmentSet::new();
    for name in names {
        set.insert(*name, "ACGT");
    }
    set
}

#[test]
fn equal_scores_split_a_fragment_across_both_subsets() {
    let (mut tree, a0, a1) = two_subset_tree();
    let root_fragments = fragments(&["q0"]);
    let mut bitscores = BTreeMap::new();
    bitscores.insert(
        "q0".to_string(),
        vec![
            ScoredHit { bit_score: 10.0, subset: a0 },
            ScoredHit { bit_score: 10.0, subset: a1 },
        ],
    );

    let assignments = distribute_fragments(&mut tree, &root_fragments, &bitscores, 0.95, true);
    assert_eq!(assignments.len(), 2);
    let total: u64 = assignments.iter().map(|a| a.weight).sum();
    assert_eq!(total, FIXED_POINT_ONE);

    let a0_frags = tree.node(a0).fragments.as_ref().unwrap();
    let a1_frags = tree.node(a1).fragments.as_ref().unwrap();
    assert!(a0_frags.contains("q0_A0_500000"));
    assert!(a1_frags.contains("q0_A1_500000"));
    assert_eq!(a0_frags.get("q0_A0_500000"), Some("ACGT"));
}

#[test]
fn dominant_score_keeps_the_fragment_in_one_subset() {
    let (mut tree, a0, a1) = two_subset_tree();
    let root_fragments = fragments(&["q0"]);
    let mut bitscores = BTreeMap::new();
    bitscores.insert(
        "q0".to_string(),
        vec![
            ScoredHit { bit_score: 50.0, subset: a0 },
            ScoredHit { bit_score: 1.0, subset: a1 },
        ],
    );

    let assignments = distribute_fragments(&mut tree, &root_fragments, &bitscores, 0.95, true);
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].subset, a0);
    assert_eq!(assignments[0].weight, FIXED_POINT_ONE);
    assert!(tree
        .node(a0)
        .fragments
        .as_ref()
        .unwrap()
        .contains("q0_A0_1000000"));
    assert!(tree.node(a1).fragments.is_none());
}

#[test]
fn weighting_disabled_names_copies_with_full_weight() {
    let (mut tree, a0, a1) = two_subset_tree();
    let root_fragments = fragments(&["q0"]);
    let mut bitscores = BTreeMap::new();
    bitscores.insert(
        "q0".to_string(),
        vec![
            ScoredHit { bit_score: 10.0, subset: a0 },
            ScoredHit { bit_score: 9.5, subset: a1 },
        ],
    );

    let assignments = distribute_fragments(&mut tree, &root_fragments, &bitscores, 0.99, false);
    assert_eq!(assignments.len(), 2);
    assert!(assignments.iter().all(|a| a.weight == FIXED_POINT_ONE));
    assert!(tree
        .node(a0)
        .fragments
        .as_ref()
        .unwrap()
        .contains("q0_A0_1000000"));
    assert!(tree
        .node(a1)
        .fragments
        .as_ref()
        .unwrap()
        .contains("q0_A1_1000000"));
}

#[test]
fn zero_hit_fragment_receives_no_assignment() {
    let (mut tree, a0, _a1) = two_subset_tree();
    let root_fragments = fragments(&["scored", "unscored"]);
    let mut bitscores = BTreeMap::new();
    bitscores.insert(
        "scored".to_string(),
        vec![ScoredHit { bit_score: 10.0, subset: a0 }],
    );
    bitscores.insert("unscored".to_string(), Vec::new());

    let assignments = distribute_fragments(&mut tree, &root_fragments, &bitscores, 0.95, true);
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].fragment, "scored");
    let a0_frags = tree.node(a0).fragments.as_ref().unwrap();
    assert_eq!(a0_frags.len(), 1);
    assert!(a0_frags.keys().all(|k| !k.starts_with("unscored")));
}

#[test]
fn scored_name_absent_from_root_collection_is_skipped() {
    let (mut tree, a0, a1) = two_subset_tree();
    let root_fragments = fragments(&["known"]);
    let mut bitscores = BTreeMap::new();
    bitscores.insert(
        "known".to_string(),
        vec![ScoredHit { bit_score: 10.0, subset: a0 }],
    );
    bitscores.insert(
        "ghost".to_string(),
        vec![ScoredHit { bit_score: 10.0, subset: a1 }],
    );

    let assignments = distribute_fragments(&mut tree, &root_fragments, &bitscores, 0.95, true);
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].fragment, "known");
    // No empty-sequence copy is materialized for the unknown name.
    assert!(tree.node(a1).fragments.is_none());
}

#[test]
fn per_fragment_weights_sum_to_one_across_subsets() {
    let (mut tree, a0, a1) = two_subset_tree();
    let names: Vec<String> = (0..20).map(|i| format!("q{i:02}")).collect();
    let root_fragments = fragments(&names.iter().map(String::as_str).collect::<Vec<_>>());

    let mut bitscores = BTreeMap::new();
    for (i, name) in names.iter().enumerate() {
        bitscores.insert(
            name.clone(),
            vec![
                ScoredHit { bit_score: 10.0 + i as f64 * 0.1, subset: a0 },
                ScoredHit { bit_score: 9.0 + i as f64 * 0.2, subset: a1 },
            ],
        );
    }

    let assignments = distribute_fragments(&mut tree, &root_fragments, &bitscores, 0.99, true);
    for name in &names {
        let total: u64 = assignments
            .iter()
            .filter(|a| &a.fragment == name)
            .map(|a| a.weight)
            .sum();
        let deviation = (total as f64 / FIXED_POINT_ONE as f64 - 1.0).abs();
        assert!(deviation < 1e-6, "{name}: weights sum to {total}");
    }
}

//! Feasibility of a LEG and per-branch reconcilability.
//!
//! A tree is feasible when no connected component of its LEG holds two
//! different loci of the same species. Everything here is a pure function of
//! the graph (and, for annotations, of the branch labels) and can be
//! recomputed at any time.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::Result;
use crate::labels::LocusKey;
use crate::leg::LocusExclusionGraph;
use crate::plct::BranchLabels;
use crate::tree::{NodeId, TreeOps};

/// True when some species contributes two or more loci to `keys`.
fn has_species_conflict<'a, I: IntoIterator<Item = &'a LocusKey>>(keys: I) -> bool {
    let mut loci: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for key in keys {
        let seen = loci.entry(key.species.as_str()).or_default();
        seen.insert(key.locus.as_str());
        if seen.len() >= 2 {
            return true;
        }
    }
    false
}

pub fn is_feasible(leg: &LocusExclusionGraph) -> bool {
    leg.components().iter().all(|cc| !has_species_conflict(cc))
}

/// Infeasible components, each as its sorted list of locus keys.
pub fn conflicts(leg: &LocusExclusionGraph) -> Vec<Vec<LocusKey>> {
    leg.components()
        .iter()
        .filter(|cc| has_species_conflict(*cc))
        .map(<[LocusKey]>::to_vec)
        .collect()
}

/// Reconcilability of the branch above one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchAnnotation {
    /// None of the branch's labels belongs to a conflicting component.
    pub reconcilable_cc: bool,
    /// No species has two loci among the branch's labels. Leaves carry a
    /// single label and are left as `None`.
    pub reconcilable: Option<bool>,
}

/// Annotate every labeled branch.
pub fn annotate<T: TreeOps>(
    tree: &T,
    labels: &BranchLabels,
    conflicts: &[Vec<LocusKey>],
) -> Result<BTreeMap<NodeId, BranchAnnotation>> {
    let conflicting: BTreeSet<&LocusKey> = conflicts.iter().flatten().collect();

    let mut annotations = BTreeMap::new();
    for node in labels.nodes() {
        let Some(set) = labels.label_set(node) else {
            continue;
        };
        let reconcilable_cc = set.iter().all(|key| !conflicting.contains(key));
        let reconcilable = if tree.is_leaf(node)? {
            None
        } else {
            Some(!has_species_conflict(set))
        };
        annotations.insert(
            node,
            BranchAnnotation {
                reconcilable_cc,
                reconcilable,
            },
        );
    }
    Ok(annotations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group_leaves;
    use crate::labels::Mapping;
    use crate::leg::build_leg;
    use crate::plct::label_branches;
    use crate::tree::GeneTree;

    fn key(s: &str, l: &str) -> LocusKey {
        LocusKey::new(s, l)
    }

    #[test]
    fn test_isolated_nodes_are_feasible() {
        let leg = LocusExclusionGraph::new([key("sp1", "locA"), key("sp1", "locB"), key("sp2", "locA")]);
        assert!(is_feasible(&leg));
        assert!(conflicts(&leg).is_empty());
    }

    #[test]
    fn test_same_species_two_loci_in_component() {
        let mut leg = LocusExclusionGraph::new([key("sp1", "locA"), key("sp1", "locB"), key("sp2", "locA")]);
        leg.add_edge(&key("sp1", "locA"), &key("sp2", "locA"));
        // different species joined: still feasible
        assert!(is_feasible(&leg));

        leg.add_edge(&key("sp2", "locA"), &key("sp1", "locB"));
        assert!(!is_feasible(&leg));
        assert_eq!(
            conflicts(&leg),
            vec![vec![key("sp1", "locA"), key("sp1", "locB"), key("sp2", "locA")]]
        );
    }

    #[test]
    fn test_feasibility_is_repeatable() {
        let tree = GeneTree::from_newick("((sp1_locA_i1,sp1_locB_i1),(sp1_locA_i2,sp1_locB_i2));").unwrap();
        let leg = build_leg(&tree, Mapping::SliUnderscore).unwrap();
        assert!(!is_feasible(&leg));
        assert_eq!(is_feasible(&leg), is_feasible(&leg));
    }

    #[test]
    fn test_trio_with_single_leaf_locus_is_feasible() {
        // (sp1, locB) has a single leaf, so no lineage path and no edge
        let tree = GeneTree::from_newick("((sp1_locA_i1,sp1_locB_i3),sp1_locA_i2);").unwrap();
        let leg = build_leg(&tree, Mapping::SliUnderscore).unwrap();
        assert_eq!(leg.edge_count(), 0);
        assert!(is_feasible(&leg));
    }

    #[test]
    fn test_annotate() {
        let tree = GeneTree::from_newick(
            "(((sp1_locA_i1,sp1_locB_i1)x,(sp1_locA_i2,sp1_locB_i2)y)z,(sp2_locC_i1,sp2_locC_i2)w)r;",
        )
        .unwrap();
        let groups = group_leaves(&tree, Mapping::SliUnderscore).unwrap();
        let labels = label_branches(&tree, &groups).unwrap();
        let leg = build_leg(&tree, Mapping::SliUnderscore).unwrap();
        let found = conflicts(&leg);
        assert_eq!(found, vec![vec![key("sp1", "locA"), key("sp1", "locB")]]);

        let notes = annotate(&tree, &labels, &found).unwrap();
        let x = tree.find("x").unwrap();
        assert_eq!(
            notes[&x],
            BranchAnnotation {
                reconcilable_cc: false,
                reconcilable: Some(false)
            }
        );

        let c1 = tree.find("sp2_locC_i1").unwrap();
        assert_eq!(
            notes[&c1],
            BranchAnnotation {
                reconcilable_cc: true,
                reconcilable: None
            }
        );

        // the LCAs carry no label of their own group
        assert!(!notes.contains_key(&tree.find("z").unwrap()));
        assert!(!notes.contains_key(&tree.find("w").unwrap()));
    }
}

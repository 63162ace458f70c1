//! Label-propagation construction of the LEG.
//!
//! Every leaf walks up towards the lowest common ancestor of its locus group
//! and leaves the group's locus key on each node it passes (the LCA itself is
//! not labeled). A node therefore carries the keys of all lineages running
//! through the branch above it, and two keys found on the same node are
//! joined in the LEG.
//!
//! Labels are kept in a [`BranchLabels`] side table owned by the caller, never
//! on the tree nodes.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use tracing::debug;

use crate::error::Result;
use crate::grouping::LeafGroups;
use crate::labels::LocusKey;
use crate::leg::LocusExclusionGraph;
use crate::tree::{NodeId, TreeOps};

/// Locus keys on the branch above each node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchLabels {
    labels: HashMap<NodeId, BTreeSet<LocusKey>>,
}

impl BranchLabels {
    /// Labels of `node`; empty when no lineage crosses its parent branch.
    pub fn get(&self, node: NodeId) -> impl Iterator<Item = &LocusKey> {
        self.labels.get(&node).into_iter().flatten()
    }

    pub fn label_set(&self, node: NodeId) -> Option<&BTreeSet<LocusKey>> {
        self.labels.get(&node).filter(|set| !set.is_empty())
    }

    /// Labeled nodes in increasing id order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.labels
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(&id, _)| id)
            .sorted()
            .collect()
    }

    fn add(&mut self, node: NodeId, key: &LocusKey) {
        self.labels.entry(node).or_default().insert(key.clone());
    }
}

/// Label every branch with the locus keys whose lineages run through it.
pub fn label_branches<T: TreeOps>(tree: &T, groups: &LeafGroups) -> Result<BranchLabels> {
    let mut labels = BranchLabels::default();
    for (key, members) in groups {
        let lca = tree.lca(members)?;
        for &leaf in members {
            let mut path = tree.path_to_ancestor(leaf, lca)?;
            path.pop();
            for node in path {
                labels.add(node, key);
            }
        }
    }
    Ok(labels)
}

/// Join every pair of keys sharing a labeled node.
pub fn leg_from_labels(groups: &LeafGroups, labels: &BranchLabels) -> LocusExclusionGraph {
    let mut leg = LocusExclusionGraph::new(groups.keys().cloned());
    for set in labels.labels.values() {
        for (a, b) in set.iter().tuple_combinations() {
            leg.add_edge(a, b);
        }
    }
    debug!(
        nodes = leg.node_count(),
        edges = leg.edge_count(),
        labeled = labels.nodes().len(),
        "built locus exclusion graph from branch labels"
    );
    leg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group_leaves;
    use crate::labels::Mapping;
    use crate::tree::GeneTree;

    fn key(s: &str, l: &str) -> LocusKey {
        LocusKey::new(s, l)
    }

    fn labeled(newick: &str) -> (GeneTree, LeafGroups, BranchLabels) {
        let tree = GeneTree::from_newick(newick).unwrap();
        let groups = group_leaves(&tree, Mapping::SliUnderscore).unwrap();
        let labels = label_branches(&tree, &groups).unwrap();
        (tree, groups, labels)
    }

    #[test]
    fn test_labels_stop_below_lca() {
        let (tree, _, labels) =
            labeled("((sp1_locA_i1,sp1_locB_i1)x,(sp1_locA_i2,sp1_locB_i2)y)r;");
        let x = tree.find("x").unwrap();
        let r = tree.root();
        let both: Vec<_> = labels.get(x).cloned().collect();
        assert_eq!(both, vec![key("sp1", "locA"), key("sp1", "locB")]);
        assert!(labels.label_set(r).is_none());
        // 4 leaves + x + y
        assert_eq!(labels.nodes().len(), 6);
    }

    #[test]
    fn test_singleton_group_labels_nothing() {
        let (_, _, labels) = labeled("(sp1_locA_i1,sp1_locB_i2,sp2_locA_i3);");
        assert!(labels.nodes().is_empty());
    }

    #[test]
    fn test_leg_from_labels() {
        let (_, groups, labels) =
            labeled("((sp1_locA_i1,sp1_locB_i1)x,(sp1_locA_i2,sp1_locB_i2)y)r;");
        let leg = leg_from_labels(&groups, &labels);
        assert_eq!(leg.node_count(), 2);
        assert!(leg.has_edge(&key("sp1", "locA"), &key("sp1", "locB")));

        let (_, groups, labels) =
            labeled("((sp1_locA_i1,sp1_locA_i2)x,(sp1_locB_i1,sp1_locB_i2)y)r;");
        assert_eq!(leg_from_labels(&groups, &labels).edge_count(), 0);
    }
}

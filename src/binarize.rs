//! Resolving multifurcations without changing feasibility.
//!
//! # Algorithm
//! Nodes are visited parents first. At a node with more than two children:
//!
//! 1. Each child is classified by the lineages crossing the branch above it:
//!    a locus key is *crossing* when the child's subtree holds some, but not
//!    all, of that key's leaves. A child without crossing keys is `no_path`;
//!    otherwise it is filed under the LEG component of its smallest crossing
//!    key.
//! 2. Groups are ordered by the first child that opened them. `no_path`
//!    children join the first group, or form the only group when nothing
//!    else exists.
//! 3. The node is rebuilt as a right-nested chain, one group per level,
//!    each group itself chained in child order:
//!
//! ```text
//!   groups [a], [b c], [d]          node
//!                                  /    \
//!                                 a    bin_0
//!                                      /   \
//!                                  bin_1    d
//!                                  /   \
//!                                 b     c
//! ```
//!
//! Keeping the children of one component together on their own subtree is
//! what prevents new lineage overlaps between components.
//!
//! The LEG passed in is the one of the input tree. It is not updated while
//! restructuring; the caller rebuilds it afterwards.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{LegError, Result};
use crate::grouping;
use crate::labels::{LocusKey, Mapping};
use crate::leg::{Components, LocusExclusionGraph};
use crate::tree::{NodeId, TreeOps};

/// What a binarization pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinarizeStats {
    /// Multifurcating nodes that were rebuilt.
    pub resolved: usize,
    /// Internal nodes created.
    pub created: usize,
}

/// Leaf-to-component lookups shared by every node of one pass.
struct Partitioner<'a> {
    key_of: HashMap<NodeId, &'a LocusKey>,
    totals: HashMap<&'a LocusKey, usize>,
    components: Components,
}

impl<'a> Partitioner<'a> {
    fn new(groups: &'a grouping::LeafGroups, leg: &LocusExclusionGraph) -> Self {
        Partitioner {
            key_of: grouping::key_by_leaf(groups),
            totals: groups.iter().map(|(k, members)| (k, members.len())).collect(),
            components: leg.components(),
        }
    }

    /// Smallest locus key with leaves on both sides of the branch above `child`.
    fn crossing_key<T: TreeOps>(&self, tree: &T, child: NodeId) -> Result<Option<&'a LocusKey>> {
        let mut inside: HashMap<&'a LocusKey, usize> = HashMap::new();
        for leaf in tree.subtree_leaves(child)? {
            let key = self.key_of.get(&leaf).ok_or(LegError::Precondition(
                "leaf missing from the locus grouping of this tree",
            ))?;
            *inside.entry(*key).or_default() += 1;
        }
        Ok(inside
            .into_iter()
            .filter(|(key, count)| self.totals.get(key).is_some_and(|total| count < total))
            .map(|(key, _)| key)
            .min())
    }

    /// Split the children of `node` into ordered groups.
    fn partition<T: TreeOps>(&self, tree: &T, node: NodeId) -> Result<Vec<Vec<NodeId>>> {
        let mut groups: Vec<(usize, Vec<NodeId>)> = Vec::new();
        let mut no_path = Vec::new();

        for &child in tree.children(node)? {
            let Some(key) = self.crossing_key(tree, child)? else {
                no_path.push(child);
                continue;
            };
            let component = self.components.id_of(key).ok_or(LegError::Precondition(
                "locus key missing from the LEG; rebuild it for the current tree",
            ))?;
            match groups.iter_mut().find(|(id, _)| *id == component) {
                Some((_, members)) => members.push(child),
                None => groups.push((component, vec![child])),
            }
        }

        let mut groups: Vec<Vec<NodeId>> = groups.into_iter().map(|(_, members)| members).collect();
        match groups.first_mut() {
            Some(first) => first.extend(no_path),
            None => groups.push(no_path),
        }
        Ok(groups)
    }
}

/// Partition the children of one node against the given LEG.
pub fn partition_children<T: TreeOps>(
    tree: &T,
    node: NodeId,
    leg: &LocusExclusionGraph,
    mapping: Mapping,
) -> Result<Vec<Vec<NodeId>>> {
    let groups = grouping::group_leaves(tree, mapping)?;
    Partitioner::new(&groups, leg).partition(tree, node)
}

/// Make every node of `tree` have at most two children.
///
/// # Errors
/// `LegError::Structural` if a node is still multifurcating at the end, which
/// means the restructuring itself is broken.
pub fn binarize<T: TreeOps>(
    tree: &mut T,
    leg: &LocusExclusionGraph,
    mapping: Mapping,
) -> Result<BinarizeStats> {
    let groups = grouping::group_leaves(tree, mapping)?;
    let partitioner = Partitioner::new(&groups, leg);
    let mut stats = BinarizeStats::default();

    // children are re-read after each restructure, never cached
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        let n_children = tree.children(node)?.len();
        if n_children > 2 {
            let parts = partitioner.partition(tree, node)?;
            debug!(node, children = n_children, groups = parts.len(), "resolving multifurcation");
            stats.created += restructure(tree, node, &parts)?;
            stats.resolved += 1;
        }
        stack.extend(tree.children(node)?.iter().rev());
    }

    tree.refresh()?;
    check_binary(tree)?;
    Ok(stats)
}

/// Fail on the first node with more than two children.
pub fn check_binary<T: TreeOps>(tree: &T) -> Result<()> {
    for node in tree.preorder(tree.root())? {
        let children = tree.children(node)?.len();
        if children > 2 {
            return Err(LegError::Structural { node, children });
        }
    }
    Ok(())
}

/// Rebuild `node` as a binary chain over `groups`; returns the number of
/// internal nodes created.
///
/// A lone group is chained child by child.
pub fn restructure<T: TreeOps>(
    tree: &mut T,
    node: NodeId,
    groups: &[Vec<NodeId>],
) -> Result<usize> {
    let units: Vec<&[NodeId]> = match groups {
        [only] => only.chunks(1).collect(),
        _ => groups.iter().map(Vec::as_slice).collect(),
    };

    tree.detach_children(node)?;
    let mut created = 0;
    attach_chain(tree, node, &units, &mut created)?;
    Ok(created)
}

fn attach_chain<T: TreeOps>(
    tree: &mut T,
    parent: NodeId,
    units: &[&[NodeId]],
    created: &mut usize,
) -> Result<()> {
    match units {
        [] => Ok(()),
        [only] => attach_unit(tree, parent, only, created),
        [first, second] => {
            attach_unit(tree, parent, first, created)?;
            attach_unit(tree, parent, second, created)
        }
        [first, rest @ ..] => {
            attach_unit(tree, parent, first, created)?;
            let inner = new_internal(tree, parent, created)?;
            attach_chain(tree, inner, rest, created)
        }
    }
}

fn attach_unit<T: TreeOps>(
    tree: &mut T,
    parent: NodeId,
    unit: &[NodeId],
    created: &mut usize,
) -> Result<()> {
    match unit {
        [single] => tree.graft(parent, *single),
        members => {
            let inner = new_internal(tree, parent, created)?;
            let singles: Vec<&[NodeId]> = members.chunks(1).collect();
            attach_chain(tree, inner, &singles, created)
        }
    }
}

fn new_internal<T: TreeOps>(tree: &mut T, parent: NodeId, created: &mut usize) -> Result<NodeId> {
    *created += 1;
    tree.split(parent, 1)?
        .pop()
        .ok_or(LegError::Precondition("split produced no node"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feasibility::is_feasible;
    use crate::leg::build_leg;
    use crate::tree::GeneTree;

    const MAPPING: Mapping = Mapping::SliUnderscore;

    fn run(newick: &str) -> (GeneTree, bool, bool, BinarizeStats) {
        let mut tree = GeneTree::from_newick(newick).unwrap();
        let leg = build_leg(&tree, MAPPING).unwrap();
        let before = is_feasible(&leg);
        let stats = binarize(&mut tree, &leg, MAPPING).unwrap();
        let after = is_feasible(&build_leg(&tree, MAPPING).unwrap());
        (tree, before, after, stats)
    }

    fn sorted_leaves(tree: &GeneTree) -> Vec<String> {
        let mut names = tree.leaf_names().unwrap();
        names.sort();
        names
    }

    fn names(tree: &GeneTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| tree.name(id).unwrap().unwrap_or("*").to_string())
            .collect()
    }

    #[test]
    fn test_star_becomes_binary() {
        let (tree, before, after, stats) = run("(sp1_locA_i1,sp1_locB_i2,sp2_locA_i3);");
        assert!(before);
        assert!(after);
        assert!(tree.is_binary().unwrap());
        assert_eq!(stats, BinarizeStats { resolved: 1, created: 1 });
        assert_eq!(
            sorted_leaves(&tree),
            vec!["sp1_locA_i1", "sp1_locB_i2", "sp2_locA_i3"]
        );
        // all no_path: chained in child order
        assert_eq!(tree.to_newick().unwrap(), "(sp1_locA_i1,(sp1_locB_i2,sp2_locA_i3)bin_0);");
    }

    #[test]
    fn test_binary_tree_is_untouched() {
        let newick = "((sp1_locA_i1,sp1_locB_i1),(sp1_locA_i2,sp1_locB_i2));";
        let (tree, before, after, stats) = run(newick);
        assert_eq!(stats, BinarizeStats::default());
        assert_eq!(tree.to_newick().unwrap(), newick);
        assert!(!before);
        assert!(!after);
    }

    #[test]
    fn test_idempotent() {
        let (mut tree, _, _, _) = run(
            "((sp1_locA_i1,sp2_locA_i1,sp3_locA_i1,sp1_locB_i1),sp1_locA_i2,sp2_locA_i2,(sp3_locA_i2,sp1_locB_i2,sp4_locZ_i1));",
        );
        let once = tree.to_newick().unwrap();
        let leg = build_leg(&tree, MAPPING).unwrap();
        let stats = binarize(&mut tree, &leg, MAPPING).unwrap();
        assert_eq!(stats, BinarizeStats::default());
        assert_eq!(tree.to_newick().unwrap(), once);
    }

    /// ```text
    ///   root: a1, b1, a2, b2, c1
    /// ```
    /// `a` (sp1, locA) and `b` (sp2, locB) have no overlapping paths, so they
    /// are separate components; c1 is a lone leaf and has no crossing lineage.
    #[test]
    fn test_partition_by_component() {
        let tree = GeneTree::from_newick(
            "(sp1_locA_i1,sp2_locB_i1,sp1_locA_i2,sp2_locB_i2,sp3_locC_i1);",
        )
        .unwrap();
        let leg = build_leg(&tree, MAPPING).unwrap();
        let parts = partition_children(&tree, tree.root(), &leg, MAPPING).unwrap();
        let named: Vec<Vec<String>> = parts.iter().map(|g| names(&tree, g)).collect();
        assert_eq!(
            named,
            vec![
                vec!["sp1_locA_i1", "sp1_locA_i2", "sp3_locC_i1"],
                vec!["sp2_locB_i1", "sp2_locB_i2"],
            ]
        );
    }

    /// `x` holds one leaf of `a` and one of `b`, which are not joined in the
    /// LEG (their paths share x and the root only). The smaller key decides.
    #[test]
    fn test_child_crossing_two_components() {
        let tree = GeneTree::from_newick(
            "((sp1_locA_i1,sp2_locB_i1)x,sp1_locA_i2,sp2_locB_i2,sp3_locC_i1);",
        )
        .unwrap();
        let leg = build_leg(&tree, MAPPING).unwrap();
        assert_eq!(leg.edge_count(), 0);

        let parts = partition_children(&tree, tree.root(), &leg, MAPPING).unwrap();
        let named: Vec<Vec<String>> = parts.iter().map(|g| names(&tree, g)).collect();
        assert_eq!(
            named,
            vec![vec!["x", "sp1_locA_i2", "sp3_locC_i1"], vec!["sp2_locB_i2"]]
        );
    }

    #[test]
    fn test_restructure_shape() {
        let mut tree = GeneTree::from_newick("(a,b,c,d);").unwrap();
        let ids: Vec<NodeId> = ["a", "b", "c", "d"].iter().map(|n| tree.find(n).unwrap()).collect();
        let root = tree.root();
        let created =
            restructure(&mut tree, root, &[vec![ids[0]], vec![ids[1], ids[2]], vec![ids[3]]]).unwrap();
        assert_eq!(created, 2);
        assert_eq!(tree.to_newick().unwrap(), "(a,((b,c)bin_1,d)bin_0);");

        let mut tree = GeneTree::from_newick("(a,b,c,d);").unwrap();
        let ids: Vec<NodeId> = ["a", "b", "c", "d"].iter().map(|n| tree.find(n).unwrap()).collect();
        let root = tree.root();
        restructure(&mut tree, root, &[ids.clone()]).unwrap();
        assert_eq!(tree.to_newick().unwrap(), "(a,(b,(c,d)bin_1)bin_0);");
    }

    #[test]
    fn test_nested_multifurcations() {
        let (tree, before, after, stats) = run(
            "((sp1_locA_i1,sp1_locB_i1,sp2_locC_i1,sp2_locC_i2),(sp1_locA_i2,sp1_locB_i2,sp3_locD_i1),sp4_locE_i1);",
        );
        assert!(tree.is_binary().unwrap());
        assert_eq!(stats.resolved, 3);
        assert_eq!(before, after);
        assert_eq!(tree.n_leaves().unwrap(), 8);
    }

    #[test]
    fn test_feasibility_preserved_on_random_like_inputs() {
        let inputs = [
            "(sp1_locA_i1,sp1_locA_i2,sp1_locB_i1,sp1_locB_i2);",
            "((sp1_locA_i1,sp2_locA_i1,sp1_locB_i1),(sp1_locA_i2,sp2_locA_i2,sp1_locB_i2),sp3_locC_i1,sp3_locC_i2);",
            "(sp1_locA_i1,(sp1_locA_i2,sp2_locB_i1,sp2_locB_i2,sp2_locC_i1),sp2_locC_i2,sp1_locD_i1);",
            "((sp1_locA_i1,sp1_locA_i2,sp1_locA_i3),(sp1_locB_i1,sp1_locB_i2,sp1_locB_i3));",
        ];
        for newick in inputs {
            let (tree, before, after, _) = run(newick);
            assert!(tree.is_binary().unwrap(), "{newick}");
            assert_eq!(before, after, "{newick}");
        }
    }

    #[test]
    fn test_branch_lengths_kept() {
        let (tree, _, _, _) = run("(sp1_locA_i1:1,sp1_locB_i2:2,sp2_locA_i3:3);");
        assert_eq!(
            tree.to_newick().unwrap(),
            "(sp1_locA_i1:1,(sp1_locB_i2:2,sp2_locA_i3:3)bin_0:0);"
        );
    }

    #[test]
    fn test_check_binary_reports_offender() {
        let tree = GeneTree::from_newick("((a,b,c)x,d);").unwrap();
        let x = tree.find("x").unwrap();
        assert!(matches!(
            check_binary(&tree),
            Err(LegError::Structural { node, children: 3 }) if node == x
        ));
    }

    #[test]
    fn test_stale_leg_is_rejected() {
        let mut tree = GeneTree::from_newick("(sp1_locA_i1,sp1_locA_i2,sp2_locB_i1);").unwrap();
        let leg = LocusExclusionGraph::new(Vec::<LocusKey>::new());
        assert!(matches!(
            binarize(&mut tree, &leg, MAPPING),
            Err(LegError::Precondition(_))
        ));
    }
}

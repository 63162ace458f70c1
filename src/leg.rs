//! Locus Exclusion Graph (LEG).
//!
//! # Overview
//! The LEG has one node per locus key present among the leaves. Two locus keys
//! are joined when one of their lineage paths overlaps the other's along a
//! branch, i.e. the two paths share more than [`CONFLICT_THRESHOLD`] tree
//! nodes. Touching at a single node (or at the two ends of one edge) is not
//! an overlap.
//!
//! The graph is immutable once built. After any change to the tree topology
//! it is rebuilt from scratch, never patched.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use rayon::prelude::*;
use tracing::debug;

use crate::bitset::Bitset;
use crate::error::Result;
use crate::grouping::{self, LeafGroups};
use crate::labels::{LocusKey, Mapping};
use crate::tree::TreeOps;

/// Two lineage paths conflict when they share more nodes than this.
pub const CONFLICT_THRESHOLD: usize = 2;

/// Undirected simple graph over locus keys.
///
/// Keys are inserted in sorted order, so node index `i` is the `i`-th
/// smallest key.
#[derive(Debug, Clone)]
pub struct LocusExclusionGraph {
    graph: UnGraph<LocusKey, ()>,
    index: HashMap<LocusKey, NodeIndex>,
}

impl LocusExclusionGraph {
    /// A graph with the given nodes and no edges.
    pub fn new<I: IntoIterator<Item = LocusKey>>(keys: I) -> Self {
        let keys: BTreeSet<LocusKey> = keys.into_iter().collect();
        let mut graph = UnGraph::with_capacity(keys.len(), 0);
        let mut index = HashMap::with_capacity(keys.len());
        for key in keys {
            let idx = graph.add_node(key.clone());
            index.insert(key, idx);
        }
        LocusExclusionGraph { graph, index }
    }

    /// Join two locus keys. Self loops, repeated edges and unknown keys are
    /// ignored.
    pub fn add_edge(&mut self, a: &LocusKey, b: &LocusKey) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&i), Some(&j)) if i != j && self.graph.find_edge(i, j).is_none() => {
                self.graph.add_edge(i, j, ());
                true
            }
            _ => false,
        }
    }

    /// Nodes in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &LocusKey> {
        self.graph.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_edge(&self, a: &LocusKey, b: &LocusKey) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&i), Some(&j)) => self.graph.find_edge(i, j).is_some(),
            _ => false,
        }
    }

    /// Edges as ordered key pairs, for comparing graphs.
    pub fn edge_set(&self) -> BTreeSet<(LocusKey, LocusKey)> {
        self.graph
            .edge_references()
            .map(|e| {
                let (a, b) = (&self.graph[e.source()], &self.graph[e.target()]);
                (a.min(b).clone(), a.max(b).clone())
            })
            .collect()
    }

    /// Connected components, computed with a union-find over the edge list.
    pub fn components(&self) -> Components {
        let mut uf = UnionFind::<usize>::new(self.graph.node_count());
        for e in self.graph.edge_references() {
            uf.union(e.source().index(), e.target().index());
        }
        let labels = uf.into_labeling();

        // nodes are sorted, so components come out ordered by their smallest key
        let mut root_to_component: HashMap<usize, usize> = HashMap::new();
        let mut members: Vec<Vec<LocusKey>> = Vec::new();
        let mut of = HashMap::with_capacity(labels.len());
        for (idx, key) in self.graph.node_indices().zip(self.graph.node_weights()) {
            let root = labels[idx.index()];
            let id = *root_to_component.entry(root).or_insert_with(|| {
                members.push(Vec::new());
                members.len() - 1
            });
            members[id].push(key.clone());
            of.insert(key.clone(), id);
        }

        Components { members, of }
    }
}

impl PartialEq for LocusExclusionGraph {
    fn eq(&self, other: &Self) -> bool {
        self.keys().eq(other.keys()) && self.edge_set() == other.edge_set()
    }
}

impl Eq for LocusExclusionGraph {}

/// Connected components of a LEG.
///
/// Component ids are dense and ordered by each component's smallest key; the
/// member list of a component is sorted and doubles as its normalized key.
#[derive(Debug, Clone)]
pub struct Components {
    members: Vec<Vec<LocusKey>>,
    of: HashMap<LocusKey, usize>,
}

impl Components {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn id_of(&self, key: &LocusKey) -> Option<usize> {
        self.of.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[LocusKey]> {
        self.members.iter().map(Vec::as_slice)
    }
}

/// True when some path of the first set overlaps some path of the second.
pub fn paths_conflict(a: &[Bitset], b: &[Bitset]) -> bool {
    a.iter()
        .cartesian_product(b)
        .any(|(p, q)| p.intersection_count(q) > CONFLICT_THRESHOLD)
}

/// Build the LEG of a tree from its leaf labels and lineage paths.
pub fn build_leg<T: TreeOps>(tree: &T, mapping: Mapping) -> Result<LocusExclusionGraph> {
    let groups = grouping::group_leaves(tree, mapping)?;
    build_leg_from_groups(tree, &groups)
}

/// Build the LEG from already grouped leaves.
///
/// Pairwise path tests run in parallel; the tree is only read.
pub fn build_leg_from_groups<T: TreeOps>(
    tree: &T,
    groups: &LeafGroups,
) -> Result<LocusExclusionGraph> {
    let paths = grouping::lineage_paths(tree, groups)?;
    let mut leg = LocusExclusionGraph::new(groups.keys().cloned());

    let traced: Vec<(&LocusKey, &Vec<Bitset>)> = paths.iter().sorted_by_key(|(k, _)| *k).collect();
    let n = traced.len();
    let conflicts: Vec<(usize, usize)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j)))
        .filter(|&(i, j)| paths_conflict(traced[i].1, traced[j].1))
        .collect();

    for (i, j) in conflicts {
        leg.add_edge(traced[i].0, traced[j].0);
    }

    debug!(
        nodes = leg.node_count(),
        edges = leg.edge_count(),
        traced = n,
        "built locus exclusion graph from lineage paths"
    );
    Ok(leg)
}

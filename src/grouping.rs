//! Bucketing leaves by locus key and tracing their lineage paths.
//!
//! # Lineage paths
//! Leaves sharing a locus key are individuals of the same locus in the same
//! species. For each such group the alphabetically first leaf is the anchor
//! and one path is traced from it to every other member:
//!
//! ```text
//!              root
//!             /    \
//!            x      y
//!           / \    / \
//!         a1   b1 a2  b2        a = (sp1, locA), b = (sp1, locB)
//! ```
//!
//! Path for `a`: {a1, x, root, y, a2}. Path for `b`: {b1, x, root, y, b2}.
//!
//! Sorting members by name makes the anchor, and therefore the paths,
//! independent of the order in which the tree enumerates its leaves.

use std::collections::{BTreeMap, HashMap};

use crate::bitset::Bitset;
use crate::error::{LegError, Result};
use crate::labels::{self, LocusKey, Mapping};
use crate::tree::{NodeId, TreeOps};

/// Leaves of the tree grouped by locus key, each group sorted by leaf name.
pub type LeafGroups = BTreeMap<LocusKey, Vec<NodeId>>;

/// Lineage paths of every locus key with at least two leaves.
pub type LineagePaths = HashMap<LocusKey, Vec<Bitset>>;

/// Name of a leaf, failing on anonymous leaves.
pub fn leaf_name<T: TreeOps>(tree: &T, leaf: NodeId) -> Result<&str> {
    tree.name(leaf)?.ok_or(LegError::UnnamedLeaf(leaf))
}

/// Partition all leaves by `(species, locus)`.
pub fn group_leaves<T: TreeOps>(tree: &T, mapping: Mapping) -> Result<LeafGroups> {
    let mut groups: LeafGroups = BTreeMap::new();
    for leaf in tree.leaves()? {
        let name = leaf_name(tree, leaf)?;
        let key = labels::locus_key(name, mapping)?;
        groups.entry(key).or_default().push(leaf);
    }

    for members in groups.values_mut() {
        let mut named = members
            .iter()
            .map(|&id| Ok((leaf_name(tree, id)?, id)))
            .collect::<Result<Vec<_>>>()?;
        named.sort();
        *members = named.into_iter().map(|(_, id)| id).collect();
    }

    Ok(groups)
}

/// Locus key of every leaf, for lookups during partitioning.
pub fn key_by_leaf(groups: &LeafGroups) -> HashMap<NodeId, &LocusKey> {
    groups
        .iter()
        .flat_map(|(key, members)| members.iter().map(move |&leaf| (leaf, key)))
        .collect()
}

/// Trace the anchor-to-member path of every group with two or more leaves.
///
/// Single-leaf groups have no path and are absent from the result.
pub fn lineage_paths<T: TreeOps>(tree: &T, groups: &LeafGroups) -> Result<LineagePaths> {
    let words = Bitset::words_for(tree.capacity());
    let mut paths = LineagePaths::new();

    for (key, members) in groups {
        let Some((&anchor, others)) = members.split_first() else {
            continue;
        };
        if others.is_empty() {
            continue;
        }

        let mut traced = Vec::with_capacity(others.len());
        for &other in others {
            let mut path = Bitset::zeros(words);
            for node in tree.trace(anchor, other)? {
                path.set(node);
            }
            traced.push(path);
        }
        paths.insert(key.clone(), traced);
    }

    Ok(paths)
}

//! Tree capability interface and its `phylotree`-backed implementation.
//!
//! The conflict-graph builders and the binarizer only need a handful of
//! queries and mutations on a rooted, ordered tree. They are collected in
//! [`TreeOps`] so the algorithms do not depend on one tree library; the crate
//! ships a single implementation, [`GeneTree`], wrapping the arena tree of
//! `phylotree` (nodes addressed by index, each storing its parent and its
//! ordered children).

use std::collections::HashSet;
use std::fmt::Write as _;

use phylotree::tree::{Node, Tree as PhyloTree, TreeError};

use crate::error::{LegError, Result};

/// Index of a node inside the tree arena.
pub type NodeId = usize;

/// Prefix of the names given to nodes created while restructuring.
const GENERATED_PREFIX: &str = "bin_";

/// Operations the analysis needs from a tree.
///
/// Mutations follow a detach/graft discipline: [`TreeOps::detach_children`]
/// leaves the returned subtrees dangling until each one is handed back to
/// [`TreeOps::graft`].
pub trait TreeOps {
    fn root(&self) -> NodeId;

    /// Exclusive upper bound on node ids, used to size node bitsets.
    fn capacity(&self) -> usize;

    fn children(&self, node: NodeId) -> Result<&[NodeId]>;

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>>;

    fn name(&self, node: NodeId) -> Result<Option<&str>>;

    fn is_leaf(&self, node: NodeId) -> Result<bool> {
        Ok(self.children(node)?.is_empty())
    }

    /// Nodes of the subtree rooted at `node`, parents before children.
    fn preorder(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.children(current)?.iter().rev());
        }
        Ok(order)
    }

    /// All leaves, in tree order.
    fn leaves(&self) -> Result<Vec<NodeId>> {
        self.subtree_leaves(self.root())
    }

    fn subtree_leaves(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut leaves = Vec::new();
        for id in self.preorder(node)? {
            if self.is_leaf(id)? {
                leaves.push(id);
            }
        }
        Ok(leaves)
    }

    /// No node has more than two children.
    fn is_binary(&self) -> Result<bool> {
        for id in self.preorder(self.root())? {
            if self.children(id)?.len() > 2 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `node` followed by each of its ancestors up to the root.
    fn ancestors(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut path = vec![node];
        let mut current = node;
        while let Some(parent) = self.parent(current)? {
            path.push(parent);
            current = parent;
        }
        Ok(path)
    }

    /// Lowest common ancestor of a non-empty node set.
    fn lca(&self, nodes: &[NodeId]) -> Result<NodeId> {
        let (&first, rest) = nodes
            .split_first()
            .ok_or(LegError::Precondition("lowest common ancestor of an empty node set"))?;
        let mut candidates = self.ancestors(first)?;
        for &node in rest {
            let above: HashSet<NodeId> = self.ancestors(node)?.into_iter().collect();
            let pos = candidates
                .iter()
                .position(|c| above.contains(c))
                .ok_or(LegError::NotAncestor { node, ancestor: first })?;
            candidates.drain(..pos);
        }
        Ok(candidates[0])
    }

    /// Nodes from `node` up to and including `ancestor`.
    fn path_to_ancestor(&self, node: NodeId, ancestor: NodeId) -> Result<Vec<NodeId>> {
        let mut path = vec![node];
        let mut current = node;
        while current != ancestor {
            current = self
                .parent(current)?
                .ok_or(LegError::NotAncestor { node, ancestor })?;
            path.push(current);
        }
        Ok(path)
    }

    /// Nodes on the path between two nodes, both endpoints included.
    fn trace(&self, from: NodeId, to: NodeId) -> Result<Vec<NodeId>> {
        let lca = self.lca(&[from, to])?;
        let mut path = self.path_to_ancestor(from, lca)?;
        let mut down = self.path_to_ancestor(to, lca)?;
        down.pop();
        path.extend(down.into_iter().rev());
        Ok(path)
    }

    /// Remove the subtree rooted at `node`.
    fn prune(&mut self, node: NodeId) -> Result<()>;

    /// Unlink and return the children of `node`, in order.
    fn detach_children(&mut self, node: NodeId) -> Result<Vec<NodeId>>;

    /// Attach a detached subtree as the last child of `parent`.
    fn graft(&mut self, parent: NodeId, child: NodeId) -> Result<()>;

    /// Append `n` fresh, uniquely named internal nodes below `node`.
    fn split(&mut self, node: NodeId, n: usize) -> Result<Vec<NodeId>>;

    fn new_unique_name(&mut self) -> String;

    /// Called once a batch of mutations is complete.
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A gene tree backed by a `phylotree` arena.
#[derive(Debug, Clone)]
pub struct GeneTree {
    tree: PhyloTree,
    root: NodeId,
    names: HashSet<String>,
    next_name: usize,
    has_lengths: bool,
}

impl GeneTree {
    pub fn from_newick(newick: &str) -> Result<Self> {
        Self::from_phylo(PhyloTree::from_newick(newick.trim())?)
    }

    pub fn from_phylo(tree: PhyloTree) -> Result<Self> {
        let root = tree.get_root()?;
        let mut names = HashSet::new();
        let mut has_lengths = false;
        for id in tree.preorder(&root)? {
            let node = tree.get(&id)?;
            if let Some(name) = &node.name {
                names.insert(name.clone());
            }
            has_lengths |= node.parent_edge.is_some();
        }
        Ok(GeneTree {
            tree,
            root,
            names,
            next_name: 0,
            has_lengths,
        })
    }

    pub fn is_multifurcating(&self) -> Result<bool> {
        Ok(!self.is_binary()?)
    }

    pub fn n_leaves(&self) -> Result<usize> {
        Ok(self.leaves()?.len())
    }

    /// Names of the named leaves, in tree order.
    pub fn leaf_names(&self) -> Result<Vec<String>> {
        Ok(self
            .leaves()?
            .into_iter()
            .filter_map(|id| self.tree.get(&id).ok()?.name.clone())
            .collect())
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.tree.get_by_name(name).map(|node| node.id)
    }

    pub fn to_newick(&self) -> Result<String> {
        Ok(self.tree.to_newick()?)
    }

    /// ASCII drawing of the tree, one node per line.
    ///
    /// ```text
    /// *
    /// ├── sp1_locA_i1
    /// └── bin_0
    ///     ├── sp1_locB_i2
    ///     └── sp2_locA_i3
    /// ```
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.display_name(self.root)?);
        self.render_children(self.root, "", &mut out)?;
        Ok(out)
    }

    fn render_children(&self, node: NodeId, prefix: &str, out: &mut String) -> Result<()> {
        let children = self.children(node)?;
        for (i, &child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
            let _ = writeln!(out, "{prefix}{branch}{}", self.display_name(child)?);
            self.render_children(child, &format!("{prefix}{indent}"), out)?;
        }
        Ok(())
    }

    fn display_name(&self, node: NodeId) -> Result<String> {
        Ok(self.name(node)?.unwrap_or("*").to_string())
    }
}

impl TreeOps for GeneTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn capacity(&self) -> usize {
        self.tree.size()
    }

    fn children(&self, node: NodeId) -> Result<&[NodeId]> {
        Ok(&self.tree.get(&node)?.children)
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.tree.get(&node)?.parent)
    }

    fn name(&self, node: NodeId) -> Result<Option<&str>> {
        Ok(self.tree.get(&node)?.name.as_deref())
    }

    fn lca(&self, nodes: &[NodeId]) -> Result<NodeId> {
        let (&first, rest) = nodes
            .split_first()
            .ok_or(LegError::Precondition("lowest common ancestor of an empty node set"))?;
        rest.iter().try_fold(first, |acc, node| {
            Ok(self.tree.get_common_ancestor(&acc, node)?)
        })
    }

    fn prune(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(LegError::Precondition("cannot prune the root of the tree"));
        }
        self.tree.prune(&node)?;
        Ok(())
    }

    fn detach_children(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let children = self.tree.get(&node)?.children.clone();
        let parent = self.tree.get_mut(&node)?;
        for child in &children {
            parent.remove_child(child).map_err(TreeError::from)?;
        }
        Ok(children)
    }

    fn graft(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let edge = self.tree.get(&child)?.parent_edge;
        self.tree.get_mut(&child)?.set_parent(parent, edge);
        self.tree.get_mut(&parent)?.add_child(child, edge);
        Ok(())
    }

    fn split(&mut self, node: NodeId, n: usize) -> Result<Vec<NodeId>> {
        let edge = self.has_lengths.then_some(0.0);
        let mut created = Vec::with_capacity(n);
        for _ in 0..n {
            let name = self.new_unique_name();
            created.push(self.tree.add_child(Node::new_named(&name), node, edge)?);
        }
        Ok(created)
    }

    fn new_unique_name(&mut self) -> String {
        loop {
            let name = format!("{GENERATED_PREFIX}{}", self.next_name);
            self.next_name += 1;
            if self.names.insert(name.clone()) {
                return name;
            }
        }
    }

    fn refresh(&mut self) -> Result<()> {
        self.tree.reset_depths()?;
        Ok(())
    }
}

//! Error taxonomy shared by every stage of the analysis.
//!
//! None of these are recoverable for the current input: the caller aborts the
//! analysis and reports the error. A feasibility mismatch after binarization
//! is deliberately absent here, it is a reported finding and not a failure.

use phylotree::tree::{NewickParseError, TreeError};

use crate::tree::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LegError {
    /// Unsupported leaf naming scheme requested.
    #[error("mapping not supported: {0}")]
    Configuration(String),

    /// A leaf identifier does not split into the expected number of fields.
    #[error("leaf '{identifier}' has {found} field(s) separated by '{separator}', expected {expected}")]
    Format {
        identifier: String,
        separator: char,
        expected: usize,
        found: usize,
    },

    /// A node kept more than two children after binarization.
    #[error("node {node} still has {children} children after binarization")]
    Structural { node: NodeId, children: usize },

    /// An operation needs a labeled tree but no labeling exists yet.
    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    /// A walk towards an ancestor reached the root without meeting it.
    #[error("node {ancestor} is not an ancestor of node {node}")]
    NotAncestor { node: NodeId, ancestor: NodeId },

    /// Leaves must carry an identifier to be labeled.
    #[error("leaf node {0} has no name")]
    UnnamedLeaf(NodeId),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("could not parse newick: {0}")]
    Parse(#[from] NewickParseError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LegError>;

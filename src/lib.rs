//! Crate root: module orchestration and public re-exports.
//!
//! Modules:
//! - `labels`: leaf naming schemes and locus keys.
//! - `tree`: tree capability trait and the `phylotree`-backed `GeneTree`.
//! - `bitset`: compact node-id sets for lineage paths.
//! - `grouping`: leaves grouped by locus key, lineage paths per group.
//! - `leg`: locus exclusion graph and its connected components.
//! - `plct`: label-propagation construction of the LEG.
//! - `feasibility`: feasibility verdict, conflicts and branch annotations.
//! - `binarize`: feasibility-preserving resolution of polytomies.
//! - `analysis`: a tree and its LEG owned together.
//! - `io`: reading and writing Newick files.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod error;
pub mod labels;
pub mod tree;
pub mod bitset;
pub mod grouping;
pub mod leg;
pub mod plct;
pub mod feasibility;
pub mod binarize;
pub mod analysis;
pub mod io;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use analysis::{is_reconcilable, Analysis, AnalysisConfig, LegMethod};
pub use binarize::binarize;
pub use bitset::Bitset;
pub use error::{LegError, Result};
pub use feasibility::{conflicts, is_feasible};
pub use io::{read_newick, write_newick};
pub use labels::{LocusKey, Mapping};
pub use leg::{build_leg, LocusExclusionGraph};
pub use tree::{GeneTree, NodeId, TreeOps};

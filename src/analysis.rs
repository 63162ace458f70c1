//! One analysis session: a gene tree together with the LEG derived from it.
//!
//! The session owns both, so the graph can never drift from the tree: every
//! structural change goes through [`Analysis::binarize`], which rebuilds the
//! LEG (and drops branch labels) before returning.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::binarize::{self, BinarizeStats};
use crate::error::{LegError, Result};
use crate::feasibility::{self, BranchAnnotation};
use crate::grouping::{self, LeafGroups};
use crate::io::read_newick;
use crate::labels::{LocusKey, Mapping};
use crate::leg::{self, LocusExclusionGraph};
use crate::plct::{self, BranchLabels};
use crate::tree::{GeneTree, NodeId};

/// How lineage overlap is detected when building the LEG.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LegMethod {
    /// Pairwise node-set intersection of traced lineage paths.
    #[default]
    Paths,
    /// Locus keys propagated from leaves up to their group's LCA.
    Plct,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub mapping: Mapping,
    pub method: LegMethod,
}

/// Feasibility before and after binarization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FeasibilityOutcome {
    Preserved(bool),
    Changed { before: bool, after: bool },
}

impl fmt::Display for FeasibilityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = |feasible: bool| if feasible { "feasible" } else { "infeasible" };
        match self {
            FeasibilityOutcome::Preserved(v) => write!(f, "The tree remained {}", word(*v)),
            FeasibilityOutcome::Changed { after, .. } => {
                write!(f, "Something went wrong!\nThe tree is now {}", word(*after))
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BinarizeReport {
    pub stats: BinarizeStats,
    pub initial_feasible: bool,
    pub final_feasible: bool,
    pub is_binary: bool,
}

impl BinarizeReport {
    pub fn outcome(&self) -> FeasibilityOutcome {
        if self.initial_feasible == self.final_feasible {
            FeasibilityOutcome::Preserved(self.final_feasible)
        } else {
            FeasibilityOutcome::Changed {
                before: self.initial_feasible,
                after: self.final_feasible,
            }
        }
    }
}

pub struct Analysis {
    tree: GeneTree,
    config: AnalysisConfig,
    groups: LeafGroups,
    leg: LocusExclusionGraph,
    labels: Option<BranchLabels>,
}

impl Analysis {
    /// Group the leaves and build the LEG of `tree`.
    pub fn new(tree: GeneTree, config: AnalysisConfig) -> Result<Self> {
        let groups = grouping::group_leaves(&tree, config.mapping)?;
        let (leg, labels) = build(&tree, &groups, config.method)?;
        Ok(Analysis {
            tree,
            config,
            groups,
            leg,
            labels,
        })
    }

    pub fn from_newick(newick: &str, config: AnalysisConfig) -> Result<Self> {
        Self::new(GeneTree::from_newick(newick)?, config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, config: AnalysisConfig) -> Result<Self> {
        Self::new(read_newick(path)?, config)
    }

    pub fn tree(&self) -> &GeneTree {
        &self.tree
    }

    pub fn leg(&self) -> &LocusExclusionGraph {
        &self.leg
    }

    pub fn is_labeled(&self) -> bool {
        self.labels.is_some()
    }

    pub fn is_multifurcating(&self) -> Result<bool> {
        self.tree.is_multifurcating()
    }

    pub fn is_feasible(&self) -> bool {
        feasibility::is_feasible(&self.leg)
    }

    pub fn conflicts(&self) -> Vec<Vec<LocusKey>> {
        feasibility::conflicts(&self.leg)
    }

    /// Compute branch labels for the current tree if not already present.
    pub fn label(&mut self) -> Result<&BranchLabels> {
        if self.labels.is_none() {
            self.labels = Some(plct::label_branches(&self.tree, &self.groups)?);
        }
        self.labels
            .as_ref()
            .ok_or(LegError::Precondition("branch labels were not computed"))
    }

    /// Reconcilability of every labeled branch.
    ///
    /// # Errors
    /// `LegError::Precondition` if the tree has not been labeled, see
    /// [`Analysis::label`].
    pub fn annotate(&self) -> Result<BTreeMap<NodeId, BranchAnnotation>> {
        let labels = self.labels.as_ref().ok_or(LegError::Precondition(
            "cannot annotate because the tree is unlabeled",
        ))?;
        feasibility::annotate(&self.tree, labels, &self.conflicts())
    }

    /// Rebuild the grouping and the LEG from the current tree.
    pub fn rebuild(&mut self) -> Result<()> {
        self.groups = grouping::group_leaves(&self.tree, self.config.mapping)?;
        let (leg, labels) = build(&self.tree, &self.groups, self.config.method)?;
        self.leg = leg;
        self.labels = labels;
        Ok(())
    }

    /// Binarize the tree, rebuild the LEG and compare feasibility.
    ///
    /// A change of verdict is reported in the returned value and logged, it
    /// is not an error.
    pub fn binarize(&mut self) -> Result<BinarizeReport> {
        let initial_feasible = self.is_feasible();

        let t0 = Instant::now();
        let stats = binarize::binarize(&mut self.tree, &self.leg, self.config.mapping)?;
        self.rebuild()?;
        info!(
            resolved = stats.resolved,
            created = stats.created,
            secs = t0.elapsed().as_secs_f64(),
            "binarized tree"
        );

        let report = BinarizeReport {
            stats,
            initial_feasible,
            final_feasible: self.is_feasible(),
            is_binary: !self.tree.is_multifurcating()?,
        };
        if let FeasibilityOutcome::Changed { before, after } = report.outcome() {
            warn!(before, after, "feasibility changed during binarization");
        }
        Ok(report)
    }
}

fn build(
    tree: &GeneTree,
    groups: &LeafGroups,
    method: LegMethod,
) -> Result<(LocusExclusionGraph, Option<BranchLabels>)> {
    let t0 = Instant::now();
    let built = match method {
        LegMethod::Paths => (leg::build_leg_from_groups(tree, groups)?, None),
        LegMethod::Plct => {
            let labels = plct::label_branches(tree, groups)?;
            (plct::leg_from_labels(groups, &labels), Some(labels))
        }
    };
    info!(
        method = ?method,
        loci = built.0.node_count(),
        edges = built.0.edge_count(),
        secs = t0.elapsed().as_secs_f64(),
        "built locus exclusion graph"
    );
    Ok(built)
}

/// Feasibility verdict of a tree together with its conflicting components.
pub fn is_reconcilable(tree: &GeneTree, mapping: Mapping) -> Result<(bool, Vec<Vec<LocusKey>>)> {
    let leg = leg::build_leg(tree, mapping)?;
    let conflicts = feasibility::conflicts(&leg);
    Ok((conflicts.is_empty(), conflicts))
}

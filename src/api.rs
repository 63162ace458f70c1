//! Python binding layer for gene tree feasibility and binarization.
//!
//! Every function reads a Newick file (optionally gzipped) and runs one
//! analysis session on it.

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::analysis::{Analysis, AnalysisConfig};
use crate::error::LegError;
use crate::labels::Mapping;

fn to_py_err(e: LegError) -> PyErr {
    match e {
        LegError::Io(_) => PyIOError::new_err(e.to_string()),
        LegError::Structural { .. } => PyRuntimeError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn open(path: &str, mapping: &str) -> PyResult<Analysis> {
    let mapping: Mapping = mapping.parse().map_err(to_py_err)?;
    let config = AnalysisConfig {
        mapping,
        ..Default::default()
    };
    Analysis::from_path(path, config).map_err(to_py_err)
}

/// Check whether a gene tree is reconcilable with its species tree.
///
/// Args:
///     path: Path to a Newick file (.gz is decompressed)
///     mapping: Leaf naming scheme, one of sli, sil, sli_, sil_ (default: sli_)
///
/// Returns:
///     True when no component of the locus exclusion graph holds two loci
///     of the same species.
///
/// Raises:
///     ValueError: If the mapping is unknown or a leaf name does not match it
///     IOError: If the file cannot be read
#[pyfunction]
#[pyo3(signature = (path, mapping="sli_"))]
fn is_feasible(path: &str, mapping: &str) -> PyResult<bool> {
    Ok(open(path, mapping)?.is_feasible())
}

/// Binarize a multifurcating gene tree while keeping its feasibility.
///
/// Args:
///     path: Path to a Newick file (.gz is decompressed)
///     mapping: Leaf naming scheme, one of sli, sil, sli_, sil_ (default: sli_)
///
/// Returns:
///     A tuple of (newick, initial_feasible, final_feasible). Binary input
///     trees are returned unchanged.
///
/// Raises:
///     ValueError: If the mapping is unknown or a leaf name does not match it
///     RuntimeError: If a node keeps more than two children
#[pyfunction]
#[pyo3(signature = (path, mapping="sli_"))]
fn binarize(path: &str, mapping: &str) -> PyResult<(String, bool, bool)> {
    let mut analysis = open(path, mapping)?;
    let initial = analysis.is_feasible();
    let fin = if analysis.is_multifurcating().map_err(to_py_err)? {
        analysis.binarize().map_err(to_py_err)?.final_feasible
    } else {
        initial
    };
    let newick = analysis.tree().to_newick().map_err(to_py_err)?;
    Ok((newick, initial, fin))
}

/// Infeasible connected components of the locus exclusion graph.
///
/// Returns:
///     A list of components, each a sorted list of (species, locus) tuples.
#[pyfunction]
#[pyo3(signature = (path, mapping="sli_"))]
fn conflicts(path: &str, mapping: &str) -> PyResult<Vec<Vec<(String, String)>>> {
    let analysis = open(path, mapping)?;
    Ok(analysis
        .conflicts()
        .into_iter()
        .map(|cc| cc.into_iter().map(|k| (k.species, k.locus)).collect())
        .collect())
}

/// Python module definition
#[pymodule]
fn gene_tree_binarizer(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(is_feasible, m)?)?;
    m.add_function(wrap_pyfunction!(binarize, m)?)?;
    m.add_function(wrap_pyfunction!(conflicts, m)?)?;
    Ok(())
}

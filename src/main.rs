use clap::{Parser, ValueEnum};
use gene_tree_binarizer::analysis::{Analysis, AnalysisConfig, LegMethod};
use gene_tree_binarizer::error::LegError;
use gene_tree_binarizer::io::{read_newick, write_newick};
use gene_tree_binarizer::labels::Mapping;
use gene_tree_binarizer::tree::TreeOps;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Check whether a multifurcating gene tree can be reconciled with its
/// species tree, and resolve its polytomies into a binary tree without
/// changing that verdict.
#[derive(Parser, Debug)]
#[command(name = "gene-tree-binarizer", version, about = "Feasibility-preserving binarization of gene trees")]
struct Args {
    /// Path to a Newick tree file (.gz is decompressed)
    tree: PathBuf,

    /// Leaf naming scheme: sli | sil | sli_ | sil_
    #[arg(short = 'm', long = "mapping", default_value = "sli_", value_parser = parse_mapping)]
    mapping: Mapping,

    /// How lineage overlap is detected: paths | plct
    #[arg(long = "method", value_enum, default_value_t = MethodArg::Paths)]
    method: MethodArg,

    /// Print the tree before and after binarization
    #[arg(short = 'd', long = "draw", default_value_t = false)]
    draw: bool,

    /// Write the resulting tree as Newick ('-' for stdout, .gz to compress)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Print conflicting components and per-branch reconcilability
    #[arg(short = 'a', long = "annotate", default_value_t = false)]
    annotate: bool,

    /// Quiet mode: suppresses progress messages on stdout
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MethodArg { Paths, Plct }

impl From<MethodArg> for LegMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Paths => LegMethod::Paths,
            MethodArg::Plct => LegMethod::Plct,
        }
    }
}

fn parse_mapping(s: &str) -> Result<Mapping, String> {
    s.parse::<Mapping>().map_err(|e| e.to_string())
}

fn main() {
    let args = Args::parse();
    init_tracing();
    let report = report_sink(args.quiet, args.output.as_deref());
    let notes_to = report_sink(false, args.output.as_deref());

    log_if(report, format!("Reading tree in file: {}", args.tree.display()));
    let t0 = Instant::now();
    let tree = match read_newick(&args.tree) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to read tree from {:?}: {e}", args.tree);
            std::process::exit(2);
        }
    };
    tracing::debug!(leaves = ?tree.n_leaves().ok(), secs = t0.elapsed().as_secs_f64(), "read tree");

    let config = AnalysisConfig {
        mapping: args.mapping,
        method: args.method.into(),
    };
    let mut analysis = match Analysis::new(tree, config) {
        Ok(a) => a,
        Err(e) => fail(e),
    };

    let multifurcating = analysis.is_multifurcating().unwrap_or_else(|e| fail(e));
    log_if(
        report,
        format!("Tree type: {}", if multifurcating { "Multifurcating" } else { "Bifurcating" }),
    );
    if args.draw {
        draw(report, &analysis);
    }
    log_if(
        report,
        format!("Feasibility: {}", if analysis.is_feasible() { "Feasible" } else { "Infeasible" }),
    );

    if args.annotate {
        print_annotations(notes_to, &mut analysis);
    }

    if multifurcating {
        log_if(report, "Binarizing multifurcating tree...".to_string());
        let result = analysis.binarize().unwrap_or_else(|e| fail(e));
        if result.is_binary {
            log_if(report, "The tree has been binarized".to_string());
        } else {
            log_if(report, "Failed to binarize".to_string());
        }
        log_if(report, result.outcome().to_string());
        if args.draw {
            draw(report, &analysis);
        }
    } else {
        log_if(report, "Tree does not need to be binarized".to_string());
    }

    if let Some(output) = &args.output {
        let t1 = Instant::now();
        if let Err(e) = write_newick(output, analysis.tree()) {
            eprintln!("Failed to write output {output:?}: {e}");
            std::process::exit(5);
        }
        log_write_done(report, output, t1.elapsed().as_secs_f64());
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gene_tree_binarizer=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Report an analysis failure and exit: 4 for a structural defect, 3 otherwise.
fn fail(e: LegError) -> ! {
    let code = match e {
        LegError::Structural { .. } => 4,
        _ => 3,
    };
    eprintln!("Analysis failed: {e}");
    std::process::exit(code);
}

fn draw(sink: Sink, analysis: &Analysis) {
    match analysis.tree().render() {
        Ok(art) => log_if(sink, art.trim_end().to_string()),
        Err(e) => eprintln!("Failed to draw tree: {e}"),
    }
}

fn print_annotations(sink: Sink, analysis: &mut Analysis) {
    let conflicts = analysis.conflicts();
    if conflicts.is_empty() {
        log_if(sink, "Conflicting components: none".to_string());
    }
    for cc in &conflicts {
        let keys: Vec<String> = cc.iter().map(ToString::to_string).collect();
        log_if(sink, format!("Conflicting component: {}", keys.join(" ")));
    }

    if let Err(e) = analysis.label() {
        fail(e);
    }
    let notes = analysis.annotate().unwrap_or_else(|e| fail(e));
    log_if(sink, "node\treconcilable_cc\treconcilable".to_string());
    for (node, note) in notes {
        let name = match analysis.tree().name(node) {
            Ok(Some(n)) => n.to_string(),
            _ => format!("#{node}"),
        };
        let reconcilable = note.reconcilable.map_or("-".to_string(), |r| r.to_string());
        log_if(sink, format!("{name}\t{}\t{reconcilable}", note.reconcilable_cc));
    }
}

/// Destination of report lines.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Sink {
    Off,
    Stdout,
    /// stdout carries the output tree
    Stderr,
}

fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn report_sink(quiet: bool, output: Option<&Path>) -> Sink {
    match (quiet, output) {
        (true, _) => Sink::Off,
        (false, Some(path)) if is_stdout(path) => Sink::Stderr,
        (false, _) => Sink::Stdout,
    }
}

fn log_if(sink: Sink, msg: String) {
    match sink {
        Sink::Off => {}
        Sink::Stdout => println!("{}", msg),
        Sink::Stderr => eprintln!("{}", msg),
    }
}

fn log_write_done(sink: Sink, output: &Path, secs: f64) {
    if is_stdout(output) {
        log_if(sink, format!("Writing to stdout {secs:.3}s"));
    } else {
        log_if(sink, format!("Writing to output {secs:.3}s"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_leaves_stdout_to_the_tree() {
        assert_eq!(report_sink(false, Some(Path::new("-"))), Sink::Stderr);
        assert_eq!(report_sink(false, Some(Path::new("out.nwk.gz"))), Sink::Stdout);
        assert_eq!(report_sink(false, None), Sink::Stdout);
        assert_eq!(report_sink(true, Some(Path::new("-"))), Sink::Off);
    }

    #[test]
    fn test_args() {
        let args =
            Args::try_parse_from(["gene-tree-binarizer", "t.nwk", "-m", "sil", "-o", "-"]).unwrap();
        assert_eq!(args.mapping, Mapping::Sil);
        assert_eq!(report_sink(args.quiet, args.output.as_deref()), Sink::Stderr);
        assert!(Args::try_parse_from(["gene-tree-binarizer", "t.nwk", "-m", "xyz"]).is_err());
        assert!(Args::try_parse_from(["gene-tree-binarizer"]).is_err());
    }
}

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::Result;
use crate::tree::GeneTree;

fn is_gz(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

/// First tree of a Newick document: everything up to and including the
/// first `;`, with surrounding whitespace removed.
fn first_tree(content: &str) -> &str {
    match content.find(';') {
        Some(end) => content[..=end].trim(),
        None => content.trim(),
    }
}

/// Read the first tree of a Newick file.
/// If `path` ends with `.gz`, the file is gzip-decompressed first.
pub fn read_newick<P: AsRef<Path>>(path: P) -> Result<GeneTree> {
    let p = path.as_ref();
    let mut content = String::new();
    if is_gz(p) {
        GzDecoder::new(File::open(p)?).read_to_string(&mut content)?;
    } else {
        File::open(p)?.read_to_string(&mut content)?;
    }
    GeneTree::from_newick(first_tree(&content))
}

/// Write a tree as a single Newick line to a file or stdout.
/// If `path` ends with `.gz`, the output is gzip-compressed.
/// If `path` equals `-`, the tree is written to stdout (uncompressed).
pub fn write_newick<P: AsRef<Path>>(path: P, tree: &GeneTree) -> Result<()> {
    let p = path.as_ref();
    let newick = tree.to_newick()?;

    let mut out: Box<dyn Write> = if p.as_os_str() == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else if is_gz(p) {
        let f = File::create(p)?;
        Box::new(BufWriter::new(GzEncoder::new(f, Compression::default())))
    } else {
        Box::new(BufWriter::new(File::create(p)?))
    };

    writeln!(&mut out, "{newick}")?;
    out.flush()?;
    Ok(())
}

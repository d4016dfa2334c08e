use std::path::Path;

use anyhow::{bail, Context};
use deobscope::pattern::{parse_expression, ExprNode, PatternCorpus};

/// Load a corpus file or directory, failing if nothing was accepted.
pub fn load_corpus(path: &Path) -> anyhow::Result<PatternCorpus> {
    if !path.exists() {
        bail!("corpus path does not exist: {}", path.display());
    }
    let mut corpus = PatternCorpus::new();
    if !corpus.load_path(path) {
        bail!("no patterns loaded from {}", path.display());
    }
    Ok(corpus)
}

/// Parse an expression given on the command line.
pub fn parse_argument(expression: &str) -> anyhow::Result<ExprNode> {
    parse_expression(expression).with_context(|| format!("failed to parse '{expression}'"))
}

/// Display-friendly name of a path: the file name if it has one.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

//! Pattern corpus loading.
//!
//! A corpus is plain text with one pattern per line, `simplified,obfuscated`:
//!
//! ```text
//! # comment
//! Simplified,Obfuscated
//! a+b,(a|b)+(a&b)
//! a^b,(a|b)-(a&b)
//! ```
//!
//! The line is split at its first comma and both sides are trimmed. Empty lines,
//! `#` comments, the header row and lines without a comma are skipped, as are lines
//! with an empty side. Repeated pairs are loaded once. Bytes that are not valid UTF-8
//! only cost the line they sit on. None of these abort a load.
//!
//! Directories are walked recursively; only files whose name contains `mba-dataset`
//! and whose extension is `csv` are read, in file-name order.
//!
//! Loaded patterns are immutable. Their trees are compiled once, either eagerly
//! through [`PatternCorpus::compile_all`] or on first use, and are shared read-only
//! between threads afterwards.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use walkdir::{DirEntry, WalkDir};

use crate::{
    pattern::{parser::parse_expression, ExprNode},
    Result,
};

/// Header rows accepted (and skipped) at any position.
const HEADERS: &[&str] = &["Original,Obfuscated", "Simplified,Obfuscated"];

/// File name fragment selecting corpus files inside a directory.
pub const DATASET_MARKER: &str = "mba-dataset";

/// File extension selecting corpus files inside a directory.
pub const DATASET_EXTENSION: &str = "csv";

/// One rewrite rule: an obfuscated expression and the simpler form it computes.
#[derive(Debug, Clone)]
pub struct Pattern {
    simplified: String,
    obfuscated: String,
    simplified_tree: OnceLock<Option<ExprNode>>,
    obfuscated_tree: OnceLock<Option<ExprNode>>,
    origin: Option<PathBuf>,
    line: usize,
}

impl Pattern {
    /// Creates a pattern from its two forms. Both are trimmed.
    #[must_use]
    pub fn new(simplified: impl AsRef<str>, obfuscated: impl AsRef<str>) -> Self {
        Self {
            simplified: simplified.as_ref().trim().to_string(),
            obfuscated: obfuscated.as_ref().trim().to_string(),
            simplified_tree: OnceLock::new(),
            obfuscated_tree: OnceLock::new(),
            origin: None,
            line: 0,
        }
    }

    fn located(mut self, origin: Option<&Path>, line: usize) -> Self {
        self.origin = origin.map(Path::to_path_buf);
        self.line = line;
        self
    }

    /// The simplified form, as written in the corpus.
    #[must_use]
    pub fn simplified(&self) -> &str {
        &self.simplified
    }

    /// The obfuscated form, as written in the corpus.
    #[must_use]
    pub fn obfuscated(&self) -> &str {
        &self.obfuscated
    }

    /// Label used in match reports: the obfuscated form.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.obfuscated
    }

    /// File the pattern was read from, if any.
    #[must_use]
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// 1-based line number within its source; 0 for patterns built in code.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Tree of the simplified form, compiled on first access.
    pub fn simplified_tree(&self) -> Option<&ExprNode> {
        self.simplified_tree
            .get_or_init(|| parse_expression(&self.simplified))
            .as_ref()
    }

    /// Tree of the obfuscated form, compiled on first access.
    pub fn obfuscated_tree(&self) -> Option<&ExprNode> {
        self.obfuscated_tree
            .get_or_init(|| parse_expression(&self.obfuscated))
            .as_ref()
    }

    /// Compiles both trees. Returns true if both sides parse.
    pub fn compile(&self) -> bool {
        let simplified = self.simplified_tree().is_some();
        let obfuscated = self.obfuscated_tree().is_some();
        simplified && obfuscated
    }

}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.simplified == other.simplified && self.obfuscated == other.obfuscated
    }
}

impl Eq for Pattern {}

/// Counters describing what a corpus load accepted and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Files read successfully.
    pub files: usize,
    /// Lines that produced a new pattern.
    pub accepted: usize,
    /// Data lines rejected as malformed.
    pub rejected: usize,
    /// Comment, header and blank lines.
    pub skipped: usize,
    /// Well-formed lines repeating an already loaded pattern.
    pub duplicates: usize,
}

enum Line<'a> {
    Ignored,
    Malformed(&'static str),
    Pair(&'a str, &'a str),
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Ignored;
    }
    if HEADERS.iter().any(|h| trimmed.eq_ignore_ascii_case(h)) {
        return Line::Ignored;
    }
    if trimmed.contains(char::REPLACEMENT_CHARACTER) {
        return Line::Malformed("invalid UTF-8");
    }
    let Some((simplified, obfuscated)) = trimmed.split_once(',') else {
        return Line::Malformed("no ',' separator");
    };
    let (simplified, obfuscated) = (simplified.trim(), obfuscated.trim());
    if simplified.is_empty() || obfuscated.is_empty() {
        return Line::Malformed("empty side");
    }
    Line::Pair(simplified, obfuscated)
}

/// The in-memory pattern list.
///
/// # Examples
///
/// ```rust
/// use deobscope::pattern::PatternCorpus;
///
/// let mut corpus = PatternCorpus::new();
/// let added = corpus.load_from_source("# demo\na+b,(a|b)+(a&b)\nfoo;bar\n", None);
///
/// assert_eq!(added, 1);
/// assert_eq!(corpus.stats().rejected, 1);
/// assert_eq!(corpus.patterns()[0].label(), "(a|b)+(a&b)");
/// ```
#[derive(Debug, Default)]
pub struct PatternCorpus {
    patterns: Vec<Pattern>,
    seen: HashSet<(String, String)>,
    stats: LoadStats,
}

impl PatternCorpus {
    /// Creates an empty corpus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses corpus text into patterns without keeping them.
    ///
    /// Repeated pairs within the text are returned once.
    #[must_use]
    pub fn parse_source(text: &str) -> Vec<Pattern> {
        let mut corpus = Self::new();
        corpus.load_from_source(text, None);
        corpus.patterns
    }

    /// Adds every valid line of `text` and returns how many new patterns it produced.
    ///
    /// # Arguments
    ///
    /// * `text` - Corpus text
    /// * `origin` - File the text came from, used in diagnostics and pattern metadata
    pub fn load_from_source(&mut self, text: &str, origin: Option<&Path>) -> usize {
        let source = origin.map_or_else(|| "<memory>".to_string(), |p| p.display().to_string());
        let mut added = 0;

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            match classify(line) {
                Line::Ignored => self.stats.skipped += 1,
                Line::Malformed(reason) => {
                    self.stats.rejected += 1;
                    log::warn!("{source}:{line_no}: skipping malformed pattern line ({reason}): {line}");
                }
                Line::Pair(simplified, obfuscated) => {
                    let key = (simplified.to_string(), obfuscated.to_string());
                    if !self.seen.insert(key) {
                        self.stats.duplicates += 1;
                        log::debug!("{source}:{line_no}: duplicate pattern {obfuscated}");
                        continue;
                    }
                    self.patterns
                        .push(Pattern::new(simplified, obfuscated).located(origin, line_no));
                    self.stats.accepted += 1;
                    added += 1;
                }
            }
        }

        added
    }

    /// Loads one corpus file.
    ///
    /// Returns true if the file contributed at least one new pattern. An unreadable file
    /// is logged and yields false.
    pub fn load_from_csv(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let text = match read_source(path) {
            Ok(text) => text,
            Err(error) => {
                log::warn!("Failed to read pattern file {}: {error}", path.display());
                return false;
            }
        };
        self.stats.files += 1;
        let added = self.load_from_source(&text, Some(path));
        log::info!("Loaded {added} patterns from {}", path.display());
        added > 0
    }

    /// Recursively loads every corpus file below `dir`.
    ///
    /// Returns true if at least one file contributed at least one pattern.
    pub fn load_from_directory(&mut self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            log::warn!("Pattern directory {} does not exist", dir.display());
            return false;
        }

        let mut any = false;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            match dataset_entry(entry) {
                Ok(Some(path)) => any |= self.load_from_csv(path),
                Ok(None) => {}
                Err(error) => {
                    log::warn!("Skipping unreadable entry below {}: {error}", dir.display());
                }
            }
        }

        if !any {
            log::warn!("No patterns found below {}", dir.display());
        }
        any
    }

    /// Loads a file or a directory, whichever `path` is.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if path.is_dir() {
            self.load_from_directory(path)
        } else {
            self.load_from_csv(path)
        }
    }

    /// Compiles every pattern's trees and returns how many are usable.
    ///
    /// Patterns with a side that does not parse stay in the corpus; the scanner skips them.
    pub fn compile_all(&self) -> usize {
        let usable = self.patterns.iter().filter(|p| p.compile()).count();
        if usable < self.patterns.len() {
            log::warn!(
                "{} of {} patterns failed to compile",
                self.patterns.len() - usable,
                self.patterns.len()
            );
        }
        usable
    }

    /// Patterns whose two sides both compile.
    pub fn usable(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter().filter(|p| p.compile())
    }

    /// All loaded patterns, in load order.
    #[must_use]
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Returns one pattern.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    /// Iterates over the loaded patterns.
    pub fn iter(&self) -> std::slice::Iter<'_, Pattern> {
        self.patterns.iter()
    }

    /// Number of loaded patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if nothing was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Load counters accumulated over every load call.
    #[must_use]
    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Adds a pattern built in code. Returns false if the pair is already present.
    pub fn push(&mut self, pattern: Pattern) -> bool {
        let key = (pattern.simplified.clone(), pattern.obfuscated.clone());
        if !self.seen.insert(key) {
            return false;
        }
        self.patterns.push(pattern);
        true
    }
}

impl<'a> IntoIterator for &'a PatternCorpus {
    type Item = &'a Pattern;
    type IntoIter = std::slice::Iter<'a, Pattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

impl FromIterator<Pattern> for PatternCorpus {
    fn from_iter<T: IntoIterator<Item = Pattern>>(iter: T) -> Self {
        let mut corpus = Self::new();
        for pattern in iter {
            corpus.push(pattern);
        }
        corpus
    }
}

fn is_dataset_file(path: &Path) -> bool {
    let named = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(DATASET_MARKER));
    let csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == DATASET_EXTENSION);
    named && csv
}

fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn dataset_entry(entry: walkdir::Result<DirEntry>) -> Result<Option<PathBuf>> {
    let entry = entry?;
    if entry.file_type().is_file() && is_dataset_file(entry.path()) {
        Ok(Some(entry.into_path()))
    } else {
        Ok(None)
    }
}

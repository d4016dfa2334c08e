use std::path::Path;

use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{file_display_name, load_corpus},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Clone, Serialize)]
struct PatternInfo {
    index: usize,
    simplified: String,
    obfuscated: String,
    usable: bool,
    origin: Option<String>,
    line: usize,
}

#[derive(Debug, Serialize)]
struct CorpusInfo {
    path: String,
    files: usize,
    accepted: usize,
    rejected: usize,
    skipped: usize,
    duplicates: usize,
    usable: usize,
    unusable: Vec<PatternInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    patterns: Option<Vec<PatternInfo>>,
}

pub fn run(path: &Path, list: bool, opts: &GlobalOptions) -> anyhow::Result<()> {
    let corpus = load_corpus(path)?;
    let usable = corpus.compile_all();
    let stats = corpus.stats();

    let patterns: Vec<PatternInfo> = corpus
        .iter()
        .enumerate()
        .map(|(index, pattern)| PatternInfo {
            index,
            simplified: pattern.simplified().to_string(),
            obfuscated: pattern.obfuscated().to_string(),
            usable: pattern.compile(),
            origin: pattern.origin().map(file_display_name),
            line: pattern.line(),
        })
        .collect();

    let (usable_patterns, unusable): (Vec<_>, Vec<_>) =
        patterns.into_iter().partition(|p| p.usable);
    let listed = list.then(|| {
        let mut all = usable_patterns;
        all.extend(unusable.iter().cloned());
        all.sort_by_key(|p| p.index);
        all
    });

    let info = CorpusInfo {
        path: path.display().to_string(),
        files: stats.files,
        accepted: stats.accepted,
        rejected: stats.rejected,
        skipped: stats.skipped,
        duplicates: stats.duplicates,
        usable,
        unusable,
        patterns: listed,
    };

    print_output(&info, opts, display_corpus)
}

fn display_corpus(info: &CorpusInfo) {
    println!("Corpus:     {}", info.path);
    println!("Files:      {}", info.files);
    println!("Accepted:   {}", info.accepted);
    println!("Rejected:   {}", info.rejected);
    println!("Skipped:    {}", info.skipped);
    println!("Duplicates: {}", info.duplicates);
    println!("Usable:     {}", info.usable);

    if !info.unusable.is_empty() {
        println!();
        println!("Patterns that fail to compile:");
        pattern_table(&info.unusable).indent("  ").print();
    }
    if let Some(patterns) = &info.patterns {
        println!();
        pattern_table(patterns).print();
    }
}

fn pattern_table(patterns: &[PatternInfo]) -> TabWriter {
    let mut table = TabWriter::new(&[
        ("#", Align::Right),
        ("OBFUSCATED", Align::Left),
        ("SIMPLIFIED", Align::Left),
        ("SOURCE", Align::Left),
    ]);
    for p in patterns {
        let source = match &p.origin {
            Some(file) => format!("{file}:{}", p.line),
            None => format!("line {}", p.line),
        };
        table.row(vec![
            p.index.to_string(),
            p.obfuscated.clone(),
            p.simplified.clone(),
            source,
        ]);
    }
    table
}

//! Benchmarks for the pattern engine.
//!
//! Covers the three hot paths of a simplification run:
//! - Tokenizing and parsing corpus expressions
//! - Loading a corpus from text
//! - Scanning a function body against a loaded corpus

extern crate deobscope;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use deobscope::{
    events::EventLog,
    il::{Function, IlFunction},
    pattern::{lower, parse, parse_expression, tokenize, PatternCorpus, Scanner},
};
use std::{hint::black_box, sync::Arc};

/// Linear MBA identities in `simplified,obfuscated` form.
const IDENTITIES: &[(&str, &str)] = &[
    ("a+b", "(a|b)+(a&b)"),
    ("a^b", "(a|b)-(a&b)"),
    ("a|b", "(a^b)+(a&b)"),
    ("a-b", "a+~b+1"),
    ("a&b", "(a|b)-(a^b)"),
    ("a+b", "(a^b)+2*(a&b)"),
    ("a-b", "(a^b)-2*(~a&b)"),
    ("a*b", "(a&b)*(a|b)+(a&~b)*(~a&b)"),
];

fn corpus_text(copies: usize) -> String {
    let mut text = String::from("Original,Obfuscated\n");
    for copy in 0..copies {
        for (simplified, obfuscated) in IDENTITIES {
            // distinct constant per copy
            text.push_str(&format!("{simplified},{obfuscated}+{copy}\n"));
        }
    }
    text
}

/// Benchmark tokenizing a nested expression.
/// Expression: (a|b)+(a&b)*(~a<<0x3)
fn bench_tokenize(c: &mut Criterion) {
    let expression = "(a|b)+(a&b)*(~a<<0x3)";

    c.bench_function("pattern_tokenize", |b| {
        b.iter(|| black_box(tokenize(black_box(expression))));
    });
}

/// Benchmark parsing pre-tokenized input.
fn bench_parse(c: &mut Criterion) {
    let tokens = tokenize("(a&b)*(a|b)+(a&~b)*(~a&b)");

    c.bench_function("pattern_parse", |b| {
        b.iter(|| {
            let tree = parse(black_box(&tokens)).unwrap();
            black_box(tree)
        });
    });
}

/// Benchmark loading and compiling a corpus of 800 patterns.
fn bench_corpus_load(c: &mut Criterion) {
    let text = corpus_text(100);

    let mut group = c.benchmark_group("pattern_corpus");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("load_from_source", |b| {
        b.iter(|| {
            let mut corpus = PatternCorpus::new();
            corpus.load_from_source(black_box(&text), None);
            black_box(corpus.compile_all())
        });
    });
    group.finish();
}

/// Benchmark scanning 256 assignments against the corpus.
fn bench_scan(c: &mut Criterion) {
    let mut corpus = PatternCorpus::new();
    let text: String = IDENTITIES
        .iter()
        .map(|(simplified, obfuscated)| format!("{simplified},{obfuscated}\n"))
        .collect();
    corpus.load_from_source(&text, None);
    corpus.compile_all();
    let scanner = Scanner::new(Arc::new(corpus));

    let mut il = IlFunction::new();
    for i in 0..256 {
        let (_, obfuscated) = IDENTITIES[i % IDENTITIES.len()];
        let tree = parse_expression(obfuscated).unwrap();
        lower::lower_assignment(&mut il, &format!("t{i}"), &tree, 4).unwrap();
    }
    let function = Function::new("bench", 0x1000, il);

    let mut group = c.benchmark_group("pattern_scan");
    group.throughput(Throughput::Elements(256));
    group.bench_function("scan_function", |b| {
        b.iter(|| black_box(scanner.scan_function(black_box(&function))));
    });
    group.bench_function("simplify", |b| {
        b.iter(|| {
            let mut function = function.clone();
            let events = EventLog::new();
            black_box(scanner.simplify(&mut function, &events))
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_parse,
    bench_corpus_load,
    bench_scan
);
criterion_main!(benches);

use std::{path::Path, sync::Arc};

use anyhow::Context;
use deobscope::{
    config::{BindingMode, EngineConfig, RewriteStrategy},
    events::EventKind,
    il::{Function, IlFunction},
    methods::{Deobfuscator, MethodKind, MethodOutcome},
    pattern::lower,
};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{load_corpus, parse_argument},
    output::print_output,
};

pub struct SimplifyOptions<'a> {
    pub corpus: &'a Path,
    pub expressions: &'a [String],
    pub width: usize,
    pub consistent: bool,
    pub template: bool,
}

#[derive(Debug, Serialize)]
struct RewriteInfo {
    instruction: usize,
    before: String,
    after: String,
    changed: bool,
}

#[derive(Debug, Serialize)]
struct SimplifyInfo {
    patterns: usize,
    matched: usize,
    rewritten: usize,
    declined: usize,
    results: Vec<RewriteInfo>,
    declines: Vec<String>,
}

pub fn run(options: &SimplifyOptions<'_>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let corpus = Arc::new(load_corpus(options.corpus)?);

    let mut il = IlFunction::new();
    for (i, expression) in options.expressions.iter().enumerate() {
        let tree = parse_argument(expression)?;
        lower::lower_assignment(&mut il, &format!("t{i}"), &tree, options.width)
            .with_context(|| format!("failed to lower '{expression}'"))?;
    }
    let before: Vec<String> = (0..il.instruction_count())
        .map(|i| il.render_instruction(i).unwrap_or_default())
        .collect();

    let config = EngineConfig::default()
        .with_methods(true, false, false)
        .with_binding_mode(if options.consistent {
            BindingMode::Consistent
        } else {
            BindingMode::Independent
        })
        .with_rewrite_strategy(if options.template {
            RewriteStrategy::Template
        } else {
            RewriteStrategy::PrincipalOperands
        })
        .with_parallel(false);
    let mut deobfuscator = Deobfuscator::new(config);
    deobfuscator.register_all(Arc::clone(&corpus));

    let mut functions = vec![Function::new("cli", 0, il)];
    let report = deobfuscator.run_all(&mut functions);
    if let Some(error) = report.functions.iter().find_map(|f| f.error.as_deref()) {
        anyhow::bail!("simplification failed: {error}");
    }

    let simplify = report
        .functions
        .first()
        .and_then(|f| match f.outcome(MethodKind::MbaSimplifier) {
            Some(MethodOutcome::Simplified(simplify)) => Some(*simplify),
            _ => None,
        })
        .unwrap_or_default();

    let after_il = functions[0].il();
    let results = before
        .into_iter()
        .enumerate()
        .map(|(instruction, before)| {
            let after = after_il
                .and_then(|il| il.render_instruction(instruction))
                .unwrap_or_default();
            RewriteInfo {
                instruction,
                changed: before != after,
                before,
                after,
            }
        })
        .collect();

    let info = SimplifyInfo {
        patterns: corpus.len(),
        matched: simplify.matched,
        rewritten: simplify.rewritten,
        declined: simplify.declined,
        results,
        declines: report
            .events
            .filter_kind(EventKind::RewriteDeclined)
            .map(|event| event.message.clone())
            .collect(),
    };

    print_output(&info, opts, display_simplify)
}

fn display_simplify(info: &SimplifyInfo) {
    for result in &info.results {
        if result.changed {
            println!("{}", result.before);
            println!("  => {}", result.after);
        } else {
            println!("{}  (unchanged)", result.before);
        }
    }
    for decline in &info.declines {
        println!("declined: {decline}");
    }
    println!();
    println!(
        "{} pattern(s), {} match(es), {} rewritten, {} declined",
        info.patterns, info.matched, info.rewritten, info.declined
    );
}

//! The MBA simplifier method.
//!
//! Wraps a [`Scanner`] over the shared pattern corpus. After a function has been
//! rewritten its derived SSA form is regenerated.

use std::sync::Arc;

use crate::{
    config::EngineConfig,
    il::Function,
    methods::{AnalysisContext, MethodOutcome},
    pattern::{PatternCorpus, Scanner},
    Result,
};

/// Loads the corpus named by a configuration.
///
/// Load failures are logged and leave the corpus empty or partial; they never abort.
/// With [`EngineConfig::eager_compile`] set, every pattern tree is compiled here.
#[must_use]
pub fn load_corpus(config: &EngineConfig) -> PatternCorpus {
    let mut corpus = PatternCorpus::new();
    if !corpus.load_path(&config.corpus_dir) {
        log::warn!("No patterns loaded from {}", config.corpus_dir.display());
    }
    if config.eager_compile {
        let usable = corpus.compile_all();
        log::info!("{usable} of {} patterns usable", corpus.len());
    }
    corpus
}

/// Rewrites obfuscated expressions into their simplified forms.
#[derive(Debug, Clone)]
pub struct MbaSimplifier {
    scanner: Scanner,
}

impl MbaSimplifier {
    /// Creates the method over a loaded corpus.
    #[must_use]
    pub fn new(corpus: Arc<PatternCorpus>, config: &EngineConfig) -> Self {
        Self {
            scanner: Scanner::from_config(corpus, config),
        }
    }

    /// The scanner used for every function.
    #[must_use]
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub(crate) fn execute(
        &self,
        function: &mut Function,
        ctx: &AnalysisContext,
    ) -> Result<MethodOutcome> {
        if !function.is_lifted() {
            return Ok(MethodOutcome::Skipped);
        }
        ctx.check_cancelled()?;

        let report = self.scanner.simplify(function, ctx.events);
        if report.rewritten > 0 {
            if let Some(il) = function.il_mut() {
                il.generate_ssa_form();
            }
            log::info!(
                "{}: {} of {} matches rewritten",
                function.name(),
                report.rewritten,
                report.matched
            );
        }
        Ok(MethodOutcome::Simplified(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{EventKind, EventLog},
        il::{IlView, Opcode},
        test::single_assignment,
    };

    fn simplifier(source: &str) -> MbaSimplifier {
        let mut corpus = PatternCorpus::new();
        corpus.load_from_source(source, None);
        MbaSimplifier::new(Arc::new(corpus), &EngineConfig::default())
    }

    #[test]
    fn test_execute_rewrites_and_regenerates() {
        let (il, index, rhs) = single_assignment(Opcode::And);
        let mut function = Function::new("f", 0x10, il);
        let events = EventLog::new();
        let config = EngineConfig::default();
        let ctx = AnalysisContext::new(&events, &config);

        let outcome = simplifier("x^y,x&y").execute(&mut function, &ctx).unwrap();
        assert!(outcome.changed());
        let il = function.il().unwrap();
        assert_eq!(il.opcode(rhs), Some(Opcode::Xor));
        assert_eq!(il.render_instruction(index).unwrap(), "eax = r0 ^ r1");
        assert!(!il.is_ssa_stale());
        assert_eq!(events.count_kind(EventKind::ExpressionRewritten), 1);
    }

    #[test]
    fn test_load_corpus_missing_dir() {
        let config = EngineConfig::default().with_corpus_dir("/nonexistent/deobscope");
        assert!(load_corpus(&config).is_empty());
    }
}

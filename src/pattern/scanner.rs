//! Scan driver: finds pattern matches in a function and applies the rewrites.
//!
//! Scanning is read-only. Every block is visited in block order and every instruction
//! of a block in ascending index order; for each assignment, every usable pattern's
//! obfuscated tree is tried against the assignment's source expression. All matches are
//! collected first and reported sorted by pattern order, then instruction index.
//!
//! Applying runs after the scan. Each match is verified again against the current IR,
//! since an earlier rewrite in the same batch may have replaced the expression it
//! points at, and is then handed to the [`Rewriter`]. A rewrite either fully happens or
//! leaves the IR untouched.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use deobscope::events::EventLog;
//! use deobscope::il::{Function, IlFunction, Opcode};
//! use deobscope::pattern::{PatternCorpus, Scanner};
//!
//! let mut corpus = PatternCorpus::new();
//! corpus.load_from_source("a*b,a+b\n", None);
//!
//! let mut il = IlFunction::new();
//! let (eax, r0, r1) = (il.add_variable("eax"), il.add_variable("r0"), il.add_variable("r1"));
//! let (a, b) = (il.var(r0, 4), il.var(r1, 4));
//! let sum = il.binary(Opcode::Add, 4, a, b);
//! il.var_init(eax, sum);
//! let mut function = Function::new("sub_1000", 0x1000, il);
//!
//! let scanner = Scanner::new(Arc::new(corpus));
//! let report = scanner.simplify(&mut function, &EventLog::new());
//!
//! assert_eq!(report.rewritten, 1);
//! assert_eq!(function.il().unwrap().render_instruction(0).as_deref(), Some("eax = r0 * r1"));
//! ```

use std::sync::Arc;

use crate::{
    config::EngineConfig,
    events::{EventKind, EventLog},
    il::{ExprId, Function, IlFunction},
    pattern::{
        BindingMode, Bindings, PatternCorpus, PatternMatcher, RewriteOutcome, RewriteStrategy,
        Rewriter,
    },
};

/// One match found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Index of the pattern in the corpus.
    pub pattern_index: usize,
    /// The pattern's label (its obfuscated form).
    pub label: String,
    /// Index of the matched instruction in the function.
    pub instruction_index: usize,
    /// The matched source expression of that instruction.
    pub expr: ExprId,
    /// Variable captures of the match.
    pub bindings: Bindings,
}

/// Counters of one simplify run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimplifyReport {
    /// Matches found by the scan.
    pub matched: usize,
    /// Matches that were rewritten.
    pub rewritten: usize,
    /// Matches the rewriter declined.
    pub declined: usize,
    /// Matches invalidated by an earlier rewrite of the same batch.
    pub stale: usize,
}

impl SimplifyReport {
    /// Adds another report's counters to this one.
    pub fn absorb(&mut self, other: SimplifyReport) {
        self.matched += other.matched;
        self.rewritten += other.rewritten;
        self.declined += other.declined;
        self.stale += other.stale;
    }
}

/// Matches a shared pattern corpus against functions and rewrites what it finds.
///
/// The corpus is shared read-only, so one scanner (or clones of it) can serve many
/// worker threads, each working on its own function.
#[derive(Debug, Clone)]
pub struct Scanner {
    corpus: Arc<PatternCorpus>,
    matcher: PatternMatcher,
    rewriter: Rewriter,
    max_instructions: Option<usize>,
    max_patterns: Option<usize>,
}

impl Scanner {
    /// Creates a scanner with independent wildcards and principal-operand rewriting.
    #[must_use]
    pub fn new(corpus: Arc<PatternCorpus>) -> Self {
        Self {
            corpus,
            matcher: PatternMatcher::default(),
            rewriter: Rewriter::default(),
            max_instructions: None,
            max_patterns: None,
        }
    }

    /// Creates a scanner with the matching, rewriting and limit settings of `config`.
    #[must_use]
    pub fn from_config(corpus: Arc<PatternCorpus>, config: &EngineConfig) -> Self {
        Self::new(corpus)
            .with_binding_mode(config.binding_mode)
            .with_strategy(config.rewrite_strategy)
            .with_limits(config.max_instructions, config.max_patterns)
    }

    /// Sets how repeated pattern variables bind.
    #[must_use]
    pub fn with_binding_mode(mut self, mode: BindingMode) -> Self {
        self.matcher = PatternMatcher::new(mode);
        self
    }

    /// Sets how replacement expressions are built.
    #[must_use]
    pub fn with_strategy(mut self, strategy: RewriteStrategy) -> Self {
        self.rewriter = Rewriter::new(strategy);
        self
    }

    /// Caps the candidate instructions and the patterns tried per scan.
    #[must_use]
    pub fn with_limits(mut self, instructions: Option<usize>, patterns: Option<usize>) -> Self {
        self.max_instructions = instructions;
        self.max_patterns = patterns;
        self
    }

    /// The corpus being matched.
    #[must_use]
    pub fn corpus(&self) -> &PatternCorpus {
        &self.corpus
    }

    /// Finds every match in a function body.
    ///
    /// Matches are ordered by pattern index, then instruction index.
    #[must_use]
    pub fn scan(&self, il: &IlFunction) -> Vec<PatternMatch> {
        let pattern_limit = self.max_patterns.unwrap_or(usize::MAX);
        let patterns: Vec<_> = self
            .corpus
            .iter()
            .enumerate()
            .take(pattern_limit)
            .filter(|(_, p)| p.simplified_tree().is_some())
            .filter_map(|(index, p)| p.obfuscated_tree().map(|tree| (index, p, tree)))
            .collect();
        if patterns.is_empty() {
            return Vec::new();
        }

        let mut budget = self.max_instructions.unwrap_or(usize::MAX);
        let mut found = Vec::new();
        'blocks: for block in il.blocks() {
            for index in block.range() {
                let Some((_, rhs)) = il.assignment(index) else {
                    continue;
                };
                if budget == 0 {
                    log::debug!("Instruction limit reached at instruction {index}");
                    break 'blocks;
                }
                budget -= 1;

                for &(pattern_index, pattern, tree) in &patterns {
                    if let Some(bindings) = self.matcher.match_with_bindings(tree, il, rhs) {
                        log::debug!("'{}' matched instruction {index}", pattern.label());
                        found.push(PatternMatch {
                            pattern_index,
                            label: pattern.label().to_string(),
                            instruction_index: index,
                            expr: rhs,
                            bindings,
                        });
                    }
                }
            }
        }

        found.sort_by_key(|m| (m.pattern_index, m.instruction_index));
        found
    }

    /// Scans a function, yielding nothing if it has no IR yet.
    #[must_use]
    pub fn scan_function(&self, function: &Function) -> Vec<PatternMatch> {
        function.il().map(|il| self.scan(il)).unwrap_or_default()
    }

    /// Rewrites previously found matches.
    ///
    /// # Arguments
    ///
    /// * `il` - The function body the matches were found in
    /// * `matches` - Output of [`scan`](Self::scan) over `il`
    /// * `events` - Log receiving one event per match and outcome
    /// * `address` - Function address attached to the events
    pub fn apply(
        &self,
        il: &mut IlFunction,
        matches: &[PatternMatch],
        events: &EventLog,
        address: u64,
    ) -> SimplifyReport {
        let mut report = SimplifyReport {
            matched: matches.len(),
            ..SimplifyReport::default()
        };

        for m in matches {
            events
                .record(EventKind::PatternMatched)
                .at(address, m.instruction_index)
                .message(format!("'{}' matched {}", m.label, il.render(m.expr)));

            let Some(pattern) = self.corpus.get(m.pattern_index) else {
                report.stale += 1;
                continue;
            };
            let (Some(obfuscated), Some(simplified)) =
                (pattern.obfuscated_tree(), pattern.simplified_tree())
            else {
                report.stale += 1;
                continue;
            };

            let current = il.assignment(m.instruction_index).map(|(_, rhs)| rhs);
            let bindings = match current {
                Some(rhs) if rhs == m.expr => {
                    self.matcher.match_with_bindings(obfuscated, il, m.expr)
                }
                _ => None,
            };
            let Some(bindings) = bindings else {
                log::debug!(
                    "Skipping stale match of '{}' at instruction {}",
                    m.label,
                    m.instruction_index
                );
                report.stale += 1;
                continue;
            };

            let before = il.render(m.expr);
            match self.rewriter.rewrite(il, m.expr, simplified, &bindings) {
                RewriteOutcome::Replaced { .. } => {
                    report.rewritten += 1;
                    events
                        .record(EventKind::ExpressionRewritten)
                        .at(address, m.instruction_index)
                        .message(format!("{before} -> {}", il.render(m.expr)));
                }
                RewriteOutcome::Declined(reason) => {
                    log::warn!(
                        "Declined '{}' at instruction {}: {reason}",
                        pattern.simplified(),
                        m.instruction_index
                    );
                    report.declined += 1;
                    events
                        .record(EventKind::RewriteDeclined)
                        .at(address, m.instruction_index)
                        .message(format!("'{}': {reason}", pattern.simplified()));
                }
            }
        }
        report
    }

    /// Scans a function and rewrites every match.
    ///
    /// A function without IR yields an empty report.
    pub fn simplify(&self, function: &mut Function, events: &EventLog) -> SimplifyReport {
        let address = function.address();
        let Some(il) = function.il_mut() else {
            return SimplifyReport::default();
        };
        let matches = self.scan(il);
        self.apply(il, &matches, events, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        il::{IlView, Opcode},
        test::single_assignment,
    };

    fn scanner(source: &str) -> Scanner {
        let mut corpus = PatternCorpus::new();
        corpus.load_from_source(source, None);
        Scanner::new(Arc::new(corpus))
    }

    #[test]
    fn test_scan_orders_by_pattern_then_instruction() {
        let mut il = IlFunction::new();
        let (t, x, y) = (il.add_variable("t"), il.add_variable("x"), il.add_variable("y"));
        for opcode in [Opcode::Add, Opcode::And, Opcode::Add] {
            let (a, b) = (il.var(x, 4), il.var(y, 4));
            let rhs = il.binary(opcode, 4, a, b);
            il.set_var(t, rhs);
        }

        let scanner = scanner("a^b,a&b\na*b,a+b\n");
        let found: Vec<_> = scanner
            .scan(&il)
            .iter()
            .map(|m| (m.pattern_index, m.instruction_index))
            .collect();
        assert_eq!(found, [(0, 1), (1, 0), (1, 2)]);
    }

    #[test]
    fn test_only_assignments_are_candidates() {
        let mut il = IlFunction::new();
        let x = il.add_variable("x");
        let (a, b) = (il.var(x, 4), il.var(x, 4));
        let sum = il.binary(Opcode::Add, 4, a, b);
        il.ret(Some(sum));

        assert!(scanner("a*b,a+b").scan(&il).is_empty());
    }

    #[test]
    fn test_unusable_patterns_are_skipped() {
        let (il, _, _) = single_assignment(Opcode::Add);
        let scanner = scanner("(,a+b\na*b,a+b\n");
        let found = scanner.scan(&il);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pattern_index, 1);
        assert_eq!(found[0].label, "a+b");
    }

    #[test]
    fn test_limits() {
        let mut il = IlFunction::new();
        let (t, x) = (il.add_variable("t"), il.add_variable("x"));
        for _ in 0..4 {
            let (a, b) = (il.var(x, 4), il.var(x, 4));
            let rhs = il.binary(Opcode::Add, 4, a, b);
            il.set_var(t, rhs);
        }

        let base = scanner("a*b,a+b\na-b,a+b\n");
        assert_eq!(base.scan(&il).len(), 8);
        assert_eq!(base.clone().with_limits(Some(3), None).scan(&il).len(), 6);
        assert_eq!(base.clone().with_limits(None, Some(1)).scan(&il).len(), 4);
        assert!(base.with_limits(Some(0), None).scan(&il).is_empty());
    }

    #[test]
    fn test_second_match_on_same_instruction_is_stale() {
        let (il, index, rhs) = single_assignment(Opcode::Add);
        let mut function = Function::new("f", 0x40, il);
        let events = EventLog::new();

        let report = scanner("a*b,a+b\na-b,a+b\n").simplify(&mut function, &events);
        assert_eq!(report.matched, 2);
        assert_eq!(report.rewritten, 1);
        assert_eq!(report.stale, 1);

        let il = function.il().unwrap();
        assert_eq!(il.opcode(rhs), Some(Opcode::Mul));
        assert_eq!(il.render_instruction(index).unwrap(), "eax = r0 * r1");
        assert_eq!(events.count_kind(EventKind::PatternMatched), 2);
        assert_eq!(events.count_kind(EventKind::ExpressionRewritten), 1);
    }

    #[test]
    fn test_declined_rewrite_is_reported() {
        let (il, _, rhs) = single_assignment(Opcode::Add);
        let mut function = Function::new("f", 0x40, il);
        let events = EventLog::new();

        let report = scanner("c,a+b\n").simplify(&mut function, &events);
        assert_eq!(report.declined, 1);
        assert_eq!(report.rewritten, 0);
        assert_eq!(function.il().unwrap().opcode(rhs), Some(Opcode::Add));
        assert!(events.has(EventKind::RewriteDeclined));
    }

    #[test]
    fn test_unlifted_function_is_empty() {
        let scanner = scanner("a*b,a+b");
        let mut function = Function::unlifted("stub", 0);
        assert!(scanner.scan_function(&function).is_empty());
        assert_eq!(
            scanner.simplify(&mut function, &EventLog::new()),
            SimplifyReport::default()
        );
    }
}

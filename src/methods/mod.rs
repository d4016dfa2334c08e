//! Deobfuscation methods and the registry that runs them.
//!
//! The set of methods is fixed: [`Method`] is a closed enum with one variant per
//! [`MethodKind`], and [`Deobfuscator`] holds at most one method of each kind.
//!
//! | Kind                    | Category   | Effect                                    |
//! |-------------------------|------------|-------------------------------------------|
//! | `MbaSimplifier`         | Workflow   | rewrites matched MBA expressions          |
//! | `OpaquePredicateSolver` | Function   | turns constant branches into jumps        |
//! | `CffDetection`          | Function   | reports flattening and dispatcher variable|
//!
//! # Parallelism
//!
//! [`Deobfuscator::run_all`] processes functions on the rayon thread pool. Each worker
//! owns exactly one function's IR; the pattern corpus is shared read-only behind an
//! [`Arc`]; events go to one thread-safe [`EventLog`]. Per-function results are gathered
//! in a [`DashMap`] and returned in input order.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use deobscope::config::EngineConfig;
//! use deobscope::il::{Function, IlFunction, Opcode};
//! use deobscope::methods::{Deobfuscator, MethodKind};
//! use deobscope::pattern::PatternCorpus;
//!
//! let mut corpus = PatternCorpus::new();
//! corpus.load_from_source("x^y,x&y\n", None);
//!
//! let mut deobfuscator = Deobfuscator::new(EngineConfig::default());
//! deobfuscator.register_all(Arc::new(corpus));
//! assert_eq!(deobfuscator.methods().len(), 3);
//!
//! let mut il = IlFunction::new();
//! let (t, a, b) = (il.add_variable("t"), il.add_variable("a"), il.add_variable("b"));
//! let (x, y) = (il.var(a, 4), il.var(b, 4));
//! let and = il.binary(Opcode::And, 4, x, y);
//! il.var_init(t, and);
//!
//! let mut functions = vec![Function::new("f", 0x1000, il)];
//! let report = deobfuscator.run_all(&mut functions);
//! assert_eq!(report.changed_functions(), 1);
//! assert_eq!(functions[0].il().unwrap().render_instruction(0).as_deref(), Some("t = a ^ b"));
//! ```

pub mod cff;
mod context;
pub mod mba;
pub mod predicates;

pub use cff::{CffDetection, CffReport};
pub use context::AnalysisContext;
pub use mba::MbaSimplifier;
pub use predicates::{PredicateReport, PredicateSolver};

use std::{
    fmt,
    sync::{atomic::AtomicBool, Arc},
};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    config::EngineConfig,
    events::{EventKind, EventLog},
    il::Function,
    pattern::{PatternCorpus, SimplifyReport},
    Error, Result,
};

/// Identity of a built-in method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MethodKind {
    /// Pattern-based MBA expression rewriting.
    MbaSimplifier,
    /// Constant branch patching.
    OpaquePredicateSolver,
    /// Control-flow flattening detection.
    CffDetection,
}

impl MethodKind {
    /// Short name used in logs and events.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MbaSimplifier => "mba-simplifier",
            Self::OpaquePredicateSolver => "opaque-predicate-solver",
            Self::CffDetection => "cff-detection",
        }
    }

    /// One-line description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::MbaSimplifier => "Reduce complex operations",
            Self::OpaquePredicateSolver => "Repeatedly patch opaque predicates until none remain",
            Self::CffDetection => "Measure control-flow flattening and find the dispatcher",
        }
    }

    /// Where the method hooks in.
    #[must_use]
    pub fn category(self) -> MethodCategory {
        match self {
            Self::MbaSimplifier => MethodCategory::Workflow,
            Self::OpaquePredicateSolver | Self::CffDetection => MethodCategory::Function,
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a method hooks into the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodCategory {
    /// Runs as part of the automatic per-function workflow.
    Workflow,
    /// Runs on an explicitly selected function.
    Function,
}

/// What a method did to one function.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutcome {
    /// The function had no IR; nothing was done.
    Skipped,
    /// MBA simplifier counters.
    Simplified(SimplifyReport),
    /// Predicate solver counters.
    Predicates(PredicateReport),
    /// Flattening measurements.
    Flattening(CffReport),
}

impl MethodOutcome {
    /// Returns true if the function's IR was modified.
    #[must_use]
    pub fn changed(&self) -> bool {
        match self {
            Self::Simplified(report) => report.rewritten > 0,
            Self::Predicates(report) => report.patched > 0,
            Self::Skipped | Self::Flattening(_) => false,
        }
    }
}

/// A registered method with its state.
#[derive(Debug, Clone)]
pub enum Method {
    /// See [`MbaSimplifier`].
    MbaSimplifier(MbaSimplifier),
    /// See [`PredicateSolver`].
    OpaquePredicateSolver(PredicateSolver),
    /// See [`CffDetection`].
    CffDetection(CffDetection),
}

impl Method {
    /// The method's identity.
    #[must_use]
    pub fn kind(&self) -> MethodKind {
        match self {
            Self::MbaSimplifier(_) => MethodKind::MbaSimplifier,
            Self::OpaquePredicateSolver(_) => MethodKind::OpaquePredicateSolver,
            Self::CffDetection(_) => MethodKind::CffDetection,
        }
    }

    /// Short name used in logs and events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// One-line description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        self.kind().description()
    }

    /// Where the method hooks in.
    #[must_use]
    pub fn category(&self) -> MethodCategory {
        self.kind().category()
    }

    /// All built-in methods are enabled unless the configuration turns them off.
    #[must_use]
    pub fn is_enabled_by_default(&self) -> bool {
        true
    }

    /// Runs the method on one function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the context is cancelled, or an IR error a
    /// method could not recover from.
    pub fn execute(&self, function: &mut Function, ctx: &AnalysisContext) -> Result<MethodOutcome> {
        match self {
            Self::MbaSimplifier(m) => m.execute(function, ctx),
            Self::OpaquePredicateSolver(m) => m.execute(function, ctx),
            Self::CffDetection(m) => m.execute(function, ctx),
        }
    }
}

/// Results of all methods on one function.
#[derive(Debug, Clone)]
pub struct FunctionSummary {
    /// Function name.
    pub name: String,
    /// Function address.
    pub address: u64,
    /// Outcome of each method that ran, in run order.
    pub outcomes: Vec<(MethodKind, MethodOutcome)>,
    /// Last error a method reported on this function.
    pub error: Option<String>,
}

impl FunctionSummary {
    /// Returns true if any method modified the function.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.changed())
    }

    /// Outcome of one method, if it ran.
    #[must_use]
    pub fn outcome(&self, kind: MethodKind) -> Option<&MethodOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }
}

/// Results of [`Deobfuscator::run_all`].
#[derive(Debug)]
pub struct RunReport {
    /// One summary per input function, in input order.
    pub functions: Vec<FunctionSummary>,
    /// Every event recorded during the run.
    pub events: EventLog,
}

impl RunReport {
    /// Number of functions any method modified.
    #[must_use]
    pub fn changed_functions(&self) -> usize {
        self.functions.iter().filter(|f| f.changed()).count()
    }

    /// Number of functions whose run ended in an error.
    #[must_use]
    pub fn failed_functions(&self) -> usize {
        self.functions.iter().filter(|f| f.error.is_some()).count()
    }
}

/// Registry and driver of the deobfuscation methods.
pub struct Deobfuscator {
    config: EngineConfig,
    methods: Vec<Method>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Deobfuscator {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            methods: Vec::new(),
            cancel: None,
        }
    }

    /// Attaches a cancellation flag checked by long-running methods.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// The configuration methods are built and run with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a method.
    ///
    /// Returns false, leaving the registry unchanged, if a method of the same kind is
    /// already registered.
    pub fn register(&mut self, method: Method) -> bool {
        if self.methods.iter().any(|m| m.kind() == method.kind()) {
            log::warn!("Method {} is already registered", method.name());
            return false;
        }
        log::info!("Registered deobfuscation method: {}", method.name());
        self.methods.push(method);
        true
    }

    /// Registers every built-in method, in run order.
    ///
    /// Returns how many were newly registered.
    pub fn register_all(&mut self, corpus: Arc<PatternCorpus>) -> usize {
        let builtins = [
            Method::MbaSimplifier(MbaSimplifier::new(corpus, &self.config)),
            Method::OpaquePredicateSolver(PredicateSolver::new(self.config.predicate_max_passes)),
            Method::CffDetection(CffDetection::new(self.config.flattening_threshold)),
        ];
        builtins
            .into_iter()
            .map(|method| self.register(method))
            .filter(|&added| added)
            .count()
    }

    /// Registered methods, in registration order.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Registered methods of one category.
    pub fn methods_by_category(&self, category: MethodCategory) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(move |m| m.category() == category)
    }

    /// Returns the registered method of a kind.
    #[must_use]
    pub fn method(&self, kind: MethodKind) -> Option<&Method> {
        self.methods.iter().find(|m| m.kind() == kind)
    }

    fn is_enabled(&self, method: &Method) -> bool {
        method.is_enabled_by_default()
            && match method.kind() {
                MethodKind::MbaSimplifier => self.config.enable_mba,
                MethodKind::OpaquePredicateSolver => self.config.enable_predicate_solver,
                MethodKind::CffDetection => self.config.enable_cff_detection,
            }
    }

    fn context<'a>(&'a self, events: &'a EventLog) -> AnalysisContext<'a> {
        let ctx = AnalysisContext::new(events, &self.config);
        match &self.cancel {
            Some(flag) => ctx.with_cancel_flag(Arc::clone(flag)),
            None => ctx,
        }
    }

    /// Runs every enabled method on one function.
    ///
    /// A method error other than cancellation is recorded as an event and the remaining
    /// methods still run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the run was cancelled.
    pub fn run(&self, function: &mut Function, events: &EventLog) -> Result<FunctionSummary> {
        let ctx = self.context(events);
        let mut summary = FunctionSummary {
            name: function.name().to_string(),
            address: function.address(),
            outcomes: Vec::new(),
            error: None,
        };

        for method in self.methods.iter().filter(|m| self.is_enabled(m)) {
            events
                .record(EventKind::MethodStarted)
                .function(summary.address)
                .method(method.name());

            match method.execute(function, &ctx) {
                Ok(outcome) => {
                    events
                        .record(EventKind::MethodCompleted)
                        .function(summary.address)
                        .method(method.name());
                    summary.outcomes.push((method.kind(), outcome));
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) => {
                    log::warn!("{} failed on {}: {error}", method.name(), summary.name);
                    events
                        .record(EventKind::Error)
                        .function(summary.address)
                        .method(method.name())
                        .message(error.to_string());
                    summary.error = Some(error.to_string());
                }
            }
        }
        Ok(summary)
    }

    /// Runs every enabled method on every function.
    ///
    /// Functions are processed in parallel unless [`EngineConfig::parallel`] is off. A
    /// function whose run was cancelled carries the error in its summary.
    pub fn run_all(&self, functions: &mut [Function]) -> RunReport {
        let events = EventLog::new();
        let results: DashMap<usize, FunctionSummary> = DashMap::new();

        let process = |(index, function): (usize, &mut Function)| {
            let summary = match self.run(function, &events) {
                Ok(summary) => summary,
                Err(error) => FunctionSummary {
                    name: function.name().to_string(),
                    address: function.address(),
                    outcomes: Vec::new(),
                    error: Some(error.to_string()),
                },
            };
            results.insert(index, summary);
        };

        if self.config.parallel {
            functions.par_iter_mut().enumerate().for_each(process);
        } else {
            functions.iter_mut().enumerate().for_each(process);
        }

        let mut ordered: Vec<(usize, FunctionSummary)> = results.into_iter().collect();
        ordered.sort_by_key(|(index, _)| *index);
        let report = RunReport {
            functions: ordered.into_iter().map(|(_, summary)| summary).collect(),
            events,
        };
        log::info!(
            "Processed {} function(s): {}",
            report.functions.len(),
            report.events.summary()
        );
        report
    }
}

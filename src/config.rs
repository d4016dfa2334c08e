//! Configuration for the deobfuscation methods.
//!
//! This module provides [`EngineConfig`], which controls where patterns are loaded from,
//! how they are matched and rewritten, scan limits, and the thresholds of the
//! control-flow analyses.

use std::path::PathBuf;

pub use crate::pattern::{BindingMode, RewriteStrategy};

/// Configuration for the deobfuscation engine.
///
/// # Examples
///
/// ```rust
/// use deobscope::config::{BindingMode, EngineConfig};
///
/// let config = EngineConfig::default()
///     .with_corpus_dir("patterns")
///     .with_binding_mode(BindingMode::Consistent)
///     .with_parallel(false);
///
/// assert_eq!(config.predicate_max_passes, 20);
/// assert!(!config.parallel);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory (or single file) the pattern corpus is loaded from (default: `resources`).
    pub corpus_dir: PathBuf,

    /// Compile every pattern tree right after loading (default: true).
    ///
    /// When disabled, each side is compiled the first time a scan needs it.
    pub eager_compile: bool,

    /// How repeated pattern variables bind (default: independent wildcards).
    pub binding_mode: BindingMode,

    /// How replacement expressions are built (default: principal operands).
    pub rewrite_strategy: RewriteStrategy,

    /// Maximum candidate instructions examined per scan.
    pub max_instructions: Option<usize>,

    /// Maximum patterns tried per scan, counted from the start of the corpus.
    pub max_patterns: Option<usize>,

    /// Maximum passes of the opaque predicate solver (default: 20).
    pub predicate_max_passes: usize,

    /// Flattening score at or above which a function is reported as flattened (default: 0.5).
    pub flattening_threshold: f64,

    /// Process functions in parallel (default: true).
    pub parallel: bool,

    /// Enable the MBA simplifier.
    pub enable_mba: bool,

    /// Enable control-flow flattening detection.
    pub enable_cff_detection: bool,

    /// Enable the opaque predicate solver.
    pub enable_predicate_solver: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("resources"),
            eager_compile: true,
            binding_mode: BindingMode::Independent,
            rewrite_strategy: RewriteStrategy::PrincipalOperands,
            max_instructions: None,
            max_patterns: None,
            predicate_max_passes: 20,
            flattening_threshold: 0.5,
            parallel: true,
            enable_mba: true,
            enable_cff_detection: true,
            enable_predicate_solver: true,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the corpus location.
    #[must_use]
    pub fn with_corpus_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_dir = path.into();
        self
    }

    /// Enables or disables eager compilation of pattern trees.
    #[must_use]
    pub fn with_eager_compile(mut self, eager: bool) -> Self {
        self.eager_compile = eager;
        self
    }

    /// Sets the wildcard binding mode.
    #[must_use]
    pub fn with_binding_mode(mut self, mode: BindingMode) -> Self {
        self.binding_mode = mode;
        self
    }

    /// Sets the rewrite strategy.
    #[must_use]
    pub fn with_rewrite_strategy(mut self, strategy: RewriteStrategy) -> Self {
        self.rewrite_strategy = strategy;
        self
    }

    /// Sets the per-scan limits.
    ///
    /// # Arguments
    ///
    /// * `instructions` - Maximum candidate instructions, `None` for no limit
    /// * `patterns` - Maximum patterns, `None` for no limit
    #[must_use]
    pub fn with_scan_limits(mut self, instructions: Option<usize>, patterns: Option<usize>) -> Self {
        self.max_instructions = instructions;
        self.max_patterns = patterns;
        self
    }

    /// Sets the maximum number of predicate solver passes.
    #[must_use]
    pub fn with_predicate_max_passes(mut self, passes: usize) -> Self {
        self.predicate_max_passes = passes;
        self
    }

    /// Sets the flattening score threshold.
    #[must_use]
    pub fn with_flattening_threshold(mut self, threshold: f64) -> Self {
        self.flattening_threshold = threshold;
        self
    }

    /// Enables or disables parallel processing across functions.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enables or disables the built-in methods.
    #[must_use]
    pub fn with_methods(mut self, mba: bool, cff: bool, predicates: bool) -> Self {
        self.enable_mba = mba;
        self.enable_cff_detection = cff;
        self.enable_predicate_solver = predicates;
        self
    }
}

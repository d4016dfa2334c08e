use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// deobscope - MBA pattern simplification and obfuscation analysis
#[derive(Debug, Parser)]
#[command(name = "deobscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the token sequence of a pattern expression.
    Tokens {
        /// Expression to tokenize, e.g. "(a|b)+(a&b)".
        #[arg(value_name = "EXPR")]
        expression: String,
    },

    /// Parse a pattern expression and print its tree.
    Parse {
        /// Expression to parse.
        #[arg(value_name = "EXPR")]
        expression: String,
    },

    /// Load a pattern corpus and report what was accepted.
    Corpus {
        /// Corpus file or directory (directories are searched for mba-dataset*.csv).
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// List every loaded pattern.
        #[arg(long)]
        list: bool,
    },

    /// Generate a linear MBA dataset the corpus loader picks up.
    Generate {
        /// Directory the mba-dataset-<VARS>-<TERMS>.csv file is written into.
        #[arg(value_name = "DIR", default_value = "resources")]
        dir: PathBuf,

        /// Number of variables (2 or 3).
        #[arg(long, default_value_t = 2)]
        variables: usize,

        /// Basis expressions combined per identity.
        #[arg(long, default_value_t = 4)]
        terms: usize,

        /// Stop after this many identities.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Simplify expressions against a corpus.
    Simplify {
        /// Corpus file or directory.
        #[arg(short, long, value_name = "PATH", default_value = "resources")]
        corpus: PathBuf,

        /// Expressions to simplify; each becomes `tN = EXPR`.
        #[arg(value_name = "EXPR", required = true)]
        expressions: Vec<String>,

        /// Operand width in bytes.
        #[arg(long, default_value_t = 4)]
        width: usize,

        /// Require repeated pattern variables to bind the same IR variable.
        #[arg(long)]
        consistent: bool,

        /// Rewrite with the full simplified tree instead of the root operator only.
        #[arg(long)]
        template: bool,
    },
}

//! Pattern-based simplification of mixed boolean-arithmetic expressions.
//!
//! A pattern pairs an obfuscated expression with the simpler expression it computes,
//! both written in a small infix language:
//!
//! ```text
//! a+b,(a|b)+(a&b)
//! ```
//!
//! The pipeline runs in fixed stages:
//!
//! 1. [`PatternCorpus`] loads pattern lines from files or directories
//! 2. [`tokenize`] and [`parse`] compile each side into an [`ExprNode`] tree
//! 3. [`Scanner::scan`] walks a function's assignments and asks the [`PatternMatcher`]
//!    whether an obfuscated tree matches each source expression
//! 4. [`Scanner::apply`] hands every confirmed match to the [`Rewriter`]
//!
//! Corpus files can be produced with [`generate::MbaGenerator`], which enumerates linear
//! MBA identities in the loader's `simplified,obfuscated` column order.
//!
//! Variable names in a pattern are wildcards that match IR variable reads; digit-only
//! operands are constants that must match exactly.
//!
//! # Examples
//!
//! ```rust
//! use deobscope::pattern::{parse_expression, tokenize};
//!
//! assert_eq!(tokenize("(a|b)+(a&b)").len(), 11);
//! let tree = parse_expression("(a|b)+(a&b)").unwrap();
//! assert_eq!(tree.to_string(), "(a | b) + (a & b)");
//! ```

pub mod generate;
pub mod lower;
pub mod symbols;

mod corpus;
mod matcher;
mod parser;
mod rewriter;
mod scanner;
mod token;

pub use corpus::{LoadStats, Pattern, PatternCorpus, DATASET_EXTENSION, DATASET_MARKER};
pub use matcher::{matches, Binding, BindingMode, Bindings, PatternMatcher};
pub use parser::{parse, parse_expression, ExprNode};
pub use rewriter::{DeclineReason, RewriteOutcome, RewriteStrategy, Rewriter};
pub use scanner::{PatternMatch, Scanner, SimplifyReport};
pub use token::{tokenize, Token, TokenKind, Tokenizer};

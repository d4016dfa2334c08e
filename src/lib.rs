// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # deobscope
//!
//! Pattern-driven simplification of mixed boolean-arithmetic (MBA) expressions in a
//! function's instruction IR, together with two sibling analyses for common
//! obfuscation idioms: control-flow flattening detection and opaque predicate solving.
//!
//! ## Features
//!
//! - **Pattern language** - infix expressions over wildcards and constants with a fixed
//!   operator table, tokenized longest-match-first and parsed by precedence climbing
//! - **Structural matching** - obfuscated pattern trees matched against IR expressions,
//!   with independent (default) or consistent variable bindings
//! - **Fail-closed rewriting** - every substitution either fully happens or leaves the IR
//!   untouched
//! - **IR independence** - the engine only talks to the IR through [`il::IlView`] and
//!   [`il::IlRewrite`]; [`il::IlFunction`] is the bundled arena implementation
//! - **Parallel runs** - functions are processed concurrently over one shared, read-only
//!   corpus
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use deobscope::prelude::*;
//!
//! // simplified,obfuscated
//! let mut corpus = PatternCorpus::new();
//! corpus.load_from_source("x^y,x&y\n", None);
//! let scanner = Scanner::new(Arc::new(corpus));
//!
//! // t = rA & rB
//! let mut il = IlFunction::new();
//! let (t, a, b) = (il.add_variable("t"), il.add_variable("rA"), il.add_variable("rB"));
//! let (x, y) = (il.var(a, 4), il.var(b, 4));
//! let and = il.binary(Opcode::And, 4, x, y);
//! il.var_init(t, and);
//!
//! let mut function = Function::new("sub_401000", 0x401000, il);
//! let events = EventLog::new();
//! let report = scanner.simplify(&mut function, &events);
//!
//! assert_eq!(report.rewritten, 1);
//! assert_eq!(function.il().unwrap().render_instruction(0).as_deref(), Some("t = rA ^ rB"));
//! ```
//!
//! ## Architecture
//!
//! - [`pattern`] - corpus loading, tokenizer, parser, matcher, rewriter and scan driver
//! - [`il`] - the IR surfaces, the arena IR, constant evaluation and printing
//! - [`methods`] - the method registry plus the MBA, CFF and predicate methods
//! - [`utils::graph`] - graph traits and dominator trees
//! - [`events`] - structured, thread-safe event log
//! - [`config`] - engine configuration
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Error Handling
//!
//! Most of the engine reports failure through sentinel values (`None`, `false`, empty
//! results) and logs a diagnostic through the `log` facade. [`Error`] is returned where
//! an operation cannot proceed at all: rejected IR mutations, analyses on functions
//! without IR or variables, cancellation and I/O.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use deobscope::prelude::*;
///
/// let tree = parse_expression("a+b*c").unwrap();
/// assert_eq!(tree.opcode(), Some(Opcode::Add));
/// ```
pub mod prelude;

pub mod config;
pub mod events;
pub mod il;
pub mod methods;
pub mod pattern;
pub mod utils;

/// `deobscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
///
/// # Examples
///
/// ```rust
/// use deobscope::{il::Function, methods::cff, Result};
///
/// fn dispatcher_name(function: &Function) -> Result<String> {
///     let var = cff::most_assigned_variable(function)?;
///     Ok(var.to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `deobscope` Error type
///
/// The main error type for all fallible operations in this crate.
pub use error::Error;

//! # deobscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types of the
//! deobscope library. Import it to get the pattern engine, the IR and the method registry
//! in one line.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all deobscope operations
pub use crate::Error;

/// The result type used throughout deobscope
pub use crate::Result;

/// Engine configuration
pub use crate::config::{BindingMode, EngineConfig, RewriteStrategy};

/// Structured event log
pub use crate::events::{Event, EventKind, EventLog};

// ================================================================================================
// Instruction IR
// ================================================================================================

/// IR surfaces and the arena implementation
pub use crate::il::{
    ExprId, Function, IlFunction, IlRewrite, IlView, Opcode, Operand, OperandKind, VarId,
};

// ================================================================================================
// Pattern Engine
// ================================================================================================

/// Tokenizer and parser
pub use crate::pattern::{parse, parse_expression, tokenize, ExprNode, Token, TokenKind};

/// Corpus, matching and rewriting
pub use crate::pattern::{
    Pattern, PatternCorpus, PatternMatch, PatternMatcher, Rewriter, Scanner, SimplifyReport,
};

// ================================================================================================
// Methods
// ================================================================================================

/// Method registry
pub use crate::methods::{Deobfuscator, Method, MethodCategory, MethodKind, MethodOutcome};

//! Instruction IR consumed by the pattern engine and the analysis methods.
//!
//! The engine itself only talks to the IR through two traits:
//!
//! - [`IlView`] - read-only queries (`opcode`, `width`, `operand_count`, `operand_at`)
//! - [`IlRewrite`] - the single mutation performed by the rewriter (`add_expression`
//!   followed by `replace_expression`)
//!
//! [`IlFunction`] is the in-crate implementation: an expression arena with basic blocks
//! and named variables. [`Function`] pairs it with the identity of the function it
//! belongs to and models functions that have not been lifted yet.
//!
//! # Key Components
//!
//! - [`Opcode`] - Operation tags, named after the high-level IL they mirror
//! - [`Operand`] / [`OperandKind`] - Operand slots and their classification
//! - [`eval`] - Constant evaluation for branch conditions
//! - [`printer`] - Infix and tree rendering

pub mod eval;
mod function;
mod opcode;
mod operand;
pub mod printer;
mod traits;

pub use function::{IlBlock, IlExpr, IlFunction, IlVariable};
pub use opcode::Opcode;
pub use operand::{ExprId, Operand, OperandKind, VarId};
pub use traits::{IlRewrite, IlView};

/// A function known to the analysis, lifted or not.
///
/// # Examples
///
/// ```rust
/// use deobscope::il::{Function, IlFunction};
///
/// let pending = Function::unlifted("sub_401000", 0x401000);
/// assert!(!pending.is_lifted());
///
/// let lifted = Function::new("sub_402000", 0x402000, IlFunction::new());
/// assert!(lifted.il().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    address: u64,
    il: Option<IlFunction>,
}

impl Function {
    /// Creates a lifted function.
    #[must_use]
    pub fn new(name: impl Into<String>, address: u64, il: IlFunction) -> Self {
        Self {
            name: name.into(),
            address,
            il: Some(il),
        }
    }

    /// Creates a function whose IR is not available yet.
    #[must_use]
    pub fn unlifted(name: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            address,
            il: None,
        }
    }

    /// Name of the function.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start address of the function.
    #[must_use]
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Returns true if IR is available.
    #[must_use]
    pub fn is_lifted(&self) -> bool {
        self.il.is_some()
    }

    /// Returns the IR, if lifted.
    #[must_use]
    pub fn il(&self) -> Option<&IlFunction> {
        self.il.as_ref()
    }

    /// Returns the IR mutably, if lifted.
    pub fn il_mut(&mut self) -> Option<&mut IlFunction> {
        self.il.as_mut()
    }

    /// Attaches freshly lifted IR, returning the previous body.
    pub fn set_il(&mut self, il: IlFunction) -> Option<IlFunction> {
        self.il.replace(il)
    }
}

use thiserror::Error;

use crate::il::ExprId;

macro_rules! malformed_error {
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most of the pattern engine reports failure through sentinel values instead of errors: the
/// tokenizer skips what it does not understand, the parser hands back `None`, the matcher
/// answers `false` and the loader answers `false`. This enum covers the remaining conditions,
/// namely IR mutations that cannot be honoured, analyses that cannot run at all, and I/O.
///
/// # Error Categories
///
/// ## Pattern Errors
/// - [`Error::Parse`] - An expression could not be parsed (only from the checked `FromStr` path)
/// - [`Error::Generator`] - Identity generation was configured out of range
///
/// ## IR Errors
/// - [`Error::Malformed`] - The IR violates a structural invariant
/// - [`Error::InvalidExpression`] - An expression id does not exist in the function
/// - [`Error::NoIl`] - The function has not been lifted yet
/// - [`Error::NoVariables`] - The function has no variables to analyse
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::WalkError`] - Directory traversal errors from walkdir
///
/// ## Control Errors
/// - [`Error::Cancelled`] - The caller aborted a long-running method
///
/// # Examples
///
/// ```rust
/// use deobscope::{il::Function, methods::cff, Error};
///
/// let function = Function::unlifted("sub_401000", 0x401000);
/// match cff::most_assigned_variable(&function) {
///     Err(Error::NoIl(name)) => assert_eq!(name, "sub_401000"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The IR is damaged and could not be processed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A pattern expression could not be turned into a tree.
    #[error("Failed to parse expression '{expression}': {message}")]
    Parse {
        /// The expression text as given
        expression: String,
        /// What went wrong
        message: String,
    },

    /// An expression id does not refer to an expression of the function.
    #[error("Invalid expression id - {0}")]
    InvalidExpression(ExprId),

    /// The function has no lifted IL yet.
    #[error("No IL available for function {0}")]
    NoIl(String),

    /// The function does not define any variable.
    #[error("No variables found in function {0}")]
    NoVariables(String),

    /// Identity generation was asked for an unsupported variable or term count.
    #[error("Invalid generator settings - {0}")]
    Generator(String),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error while walking a pattern directory.
    #[error("{0}")]
    WalkError(#[from] walkdir::Error),
}

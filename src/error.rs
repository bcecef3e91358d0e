use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The kind of entity a symbol-level error refers to.
///
/// Used by [`Error::UndefinedSymbol`] and [`Error::DuplicateDefinition`] so that the
/// rendered message names what kind of thing was missing or defined twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A class, interface or value type
    Type,
    /// A method (global or member)
    Method,
    /// A field (global or member)
    Field,
    /// An event
    Event,
    /// A property
    Property,
    /// A module-level `.data` label
    DataLabel,
    /// The module entry point
    EntryPoint,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Type => write!(f, "type"),
            SymbolKind::Method => write!(f, "method"),
            SymbolKind::Field => write!(f, "field"),
            SymbolKind::Event => write!(f, "event"),
            SymbolKind::Property => write!(f, "property"),
            SymbolKind::DataLabel => write!(f, "data label"),
            SymbolKind::EntryPoint => write!(f, "entry point"),
        }
    }
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most of these errors never escape the assembler directly. While a module is being assembled,
/// failures that concern a single definition are converted into
/// [`crate::diagnostics::Diagnostic`] entries so that independent problems surface together in one
/// run. Only [`Error::AssemblyFailed`] is returned by the final entry points to signal that the
/// accumulated diagnostics contained errors.
///
/// # Error Categories
///
/// ## Symbol Errors
/// - [`Error::UndefinedSymbol`] - Referenced, never defined (reported by the final check only)
/// - [`Error::DuplicateDefinition`] - Same signature defined twice
/// - [`Error::CircularDefinition`] - A definition's resolve pass re-entered while resolving
/// - [`Error::UnknownExternal`] - Reference into an undeclared external assembly or module
/// - [`Error::InvalidReference`] - A reference that can never resolve (e.g. field on a primitive)
///
/// ## Generic Errors
/// - [`Error::GenericBinding`] - A generic parameter name that matches no parameter in scope
/// - [`Error::GenericArity`] - Instantiation argument count mismatch
///
/// ## Method Body Errors
/// - [`Error::UndefinedLabel`] - A label referenced but never defined in that body
/// - [`Error::DuplicateLabel`] - A label defined twice in one body
/// - [`Error::MalformedBody`] - A body where none is allowed, or none where one is required
/// - [`Error::InvalidMnemonic`] / [`Error::InvalidOperand`] / [`Error::InvalidBranch`] - Encoding
///
/// # Examples
///
/// ```rust
/// use cilasm::{Error, SymbolKind};
///
/// let err = Error::UndefinedSymbol {
///     kind: SymbolKind::Type,
///     name: "Foo".to_string(),
/// };
/// assert_eq!(err.to_string(), "Undefined type - Foo");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The input is structurally invalid.
    ///
    /// The error includes the source location in this crate where the problem
    /// was detected for debugging purposes.
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

    /// A symbol was referenced but has no defining occurrence.
    ///
    /// Only produced by the end-of-module undefined check; no earlier phase may
    /// assume that all definitions are known.
    #[error("Undefined {kind} - {name}")]
    UndefinedSymbol {
        /// What kind of entity was referenced
        kind: SymbolKind,
        /// The full name or signature key of the entity
        name: String,
    },

    /// The same symbol was defined twice.
    ///
    /// The first definition wins; the duplicate is reported and ignored.
    #[error("Duplicate {kind} definition - {name}")]
    DuplicateDefinition {
        /// What kind of entity was redefined
        kind: SymbolKind,
        /// The full name or signature key of the entity
        name: String,
    },

    /// A definition's resolve pass was re-entered while it was still resolving.
    ///
    /// For types this means the parent or enclosing chain reaches the type itself.
    #[error("Circular definition - {0}")]
    CircularDefinition(String),

    /// A generic parameter referenced by name is not declared in the applicable scope.
    #[error("Invalid generic parameter binding - {0}")]
    GenericBinding(String),

    /// The number of generic arguments does not match the generic definition.
    #[error("Generic arity mismatch for {name} - expected {expected}, found {found}")]
    GenericArity {
        /// The generic definition being instantiated
        name: String,
        /// The number of declared generic parameters
        expected: usize,
        /// The number of supplied generic arguments
        found: usize,
    },

    /// A label was referenced in a method body but never defined in it.
    #[error("Undefined label - {0}")]
    UndefinedLabel(String),

    /// A label was defined twice in the same method body.
    #[error("Duplicate label - {0}")]
    DuplicateLabel(String),

    /// A method body is present where none is allowed, or missing where one is required.
    #[error("Malformed method body - {0}")]
    MalformedBody(String),

    /// A reference names an external assembly or module that was never declared.
    #[error("Unknown external module - {0}")]
    UnknownExternal(String),

    /// A reference that can never be resolved, independent of definition order.
    #[error("Invalid reference - {0}")]
    InvalidReference(String),

    /// The instruction mnemonic is not a known CIL opcode.
    #[error("Invalid instruction mnemonic - {0}")]
    InvalidMnemonic(String),

    /// The operand does not match the operand kind of the instruction.
    #[error("Invalid operand for {mnemonic} - {message}")]
    InvalidOperand {
        /// The instruction mnemonic
        mnemonic: &'static str,
        /// What was wrong with the operand
        message: String,
    },

    /// A branch target is out of range for the branch form used.
    #[error("Branch target out of range for {mnemonic} - offset {offset}")]
    InvalidBranch {
        /// The instruction mnemonic
        mnemonic: &'static str,
        /// The relative offset that did not fit
        offset: i64,
    },

    /// A token was used where a different table was expected.
    #[error("Unexpected token - {0}")]
    UnexpectedToken(Token),

    /// The assembly run finished with errors; the module was not produced.
    ///
    /// The associated value is the number of error diagnostics.
    #[error("Assembly failed with {0} error(s)")]
    AssemblyFailed(usize),
}

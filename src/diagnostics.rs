//! Diagnostics collection for a module assembly run.
//!
//! The assembler never stops at the first problem. Every failure that concerns a single
//! definition, every auto-correction applied to lenient input, and every informational
//! note (for example an implicitly declared core library) is pushed into a [`Diagnostics`]
//! sink, so that independent errors surface together in one run. The run produces a module
//! only if the sink holds no error-severity entries.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Append-only container for diagnostic entries
//! - [`Diagnostic`] - Individual entry with severity, category, code and source locations
//! - [`DiagnosticSeverity`] - Severity level (Info, Warning, Error)
//! - [`DiagnosticCategory`] - What kind of entity the entry concerns
//! - [`DiagnosticCode`] - The error taxonomy of [`crate::Error`], for filtering
//! - [`Location`] - A source position supplied by the front end
//!
//! # Usage Examples
//!
//! ```rust
//! use cilasm::diagnostics::{Diagnostics, DiagnosticCategory, Location};
//! use cilasm::{Error, SymbolKind};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.warning(DiagnosticCategory::Method, "empty body completed with 'ret'");
//! diagnostics.report(
//!     DiagnosticCategory::Type,
//!     &Error::UndefinedSymbol { kind: SymbolKind::Type, name: "Foo".into() },
//!     &[Location::new(3, 5), Location::new(9, 1)],
//! );
//!
//! assert_eq!(diagnostics.error_count(), 1);
//! assert!(diagnostics.errors()[0].to_string().contains("3:5, 9:1"));
//! ```
//!
//! # Thread Safety
//!
//! [`Diagnostics`] uses `boxcar::Vec` internally, so entries can be appended through a
//! shared reference. The assembler itself is single threaded; the shared-reference API lets
//! the resolver report problems while other parts of the context are mutably borrowed.

use std::fmt::{self, Write};

use crate::Error;

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Informational message, no action needed
    Info,
    /// Input was auto-corrected; the module is still produced
    Warning,
    /// The module cannot be produced
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// Category of the entity a diagnostic concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// Type definitions and type references
    Type,
    /// Method definitions, method references and method bodies
    Method,
    /// Field definitions and field references
    Field,
    /// Events and properties
    Member,
    /// Generic parameters, constraints and instantiations
    Generic,
    /// Labels, instructions and exception regions inside a body
    Body,
    /// External assemblies and modules
    External,
    /// Custom attributes and security declarations
    Attribute,
    /// Module-level issues
    General,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Type => write!(f, "Type"),
            DiagnosticCategory::Method => write!(f, "Method"),
            DiagnosticCategory::Field => write!(f, "Field"),
            DiagnosticCategory::Member => write!(f, "Member"),
            DiagnosticCategory::Generic => write!(f, "Generic"),
            DiagnosticCategory::Body => write!(f, "Body"),
            DiagnosticCategory::External => write!(f, "External"),
            DiagnosticCategory::Attribute => write!(f, "Attribute"),
            DiagnosticCategory::General => write!(f, "General"),
        }
    }
}

/// The kind of error a diagnostic was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// [`Error::UndefinedSymbol`]
    UndefinedSymbol,
    /// [`Error::DuplicateDefinition`]
    DuplicateDefinition,
    /// [`Error::CircularDefinition`]
    CircularDefinition,
    /// [`Error::GenericBinding`] and [`Error::GenericArity`]
    GenericArityOrBinding,
    /// [`Error::UndefinedLabel`]
    UndefinedLabel,
    /// [`Error::DuplicateLabel`]
    DuplicateLabel,
    /// [`Error::MalformedBody`]
    MalformedBody,
    /// [`Error::UnknownExternal`]
    UnknownExternal,
    /// [`Error::InvalidReference`]
    InvalidReference,
    /// Instruction encoding errors
    Encoding,
    /// Anything else
    Other,
}

impl From<&Error> for DiagnosticCode {
    fn from(error: &Error) -> Self {
        match error {
            Error::UndefinedSymbol { .. } => DiagnosticCode::UndefinedSymbol,
            Error::DuplicateDefinition { .. } => DiagnosticCode::DuplicateDefinition,
            Error::CircularDefinition(_) => DiagnosticCode::CircularDefinition,
            Error::GenericBinding(_) | Error::GenericArity { .. } => {
                DiagnosticCode::GenericArityOrBinding
            }
            Error::UndefinedLabel(_) => DiagnosticCode::UndefinedLabel,
            Error::DuplicateLabel(_) => DiagnosticCode::DuplicateLabel,
            Error::MalformedBody(_) => DiagnosticCode::MalformedBody,
            Error::UnknownExternal(_) => DiagnosticCode::UnknownExternal,
            Error::InvalidReference(_) => DiagnosticCode::InvalidReference,
            Error::InvalidMnemonic(_)
            | Error::InvalidOperand { .. }
            | Error::InvalidBranch { .. } => DiagnosticCode::Encoding,
            _ => DiagnosticCode::Other,
        }
    }
}

/// A source position as reported by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Location {
    /// Source file, when the front end tracks more than one
    pub file: Option<String>,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl Location {
    /// Creates a location without a file name.
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Location {
            file: None,
            line,
            column,
        }
    }

    /// Attaches a file name.
    #[must_use]
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{file}:")?;
        }
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single diagnostic entry.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level
    pub severity: DiagnosticSeverity,
    /// What kind of entity the entry concerns
    pub category: DiagnosticCategory,
    /// The error kind, for entries produced from an [`Error`]
    pub code: Option<DiagnosticCode>,
    /// Human readable message
    pub message: String,
    /// Every source location attached to the symbol, in the order they were recorded
    pub locations: Vec<Location>,
    /// Metadata token of the affected entity, if it has one
    pub token: Option<u32>,
}

impl Diagnostic {
    /// Creates a new diagnostic without code, locations or token.
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            code: None,
            message: message.into(),
            locations: Vec::new(),
            token: None,
        }
    }

    /// Creates an error-severity diagnostic from an [`Error`].
    pub fn from_error(category: DiagnosticCategory, error: &Error) -> Self {
        Self::new(DiagnosticSeverity::Error, category, error.to_string()).with_code(error.into())
    }

    /// Sets the diagnostic code.
    #[must_use]
    pub fn with_code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches source locations.
    #[must_use]
    pub fn with_locations(mut self, locations: &[Location]) -> Self {
        self.locations.extend_from_slice(locations);
        self
    }

    /// Attaches the token of the affected entity.
    #[must_use]
    pub fn with_token(mut self, token: u32) -> Self {
        self.token = Some(token);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;

        if !self.locations.is_empty() {
            let rendered: Vec<String> = self.locations.iter().map(ToString::to_string).collect();
            write!(f, " (at {})", rendered.join(", "))?;
        }

        if let Some(token) = self.token {
            write!(f, " (token: 0x{:08x})", token)?;
        }

        Ok(())
    }
}

/// Append-only container for diagnostic entries.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds an info-level entry.
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Adds a warning-level entry.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            category,
            message,
        ));
    }

    /// Adds an error-level entry.
    pub fn error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            category,
            message,
        ));
    }

    /// Adds an error-level entry produced from `error`, with all of its source locations.
    pub fn report(&self, category: DiagnosticCategory, error: &Error, locations: &[Location]) {
        self.push(Diagnostic::from_error(category, error).with_locations(locations));
    }

    /// Adds a pre-built entry.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Returns `true` if any entry was recorded.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns `true` if any error-level entry was recorded.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns `true` if any warning-level entry was recorded.
    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Warning)
    }

    /// Total number of entries.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Number of error-level entries.
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Error)
            .count()
    }

    /// Number of warning-level entries.
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Warning)
            .count()
    }

    /// Number of info-level entries.
    pub fn info_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Info)
            .count()
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// All error-level entries.
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Error)
            .map(|(_, d)| d)
            .collect()
    }

    /// All warning-level entries.
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Warning)
            .map(|(_, d)| d)
            .collect()
    }

    /// All entries with the given code.
    pub fn by_code(&self, code: DiagnosticCode) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.code == Some(code))
            .map(|(_, d)| d)
            .collect()
    }

    /// All entries in the given category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.category == category)
            .map(|(_, d)| d)
            .collect()
    }

    /// Renders a human readable summary, errors first.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let error_count = self.error_count();
        let warning_count = self.warning_count();
        let info_count = self.info_count();

        let _ = writeln!(
            output,
            "Diagnostics: {} error(s), {} warning(s), {} info(s)",
            error_count, warning_count, info_count
        );

        if error_count > 0 {
            output.push_str("\nErrors:\n");
            for diag in self.errors() {
                let _ = writeln!(output, "  {diag}");
            }
        }

        if warning_count > 0 {
            output.push_str("\nWarnings:\n");
            for diag in self.warnings() {
                let _ = writeln!(output, "  {diag}");
            }
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SymbolKind;

    #[test]
    fn test_diagnostic_from_error() {
        let error = Error::DuplicateDefinition {
            kind: SymbolKind::Type,
            name: "Foo".to_string(),
        };
        let diag = Diagnostic::from_error(DiagnosticCategory::Type, &error)
            .with_locations(&[Location::new(4, 1).in_file("a.il")]);

        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.code, Some(DiagnosticCode::DuplicateDefinition));
        assert_eq!(
            diag.to_string(),
            "[ERROR] Type: Duplicate type definition - Foo (at a.il:4:1)"
        );
    }

    #[test]
    fn test_diagnostics_container() {
        let diagnostics = Diagnostics::new();

        diagnostics.info(DiagnosticCategory::External, "Info message");
        diagnostics.warning(DiagnosticCategory::Method, "Warning message");
        diagnostics.error(DiagnosticCategory::Body, "Error message");

        assert_eq!(diagnostics.count(), 3);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.info_count(), 1);
        assert!(diagnostics.has_errors());
        assert!(diagnostics.has_warnings());
        assert!(diagnostics.has_any());
    }

    #[test]
    fn test_filter_by_code_and_category() {
        let diagnostics = Diagnostics::new();
        diagnostics.report(
            DiagnosticCategory::Body,
            &Error::UndefinedLabel("IL_0004".to_string()),
            &[],
        );
        diagnostics.report(
            DiagnosticCategory::Type,
            &Error::CircularDefinition("A".to_string()),
            &[Location::new(1, 1)],
        );

        assert_eq!(diagnostics.by_code(DiagnosticCode::UndefinedLabel).len(), 1);
        assert_eq!(diagnostics.by_category(DiagnosticCategory::Type).len(), 1);
        assert!(diagnostics.summary().contains("2 error(s)"));
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new(12, 3).to_string(), "12:3");
        assert_eq!(Location::new(1, 2).in_file("x.il").to_string(), "x.il:1:2");
    }
}

//! What an assembly run produces.

use crate::{
    body::{BinaryLabel, ExceptionClause},
    diagnostics::Diagnostics,
    metadata::{tables::MetadataTables, token::Token},
    Error, Result,
};

/// The encoded body of one method, ready for a writer to lay out (II.25.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// The MethodDef the body belongs to
    pub method: Token,
    /// CIL bytes
    pub code: Vec<u8>,
    /// Evaluation stack bound
    pub max_stack: u16,
    /// StandAloneSig of the locals, if any were declared
    pub local_var_sig: Option<Token>,
    /// `.locals init`
    pub init_locals: bool,
    /// Exception handling clauses
    pub exception_clauses: Vec<ExceptionClause>,
    /// Binary labels, kept for listings and debuggers
    pub labels: Vec<BinaryLabel>,
}

impl MethodBody {
    /// Checks whether the body fits the tiny header format: under 64 bytes of code, max
    /// stack at most 8, no locals and no exception clauses.
    #[must_use]
    pub fn is_tiny(&self) -> bool {
        self.code.len() < 64
            && self.max_stack <= 8
            && self.local_var_sig.is_none()
            && self.exception_clauses.is_empty()
    }
}

/// A fully resolved module: the tables, the bodies and the entry point.
#[derive(Debug, Clone)]
pub struct AssembledModule {
    /// Every metadata table and heap
    pub tables: MetadataTables,
    /// Method bodies in MethodDef order
    pub bodies: Vec<MethodBody>,
    /// The `.entrypoint` method
    pub entry_point: Option<Token>,
    /// `(offset, line)` tables per method, when debug lines are collected
    pub debug_lines: Vec<(Token, Vec<(u32, u32)>)>,
}

impl AssembledModule {
    /// The body of `method`, if it has one.
    #[must_use]
    pub fn body(&self, method: Token) -> Option<&MethodBody> {
        self.bodies.iter().find(|body| body.method == method)
    }
}

/// The result of [`crate::assembler::ModuleAssembler::assemble`].
///
/// Diagnostics are always returned; the module only when no error was reported.
#[derive(Debug)]
pub struct AssemblyOutput {
    /// The module, if assembly succeeded
    pub module: Option<AssembledModule>,
    /// Every diagnostic of the run
    pub diagnostics: Diagnostics,
}

impl AssemblyOutput {
    /// Checks whether a module was produced.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.module.is_some()
    }

    /// The module, or [`Error::AssemblyFailed`] with the error count.
    ///
    /// # Errors
    /// Returns [`Error::AssemblyFailed`] if any error was reported.
    pub fn into_result(self) -> Result<AssembledModule> {
        let errors = self.diagnostics.error_count();
        self.module.ok_or(Error::AssemblyFailed(errors))
    }
}

/// Consumer of an assembled module, such as a PE image writer.
///
/// The assembler never writes files itself; a writer receives the finished tables and
/// bodies and decides on the physical layout.
pub trait MetadataWriter {
    /// Writes `module`.
    ///
    /// # Errors
    /// Implementations report their own I/O or layout failures.
    fn write_module(&mut self, module: &AssembledModule) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCategory;

    fn body(code: usize, max_stack: u16) -> MethodBody {
        MethodBody {
            method: Token::new(0x0600_0001),
            code: vec![0; code],
            max_stack,
            local_var_sig: None,
            init_locals: false,
            exception_clauses: Vec::new(),
            labels: Vec::new(),
        }
    }

    #[test]
    fn test_tiny_header_limits() {
        assert!(body(63, 8).is_tiny());
        assert!(!body(64, 8).is_tiny());
        assert!(!body(1, 9).is_tiny());

        let mut with_locals = body(1, 1);
        with_locals.local_var_sig = Some(Token::new(0x1100_0001));
        assert!(!with_locals.is_tiny());
    }

    #[test]
    fn test_failed_output() {
        let diagnostics = Diagnostics::new();
        diagnostics.error(DiagnosticCategory::General, "first");
        diagnostics.error(DiagnosticCategory::General, "second");
        let output = AssemblyOutput {
            module: None,
            diagnostics,
        };
        assert!(!output.is_success());
        assert!(matches!(output.into_result(), Err(Error::AssemblyFailed(2))));
    }
}

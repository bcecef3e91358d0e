//! Assembler configuration
//!
//! Controls which input irregularities are corrected with a warning and which are rejected,
//! plus a few emission choices.

/// Name of the core library that may be referenced without an `.assembly extern`.
pub const CORLIB: &str = "mscorlib";

/// Configuration of one [`crate::assembler::ModuleAssembler`] run
///
/// The lenient preset accepts input that the reference assembler accepts with a warning;
/// the strict preset turns those corrections into errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct AssemblerConfig {
    /// Complete a concrete method whose body is empty with a single `ret` (warning) instead
    /// of rejecting it as a malformed body
    pub auto_complete_empty_bodies: bool,

    /// Declare `[mscorlib]` implicitly (info) the first time it is referenced without an
    /// `.assembly extern`
    pub implicit_corlib: bool,

    /// Force non-static interface fields to static (warning) instead of rejecting them
    pub interface_fields_static: bool,

    /// Max stack of bodies without `.maxstack` (default: 8)
    pub default_max_stack: u16,

    /// Store the 8-byte public key token in AssemblyRef rows instead of the full key
    pub compact_public_keys: bool,

    /// Collect offset to source line tables from `.line` directives
    pub debug_lines: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::lenient()
    }
}

impl AssemblerConfig {
    /// Creates the lenient configuration
    ///
    /// Empty bodies, implicit core library references and instance interface fields are
    /// corrected and reported as warnings or notes.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            auto_complete_empty_bodies: true,
            implicit_corlib: true,
            interface_fields_static: true,
            default_max_stack: 8,
            compact_public_keys: true,
            debug_lines: true,
        }
    }

    /// Creates the strict configuration
    ///
    /// Every correction the lenient preset applies is an error instead.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            auto_complete_empty_bodies: false,
            implicit_corlib: false,
            interface_fields_static: false,
            ..Self::lenient()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let lenient = AssemblerConfig::lenient();
        assert!(lenient.auto_complete_empty_bodies);
        assert!(lenient.implicit_corlib);
        assert!(lenient.interface_fields_static);
        assert_eq!(lenient.default_max_stack, 8);

        let strict = AssemblerConfig::strict();
        assert!(!strict.auto_complete_empty_bodies);
        assert!(!strict.implicit_corlib);
        assert!(!strict.interface_fields_static);
        assert_eq!(strict.default_max_stack, 8);
    }

    #[test]
    fn test_default_is_lenient() {
        assert_eq!(AssemblerConfig::default(), AssemblerConfig::lenient());
    }
}

use std::collections::HashMap;

use crate::{
    assembler::{config::AssemblerConfig, externs::ExternTable},
    definitions::Definitions,
    diagnostics::{DiagnosticCategory, Diagnostics, Location},
    generics::{GenericScope, GenericsEngine},
    metadata::{tables::MetadataTables, token::Token},
    references::{MemberReferences, TypeRefId, TypeReferences},
    Error,
};

/// Everything one assembly run owns: configuration, diagnostics, the binary tables, the
/// reference arenas with their caches, the definition tables and the extern table.
///
/// Nothing in here outlives the run; a new [`crate::assembler::ModuleAssembler`] starts
/// from empty caches.
#[derive(Debug, Default)]
pub struct AssemblyContext {
    pub(crate) config: AssemblerConfig,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) tables: MetadataTables,
    pub(crate) types: TypeReferences,
    pub(crate) members: MemberReferences,
    pub(crate) generics: GenericsEngine,
    pub(crate) definitions: Definitions,
    pub(crate) externs: ExternTable,
    pub(crate) aliases: HashMap<String, TypeRefId>,
    /// `(method, sequence)` to Param row
    pub(crate) param_tokens: HashMap<(Token, u16), Token>,
    /// `(owner, index)` to GenericParam row
    pub(crate) generic_param_tokens: HashMap<(Token, u32), Token>,
}

impl AssemblyContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new(config: AssemblerConfig) -> Self {
        AssemblyContext {
            config,
            ..Self::default()
        }
    }

    /// The configuration of the run.
    #[must_use]
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Diagnostics collected so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The binary tables populated so far.
    #[must_use]
    pub fn tables(&self) -> &MetadataTables {
        &self.tables
    }

    /// The type reference arena.
    #[must_use]
    pub fn types(&self) -> &TypeReferences {
        &self.types
    }

    /// The member reference arena.
    #[must_use]
    pub fn members(&self) -> &MemberReferences {
        &self.members
    }

    /// The definition tables.
    #[must_use]
    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// The generic instantiation caches.
    #[must_use]
    pub fn generics(&self) -> &GenericsEngine {
        &self.generics
    }

    /// Records `error` as an error diagnostic.
    pub(crate) fn report(
        &self,
        fallback: DiagnosticCategory,
        error: &Error,
        locations: &[Location],
    ) {
        self.diagnostics
            .report(category_for(error, fallback), error, locations);
    }

    /// Records an error raised while resolving or defining something.
    ///
    /// Undefined symbols are skipped: the undefined check already reported each of them once,
    /// with every location it was mentioned at.
    pub(crate) fn report_resolution(
        &self,
        fallback: DiagnosticCategory,
        error: &Error,
        location: Option<&Location>,
    ) {
        if matches!(error, Error::UndefinedSymbol { .. }) {
            return;
        }
        match location {
            Some(location) => self.report(fallback, error, std::slice::from_ref(location)),
            None => self.report(fallback, error, &[]),
        }
    }

    /// The generic scope inside the defined type at `index`, optionally inside one of its
    /// methods.
    pub(crate) fn type_scope(&self, index: usize) -> GenericScope {
        self.definitions
            .types
            .node(index)
            .map_or_else(GenericScope::empty, |ty| {
                GenericScope::for_type(&ty.generic_params)
            })
    }
}

/// The category an error belongs to, or `fallback` when the error does not imply one.
pub(crate) fn category_for(error: &Error, fallback: DiagnosticCategory) -> DiagnosticCategory {
    match error {
        Error::GenericBinding(_) | Error::GenericArity { .. } => DiagnosticCategory::Generic,
        Error::UnknownExternal(_) => DiagnosticCategory::External,
        Error::UndefinedLabel(_)
        | Error::DuplicateLabel(_)
        | Error::MalformedBody(_)
        | Error::InvalidMnemonic(_)
        | Error::InvalidOperand { .. }
        | Error::InvalidBranch { .. } => DiagnosticCategory::Body,
        _ => fallback,
    }
}

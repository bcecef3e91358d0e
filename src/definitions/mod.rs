//! Definition tables and the definition nodes they own.
//!
//! Every entity the input declares (types, methods, fields, events, properties, `.data`
//! labels) lives in a [`DefinitionTable`] keyed by name or signature key. An entry is created
//! by whichever comes first, a reference or the definition, and keeps its identity for the
//! whole run: a forward reference and the later definition share one node.
//!
//! # Key Components
//!
//! - [`DefinitionTable`] - referenced/defined bookkeeping plus declaration order
//! - [`Lifecycle`] - the `Unresolved -> Resolving -> Resolved` state machine with a separate
//!   defined flag
//! - [`TypeDefinition`] - a type and the member tables it owns
//! - [`MethodDefinition`], [`FieldDefinition`], [`EventDefinition`], [`PropertyDefinition`]
//! - [`CustomAttribute`], [`SecurityDeclaration`] - decorations attached by target key
//! - [`Definitions`] - the module-level tables
//!
//! Only [`Definitions::check_for_undefined`] decides that something was never defined; no
//! earlier step assumes the input is complete.

mod attributes;
mod fielddef;
mod members;
mod methoddef;
mod state;
mod table;
mod typedef;

pub use attributes::{AttributeTarget, CustomAttribute, SecurityDeclaration};
pub use fielddef::{ConstantValue, DataLabel, FieldDefinition};
pub use members::{EventDefinition, PropertyDefinition};
pub use methoddef::{MethodDefinition, PInvokeInfo, ParamDefinition};
pub use state::{Lifecycle, ResolveState};
pub use table::{DefineOutcome, DefinitionNode, DefinitionTable, TableEntry, Undefined};
pub use typedef::{ClassLayout, MethodOverride, TypeDefId, TypeDefinition, MODULE_TYPE};

use crate::{diagnostics::Location, SymbolKind};

/// The module-level definition tables of one assembly run.
///
/// The implicit `<Module>` type is defined on construction so that it always becomes
/// TypeDef row 1 and can own module-scope fields and methods.
#[derive(Debug, Clone)]
pub struct Definitions {
    /// Types by full name, `<Module>` first
    pub types: DefinitionTable<TypeDefinition>,
    /// `.data` labels by name
    pub data_labels: DefinitionTable<DataLabel>,
    /// `.custom` directives in declaration order
    pub attributes: Vec<CustomAttribute>,
    /// `.permissionset` directives in declaration order
    pub security: Vec<SecurityDeclaration>,
    /// Duplicate type definitions; kept so their members can still be declared, never
    /// emitted
    pub discarded: Vec<TypeDefinition>,
    /// `.entrypoint`: owner and definition key of the method
    pub entry_point: Option<(TypeDefId, String)>,
}

impl Default for Definitions {
    fn default() -> Self {
        Self::new()
    }
}

impl Definitions {
    /// Creates the tables with `<Module>` already defined.
    #[must_use]
    pub fn new() -> Self {
        let mut types = DefinitionTable::new(SymbolKind::Type);
        types.add_definition(MODULE_TYPE, None, TypeDefinition::new(MODULE_TYPE));

        Definitions {
            types,
            data_labels: DefinitionTable::new(SymbolKind::DataLabel),
            attributes: Vec::new(),
            security: Vec::new(),
            discarded: Vec::new(),
            entry_point: None,
        }
    }

    /// The implicit `<Module>` type.
    #[must_use]
    pub fn module_type() -> TypeDefId {
        TypeDefId::new(0)
    }

    /// Id of the type called `full_name`, referenced or defined.
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<TypeDefId> {
        self.types.index_of(full_name).map(TypeDefId::new)
    }

    /// The type node for `id`.
    #[must_use]
    pub fn type_def(&self, id: TypeDefId) -> Option<&TypeDefinition> {
        self.types.node(id.index())
    }

    /// The mutable type node for `id`.
    pub fn type_def_mut(&mut self, id: TypeDefId) -> Option<&mut TypeDefinition> {
        self.types.node_mut(id.index())
    }

    /// Returns the entry for `full_name`, creating a referenced-only type if needed.
    pub fn reference_type(&mut self, full_name: &str, location: Option<Location>) -> TypeDefId {
        TypeDefId::new(
            self.types
                .get_reference(full_name, location, || TypeDefinition::new(full_name)),
        )
    }

    /// Returns the entry for the `.data` label `name`, creating a referenced-only one if
    /// needed.
    pub fn reference_data_label(&mut self, name: &str, location: Option<Location>) -> usize {
        self.data_labels
            .get_reference(name, location, DataLabel::default)
    }

    /// Every referenced symbol that never received a definition: types, their members and
    /// `.data` labels.
    #[must_use]
    pub fn check_for_undefined(&self) -> Vec<Undefined> {
        let mut missing = self.types.check_for_undefined("");
        missing.extend(self.data_labels.check_for_undefined(""));
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_type_is_first() {
        let definitions = Definitions::new();
        assert_eq!(definitions.find_type(MODULE_TYPE), Some(Definitions::module_type()));
        assert!(definitions.types.is_defined(0));
        assert!(definitions.check_for_undefined().is_empty());
    }

    #[test]
    fn test_undefined_reports_types_and_labels() {
        let mut definitions = Definitions::new();
        definitions.reference_type("Missing", Some(Location::new(2, 7)));
        definitions.reference_data_label("D_0001", None);

        let missing = definitions.check_for_undefined();
        let names: Vec<_> = missing.iter().map(|m| (m.kind, m.name.as_str())).collect();
        assert_eq!(
            names,
            vec![(SymbolKind::Type, "Missing"), (SymbolKind::DataLabel, "D_0001")]
        );
        assert_eq!(missing[0].locations, vec![Location::new(2, 7)]);
    }
}

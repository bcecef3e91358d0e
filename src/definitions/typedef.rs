use std::fmt;

use crate::{
    definitions::{
        DefinitionNode, DefinitionTable, EventDefinition, FieldDefinition, Lifecycle,
        MethodDefinition, PropertyDefinition, Undefined,
    },
    diagnostics::Location,
    generics::GenericParameters,
    metadata::{flags::TypeAttributes, token::Token},
    references::{split_type_name, MemberRefId, TypeRefId, TypeReferences},
    SymbolKind,
};

/// Name of the implicit type owning module-scope fields and methods.
pub const MODULE_TYPE: &str = "<Module>";

/// Handle of a type in the module's type table; stable for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDefId(u32);

impl TypeDefId {
    pub(crate) fn new(index: usize) -> Self {
        TypeDefId(index as u32)
    }

    /// Position of the type in the module's type table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "typedef#{}", self.0)
    }
}

/// `.override` - the method `body` implements the inherited `declaration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodOverride {
    /// Implementing method
    pub body: MemberRefId,
    /// Overridden method
    pub declaration: MemberRefId,
}

/// `.pack` / `.size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassLayout {
    /// Field alignment
    pub packing_size: u16,
    /// Total instance size
    pub class_size: u32,
}

/// A class, interface or value type defined in this module.
///
/// Besides its own attributes a type owns the definition tables of its members, so member
/// references on a local type register in the owner's tables and the final undefined check
/// reports missing members per owner.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// `Ns.Outer/Inner`
    pub full_name: String,
    /// Namespace of the outermost type; empty for nested types
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Type attributes
    pub flags: TypeAttributes,
    /// `extends`
    pub parent: Option<TypeRefId>,
    /// `implements`, in declaration order
    pub interfaces: Vec<TypeRefId>,
    /// Full name of the enclosing type, for nested types
    pub enclosing: Option<String>,
    /// Type-level generic parameters
    pub generic_params: GenericParameters,
    /// Methods keyed by definition key
    pub methods: DefinitionTable<MethodDefinition>,
    /// Fields keyed by `type name`
    pub fields: DefinitionTable<FieldDefinition>,
    /// Events keyed by name
    pub events: DefinitionTable<EventDefinition>,
    /// Properties keyed by `type name(params)`
    pub properties: DefinitionTable<PropertyDefinition>,
    /// `.override` directives
    pub overrides: Vec<MethodOverride>,
    /// `.pack` / `.size`
    pub layout: Option<ClassLayout>,
    /// Resolve/define state
    pub lifecycle: Lifecycle,
    /// TypeDef token, once reserved
    pub token: Option<Token>,
    /// Defining occurrence
    pub location: Option<Location>,
}

impl TypeDefinition {
    /// Creates a type called `full_name` with no attributes.
    #[must_use]
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let (namespace, mut names) = split_type_name(&full_name);
        let name = names.pop().unwrap_or_default();
        let (namespace, enclosing) = match full_name.rsplit_once('/') {
            Some((outer, _)) => (String::new(), Some(outer.to_string())),
            None => (namespace, None),
        };

        TypeDefinition {
            full_name,
            namespace,
            name,
            flags: TypeAttributes::empty(),
            parent: None,
            interfaces: Vec::new(),
            enclosing,
            generic_params: GenericParameters::new(),
            methods: DefinitionTable::new(SymbolKind::Method),
            fields: DefinitionTable::new(SymbolKind::Field),
            events: DefinitionTable::new(SymbolKind::Event),
            properties: DefinitionTable::new(SymbolKind::Property),
            overrides: Vec::new(),
            layout: None,
            lifecycle: Lifecycle::default(),
            token: None,
            location: None,
        }
    }

    /// Sets the attributes.
    #[must_use]
    pub fn with_flags(mut self, flags: TypeAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the parent type.
    #[must_use]
    pub fn extends(mut self, parent: TypeRefId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Adds an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: TypeRefId) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Sets the type-level generic parameters.
    #[must_use]
    pub fn with_generic_params(mut self, params: GenericParameters) -> Self {
        self.generic_params = params;
        self
    }

    /// Records the defining occurrence.
    #[must_use]
    pub fn at_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Re-roots the type inside `enclosing`, as a `.class` declared within another class.
    ///
    /// The simple name is kept; namespace and full name follow the enclosing type.
    #[must_use]
    pub fn nested_in(mut self, enclosing: &str) -> Self {
        self.full_name = format!("{enclosing}/{}", self.name);
        self.namespace = String::new();
        self.enclosing = Some(enclosing.to_string());
        self
    }

    /// Checks whether the type is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Checks whether the type is the implicit `<Module>` type.
    #[must_use]
    pub fn is_module_type(&self) -> bool {
        self.full_name == MODULE_TYPE
    }

    /// Checks whether the type is a value type, judged by its parent.
    #[must_use]
    pub fn is_value_type(&self, types: &TypeReferences) -> bool {
        let Some(parent) = self.parent else {
            return false;
        };
        let parent = types.name(parent);
        (parent.ends_with("]System.ValueType") && self.full_name != "System.Enum")
            || parent.ends_with("]System.Enum")
    }
}

impl DefinitionNode for TypeDefinition {
    fn promote(&mut self, definition: Self) {
        let TypeDefinition {
            flags,
            parent,
            interfaces,
            generic_params,
            methods,
            fields,
            events,
            properties,
            overrides,
            layout,
            location,
            ..
        } = definition;

        self.flags = flags;
        self.parent = parent;
        self.interfaces = interfaces;
        self.generic_params = generic_params;
        self.overrides.extend(overrides);
        self.layout = layout;
        self.location = location;
        self.methods.absorb(methods);
        self.fields.absorb(fields);
        self.events.absorb(events);
        self.properties.absorb(properties);
    }

    fn undefined_members(&self, owner: &str, out: &mut Vec<Undefined>) {
        // module-scope members are reported unqualified
        let scope = if self.is_module_type() { "" } else { owner };
        out.extend(self.methods.check_for_undefined(scope));
        out.extend(self.fields.check_for_undefined(scope));
        out.extend(self.events.check_for_undefined(scope));
        out.extend(self.properties.check_for_undefined(scope));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::{ExternalScope, PrimitiveType};

    #[test]
    fn test_name_parts() {
        let plain = TypeDefinition::new("Ns.Sub.Foo");
        assert_eq!((plain.namespace.as_str(), plain.name.as_str()), ("Ns.Sub", "Foo"));
        assert_eq!(plain.enclosing, None);

        let nested = TypeDefinition::new("Ns.Outer/Inner");
        assert_eq!((nested.namespace.as_str(), nested.name.as_str()), ("", "Inner"));
        assert_eq!(nested.enclosing.as_deref(), Some("Ns.Outer"));
    }

    #[test]
    fn test_value_type_from_parent() {
        let mut types = TypeReferences::new();
        let corlib = ExternalScope::Assembly("mscorlib".into());
        let value_type = types.external(corlib.clone(), "System.ValueType", false);
        let object = types.external(corlib, "System.Object", false);

        assert!(TypeDefinition::new("Point").extends(value_type).is_value_type(&types));
        assert!(!TypeDefinition::new("Foo").extends(object).is_value_type(&types));
        assert!(!TypeDefinition::new("IFoo").is_value_type(&types));
    }

    #[test]
    fn test_promote_keeps_member_references() {
        let mut types = TypeReferences::new();
        let int32 = types.primitive(PrimitiveType::I4);
        let object = types.primitive(PrimitiveType::Object);

        let mut placeholder = TypeDefinition::new("Foo");
        placeholder
            .fields
            .get_reference("int32 X", Some(Location::new(4, 2)), || {
                FieldDefinition::new("X", int32)
            });

        placeholder.promote(
            TypeDefinition::new("Foo")
                .with_flags(TypeAttributes::PUBLIC)
                .extends(object),
        );
        assert_eq!(placeholder.flags, TypeAttributes::PUBLIC);
        assert_eq!(placeholder.parent, Some(object));

        let mut missing = Vec::new();
        placeholder.undefined_members("Foo", &mut missing);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "Foo::int32 X");
        assert_eq!(missing[0].kind, SymbolKind::Field);
    }
}

//! Metadata tables and heaps populated by the assembler.
//!
//! [`MetadataTables`] is the handle-producing side of the binary module: every row the
//! assembler allocates returns the [`Token`] that identifies it, and the rows that are
//! shared by many references (TypeRef, MemberRef, TypeSpec, MethodSpec, ModuleRef,
//! StandAloneSig) are deduplicated so that equal content always maps to one token.
//!
//! Serialising the tables into the `#~` stream is left to a [`crate::assembler::MetadataWriter`].
//!
//! # Row Ordering
//!
//! Rows are stored in allocation order. The assembler allocates TypeDef, Field, MethodDef,
//! Param, NestedClass, InterfaceImpl, GenericParam and GenericParamConstraint rows in an order
//! that already satisfies ECMA-335 II.22 sorting rules, because other rows refer to them by
//! token. Tables that nobody refers to by token (Constant, CustomAttribute, DeclSecurity,
//! FieldLayout, FieldRVA, ImplMap, MethodImpl, MethodSemantics) may be sorted by the writer.
//!
//! # Examples
//!
//! ```rust
//! use cilasm::metadata::{tables::{MetadataTables, TableId}, token::Token};
//!
//! let mut tables = MetadataTables::new();
//! let corlib = tables.add_assembly_ref_named("mscorlib");
//! let object = tables.add_type_ref(corlib, "System", "Object");
//!
//! assert_eq!(object, Token::from_parts(TableId::TypeRef, 1));
//! assert_eq!(tables.add_type_ref(corlib, "System", "Object"), object);
//! ```

mod heaps;
mod rows;

pub use heaps::{BlobHeap, GuidHeap, StringHeap, UserStringHeap};
pub use rows::*;

use std::collections::HashMap;

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::metadata::token::Token;

/// Identifiers of the metadata tables the assembler produces (ECMA-335 II.22).
///
/// The numeric values are the table bytes used in tokens.
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    /// `Module` table (0x00)
    Module = 0x00,
    /// `TypeRef` table (0x01)
    TypeRef = 0x01,
    /// `TypeDef` table (0x02)
    TypeDef = 0x02,
    /// `Field` table (0x04)
    Field = 0x04,
    /// `MethodDef` table (0x06)
    MethodDef = 0x06,
    /// `Param` table (0x08)
    Param = 0x08,
    /// `InterfaceImpl` table (0x09)
    InterfaceImpl = 0x09,
    /// `MemberRef` table (0x0A)
    MemberRef = 0x0A,
    /// `Constant` table (0x0B)
    Constant = 0x0B,
    /// `CustomAttribute` table (0x0C)
    CustomAttribute = 0x0C,
    /// `DeclSecurity` table (0x0E)
    DeclSecurity = 0x0E,
    /// `ClassLayout` table (0x0F)
    ClassLayout = 0x0F,
    /// `FieldLayout` table (0x10)
    FieldLayout = 0x10,
    /// `StandAloneSig` table (0x11)
    StandAloneSig = 0x11,
    /// `EventMap` table (0x12)
    EventMap = 0x12,
    /// `Event` table (0x14)
    Event = 0x14,
    /// `PropertyMap` table (0x15)
    PropertyMap = 0x15,
    /// `Property` table (0x17)
    Property = 0x17,
    /// `MethodSemantics` table (0x18)
    MethodSemantics = 0x18,
    /// `MethodImpl` table (0x19)
    MethodImpl = 0x19,
    /// `ModuleRef` table (0x1A)
    ModuleRef = 0x1A,
    /// `TypeSpec` table (0x1B)
    TypeSpec = 0x1B,
    /// `ImplMap` table (0x1C)
    ImplMap = 0x1C,
    /// `FieldRVA` table (0x1D)
    FieldRVA = 0x1D,
    /// `Assembly` table (0x20)
    Assembly = 0x20,
    /// `AssemblyRef` table (0x23)
    AssemblyRef = 0x23,
    /// `NestedClass` table (0x29)
    NestedClass = 0x29,
    /// `GenericParam` table (0x2A)
    GenericParam = 0x2A,
    /// `MethodSpec` table (0x2B)
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` table (0x2C)
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Returns the table whose id byte is `value`, if any.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        TableId::iter().find(|table| *table as u8 == value)
    }
}

/// Owned metadata tables, heaps and row caches for one assembled module.
#[derive(Debug, Clone, Default)]
pub struct MetadataTables {
    /// `Module` rows
    pub module: Vec<ModuleRow>,
    /// `TypeRef` rows
    pub type_ref: Vec<TypeRefRow>,
    /// `TypeDef` rows
    pub type_def: Vec<TypeDefRow>,
    /// `Field` rows
    pub field: Vec<FieldRow>,
    /// `MethodDef` rows
    pub method_def: Vec<MethodDefRow>,
    /// `Param` rows
    pub param: Vec<ParamRow>,
    /// `InterfaceImpl` rows
    pub interface_impl: Vec<InterfaceImplRow>,
    /// `MemberRef` rows
    pub member_ref: Vec<MemberRefRow>,
    /// `Constant` rows
    pub constant: Vec<ConstantRow>,
    /// `CustomAttribute` rows
    pub custom_attribute: Vec<CustomAttributeRow>,
    /// `DeclSecurity` rows
    pub decl_security: Vec<DeclSecurityRow>,
    /// `ClassLayout` rows
    pub class_layout: Vec<ClassLayoutRow>,
    /// `FieldLayout` rows
    pub field_layout: Vec<FieldLayoutRow>,
    /// `StandAloneSig` rows
    pub stand_alone_sig: Vec<StandAloneSigRow>,
    /// `EventMap` rows
    pub event_map: Vec<EventMapRow>,
    /// `Event` rows
    pub event: Vec<EventRow>,
    /// `PropertyMap` rows
    pub property_map: Vec<PropertyMapRow>,
    /// `Property` rows
    pub property: Vec<PropertyRow>,
    /// `MethodSemantics` rows
    pub method_semantics: Vec<MethodSemanticsRow>,
    /// `MethodImpl` rows
    pub method_impl: Vec<MethodImplRow>,
    /// `ModuleRef` rows
    pub module_ref: Vec<ModuleRefRow>,
    /// `TypeSpec` rows
    pub type_spec: Vec<TypeSpecRow>,
    /// `ImplMap` rows
    pub impl_map: Vec<ImplMapRow>,
    /// `FieldRVA` rows
    pub field_rva: Vec<FieldRvaRow>,
    /// `Assembly` rows (zero or one)
    pub assembly: Vec<AssemblyRow>,
    /// `AssemblyRef` rows
    pub assembly_ref: Vec<AssemblyRefRow>,
    /// `NestedClass` rows
    pub nested_class: Vec<NestedClassRow>,
    /// `GenericParam` rows
    pub generic_param: Vec<GenericParamRow>,
    /// `MethodSpec` rows
    pub method_spec: Vec<MethodSpecRow>,
    /// `GenericParamConstraint` rows
    pub generic_param_constraint: Vec<GenericParamConstraintRow>,

    /// `#Strings` heap
    pub strings: StringHeap,
    /// `#Blob` heap
    pub blobs: BlobHeap,
    /// `#US` heap
    pub user_strings: UserStringHeap,
    /// `#GUID` heap
    pub guids: GuidHeap,
    /// Initial values of `.data` labels, referenced by [`FieldRvaRow::data`]
    pub data: Vec<Vec<u8>>,

    type_ref_cache: HashMap<(Token, u32, u32), Token>,
    member_ref_cache: HashMap<(Token, u32, u32), Token>,
    type_spec_cache: HashMap<u32, Token>,
    method_spec_cache: HashMap<(Token, u32), Token>,
    module_ref_cache: HashMap<u32, Token>,
    stand_alone_sig_cache: HashMap<u32, Token>,
}

fn push_row<R>(rows: &mut Vec<R>, table: TableId, row: R) -> Token {
    rows.push(row);
    Token::from_parts(table, rows.len() as u32)
}

impl MetadataTables {
    /// Creates empty tables with pre-seeded heaps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> usize {
        match table {
            TableId::Module => self.module.len(),
            TableId::TypeRef => self.type_ref.len(),
            TableId::TypeDef => self.type_def.len(),
            TableId::Field => self.field.len(),
            TableId::MethodDef => self.method_def.len(),
            TableId::Param => self.param.len(),
            TableId::InterfaceImpl => self.interface_impl.len(),
            TableId::MemberRef => self.member_ref.len(),
            TableId::Constant => self.constant.len(),
            TableId::CustomAttribute => self.custom_attribute.len(),
            TableId::DeclSecurity => self.decl_security.len(),
            TableId::ClassLayout => self.class_layout.len(),
            TableId::FieldLayout => self.field_layout.len(),
            TableId::StandAloneSig => self.stand_alone_sig.len(),
            TableId::EventMap => self.event_map.len(),
            TableId::Event => self.event.len(),
            TableId::PropertyMap => self.property_map.len(),
            TableId::Property => self.property.len(),
            TableId::MethodSemantics => self.method_semantics.len(),
            TableId::MethodImpl => self.method_impl.len(),
            TableId::ModuleRef => self.module_ref.len(),
            TableId::TypeSpec => self.type_spec.len(),
            TableId::ImplMap => self.impl_map.len(),
            TableId::FieldRVA => self.field_rva.len(),
            TableId::Assembly => self.assembly.len(),
            TableId::AssemblyRef => self.assembly_ref.len(),
            TableId::NestedClass => self.nested_class.len(),
            TableId::GenericParam => self.generic_param.len(),
            TableId::MethodSpec => self.method_spec.len(),
            TableId::GenericParamConstraint => self.generic_param_constraint.len(),
        }
    }

    /// Returns the row count of every table, in table id order.
    #[must_use]
    pub fn row_counts(&self) -> Vec<(TableId, usize)> {
        TableId::iter()
            .map(|table| (table, self.row_count(table)))
            .collect()
    }

    /// Sets the single `Module` row.
    pub fn set_module(&mut self, name: &str, mvid: uguid::Guid) -> Token {
        let row = ModuleRow {
            name: self.strings.intern(name),
            mvid: self.guids.intern(mvid),
        };
        self.module.clear();
        push_row(&mut self.module, TableId::Module, row)
    }

    /// Adds an `AssemblyRef` row.
    pub fn add_assembly_ref(&mut self, row: AssemblyRefRow) -> Token {
        push_row(&mut self.assembly_ref, TableId::AssemblyRef, row)
    }

    /// Adds an `AssemblyRef` row carrying only a name.
    pub fn add_assembly_ref_named(&mut self, name: &str) -> Token {
        let row = AssemblyRefRow {
            name: self.strings.intern(name),
            ..AssemblyRefRow::default()
        };
        self.add_assembly_ref(row)
    }

    /// Returns the `ModuleRef` for `name`, adding it on first use.
    pub fn add_module_ref(&mut self, name: &str) -> Token {
        let name = self.strings.intern(name);
        if let Some(token) = self.module_ref_cache.get(&name) {
            return *token;
        }
        let token = push_row(&mut self.module_ref, TableId::ModuleRef, ModuleRefRow { name });
        self.module_ref_cache.insert(name, token);
        token
    }

    /// Returns the `TypeRef` for `namespace.name` in `scope`, adding it on first use.
    pub fn add_type_ref(&mut self, scope: Token, namespace: &str, name: &str) -> Token {
        let namespace = self.strings.intern(namespace);
        let name = self.strings.intern(name);
        if let Some(token) = self.type_ref_cache.get(&(scope, namespace, name)) {
            return *token;
        }
        let row = TypeRefRow {
            resolution_scope: scope,
            name,
            namespace,
        };
        let token = push_row(&mut self.type_ref, TableId::TypeRef, row);
        self.type_ref_cache.insert((scope, namespace, name), token);
        token
    }

    /// Returns the `MemberRef` for `name` with `signature` on `parent`, adding it on first use.
    pub fn add_member_ref(&mut self, parent: Token, name: &str, signature: &[u8]) -> Token {
        let name = self.strings.intern(name);
        let signature = self.blobs.intern(signature);
        if let Some(token) = self.member_ref_cache.get(&(parent, name, signature)) {
            return *token;
        }
        let row = MemberRefRow {
            class: parent,
            name,
            signature,
        };
        let token = push_row(&mut self.member_ref, TableId::MemberRef, row);
        self.member_ref_cache
            .insert((parent, name, signature), token);
        token
    }

    /// Returns the `TypeSpec` for `signature`, adding it on first use.
    pub fn add_type_spec(&mut self, signature: &[u8]) -> Token {
        let signature = self.blobs.intern(signature);
        if let Some(token) = self.type_spec_cache.get(&signature) {
            return *token;
        }
        let token = push_row(&mut self.type_spec, TableId::TypeSpec, TypeSpecRow { signature });
        self.type_spec_cache.insert(signature, token);
        token
    }

    /// Returns the `MethodSpec` instantiating `method` with `instantiation`, adding it on first use.
    pub fn add_method_spec(&mut self, method: Token, instantiation: &[u8]) -> Token {
        let instantiation = self.blobs.intern(instantiation);
        if let Some(token) = self.method_spec_cache.get(&(method, instantiation)) {
            return *token;
        }
        let row = MethodSpecRow {
            method,
            instantiation,
        };
        let token = push_row(&mut self.method_spec, TableId::MethodSpec, row);
        self.method_spec_cache.insert((method, instantiation), token);
        token
    }

    /// Returns the `StandAloneSig` for `signature`, adding it on first use.
    pub fn add_stand_alone_sig(&mut self, signature: &[u8]) -> Token {
        let signature = self.blobs.intern(signature);
        if let Some(token) = self.stand_alone_sig_cache.get(&signature) {
            return *token;
        }
        let token = push_row(
            &mut self.stand_alone_sig,
            TableId::StandAloneSig,
            StandAloneSigRow { signature },
        );
        self.stand_alone_sig_cache.insert(signature, token);
        token
    }

    /// Reserves the next `TypeDef` row; the content is filled in later via [`Self::type_def_mut`].
    pub fn reserve_type_def(&mut self) -> Token {
        push_row(&mut self.type_def, TableId::TypeDef, TypeDefRow::default())
    }

    /// Returns the `TypeDef` row identified by `token`.
    pub fn type_def_mut(&mut self, token: Token) -> Option<&mut TypeDefRow> {
        if !token.is_table(TableId::TypeDef) || token.row() == 0 {
            return None;
        }
        self.type_def.get_mut(token.row() as usize - 1)
    }

    /// Returns the `TypeDef` row identified by `token`.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDefRow> {
        if !token.is_table(TableId::TypeDef) || token.row() == 0 {
            return None;
        }
        self.type_def.get(token.row() as usize - 1)
    }

    /// Adds a `Field` row.
    pub fn add_field(&mut self, row: FieldRow) -> Token {
        push_row(&mut self.field, TableId::Field, row)
    }

    /// Adds a `MethodDef` row.
    pub fn add_method_def(&mut self, row: MethodDefRow) -> Token {
        push_row(&mut self.method_def, TableId::MethodDef, row)
    }

    /// Adds a `Param` row.
    pub fn add_param(&mut self, row: ParamRow) -> Token {
        push_row(&mut self.param, TableId::Param, row)
    }

    /// Adds an `InterfaceImpl` row.
    pub fn add_interface_impl(&mut self, row: InterfaceImplRow) -> Token {
        push_row(&mut self.interface_impl, TableId::InterfaceImpl, row)
    }

    /// Adds a `Constant` row.
    pub fn add_constant(&mut self, row: ConstantRow) -> Token {
        push_row(&mut self.constant, TableId::Constant, row)
    }

    /// Adds a `CustomAttribute` row.
    pub fn add_custom_attribute(&mut self, row: CustomAttributeRow) -> Token {
        push_row(&mut self.custom_attribute, TableId::CustomAttribute, row)
    }

    /// Adds a `DeclSecurity` row.
    pub fn add_decl_security(&mut self, row: DeclSecurityRow) -> Token {
        push_row(&mut self.decl_security, TableId::DeclSecurity, row)
    }

    /// Adds a `ClassLayout` row.
    pub fn add_class_layout(&mut self, row: ClassLayoutRow) -> Token {
        push_row(&mut self.class_layout, TableId::ClassLayout, row)
    }

    /// Adds a `FieldLayout` row.
    pub fn add_field_layout(&mut self, row: FieldLayoutRow) -> Token {
        push_row(&mut self.field_layout, TableId::FieldLayout, row)
    }

    /// Adds an `EventMap` row.
    pub fn add_event_map(&mut self, row: EventMapRow) -> Token {
        push_row(&mut self.event_map, TableId::EventMap, row)
    }

    /// Adds an `Event` row.
    pub fn add_event(&mut self, row: EventRow) -> Token {
        push_row(&mut self.event, TableId::Event, row)
    }

    /// Adds a `PropertyMap` row.
    pub fn add_property_map(&mut self, row: PropertyMapRow) -> Token {
        push_row(&mut self.property_map, TableId::PropertyMap, row)
    }

    /// Adds a `Property` row.
    pub fn add_property(&mut self, row: PropertyRow) -> Token {
        push_row(&mut self.property, TableId::Property, row)
    }

    /// Adds a `MethodSemantics` row.
    pub fn add_method_semantics(&mut self, row: MethodSemanticsRow) -> Token {
        push_row(&mut self.method_semantics, TableId::MethodSemantics, row)
    }

    /// Adds a `MethodImpl` row.
    pub fn add_method_impl(&mut self, row: MethodImplRow) -> Token {
        push_row(&mut self.method_impl, TableId::MethodImpl, row)
    }

    /// Adds an `ImplMap` row.
    pub fn add_impl_map(&mut self, row: ImplMapRow) -> Token {
        push_row(&mut self.impl_map, TableId::ImplMap, row)
    }

    /// Adds a `FieldRVA` row with its initial value.
    pub fn add_field_rva(&mut self, field: Token, data: Vec<u8>) -> Token {
        self.data.push(data);
        let row = FieldRvaRow {
            data: self.data.len() as u32 - 1,
            field,
        };
        push_row(&mut self.field_rva, TableId::FieldRVA, row)
    }

    /// Sets the single `Assembly` row.
    pub fn set_assembly(&mut self, row: AssemblyRow) -> Token {
        self.assembly.clear();
        push_row(&mut self.assembly, TableId::Assembly, row)
    }

    /// Adds a `NestedClass` row.
    pub fn add_nested_class(&mut self, row: NestedClassRow) -> Token {
        push_row(&mut self.nested_class, TableId::NestedClass, row)
    }

    /// Adds a `GenericParam` row.
    pub fn add_generic_param(&mut self, row: GenericParamRow) -> Token {
        push_row(&mut self.generic_param, TableId::GenericParam, row)
    }

    /// Adds a `GenericParamConstraint` row.
    pub fn add_generic_param_constraint(&mut self, row: GenericParamConstraintRow) -> Token {
        push_row(
            &mut self.generic_param_constraint,
            TableId::GenericParamConstraint,
            row,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id_from_u8() {
        assert_eq!(TableId::from_u8(0x02), Some(TableId::TypeDef));
        assert_eq!(TableId::from_u8(0x2C), Some(TableId::GenericParamConstraint));
        assert_eq!(TableId::from_u8(0x03), None);
        assert_eq!(TableId::COUNT, 30);
    }

    #[test]
    fn test_type_ref_dedup_per_scope() {
        let mut tables = MetadataTables::new();
        let corlib = tables.add_assembly_ref_named("mscorlib");
        let other = tables.add_assembly_ref_named("System");

        let a = tables.add_type_ref(corlib, "System", "Uri");
        let b = tables.add_type_ref(other, "System", "Uri");
        assert_ne!(a, b);
        assert_eq!(tables.add_type_ref(corlib, "System", "Uri"), a);
        assert_eq!(tables.row_count(TableId::TypeRef), 2);
    }

    #[test]
    fn test_member_ref_dedup_by_signature() {
        let mut tables = MetadataTables::new();
        let parent = Token::from_parts(TableId::TypeRef, 1);

        let a = tables.add_member_ref(parent, "M", &[0x00, 0x00, 0x01]);
        let b = tables.add_member_ref(parent, "M", &[0x00, 0x01, 0x01, 0x08]);
        assert_ne!(a, b);
        assert_eq!(tables.add_member_ref(parent, "M", &[0x00, 0x00, 0x01]), a);
    }

    #[test]
    fn test_type_spec_and_method_spec_dedup() {
        let mut tables = MetadataTables::new();
        let spec = tables.add_type_spec(&[0x1D, 0x08]);
        assert_eq!(tables.add_type_spec(&[0x1D, 0x08]), spec);
        assert_eq!(spec.table_id(), Some(TableId::TypeSpec));

        let method = Token::from_parts(TableId::MethodDef, 1);
        let inst = tables.add_method_spec(method, &[0x0A, 0x01, 0x08]);
        assert_eq!(tables.add_method_spec(method, &[0x0A, 0x01, 0x08]), inst);
        assert_ne!(tables.add_method_spec(method, &[0x0A, 0x01, 0x0E]), inst);
    }

    #[test]
    fn test_reserve_type_def() {
        let mut tables = MetadataTables::new();
        let first = tables.reserve_type_def();
        let second = tables.reserve_type_def();
        assert_eq!(first.row(), 1);
        assert_eq!(second.row(), 2);

        let name = tables.strings.intern("Foo");
        tables.type_def_mut(second).unwrap().name = name;
        assert_eq!(tables.type_def(second).unwrap().name, name);
        assert!(tables.type_def_mut(Token::from_parts(TableId::Field, 1)).is_none());
    }

    #[test]
    fn test_field_rva_data_index() {
        let mut tables = MetadataTables::new();
        let field = Token::from_parts(TableId::Field, 1);
        tables.add_field_rva(field, vec![1, 2, 3, 4]);
        assert_eq!(tables.field_rva[0].data, 0);
        assert_eq!(tables.data[0], vec![1, 2, 3, 4]);
    }
}

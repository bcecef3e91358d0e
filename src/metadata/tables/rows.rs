//! Owned metadata table rows produced by the assembler.
//!
//! Each struct mirrors one ECMA-335 II.22 table. Heap columns hold indices into the
//! heaps owned by [`crate::metadata::tables::MetadataTables`]; coded-index columns hold the
//! full [`Token`] of the referenced row and are narrowed to coded indices by the external
//! metadata writer. Row order inside every table is the order rows were allocated.

use crate::metadata::token::Token;

/// Row of the `Module` table (0x00)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRow {
    /// Index into the string heap
    pub name: u32,
    /// Index into the GUID heap
    pub mvid: u32,
}

/// Row of the `TypeRef` table (0x01)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRefRow {
    /// Module, ModuleRef, AssemblyRef or enclosing TypeRef token
    pub resolution_scope: Token,
    /// Index into the string heap
    pub name: u32,
    /// Index into the string heap
    pub namespace: u32,
}

/// Row of the `TypeDef` table (0x02)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDefRow {
    /// `TypeAttributes` bitmask
    pub flags: u32,
    /// Index into the string heap
    pub name: u32,
    /// Index into the string heap
    pub namespace: u32,
    /// TypeDef, TypeRef or TypeSpec token of the parent; null for interfaces and `<Module>`
    pub extends: Token,
    /// First row of this type's run in the `Field` table
    pub field_list: u32,
    /// First row of this type's run in the `MethodDef` table
    pub method_list: u32,
}

/// Row of the `Field` table (0x04)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRow {
    /// `FieldAttributes` bitmask
    pub flags: u16,
    /// Index into the string heap
    pub name: u32,
    /// Index into the blob heap
    pub signature: u32,
}

/// Row of the `MethodDef` table (0x06)
///
/// The RVA column is assigned by the writer from the matching
/// [`crate::assembler::MethodBody`]; methods without a body keep RVA 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodDefRow {
    /// `MethodImplAttributes` bitmask
    pub impl_flags: u16,
    /// `MethodAttributes` bitmask
    pub flags: u16,
    /// Index into the string heap
    pub name: u32,
    /// Index into the blob heap
    pub signature: u32,
    /// First row of this method's run in the `Param` table
    pub param_list: u32,
}

/// Row of the `Param` table (0x08)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamRow {
    /// `ParamAttributes` bitmask
    pub flags: u16,
    /// 0 for the return value, 1.. for parameters
    pub sequence: u16,
    /// Index into the string heap
    pub name: u32,
}

/// Row of the `InterfaceImpl` table (0x09)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceImplRow {
    /// Implementing TypeDef
    pub class: Token,
    /// Implemented TypeDef, TypeRef or TypeSpec
    pub interface: Token,
}

/// Row of the `MemberRef` table (0x0A)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberRefRow {
    /// TypeRef, TypeSpec, ModuleRef or MethodDef (vararg call sites) parent
    pub class: Token,
    /// Index into the string heap
    pub name: u32,
    /// Index into the blob heap
    pub signature: u32,
}

/// Row of the `Constant` table (0x0B)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantRow {
    /// Element type of the constant value
    pub element_type: u8,
    /// Field, Param or Property token
    pub parent: Token,
    /// Index into the blob heap
    pub value: u32,
}

/// Row of the `CustomAttribute` table (0x0C)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomAttributeRow {
    /// Attributed entity
    pub parent: Token,
    /// MethodDef or MemberRef of the attribute constructor
    pub constructor: Token,
    /// Index into the blob heap
    pub value: u32,
}

/// Row of the `DeclSecurity` table (0x0E)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclSecurityRow {
    /// Security action code
    pub action: u16,
    /// TypeDef, MethodDef or Assembly token
    pub parent: Token,
    /// Index into the blob heap
    pub permission_set: u32,
}

/// Row of the `ClassLayout` table (0x0F)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassLayoutRow {
    /// `.pack` value
    pub packing_size: u16,
    /// `.size` value
    pub class_size: u32,
    /// Owning TypeDef
    pub parent: Token,
}

/// Row of the `FieldLayout` table (0x10)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLayoutRow {
    /// Explicit byte offset of the field
    pub offset: u32,
    /// Field token
    pub field: Token,
}

/// Row of the `StandAloneSig` table (0x11)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandAloneSigRow {
    /// Index into the blob heap
    pub signature: u32,
}

/// Row of the `EventMap` table (0x12)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMapRow {
    /// Owning TypeDef
    pub parent: Token,
    /// First row of this type's run in the `Event` table
    pub event_list: u32,
}

/// Row of the `Event` table (0x14)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRow {
    /// `EventAttributes` bitmask
    pub flags: u16,
    /// Index into the string heap
    pub name: u32,
    /// Delegate type token
    pub event_type: Token,
}

/// Row of the `PropertyMap` table (0x15)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMapRow {
    /// Owning TypeDef
    pub parent: Token,
    /// First row of this type's run in the `Property` table
    pub property_list: u32,
}

/// Row of the `Property` table (0x17)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyRow {
    /// `PropertyAttributes` bitmask
    pub flags: u16,
    /// Index into the string heap
    pub name: u32,
    /// Index into the blob heap
    pub signature: u32,
}

/// Row of the `MethodSemantics` table (0x18)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSemanticsRow {
    /// `MethodSemanticsAttributes` bitmask
    pub semantics: u16,
    /// Accessor MethodDef
    pub method: Token,
    /// Event or Property token
    pub association: Token,
}

/// Row of the `MethodImpl` table (0x19)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodImplRow {
    /// Implementing TypeDef
    pub class: Token,
    /// Implementing method body (MethodDef or MemberRef)
    pub body: Token,
    /// Overridden declaration (MethodDef or MemberRef)
    pub declaration: Token,
}

/// Row of the `ModuleRef` table (0x1A)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRefRow {
    /// Index into the string heap
    pub name: u32,
}

/// Row of the `TypeSpec` table (0x1B)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSpecRow {
    /// Index into the blob heap
    pub signature: u32,
}

/// Row of the `ImplMap` table (0x1C)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImplMapRow {
    /// `PInvokeAttributes` bitmask
    pub flags: u16,
    /// Forwarded MethodDef (or Field)
    pub member_forwarded: Token,
    /// Index into the string heap
    pub import_name: u32,
    /// ModuleRef of the native library
    pub import_scope: Token,
}

/// Row of the `FieldRVA` table (0x1D)
///
/// The RVA itself is assigned by the writer; `data` indexes
/// [`crate::metadata::tables::MetadataTables::data`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRvaRow {
    /// Index of the initial-value blob in the data section list
    pub data: u32,
    /// Field token
    pub field: Token,
}

/// Row of the `Assembly` table (0x20)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyRow {
    /// Hash algorithm id
    pub hash_alg_id: u32,
    /// Version major
    pub major_version: u16,
    /// Version minor
    pub minor_version: u16,
    /// Version build
    pub build_number: u16,
    /// Version revision
    pub revision_number: u16,
    /// `AssemblyFlags` bitmask
    pub flags: u32,
    /// Index into the blob heap
    pub public_key: u32,
    /// Index into the string heap
    pub name: u32,
    /// Index into the string heap
    pub culture: u32,
}

/// Row of the `AssemblyRef` table (0x23)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyRefRow {
    /// Version major
    pub major_version: u16,
    /// Version minor
    pub minor_version: u16,
    /// Version build
    pub build_number: u16,
    /// Version revision
    pub revision_number: u16,
    /// `AssemblyFlags` bitmask
    pub flags: u32,
    /// Index into the blob heap
    pub public_key_or_token: u32,
    /// Index into the string heap
    pub name: u32,
    /// Index into the string heap
    pub culture: u32,
    /// Index into the blob heap
    pub hash_value: u32,
}

/// Row of the `NestedClass` table (0x29)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedClassRow {
    /// Nested TypeDef
    pub nested_class: Token,
    /// Enclosing TypeDef
    pub enclosing_class: Token,
}

/// Row of the `GenericParam` table (0x2A)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericParamRow {
    /// Positional index of the parameter
    pub number: u16,
    /// `GenericParamAttributes` bitmask
    pub flags: u16,
    /// Owning TypeDef or MethodDef
    pub owner: Token,
    /// Index into the string heap
    pub name: u32,
}

/// Row of the `MethodSpec` table (0x2B)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSpecRow {
    /// Open generic MethodDef or MemberRef
    pub method: Token,
    /// Index into the blob heap
    pub instantiation: u32,
}

/// Row of the `GenericParamConstraint` table (0x2C)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericParamConstraintRow {
    /// Constrained GenericParam
    pub owner: Token,
    /// TypeDef, TypeRef or TypeSpec of the constraint
    pub constraint: Token,
}

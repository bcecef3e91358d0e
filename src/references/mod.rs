//! Symbolic type and member references.
//!
//! Every mention of a type or member in the assembler input becomes a reference object that
//! is interned for the whole assembly run. References are plain arena entries addressed by
//! small copyable ids ([`TypeRefId`], [`MemberRefId`]); their resolution to binary handles is
//! memoized on the entry itself, so resolving the same mention twice never inserts a second
//! metadata row.
//!
//! # Architecture
//!
//! - [`TypeReferences`] - interning arena for [`TypeRefKind`] (local, external, primitive,
//!   generic parameter, generic instantiation, modified)
//! - [`MemberReferences`] - interning arena for methods and fields, keyed per owner by a
//!   canonical signature key
//! - [`Modifier`] - array/pointer/by-ref/pinned/custom modifiers applied on top of a base type
//! - [`PrimitiveType`] - built-in element types
//!
//! Resolution itself (turning a reference into a [`crate::metadata::token::Token`]) lives in
//! [`crate::assembler`], because it needs the definition tables and the external module table.
//!
//! # Examples
//!
//! ```rust
//! use cilasm::references::{
//!     MemberReferences, MethodRefSignature, PrimitiveType, TypeReferences,
//! };
//!
//! let mut types = TypeReferences::new();
//! let mut members = MemberReferences::new();
//!
//! let foo = types.local("Foo");
//! let void = types.primitive(PrimitiveType::Void);
//! let int32 = types.primitive(PrimitiveType::I4);
//!
//! let signature = MethodRefSignature::new("Bar", void, vec![int32]);
//! let first = members.method(&types, foo, signature.clone());
//! let second = members.method(&types, foo, signature);
//! assert_eq!(first, second);
//! ```

use std::fmt;

mod memberref;
mod modifiers;
mod primitives;
mod typeref;

pub use memberref::{
    field_key, method_key, FieldRefSignature, MemberRefKind, MemberReference, MemberReferences,
    MethodRefSignature,
};
pub use modifiers::Modifier;
pub use primitives::PrimitiveType;
pub use typeref::{
    mangled_arity, split_type_name, ExternalScope, TypeRefKind, TypeReference, TypeReferences,
};

/// Handle of an interned type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRefId(u32);

impl TypeRefId {
    pub(crate) fn new(index: usize) -> Self {
        TypeRefId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Handle of an interned member reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberRefId(u32);

impl MemberRefId {
    pub(crate) fn new(index: usize) -> Self {
        MemberRefId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MemberRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member#{}", self.0)
    }
}

//! Resolved signatures and their blob encoders.
//!
//! Every type or member reference the assembler resolves is turned into one of the
//! signature structures in this module, which are then encoded into `#Blob` heap entries
//! following ECMA-335 II.23.2:
//!
//! - **Method Signatures** - Calling convention, generic arity, return and parameter types,
//!   plus the optional tail of vararg call sites
//! - **Field Signatures** - Field type and custom modifiers
//! - **Property Signatures** - Property type and index parameters
//! - **LocalVar Signatures** - `.locals` types, including pinned and by-reference locals
//! - **TypeSpec Signatures** - Instantiations, arrays, pointers and modified types
//! - **MethodSpec Signatures** - Generic method argument lists
//!
//! # Examples
//!
//! ```rust
//! use cilasm::metadata::signatures::{encode_method_signature, SignatureMethod, TypeSignature};
//!
//! let signature = SignatureMethod {
//!     return_type: TypeSignature::Void.into(),
//!     params: vec![TypeSignature::I4.into()],
//!     ..SignatureMethod::default()
//! };
//! assert_eq!(encode_method_signature(&signature)?, vec![0x00, 0x01, 0x01, 0x08]);
//! # Ok::<(), cilasm::Error>(())
//! ```

mod encoders;
mod types;

pub use encoders::*;
pub use types::*;

#[allow(non_snake_case, dead_code, missing_docs)]
/// Element type bytes of signature blobs (II.23.1.16)
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const PTR: u8 = 0x0f;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDef or TypeRef token
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDef or TypeRef token
    pub const CLASS: u8 = 0x12;
    // Generic parameter in a generic type definition, represented as number
    pub const VAR: u8 = 0x13;
    // type rank boundsCount bound1 … loCount lo1 …
    pub const ARRAY: u8 = 0x14;
    // Followed by type type-arg-count type-1 ... type-n
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    // Followed by full method signature
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    // Single-dim array with 0 lower bound
    pub const SZARRAY: u8 = 0x1d;
    // Generic parameter in a generic method definition, represented as number
    pub const MVAR: u8 = 0x1e;
    // Required modifier : followed by a TypeDef or TypeRef token
    pub const CMOD_REQD: u8 = 0x1f;
    // Optional modifier : followed by a TypeDef or TypeRef token
    pub const CMOD_OPT: u8 = 0x20;
    // Sentinel for vararg method signature
    pub const SENTINEL: u8 = 0x41;
    // Denotes a local variable that points at a pinned object
    pub const PINNED: u8 = 0x45;
}

#[allow(non_snake_case, dead_code, missing_docs)]
/// Calling convention bits of method signatures (II.23.2.1)
pub mod CALLING_CONVENTION {
    pub const DEFAULT: u8 = 0x00;
    pub const C: u8 = 0x01;
    pub const STDCALL: u8 = 0x02;
    pub const THISCALL: u8 = 0x03;
    pub const FASTCALL: u8 = 0x04;
    pub const VARARG: u8 = 0x05;
    pub const GENERIC: u8 = 0x10;
    pub const HASTHIS: u8 = 0x20;
    pub const EXPLICITTHIS: u8 = 0x40;
}

#[allow(non_snake_case, dead_code, missing_docs)]
/// Leading bytes of non-method signatures
pub mod SIGNATURE_HEADER {
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const PROPERTY: u8 = 0x08;
    pub const GENERIC_INST: u8 = 0x0A;
}

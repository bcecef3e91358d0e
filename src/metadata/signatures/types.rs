use crate::metadata::token::Token;

/// The fully resolved binary shape of a type, as it appears inside signature blobs.
///
/// This is what a resolved [`crate::references::TypeReference`] turns into: named types
/// carry the TypeDef/TypeRef token of their definition, everything else is structural.
/// Types that cannot be named by a single TypeDef/TypeRef token are emitted as TypeSpec rows
/// whose blob is the encoding of this signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeSignature {
    /// `void`
    #[default]
    Void,
    /// `bool`
    Boolean,
    /// `char`
    Char,
    /// `int8`
    I1,
    /// `unsigned int8`
    U1,
    /// `int16`
    I2,
    /// `unsigned int16`
    U2,
    /// `int32`
    I4,
    /// `unsigned int32`
    U4,
    /// `int64`
    I8,
    /// `unsigned int64`
    U8,
    /// `float32`
    R4,
    /// `float64`
    R8,
    /// `string`
    String,
    /// `object`
    Object,
    /// `typedref`
    TypedByRef,
    /// `native int`
    I,
    /// `native unsigned int`
    U,
    /// Reference type - TypeDef or TypeRef token
    Class(Token),
    /// Value type - TypeDef or TypeRef token
    ValueType(Token),
    /// `!n` - type-level generic parameter by position
    GenericParamType(u32),
    /// `!!n` - method-level generic parameter by position
    GenericParamMethod(u32),
    /// Generic instantiation of a `Class`/`ValueType` definition with the given arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// `T[]`
    SzArray(Box<TypeSignature>),
    /// `T[lo...hi, ...]`
    Array(SignatureArray),
    /// `T*`
    Ptr(Box<TypeSignature>),
    /// `T&`
    ByRef(Box<TypeSignature>),
    /// `T pinned` - only meaningful in local variable signatures
    Pinned(Box<TypeSignature>),
    /// `method ...` function pointer
    FnPtr(Box<SignatureMethod>),
    /// `T modreq(...)` / `T modopt(...)`
    Modified(SignatureModified),
}

impl TypeSignature {
    /// Checks whether this signature names a type through a single TypeDef/TypeRef token.
    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self, TypeSignature::Class(_) | TypeSignature::ValueType(_))
    }

    /// Returns the TypeDef/TypeRef token of a named type.
    #[must_use]
    pub fn named_token(&self) -> Option<Token> {
        match self {
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => Some(*token),
            _ => None,
        }
    }

    /// Checks whether this is one of the built-in primitive element types.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            TypeSignature::Void
                | TypeSignature::Boolean
                | TypeSignature::Char
                | TypeSignature::I1
                | TypeSignature::U1
                | TypeSignature::I2
                | TypeSignature::U2
                | TypeSignature::I4
                | TypeSignature::U4
                | TypeSignature::I8
                | TypeSignature::U8
                | TypeSignature::R4
                | TypeSignature::R8
                | TypeSignature::String
                | TypeSignature::Object
                | TypeSignature::TypedByRef
                | TypeSignature::I
                | TypeSignature::U
        )
    }
}

/// A dimension of a general array
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ArrayDimensions {
    /// Number of elements, if specified
    pub size: Option<u32>,
    /// Lower bound, if specified
    pub lower_bound: Option<i32>,
}

/// A general (multi-dimensional or non-zero based) array
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureArray {
    /// The type in the array
    pub base: Box<TypeSignature>,
    /// The number of dimensions
    pub rank: u32,
    /// The dimensions (can be less than 'rank', are in order from 0..count)
    pub dimensions: Vec<ArrayDimensions>,
}

/// A custom modifier (`modreq` / `modopt`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CustomModifier {
    /// `modreq` when true, `modopt` otherwise
    pub is_required: bool,
    /// TypeDef, TypeRef or TypeSpec token of the modifier type
    pub modifier_type: Token,
}

/// A type preceded by custom modifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureModified {
    /// Modifiers in encoding order
    pub modifiers: Vec<CustomModifier>,
    /// The modified type
    pub base: Box<TypeSignature>,
}

/// Parameter with optional custom modifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureParameter {
    /// Custom modifiers of the parameter
    pub modifiers: Vec<CustomModifier>,
    /// Parameter is passed by reference
    pub by_ref: bool,
    /// The type of the parameter
    pub base: TypeSignature,
}

impl From<TypeSignature> for SignatureParameter {
    fn from(base: TypeSignature) -> Self {
        SignatureParameter {
            modifiers: Vec::new(),
            by_ref: false,
            base,
        }
    }
}

/// Represents a method signature (II.23.2.1)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SignatureMethod {
    /// Used to encode the keyword instance in the calling convention, see §II.15.3
    pub has_this: bool,
    /// Used to encode the keyword explicit in the calling convention, see §II.15.3
    pub explicit_this: bool,
    /// Used to encode the keyword vararg in the calling convention, see §II.15.3
    pub vararg: bool,
    /// Uses native 'cdecl' calling convention
    pub cdecl: bool,
    /// Uses native 'stdcall' calling convention
    pub stdcall: bool,
    /// Uses native 'thiscall' calling convention
    pub thiscall: bool,
    /// Uses native 'fastcall' calling convention
    pub fastcall: bool,
    /// Number of generic parameters of a generic method
    pub param_count_generic: u32,
    /// The return type of this `Method`
    pub return_type: SignatureParameter,
    /// The fixed parameters of this `Method`
    pub params: Vec<SignatureParameter>,
    /// The optional tail of a vararg call site, encoded after the sentinel
    pub varargs: Vec<SignatureParameter>,
}

/// Field signature (II.23.2.4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureField {
    /// The custom modifiers for this field
    pub modifiers: Vec<CustomModifier>,
    /// The signature of this type
    pub base: TypeSignature,
}

/// Property signature (II.23.2.5)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureProperty {
    /// Indicates the passing of a 'this' pointer
    pub has_this: bool,
    /// The custom modifiers of the property type
    pub modifiers: Vec<CustomModifier>,
    /// The signature of this property
    pub base: TypeSignature,
    /// The parameters of this property
    pub params: Vec<SignatureParameter>,
}

/// Local variable signature (II.23.2.6)
///
/// `pinned` and by-reference locals are expressed through [`TypeSignature::Pinned`] and
/// [`TypeSignature::ByRef`], which encode in the order the local signature grammar expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureLocalVariables {
    /// The local variables
    pub locals: Vec<TypeSignature>,
}

/// Represents a method specification (II.23.2.15)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SignatureMethodSpec {
    /// Types of the generic arguments
    pub generic_args: Vec<TypeSignature>,
}

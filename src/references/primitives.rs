use std::fmt;

use crate::metadata::signatures::TypeSignature;

/// Built-in types that have their own element type and no TypeDef/TypeRef of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `void`
    Void,
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `int8`
    I1,
    /// `uint8`
    U1,
    /// `int16`
    I2,
    /// `uint16`
    U2,
    /// `int32`
    I4,
    /// `uint32`
    U4,
    /// `int64`
    I8,
    /// `uint64`
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
    TypedRef,
    /// `native int`
    IntPtr,
    /// `native uint`
    UIntPtr,
}

impl PrimitiveType {
    /// Parses the assembler keyword of a primitive type.
    ///
    /// Both `unsigned int32` and `uint32` spellings are accepted.
    #[must_use]
    pub fn from_name(name: &str) -> Option<PrimitiveType> {
        let primitive = match name {
            "void" => PrimitiveType::Void,
            "bool" => PrimitiveType::Bool,
            "char" => PrimitiveType::Char,
            "int8" => PrimitiveType::I1,
            "uint8" | "unsigned int8" => PrimitiveType::U1,
            "int16" => PrimitiveType::I2,
            "uint16" | "unsigned int16" => PrimitiveType::U2,
            "int32" => PrimitiveType::I4,
            "uint32" | "unsigned int32" => PrimitiveType::U4,
            "int64" => PrimitiveType::I8,
            "uint64" | "unsigned int64" => PrimitiveType::U8,
            "float32" => PrimitiveType::R4,
            "float64" => PrimitiveType::R8,
            "string" => PrimitiveType::String,
            "object" => PrimitiveType::Object,
            "typedref" => PrimitiveType::TypedRef,
            "native int" => PrimitiveType::IntPtr,
            "native uint" | "native unsigned int" => PrimitiveType::UIntPtr,
            _ => return None,
        };
        Some(primitive)
    }

    /// The canonical keyword.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Char => "char",
            PrimitiveType::I1 => "int8",
            PrimitiveType::U1 => "uint8",
            PrimitiveType::I2 => "int16",
            PrimitiveType::U2 => "uint16",
            PrimitiveType::I4 => "int32",
            PrimitiveType::U4 => "uint32",
            PrimitiveType::I8 => "int64",
            PrimitiveType::U8 => "uint64",
            PrimitiveType::R4 => "float32",
            PrimitiveType::R8 => "float64",
            PrimitiveType::String => "string",
            PrimitiveType::Object => "object",
            PrimitiveType::TypedRef => "typedref",
            PrimitiveType::IntPtr => "native int",
            PrimitiveType::UIntPtr => "native uint",
        }
    }

    /// The element type signature.
    #[must_use]
    pub fn signature(self) -> TypeSignature {
        match self {
            PrimitiveType::Void => TypeSignature::Void,
            PrimitiveType::Bool => TypeSignature::Boolean,
            PrimitiveType::Char => TypeSignature::Char,
            PrimitiveType::I1 => TypeSignature::I1,
            PrimitiveType::U1 => TypeSignature::U1,
            PrimitiveType::I2 => TypeSignature::I2,
            PrimitiveType::U2 => TypeSignature::U2,
            PrimitiveType::I4 => TypeSignature::I4,
            PrimitiveType::U4 => TypeSignature::U4,
            PrimitiveType::I8 => TypeSignature::I8,
            PrimitiveType::U8 => TypeSignature::U8,
            PrimitiveType::R4 => TypeSignature::R4,
            PrimitiveType::R8 => TypeSignature::R8,
            PrimitiveType::String => TypeSignature::String,
            PrimitiveType::Object => TypeSignature::Object,
            PrimitiveType::TypedRef => TypeSignature::TypedByRef,
            PrimitiveType::IntPtr => TypeSignature::I,
            PrimitiveType::UIntPtr => TypeSignature::U,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_spellings() {
        assert_eq!(
            PrimitiveType::from_name("unsigned int32"),
            Some(PrimitiveType::U4)
        );
        assert_eq!(PrimitiveType::from_name("uint32"), Some(PrimitiveType::U4));
        assert_eq!(PrimitiveType::U4.name(), "uint32");
        assert_eq!(PrimitiveType::from_name("System.Int32"), None);
    }

    #[test]
    fn test_signature_mapping() {
        assert_eq!(PrimitiveType::R8.signature(), TypeSignature::R8);
        assert_eq!(PrimitiveType::IntPtr.signature(), TypeSignature::I);
        assert!(PrimitiveType::String.signature().is_primitive());
    }
}

//! Signature blob encoders (ECMA-335 II.23.2).
//!
//! - [`encode_type_signature`] - A single type, used by every other encoder
//! - [`encode_method_signature`] - MethodDef, MemberRef and stand-alone `calli` signatures
//! - [`encode_field_signature`] - Field and field MemberRef signatures
//! - [`encode_property_signature`] - Property signatures
//! - [`encode_local_var_signature`] - `.locals` signatures for StandAloneSig rows
//! - [`encode_typespec_signature`] - TypeSpec blobs
//! - [`encode_method_spec_signature`] - MethodSpec instantiation blobs

use crate::{
    metadata::{
        signatures::{
            CustomModifier, SignatureArray, SignatureField, SignatureLocalVariables,
            SignatureMethod, SignatureMethodSpec, SignatureParameter, SignatureProperty,
            TypeSignature, CALLING_CONVENTION, ELEMENT_TYPE, SIGNATURE_HEADER,
        },
        tables::TableId,
        token::Token,
    },
    utils::{write_compressed_int, write_compressed_uint},
    Result,
};

/// TypeDefOrRef coded index of `token` (II.23.2.8).
///
/// # Errors
/// Returns an error for tokens outside the TypeDef, TypeRef and TypeSpec tables.
fn encode_type_def_or_ref_coded_index(token: Token) -> Result<u32> {
    match token.table_id() {
        Some(TableId::TypeDef) => Ok(token.row() << 2),
        Some(TableId::TypeRef) => Ok((token.row() << 2) | 1),
        Some(TableId::TypeSpec) => Ok((token.row() << 2) | 2),
        _ => Err(malformed_error!(
            "Invalid token {} for TypeDefOrRef coded index",
            token
        )),
    }
}

/// `CMOD_REQD`/`CMOD_OPT` followed by the modifier type.
fn encode_custom_modifier(modifier: &CustomModifier, buffer: &mut Vec<u8>) -> Result<()> {
    let modifier_type = if modifier.is_required {
        ELEMENT_TYPE::CMOD_REQD
    } else {
        ELEMENT_TYPE::CMOD_OPT
    };
    buffer.push(modifier_type);

    let coded_index = encode_type_def_or_ref_coded_index(modifier.modifier_type)?;
    write_compressed_uint(coded_index, buffer);
    Ok(())
}

/// Element type and `ArrayShape` of a general array (II.23.2.13).
fn encode_array_shape(array: &SignatureArray, buffer: &mut Vec<u8>) -> Result<()> {
    encode_type_signature(&array.base, buffer)?;
    write_compressed_uint(array.rank, buffer);

    // sizes and lower bounds are both prefixes of the dimension list
    let sizes: Vec<u32> = array
        .dimensions
        .iter()
        .map_while(|dimension| dimension.size)
        .collect();
    write_compressed_uint(sizes.len() as u32, buffer);
    for size in sizes {
        write_compressed_uint(size, buffer);
    }

    let bounds: Vec<i32> = array
        .dimensions
        .iter()
        .map_while(|dimension| dimension.lower_bound)
        .collect();
    write_compressed_uint(bounds.len() as u32, buffer);
    for bound in bounds {
        write_compressed_int(bound, buffer);
    }
    Ok(())
}

/// Appends the encoding of a single type to `buffer`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a named type carries a token that is not a
/// TypeDef, TypeRef or TypeSpec.
pub fn encode_type_signature(signature: &TypeSignature, buffer: &mut Vec<u8>) -> Result<()> {
    match signature {
        TypeSignature::Void => buffer.push(ELEMENT_TYPE::VOID),
        TypeSignature::Boolean => buffer.push(ELEMENT_TYPE::BOOLEAN),
        TypeSignature::Char => buffer.push(ELEMENT_TYPE::CHAR),
        TypeSignature::I1 => buffer.push(ELEMENT_TYPE::I1),
        TypeSignature::U1 => buffer.push(ELEMENT_TYPE::U1),
        TypeSignature::I2 => buffer.push(ELEMENT_TYPE::I2),
        TypeSignature::U2 => buffer.push(ELEMENT_TYPE::U2),
        TypeSignature::I4 => buffer.push(ELEMENT_TYPE::I4),
        TypeSignature::U4 => buffer.push(ELEMENT_TYPE::U4),
        TypeSignature::I8 => buffer.push(ELEMENT_TYPE::I8),
        TypeSignature::U8 => buffer.push(ELEMENT_TYPE::U8),
        TypeSignature::R4 => buffer.push(ELEMENT_TYPE::R4),
        TypeSignature::R8 => buffer.push(ELEMENT_TYPE::R8),
        TypeSignature::String => buffer.push(ELEMENT_TYPE::STRING),
        TypeSignature::Object => buffer.push(ELEMENT_TYPE::OBJECT),
        TypeSignature::TypedByRef => buffer.push(ELEMENT_TYPE::TYPEDBYREF),
        TypeSignature::I => buffer.push(ELEMENT_TYPE::I),
        TypeSignature::U => buffer.push(ELEMENT_TYPE::U),
        TypeSignature::Class(token) => {
            buffer.push(ELEMENT_TYPE::CLASS);
            write_compressed_uint(encode_type_def_or_ref_coded_index(*token)?, buffer);
        }
        TypeSignature::ValueType(token) => {
            buffer.push(ELEMENT_TYPE::VALUETYPE);
            write_compressed_uint(encode_type_def_or_ref_coded_index(*token)?, buffer);
        }
        TypeSignature::GenericParamType(index) => {
            buffer.push(ELEMENT_TYPE::VAR);
            write_compressed_uint(*index, buffer);
        }
        TypeSignature::GenericParamMethod(index) => {
            buffer.push(ELEMENT_TYPE::MVAR);
            write_compressed_uint(*index, buffer);
        }
        TypeSignature::GenericInst(definition, args) => {
            if !definition.is_named() {
                return Err(malformed_error!(
                    "Generic instantiation of a non-named type {:?}",
                    definition
                ));
            }
            buffer.push(ELEMENT_TYPE::GENERICINST);
            encode_type_signature(definition, buffer)?;
            write_compressed_uint(args.len() as u32, buffer);
            for arg in args {
                encode_type_signature(arg, buffer)?;
            }
        }
        TypeSignature::SzArray(base) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            encode_type_signature(base, buffer)?;
        }
        TypeSignature::Array(array) => {
            buffer.push(ELEMENT_TYPE::ARRAY);
            encode_array_shape(array, buffer)?;
        }
        TypeSignature::Ptr(base) => {
            buffer.push(ELEMENT_TYPE::PTR);
            encode_type_signature(base, buffer)?;
        }
        TypeSignature::ByRef(base) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type_signature(base, buffer)?;
        }
        TypeSignature::Pinned(base) => {
            buffer.push(ELEMENT_TYPE::PINNED);
            encode_type_signature(base, buffer)?;
        }
        TypeSignature::FnPtr(method) => {
            buffer.push(ELEMENT_TYPE::FNPTR);
            buffer.extend_from_slice(&encode_method_signature(method)?);
        }
        TypeSignature::Modified(modified) => {
            for modifier in &modified.modifiers {
                encode_custom_modifier(modifier, buffer)?;
            }
            encode_type_signature(&modified.base, buffer)?;
        }
    }
    Ok(())
}

fn encode_parameter(parameter: &SignatureParameter, buffer: &mut Vec<u8>) -> Result<()> {
    for modifier in &parameter.modifiers {
        encode_custom_modifier(modifier, buffer)?;
    }

    if parameter.by_ref {
        buffer.push(ELEMENT_TYPE::BYREF);
    }

    encode_type_signature(&parameter.base, buffer)
}

/// Encodes a method signature.
///
/// A vararg signature with a non-empty `varargs` tail is a call-site signature: the tail
/// follows a sentinel and counts towards the parameter count.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid type tokens or oversized parameter lists.
pub fn encode_method_signature(signature: &SignatureMethod) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    // Priority: check most specific conventions first to handle mutual exclusivity
    let mut calling_convention = if signature.vararg {
        CALLING_CONVENTION::VARARG
    } else if signature.fastcall {
        CALLING_CONVENTION::FASTCALL
    } else if signature.thiscall {
        CALLING_CONVENTION::THISCALL
    } else if signature.stdcall {
        CALLING_CONVENTION::STDCALL
    } else if signature.cdecl {
        CALLING_CONVENTION::C
    } else {
        CALLING_CONVENTION::DEFAULT
    };

    if signature.has_this {
        calling_convention |= CALLING_CONVENTION::HASTHIS;
    }
    if signature.explicit_this {
        calling_convention |= CALLING_CONVENTION::EXPLICITTHIS;
    }
    if signature.param_count_generic > 0 {
        calling_convention |= CALLING_CONVENTION::GENERIC;
    }

    buffer.push(calling_convention);

    if signature.param_count_generic > 0 {
        write_compressed_uint(signature.param_count_generic, &mut buffer);
    }

    let param_count = u32::try_from(signature.params.len() + signature.varargs.len())
        .map_err(|_| malformed_error!("Too many parameters in method signature"))?;
    write_compressed_uint(param_count, &mut buffer);

    encode_parameter(&signature.return_type, &mut buffer)?;
    for param in &signature.params {
        encode_parameter(param, &mut buffer)?;
    }

    if !signature.varargs.is_empty() {
        buffer.push(ELEMENT_TYPE::SENTINEL);
        for param in &signature.varargs {
            encode_parameter(param, &mut buffer)?;
        }
    }

    Ok(buffer)
}

/// Encodes a field signature.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid type tokens.
pub fn encode_field_signature(signature: &SignatureField) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE_HEADER::FIELD];

    for modifier in &signature.modifiers {
        encode_custom_modifier(modifier, &mut buffer)?;
    }

    encode_type_signature(&signature.base, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a property signature.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid type tokens.
pub fn encode_property_signature(signature: &SignatureProperty) -> Result<Vec<u8>> {
    let mut prolog = SIGNATURE_HEADER::PROPERTY;
    if signature.has_this {
        prolog |= CALLING_CONVENTION::HASTHIS;
    }
    let mut buffer = vec![prolog];

    write_compressed_uint(signature.params.len() as u32, &mut buffer);

    for modifier in &signature.modifiers {
        encode_custom_modifier(modifier, &mut buffer)?;
    }
    encode_type_signature(&signature.base, &mut buffer)?;

    for param in &signature.params {
        encode_parameter(param, &mut buffer)?;
    }
    Ok(buffer)
}

/// Encodes a local variable signature.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid type tokens or too many locals.
pub fn encode_local_var_signature(signature: &SignatureLocalVariables) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE_HEADER::LOCAL_SIG];

    let count = u16::try_from(signature.locals.len()).map_err(|_| {
        malformed_error!(
            "LocalVar signature has too many locals: {}",
            signature.locals.len()
        )
    })?;
    write_compressed_uint(u32::from(count), &mut buffer);

    for local in &signature.locals {
        encode_type_signature(local, &mut buffer)?;
    }
    Ok(buffer)
}

/// Encodes a TypeSpec blob.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid type tokens.
pub fn encode_typespec_signature(signature: &TypeSignature) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_type_signature(signature, &mut buffer)?;
    Ok(buffer)
}

/// Encodes a MethodSpec instantiation blob.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid type tokens.
pub fn encode_method_spec_signature(signature: &SignatureMethodSpec) -> Result<Vec<u8>> {
    let mut buffer = vec![SIGNATURE_HEADER::GENERIC_INST];
    write_compressed_uint(signature.generic_args.len() as u32, &mut buffer);
    for arg in &signature.generic_args {
        encode_type_signature(arg, &mut buffer)?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::ArrayDimensions;

    #[test]
    fn test_encode_static_method_signature() {
        let signature = SignatureMethod {
            return_type: TypeSignature::Void.into(),
            params: vec![TypeSignature::I4.into(), TypeSignature::String.into()],
            ..SignatureMethod::default()
        };

        let encoded = encode_method_signature(&signature).unwrap();
        assert_eq!(encoded, vec![0x00, 0x02, 0x01, 0x08, 0x0E]);
    }

    #[test]
    fn test_encode_instance_generic_method() {
        let signature = SignatureMethod {
            has_this: true,
            param_count_generic: 1,
            return_type: TypeSignature::GenericParamMethod(0).into(),
            params: vec![TypeSignature::GenericParamType(0).into()],
            ..SignatureMethod::default()
        };

        let encoded = encode_method_signature(&signature).unwrap();
        assert_eq!(encoded, vec![0x30, 0x01, 0x01, 0x1E, 0x00, 0x13, 0x00]);
    }

    #[test]
    fn test_encode_vararg_call_site() {
        let signature = SignatureMethod {
            vararg: true,
            return_type: TypeSignature::Void.into(),
            params: vec![TypeSignature::I4.into()],
            varargs: vec![
                TypeSignature::R8.into(),
                TypeSignature::R8.into(),
                TypeSignature::R8.into(),
            ],
            ..SignatureMethod::default()
        };

        let encoded = encode_method_signature(&signature).unwrap();
        assert_eq!(
            encoded,
            vec![0x05, 0x04, 0x01, 0x08, 0x41, 0x0D, 0x0D, 0x0D]
        );
    }

    #[test]
    fn test_encode_field_with_modifier() {
        let modreq = Token::from_parts(TableId::TypeRef, 2);
        let signature = SignatureField {
            modifiers: vec![CustomModifier {
                is_required: true,
                modifier_type: modreq,
            }],
            base: TypeSignature::I4,
        };

        let encoded = encode_field_signature(&signature).unwrap();
        assert_eq!(encoded, vec![0x06, 0x1F, 0x09, 0x08]);
    }

    #[test]
    fn test_encode_generic_instance_typespec() {
        let list = Token::from_parts(TableId::TypeRef, 1);
        let signature = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(list)),
            vec![TypeSignature::I4],
        );

        let encoded = encode_typespec_signature(&signature).unwrap();
        assert_eq!(encoded, vec![0x15, 0x12, 0x05, 0x01, 0x08]);
    }

    #[test]
    fn test_encode_general_array() {
        let signature = TypeSignature::Array(SignatureArray {
            base: Box::new(TypeSignature::I4),
            rank: 2,
            dimensions: vec![
                ArrayDimensions {
                    size: Some(3),
                    lower_bound: Some(0),
                },
                ArrayDimensions {
                    size: None,
                    lower_bound: Some(-3),
                },
            ],
        });

        let encoded = encode_typespec_signature(&signature).unwrap();
        assert_eq!(
            encoded,
            vec![0x14, 0x08, 0x02, 0x01, 0x03, 0x02, 0x00, 0x7B]
        );
    }

    #[test]
    fn test_encode_pinned_byref_local() {
        let signature = SignatureLocalVariables {
            locals: vec![
                TypeSignature::Pinned(Box::new(TypeSignature::ByRef(Box::new(
                    TypeSignature::I4,
                )))),
                TypeSignature::String,
            ],
        };

        let encoded = encode_local_var_signature(&signature).unwrap();
        assert_eq!(encoded, vec![0x07, 0x02, 0x45, 0x10, 0x08, 0x0E]);
    }

    #[test]
    fn test_encode_method_spec() {
        let signature = SignatureMethodSpec {
            generic_args: vec![TypeSignature::I4, TypeSignature::String],
        };
        let encoded = encode_method_spec_signature(&signature).unwrap();
        assert_eq!(encoded, vec![0x0A, 0x02, 0x08, 0x0E]);
    }

    #[test]
    fn test_invalid_coded_index_token() {
        let signature = TypeSignature::Class(Token::from_parts(TableId::Field, 1));
        assert!(encode_typespec_signature(&signature).is_err());
    }
}

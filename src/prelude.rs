//! # cilasm Prelude
//!
//! The types a front end needs to drive an assembly run, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilasm operations
pub use crate::Error;

/// The result type used throughout cilasm
pub use crate::Result;

/// What kind of symbol an undefined/duplicate error names
pub use crate::SymbolKind;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Builder surface, configuration and output
pub use crate::assembler::{
    AssembledModule, AssemblerConfig, AssemblyManifest, AssemblyOutput, ExternAssembly,
    MetadataWriter, MethodBody, ModuleAssembler,
};

// ================================================================================================
// References and Generics
// ================================================================================================

/// Type and member mentions
pub use crate::references::{
    ExternalScope, FieldRefSignature, MemberRefId, MethodRefSignature, Modifier, PrimitiveType,
    TypeRefId,
};

/// Generic parameters and their mentions
pub use crate::generics::{GenericParamKind, GenericParamRef, GenericParameter, GenericParameters};

// ================================================================================================
// Definitions
// ================================================================================================

/// Declarations the builder accepts
pub use crate::definitions::{
    AttributeTarget, ConstantValue, EventDefinition, FieldDefinition, MethodDefinition,
    PInvokeInfo, ParamDefinition, PropertyDefinition, TypeDefinition,
};

// ================================================================================================
// Method Bodies
// ================================================================================================

/// Instruction operands and body structures
pub use crate::body::{InstructionStream, LabelHandle, Operand, TokenOperand, TryBlock, VarRef};

// ================================================================================================
// Metadata
// ================================================================================================

/// Attribute flags
pub use crate::metadata::flags::{
    EventAttributes, ExceptionHandlerFlags, FieldAttributes, GenericParamAttributes,
    MethodAttributes, MethodImplAttributes, ParamAttributes, PropertyAttributes, TypeAttributes,
};

/// Tables and tokens
pub use crate::metadata::{
    tables::{MetadataTables, TableId},
    token::Token,
};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Diagnostics sink and entries
pub use crate::diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticCode, DiagnosticSeverity, Diagnostics, Location,
};

//! Method bodies: instruction streams, labels, exception regions and encoding.
//!
//! A body is accumulated as an [`InstructionStream`] while the front end feeds instructions
//! and is finalized only once the whole body is known. Until then every operand stays
//! symbolic: labels are [`LabelHandle`]s into the body's [`LabelTable`], and members and
//! types are ids into the run-wide reference arenas.
//!
//! # Finalization
//!
//! [`finalize_body`] runs a single pass over the completed stream:
//!
//! 1. compute the byte offset of every instruction (branch forms are taken as written)
//! 2. resolve every label to an offset and collapse labels at the same offset
//! 3. encode each instruction, turning label operands into relative offsets and member/type
//!    operands into tokens via an [`OperandResolver`]
//! 4. resolve the exception regions into [`ExceptionClause`]s
//!
//! A named label that was mentioned but never defined fails the body with
//! [`crate::Error::UndefinedLabel`].

mod exceptions;
mod finalize;
mod labels;
mod stream;

pub use exceptions::{ExceptionRegions, HandlerClause, HandlerKind, TryBlock};
pub use finalize::{
    finalize_body, BinaryLabel, BodyLayout, ExceptionClause, FinalizedBody, OperandResolver,
};
pub use labels::{LabelHandle, LabelKey, LabelTable, LabelTarget};
pub use stream::{
    Instruction, InstructionKind, InstructionStream, LocalVariable, Operand, TokenOperand, VarRef,
};

//! CIL instruction set knowledge used by the method body encoder.
//!
//! The assembler only needs the static side of the instruction set: how each mnemonic is
//! encoded and what kind of inline operand it expects. Symbolic operands, labels and the
//! encoding pass live in [`crate::body`].

pub mod opcodes;

pub use opcodes::{OpCode, OperandKind, OPCODES};

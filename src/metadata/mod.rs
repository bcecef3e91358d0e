//! Binary metadata layer: tokens, tables, heaps, signatures and attribute flags.
//!
//! This is the handle-producing side of the assembler. The resolution engine never writes
//! bytes itself; it asks this layer for rows and receives [`token::Token`]s back. The rows,
//! heaps and signature blobs collected here are what an external metadata writer
//! serialises into the final module.
//!
//! # Key Components
//!
//! - [`token`] - 32-bit table/row handles
//! - [`tables`] - Row types, [`tables::MetadataTables`] and the interning heaps
//! - [`signatures`] - Resolved signature types and their blob encoders
//! - [`flags`] - Attribute bitmasks for types, members, parameters and generic parameters

pub mod flags;
pub mod signatures;
pub mod tables;
pub mod token;

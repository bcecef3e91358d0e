// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # cilasm
//!
//! The resolution back end of a CIL assembler. A textual front end (not part of this crate)
//! parses `.il` source and drives a [`assembler::ModuleAssembler`] with builder calls; this
//! crate turns those calls into ECMA-335 metadata rows, signature blobs and encoded method
//! bodies, ready for a PE/metadata writer.
//!
//! ## Features
//!
//! - **Forward references** - types and members may be used before they are declared; a
//!   reference and its later definition share one node and one token
//! - **Lazy, memoized resolution** - every type and member mention is interned once and
//!   resolved at most once per run
//! - **Generics** - by-name and positional generic parameters, canonical instantiation
//!   caches for types and methods, arity checks
//! - **Method bodies** - named and offset labels, exception regions, locals, `switch`,
//!   `calli`, vararg call sites, `.line` tables
//! - **Complete diagnostics** - the run never stops at the first error; every problem is
//!   reported with all of its source locations
//!
//! ## Quick Start
//!
//! ```rust
//! use cilasm::prelude::*;
//!
//! let mut asm = ModuleAssembler::default();
//! asm.assembly(AssemblyManifest::new("Hello"));
//! let void = asm.primitive(PrimitiveType::Void);
//!
//! asm.begin_method(MethodDefinition::new("Main", void).with_flags(MethodAttributes::STATIC))?;
//! asm.entry_point()?;
//! asm.emit("ret", Operand::None)?;
//! asm.end_method()?;
//!
//! let output = asm.assemble();
//! println!("{}", output.diagnostics.summary());
//! let module = output.into_result()?;
//! assert_eq!(module.bodies.len(), 1);
//! # Ok::<(), cilasm::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`references`] - interned type and member mentions and their signature keys
//! - [`generics`] - generic scopes, parameter binding and instantiation caches
//! - [`definitions`] - definition tables, definition nodes and their lifecycle
//! - [`body`] - instruction streams, labels, exception regions and body encoding
//! - [`assembler`] - the builder surface and the resolve/define pipeline
//! - [`metadata`] - tokens, tables, heaps, signature blobs and attribute flags
//! - [`assembly`] - the CIL opcode table
//! - [`diagnostics`] - the diagnostics sink every run reports into
//! - [`Error`] and [`Result`] - error handling

#[macro_use]
pub(crate) mod error;
pub(crate) mod utils;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use cilasm::prelude::*;
///
/// let mut asm = ModuleAssembler::new(AssemblerConfig::strict());
/// let int32 = asm.primitive(PrimitiveType::I4);
/// assert_eq!(asm.context().types().name(int32), "int32");
/// ```
pub mod prelude;

/// Binary metadata layer: tokens, tables, heaps, signatures and flags (ECMA-335 II.22-II.24)
pub mod metadata;

/// CIL opcode table (ECMA-335 III)
pub mod assembly;

/// Interned type and member references
pub mod references;

/// Generic parameters, scopes and instantiation caches
pub mod generics;

/// Definition tables and definition nodes
pub mod definitions;

/// Method bodies: instruction streams, labels and exception regions
pub mod body;

/// The builder surface and the resolve/define pipeline
///
/// # Examples
///
/// ```rust
/// use cilasm::{assembler::ModuleAssembler, Error};
///
/// let mut asm = ModuleAssembler::default();
/// let foo = asm.local_type("Foo", None);
/// let output = asm.assemble();
///
/// // `Foo` was mentioned but never declared
/// assert!(!output.is_success());
/// assert_eq!(output.diagnostics.error_count(), 1);
/// # let _ = foo;
/// # Ok::<(), Error>(())
/// ```
pub mod assembler;

/// Diagnostics collected during a run
pub mod diagnostics;

/// `cilasm` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilasm` Error type
///
/// # Examples
///
/// ```rust
/// use cilasm::{Error, SymbolKind};
///
/// let error = Error::UndefinedSymbol { kind: SymbolKind::Type, name: "Foo".into() };
/// assert_eq!(error.to_string(), "Undefined type - Foo");
/// ```
pub use error::{Error, SymbolKind};

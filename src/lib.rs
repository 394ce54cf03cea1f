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

//! # classfold
//!
//! A post-compilation constant inliner for JVM classfiles. `classfold` loads
//! compiled classes, proves that expressions evaluate to the same value in
//! every environment, and rewrites the bytecode so the value is embedded
//! directly and the computation disappears.
//!
//! ```text
//! ldc "8080"                                    sipush 8080
//! invokestatic Integer.parseInt(String)I   =>
//! ```
//!
//! ## Features
//!
//! - **Backward stack reconstruction** - a symbolic interpreter walks from a
//!   call site back to the instructions producing its operands
//! - **Bytecode deconstruction** - values are written back as the shortest
//!   instruction sequences, including arrays, enum constants and configured
//!   constructor or factory calls
//! - **Field propagation** - `static final` fields proven constant move into
//!   their `ConstantValue` attribute and their reads are substituted
//! - **Conservative by default** - anything that could differ between runs,
//!   or that depends on control flow, is left untouched
//! - **Deterministic** - classes, fields and sites are processed in a stable
//!   order
//!
//! ## Quick Start
//!
//! ```rust
//! use classfold::prelude::*;
//!
//! let mut class = ClassNode::new("com/example/Server");
//! class.methods.push(MethodNode::new(
//!     AccessFlags::STATIC,
//!     "port",
//!     "()I",
//!     InsnList::from_insns([
//!         Insn::ldc_string("8080"),
//!         Insn::invokestatic("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I"),
//!         Insn::Simple(Opcode::Ireturn),
//!     ]),
//! ));
//!
//! let output = Transformer::new(TransformConfig::default()).run(vec![((), class)])?;
//! assert_eq!(output.stats.instructions_replaced, 1);
//! # Ok::<(), classfold::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`classfile`] - the class tree: nodes, instruction lists, descriptors
//! - [`runtime`] - values and the host runtime the engine may query
//! - [`registry`] - member keys and reconstruction strategies
//! - [`reconstruct`] - the stack reconstruction engine
//! - [`deconstruct`] - the bytecode writer and deconstruction strategies
//! - [`transform`] - the fixed-point driver
//! - [`diagnostics`] - event log and failure context chains
//!
//! ## Error Handling
//!
//! Most failures are local: a call site that cannot be proven constant is
//! left alone, and a call that fails on the host runtime is recorded in the
//! event log with its full context chain. Only input-level inconsistencies
//! abort a run:
//!
//! ```rust
//! use classfold::{prelude::*, Error};
//!
//! let twice = vec![(1, ClassNode::new("a/A")), (2, ClassNode::new("a/A"))];
//! match Transformer::default().run(twice) {
//!     Err(Error::DuplicateClass(name)) => assert_eq!(name, "a/A"),
//!     _ => unreachable!(),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
pub mod prelude;

/// The class tree the transformation operates on, and the codec boundary.
pub mod classfile;

/// Values and the host runtime model.
pub mod runtime;

/// Member identities and reconstruction strategies.
pub mod registry;

/// The backward stack reconstruction engine.
pub mod reconstruct;

/// Writing values back as bytecode.
pub mod deconstruct;

/// The fixed-point class transformation driver.
pub mod transform;

/// Structured events and failure context chains.
pub mod diagnostics;

/// `classfold` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `classfold` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

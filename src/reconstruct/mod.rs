//! Stack reconstruction: proving what value an instruction leaves on the
//! operand stack.
//!
//! # Key Components
//!
//! - [`StackReconstructor`] - the backward symbolic interpreter
//! - [`ReconstructionContext`] - expected type, location, force mode, loader
//! - [`ReconstructedValue`] / [`StackInfo`] - a proven value, its span and
//!   provenance
//! - [`ops`] - JVM arithmetic and conversion semantics
//!
//! # Example
//!
//! ```rust
//! use classfold::classfile::{Insn, InsnList, Opcode};
//! use classfold::diagnostics::BytecodeLocation;
//! use classfold::reconstruct::{ReconstructionContext, StackReconstructor};
//! use classfold::registry::Registries;
//! use classfold::runtime::{InputClasses, Value};
//! use rustc_hash::FxHashSet;
//!
//! let list = InsnList::from_insns([
//!     Insn::Simple(Opcode::Iconst3),
//!     Insn::Simple(Opcode::Iconst4),
//!     Insn::Simple(Opcode::Imul),
//! ]);
//! let (safe, registries, inputs) = (FxHashSet::default(), Registries::new(), InputClasses::new());
//! let engine = StackReconstructor::new(&list, &safe, &registries, &inputs);
//! let ctx = ReconstructionContext::new(BytecodeLocation::new("a/B", "f", "()I"));
//!
//! let value = engine.reconstruct(&ctx, list.last().unwrap())?.unwrap();
//! assert_eq!(value.value, Value::Int(12));
//! assert_eq!(value.first, list.first().unwrap());
//! # Ok::<(), classfold::Error>(())
//! ```

mod concat;
mod context;
mod engine;
mod info;
pub mod ops;

pub use concat::{concat, concat_kind, ConcatKind};
pub use context::ReconstructionContext;
pub use engine::{StackReconstructor, DEFAULT_MAX_DEPTH, MAX_ARRAY_LENGTH};
pub use info::{ReconstructedValue, StackInfo};

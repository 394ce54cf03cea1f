//! Bytecode deconstruction: writing values back as instructions.
//!
//! The inverse of [`crate::reconstruct`]. Given a slot type and a value,
//! [`BytecodeWriter`] emits the shortest instruction sequence that leaves an
//! equal value on the stack. Host objects are handed to the [`Deconstructor`]
//! registered for their runtime type.
//!
//! A writer never fails softly with an error: a value it cannot express is
//! `Ok(None)` and the call site is left alone.

mod strategy;
mod writer;

pub use strategy::{
    CanonicalInstanceDeconstructor, ConstructorDeconstructor, DataAccessor, Deconstructor,
    PreferredDeconstructor, SelectingDeconstructor, Selector, StaticFactoryDeconstructor,
};
pub use writer::{int_literal, BytecodeWriter};

use crate::{classfile::Insn, reconstruct::StackInfo};

/// Instructions pushing a value, with the provenance they encode.
#[derive(Debug, Clone, PartialEq)]
pub struct DeconstructionResult {
    /// The emitted instructions, in program order
    pub insns: Vec<Insn>,
    /// What the instructions compute
    pub info: StackInfo,
}

impl DeconstructionResult {
    /// Pairs instructions with their provenance.
    #[must_use]
    pub fn new(insns: Vec<Insn>, info: StackInfo) -> Self {
        DeconstructionResult { insns, info }
    }
}

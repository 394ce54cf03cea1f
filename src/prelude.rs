//! # classfold Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the classfold library. Import this module to get quick access to everything needed
//! to configure and run a transformation.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classfold operations
pub use crate::Error;

/// The result type used throughout classfold
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The transformation driver and its configuration
pub use crate::transform::{TransformConfig, TransformOutput, Transformer};

// ================================================================================================
// Class Tree
// ================================================================================================

/// Class, field and method nodes
pub use crate::classfile::{AccessFlags, ClassCodec, ClassNode, FieldNode, MethodNode, TryCatchBlock};

/// Instructions and their operands
pub use crate::classfile::{
    Constant, FieldRef, Handle, Insn, InsnId, InsnList, LabelId, MethodRef, Opcode,
};

/// Descriptors
pub use crate::classfile::{MethodDescriptor, Type};

// ================================================================================================
// Host Runtime
// ================================================================================================

/// Values and host runtime traits
pub use crate::runtime::{
    ClassLoader, EnumConstant, HostClass, HostObject, MapClassLoader, SimpleClass, Value,
};

// ================================================================================================
// Strategies
// ================================================================================================

/// Reconstruction strategies
pub use crate::registry::{
    HostFieldReconstructor, HostMethodReconstructor, MemberKey, NativeReconstructor,
    Reconstructor,
};

/// Deconstruction strategies
pub use crate::deconstruct::{
    CanonicalInstanceDeconstructor, ConstructorDeconstructor, DataAccessor, Deconstructor,
    PreferredDeconstructor, SelectingDeconstructor, StaticFactoryDeconstructor,
};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Event log and statistics
pub use crate::diagnostics::{EventKind, EventLog, TransformStats};

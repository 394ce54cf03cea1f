//! The mutable class tree the transformation works on.
//!
//! This is the boundary to the classfile codec. A [`ClassCodec`] turns bytes
//! into a [`ClassNode`] and back; everything in between operates on the tree:
//! fields with their optional `ConstantValue`, methods with an arena-backed
//! [`InsnList`] and their exception table.
//!
//! # Key Components
//!
//! - [`ClassNode`], [`FieldNode`], [`MethodNode`] - the class tree
//! - [`InsnList`] / [`InsnId`] - the instruction list of a method body
//! - [`Insn`] - one instruction node, with [`Opcode`] and its operands
//! - [`Type`] / [`MethodDescriptor`] - parsed descriptors
//! - [`ClassCodec`] - the byte-level reader and writer

use bitflags::bitflags;
use rustc_hash::FxHashSet;

use crate::Result;

mod insn;
mod list;
mod opcodes;
mod types;

pub use insn::{
    Constant, FieldRef, Handle, Insn, LabelId, MethodRef, H_GETFIELD, H_GETSTATIC,
    H_INVOKEINTERFACE, H_INVOKESPECIAL, H_INVOKESTATIC, H_INVOKEVIRTUAL, H_NEWINVOKESPECIAL,
    H_PUTFIELD, H_PUTSTATIC,
};
pub use list::{InsnId, InsnIter, InsnList};
pub use opcodes::{array_type, NumericKind, Opcode};
pub use types::{MethodDescriptor, Type, CLASS, ENUM, OBJECT, STRING};

/// Name of the static initializer.
pub const CLINIT: &str = "<clinit>";
/// Name of instance constructors.
pub const INIT: &str = "<init>";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Access flags of classes, fields and methods
    pub struct AccessFlags: u16 {
        /// `ACC_PUBLIC`
        const PUBLIC = 0x0001;
        /// `ACC_PRIVATE`
        const PRIVATE = 0x0002;
        /// `ACC_PROTECTED`
        const PROTECTED = 0x0004;
        /// `ACC_STATIC`
        const STATIC = 0x0008;
        /// `ACC_FINAL`
        const FINAL = 0x0010;
        /// `ACC_SUPER` on classes, `ACC_SYNCHRONIZED` on methods
        const SUPER = 0x0020;
        /// `ACC_VOLATILE` on fields, `ACC_BRIDGE` on methods
        const VOLATILE = 0x0040;
        /// `ACC_TRANSIENT` on fields, `ACC_VARARGS` on methods
        const TRANSIENT = 0x0080;
        /// `ACC_NATIVE`
        const NATIVE = 0x0100;
        /// `ACC_INTERFACE`
        const INTERFACE = 0x0200;
        /// `ACC_ABSTRACT`
        const ABSTRACT = 0x0400;
        /// `ACC_STRICT`
        const STRICT = 0x0800;
        /// `ACC_SYNTHETIC`
        const SYNTHETIC = 0x1000;
        /// `ACC_ANNOTATION`
        const ANNOTATION = 0x2000;
        /// `ACC_ENUM`
        const ENUM = 0x4000;
    }
}

/// An entry of a method's exception table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// Start of the protected range (inclusive)
    pub start: LabelId,
    /// End of the protected range (exclusive)
    pub end: LabelId,
    /// Handler entry point
    pub handler: LabelId,
    /// Internal name of the caught type, `None` for `finally`
    pub catch_type: Option<String>,
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    /// Access flags
    pub access: AccessFlags,
    /// Field name
    pub name: String,
    /// Field descriptor
    pub desc: String,
    /// The `ConstantValue` attribute, if any
    pub value: Option<Constant>,
}

impl FieldNode {
    /// Creates a field without a constant value.
    pub fn new(access: AccessFlags, name: impl Into<String>, desc: impl Into<String>) -> Self {
        FieldNode {
            access,
            name: name.into(),
            desc: desc.into(),
            value: None,
        }
    }

    /// Returns `true` for `static final` fields.
    #[must_use]
    pub fn is_static_final(&self) -> bool {
        self.access.contains(AccessFlags::STATIC | AccessFlags::FINAL)
    }
}

/// A method declaration with its body.
#[derive(Debug, Clone)]
pub struct MethodNode {
    /// Access flags
    pub access: AccessFlags,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub desc: String,
    /// Instruction list; empty for abstract and native methods
    pub insns: InsnList,
    /// Exception table
    pub try_catch: Vec<TryCatchBlock>,
}

impl MethodNode {
    /// Creates a method with the given body and no exception table.
    pub fn new(
        access: AccessFlags,
        name: impl Into<String>,
        desc: impl Into<String>,
        insns: InsnList,
    ) -> Self {
        MethodNode {
            access,
            name: name.into(),
            desc: desc.into(),
            insns,
            try_catch: Vec::new(),
        }
    }

    /// Returns `true` for the static initializer.
    #[must_use]
    pub fn is_clinit(&self) -> bool {
        self.name == CLINIT
    }

    /// Labels reachable from somewhere other than their fall-through
    /// predecessor: jump and switch targets plus exception handler entries.
    #[must_use]
    pub fn jump_targets(&self) -> FxHashSet<LabelId> {
        let mut targets = self.insns.jump_targets();
        targets.extend(self.try_catch.iter().map(|block| block.handler));
        targets
    }

    /// Labels of this body that no jump, switch or handler targets.
    ///
    /// A backward scan may cross these without losing track of the operand
    /// stack, since control can only reach them by falling through.
    #[must_use]
    pub fn safe_labels(&self) -> FxHashSet<LabelId> {
        let targets = self.jump_targets();
        self.insns
            .iter()
            .filter_map(|(_, insn)| match insn {
                Insn::Label(label) if !targets.contains(label) => Some(*label),
                _ => None,
            })
            .collect()
    }
}

/// A class: its identity, fields and methods.
#[derive(Debug, Clone)]
pub struct ClassNode {
    /// Classfile major version, kept for the codec
    pub version: u32,
    /// Access flags
    pub access: AccessFlags,
    /// Internal name
    pub name: String,
    /// Internal name of the superclass, `None` only for `java/lang/Object`
    pub super_name: Option<String>,
    /// Implemented interfaces
    pub interfaces: Vec<String>,
    /// Declared fields in declaration order
    pub fields: Vec<FieldNode>,
    /// Declared methods in declaration order
    pub methods: Vec<MethodNode>,
}

impl ClassNode {
    /// Creates an empty public class extending `java/lang/Object`.
    pub fn new(name: impl Into<String>) -> Self {
        ClassNode {
            version: 52,
            access: AccessFlags::PUBLIC | AccessFlags::SUPER,
            name: name.into(),
            super_name: Some(OBJECT.to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Returns `true` if this class is an enum.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.access.contains(AccessFlags::ENUM) && self.super_name.as_deref() == Some(ENUM)
    }

    /// Looks up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Looks up a declared method by name and descriptor.
    #[must_use]
    pub fn method(&self, name: &str, desc: &str) -> Option<&MethodNode> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.desc == desc)
    }

    /// Index of the static initializer in [`ClassNode::methods`].
    #[must_use]
    pub fn clinit_index(&self) -> Option<usize> {
        self.methods.iter().position(MethodNode::is_clinit)
    }
}

/// Reads and writes classfiles.
///
/// The transformation engine never touches bytes itself; callers that work
/// on raw classfiles plug a codec into [`crate::transform::Transformer::run_bytes`].
pub trait ClassCodec {
    /// Parses a classfile into a tree, expanding compact encodings
    /// (`iload_0`, `ldc_w`, `goto_w`, ...) into their general form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Codec`] if the bytes are not a valid classfile.
    fn read(&self, bytes: &[u8]) -> Result<ClassNode>;

    /// Serializes a tree back to a classfile, recomputing frames and maxima.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Codec`] if the tree cannot be encoded.
    fn write(&self, class: &ClassNode) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_labels_exclude_handlers() {
        let insns = InsnList::from_insns(vec![
            Insn::Label(LabelId(0)),
            Insn::Simple(Opcode::Nop),
            Insn::Label(LabelId(1)),
            Insn::Simple(Opcode::Return),
            Insn::Label(LabelId(2)),
            Insn::Simple(Opcode::Athrow),
        ]);
        let mut method = MethodNode::new(AccessFlags::STATIC, CLINIT, "()V", insns);
        method.try_catch.push(TryCatchBlock {
            start: LabelId(0),
            end: LabelId(1),
            handler: LabelId(2),
            catch_type: None,
        });
        let safe = method.safe_labels();
        assert!(safe.contains(&LabelId(0)));
        assert!(safe.contains(&LabelId(1)));
        assert!(!safe.contains(&LabelId(2)));
    }

    #[test]
    fn test_static_final() {
        let field = FieldNode::new(
            AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL,
            "X",
            "I",
        );
        assert!(field.is_static_final());
        let field = FieldNode::new(AccessFlags::STATIC, "Y", "I");
        assert!(!field.is_static_final());
    }
}

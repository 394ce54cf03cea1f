//! Provenance of reconstructed values.

use std::fmt;

use crate::{
    classfile::{InsnId, Opcode, Type},
    registry::MemberKey,
    runtime::Value,
};

/// Where a reconstructed value came from.
///
/// Only used to describe replacements and failures to humans; nothing
/// computes with it.
#[derive(Debug, Clone, PartialEq)]
pub enum StackInfo {
    /// A literal push
    Constant(Value),
    /// A static field read
    StaticField(MemberKey),
    /// An instance field read
    InstanceField {
        /// The field
        key: MemberKey,
        /// The receiver
        instance: Box<StackInfo>,
    },
    /// A static call
    StaticMethod {
        /// The method
        key: MemberKey,
        /// The arguments
        args: Vec<StackInfo>,
    },
    /// An instance call
    InstanceMethod {
        /// The method
        key: MemberKey,
        /// The receiver
        instance: Box<StackInfo>,
        /// The arguments
        args: Vec<StackInfo>,
    },
    /// A `new`/`<init>` pair
    Constructor {
        /// The constructor
        key: MemberKey,
        /// The arguments
        args: Vec<StackInfo>,
    },
    /// An array allocation, possibly followed by element stores
    ArrayLiteral {
        /// Component type
        component: Type,
        /// Stored elements; absent slots keep their default
        elements: Vec<StackInfo>,
    },
    /// `xaload`
    ArrayLoad {
        /// The array
        array: Box<StackInfo>,
        /// The index
        index: Box<StackInfo>,
    },
    /// `arraylength`
    ArrayLength(Box<StackInfo>),
    /// An arithmetic, conversion or cast instruction
    Operator {
        /// The operator
        opcode: Opcode,
        /// Its operands in stack order
        operands: Vec<StackInfo>,
    },
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[StackInfo]) -> fmt::Result {
    f.write_str("(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

impl fmt::Display for StackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackInfo::Constant(value) => write!(f, "{value}"),
            StackInfo::StaticField(key) => write!(f, "{}.{}", key.owner, key.name),
            StackInfo::InstanceField { key, instance } => write!(f, "{instance}.{}", key.name),
            StackInfo::StaticMethod { key, args } => {
                write!(f, "{}.{}", key.owner, key.name)?;
                write_args(f, args)
            }
            StackInfo::InstanceMethod {
                key,
                instance,
                args,
            } => {
                write!(f, "{instance}.{}", key.name)?;
                write_args(f, args)
            }
            StackInfo::Constructor { key, args } => {
                write!(f, "new {}", key.owner)?;
                write_args(f, args)
            }
            StackInfo::ArrayLiteral {
                component,
                elements,
            } => {
                write!(f, "new {}[]{{", component.class_name())?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("}")
            }
            StackInfo::ArrayLoad { array, index } => write!(f, "{array}[{index}]"),
            StackInfo::ArrayLength(array) => write!(f, "{array}.length"),
            StackInfo::Operator { opcode, operands } => {
                write!(f, "{opcode}")?;
                write_args(f, operands)
            }
        }
    }
}

/// A value proven for the stack top after some instruction, with the span of
/// instructions that computed it.
///
/// The span runs from `first` up to but excluding `end`; `None` means the end
/// of the list. Substituting the value means deleting exactly this span.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedValue {
    /// First instruction of the span
    pub first: InsnId,
    /// Instruction after the span
    pub end: Option<InsnId>,
    /// Provenance
    pub info: StackInfo,
    /// The value
    pub value: Value,
}

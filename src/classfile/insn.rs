//! Instruction nodes of a method body.
//!
//! Instructions are grouped the way the classfile format groups their operands:
//! a plain opcode, an `int` operand, a local variable slot, a type, a field or
//! method reference, a jump target, a constant pool load and so on. Labels,
//! line numbers and stack map frames are pseudo-instructions that occupy a
//! position in the list without emitting bytecode.

use std::fmt;

use crate::classfile::{opcodes::Opcode, types::Type};

/// Handle of a label within one [`crate::classfile::InsnList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Symbolic reference to a field: owner internal name, field name, descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    /// Internal name of the declaring class
    pub owner: String,
    /// Field name
    pub name: String,
    /// Field descriptor
    pub desc: String,
}

impl FieldRef {
    /// Creates a field reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        FieldRef {
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.desc)
    }
}

/// Symbolic reference to a method: owner internal name, method name, descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    /// Internal name of the declaring class
    pub owner: String,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub desc: String,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        MethodRef {
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.desc)
    }
}

/// `REF_getField`
pub const H_GETFIELD: u8 = 1;
/// `REF_getStatic`
pub const H_GETSTATIC: u8 = 2;
/// `REF_putField`
pub const H_PUTFIELD: u8 = 3;
/// `REF_putStatic`
pub const H_PUTSTATIC: u8 = 4;
/// `REF_invokeVirtual`
pub const H_INVOKEVIRTUAL: u8 = 5;
/// `REF_invokeStatic`
pub const H_INVOKESTATIC: u8 = 6;
/// `REF_invokeSpecial`
pub const H_INVOKESPECIAL: u8 = 7;
/// `REF_newInvokeSpecial`
pub const H_NEWINVOKESPECIAL: u8 = 8;
/// `REF_invokeInterface`
pub const H_INVOKEINTERFACE: u8 = 9;

/// A method handle constant, as used for bootstrap methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    /// Reference kind, one of the `H_*` constants
    pub tag: u8,
    /// Internal name of the owner
    pub owner: String,
    /// Member name
    pub name: String,
    /// Member descriptor
    pub desc: String,
    /// Whether the owner is an interface
    pub interface: bool,
}

impl Handle {
    /// Creates a handle to a static method of a class.
    pub fn invoke_static(
        owner: impl Into<String>,
        name: impl Into<String>,
        desc: impl Into<String>,
    ) -> Self {
        Handle {
            tag: H_INVOKESTATIC,
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
            interface: false,
        }
    }
}

/// A loadable constant: the operand of `ldc` and of bootstrap arguments.
///
/// Floating point constants compare by bit pattern, so `-0.0` and `0.0`
/// differ and a `NaN` constant equals itself.
#[derive(Debug, Clone)]
pub enum Constant {
    /// `CONSTANT_Integer`
    Int(i32),
    /// `CONSTANT_Float`
    Float(f32),
    /// `CONSTANT_Long`
    Long(i64),
    /// `CONSTANT_Double`
    Double(f64),
    /// `CONSTANT_String`
    String(String),
    /// `CONSTANT_Class` for object and array types. Primitive types only appear
    /// in the normalized form of `getstatic <Wrapper>.TYPE`.
    Type(Type),
    /// `CONSTANT_MethodHandle`
    Handle(Handle),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Long(a), Constant::Long(b)) => a == b,
            (Constant::Double(a), Constant::Double(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            (Constant::Type(a), Constant::Type(b)) => a == b,
            (Constant::Handle(a), Constant::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v}f"),
            Constant::Long(v) => write!(f, "{v}L"),
            Constant::Double(v) => write!(f, "{v}d"),
            Constant::String(v) => write!(f, "{v:?}"),
            Constant::Type(ty) => write!(f, "{}.class", ty.class_name()),
            Constant::Handle(h) => write!(f, "handle {}.{}{}", h.owner, h.name, h.desc),
        }
    }
}

/// One node of a method's instruction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn {
    /// An instruction without operands (`iadd`, `dup`, `aconst_null`, `return`, ...)
    Simple(Opcode),
    /// `bipush`, `sipush` and `newarray` with their `int` operand
    Int {
        /// The opcode
        opcode: Opcode,
        /// The immediate operand; for `newarray` an `array_type` code
        operand: i32,
    },
    /// A local variable load or store
    Var {
        /// The opcode
        opcode: Opcode,
        /// Local variable slot
        var: u16,
    },
    /// `new`, `anewarray`, `checkcast` and `instanceof`
    Type {
        /// The opcode
        opcode: Opcode,
        /// Internal name of the type operand (a descriptor for array types)
        desc: String,
    },
    /// `getstatic`, `putstatic`, `getfield` and `putfield`
    Field {
        /// The opcode
        opcode: Opcode,
        /// The accessed field
        field: FieldRef,
    },
    /// `invokevirtual`, `invokespecial`, `invokestatic` and `invokeinterface`
    Method {
        /// The opcode
        opcode: Opcode,
        /// The invoked method
        method: MethodRef,
        /// Whether the owner is an interface
        interface: bool,
    },
    /// `invokedynamic`
    InvokeDynamic {
        /// Call site name
        name: String,
        /// Call site descriptor
        desc: String,
        /// Bootstrap method
        bsm: Handle,
        /// Static bootstrap arguments
        bsm_args: Vec<Constant>,
    },
    /// A conditional or unconditional jump
    Jump {
        /// The opcode
        opcode: Opcode,
        /// Jump target
        label: LabelId,
    },
    /// A position marker that jumps and handlers may target
    Label(LabelId),
    /// `ldc` of a constant
    Ldc(Constant),
    /// `iinc`
    Iinc {
        /// Local variable slot
        var: u16,
        /// Increment
        incr: i16,
    },
    /// `tableswitch`
    TableSwitch {
        /// Lowest key
        min: i32,
        /// Highest key
        max: i32,
        /// Default target
        default: LabelId,
        /// Targets for `min..=max`
        labels: Vec<LabelId>,
    },
    /// `lookupswitch`
    LookupSwitch {
        /// Default target
        default: LabelId,
        /// Sorted keys
        keys: Vec<i32>,
        /// Target per key
        labels: Vec<LabelId>,
    },
    /// `multianewarray`
    MultiANewArray {
        /// Array type descriptor
        desc: String,
        /// Number of dimensions to allocate
        dims: u8,
    },
    /// Source line marker
    LineNumber {
        /// Source line
        line: u32,
        /// Label where the line starts
        start: LabelId,
    },
    /// Stack map frame, kept opaque
    Frame,
}

impl Insn {
    /// `ldc` of a string.
    pub fn ldc_string(value: impl Into<String>) -> Insn {
        Insn::Ldc(Constant::String(value.into()))
    }

    /// `getstatic owner.name:desc`
    pub fn getstatic(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Insn {
        Insn::Field {
            opcode: Opcode::Getstatic,
            field: FieldRef::new(owner, name, desc),
        }
    }

    /// `putstatic owner.name:desc`
    pub fn putstatic(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Insn {
        Insn::Field {
            opcode: Opcode::Putstatic,
            field: FieldRef::new(owner, name, desc),
        }
    }

    /// `invokestatic` of a class (not interface) method.
    pub fn invokestatic(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Insn {
        Insn::Method {
            opcode: Opcode::Invokestatic,
            method: MethodRef::new(owner, name, desc),
            interface: false,
        }
    }

    /// `invokevirtual` of a class method.
    pub fn invokevirtual(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Insn {
        Insn::Method {
            opcode: Opcode::Invokevirtual,
            method: MethodRef::new(owner, name, desc),
            interface: false,
        }
    }

    /// `invokespecial` of a constructor.
    pub fn init(owner: impl Into<String>, desc: impl Into<String>) -> Insn {
        Insn::Method {
            opcode: Opcode::Invokespecial,
            method: MethodRef::new(owner, "<init>", desc),
            interface: false,
        }
    }

    /// An instruction with a type operand.
    pub fn type_insn(opcode: Opcode, desc: impl Into<String>) -> Insn {
        Insn::Type {
            opcode,
            desc: desc.into(),
        }
    }

    /// Returns the opcode, or `None` for pseudo-instructions.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Insn::Simple(opcode)
            | Insn::Int { opcode, .. }
            | Insn::Var { opcode, .. }
            | Insn::Type { opcode, .. }
            | Insn::Field { opcode, .. }
            | Insn::Method { opcode, .. }
            | Insn::Jump { opcode, .. } => Some(*opcode),
            Insn::InvokeDynamic { .. } => Some(Opcode::Invokedynamic),
            Insn::Ldc(_) => Some(Opcode::Ldc),
            Insn::Iinc { .. } => Some(Opcode::Iinc),
            Insn::TableSwitch { .. } => Some(Opcode::Tableswitch),
            Insn::LookupSwitch { .. } => Some(Opcode::Lookupswitch),
            Insn::MultiANewArray { .. } => Some(Opcode::Multianewarray),
            Insn::Label(_) | Insn::LineNumber { .. } | Insn::Frame => None,
        }
    }

    /// Returns `true` for labels, line numbers and frames.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        self.opcode().is_none()
    }

    /// Labels this instruction may transfer control to.
    #[must_use]
    pub fn targets(&self) -> Vec<LabelId> {
        match self {
            Insn::Jump { label, .. } => vec![*label],
            Insn::TableSwitch {
                default, labels, ..
            }
            | Insn::LookupSwitch {
                default, labels, ..
            } => {
                let mut out = Vec::with_capacity(labels.len() + 1);
                out.push(*default);
                out.extend(labels.iter().copied());
                out
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Simple(op) => write!(f, "{op}"),
            Insn::Int { opcode, operand } => write!(f, "{opcode} {operand}"),
            Insn::Var { opcode, var } => write!(f, "{opcode} {var}"),
            Insn::Type { opcode, desc } => write!(f, "{opcode} {desc}"),
            Insn::Field { opcode, field } => write!(f, "{opcode} {field}"),
            Insn::Method { opcode, method, .. } => write!(f, "{opcode} {method}"),
            Insn::InvokeDynamic { name, desc, .. } => write!(f, "invokedynamic {name}{desc}"),
            Insn::Jump { opcode, label } => write!(f, "{opcode} {label}"),
            Insn::Label(label) => write!(f, "{label}:"),
            Insn::Ldc(constant) => write!(f, "ldc {constant}"),
            Insn::Iinc { var, incr } => write!(f, "iinc {var} {incr}"),
            Insn::TableSwitch { min, max, .. } => write!(f, "tableswitch {min}..{max}"),
            Insn::LookupSwitch { keys, .. } => write!(f, "lookupswitch ({} keys)", keys.len()),
            Insn::MultiANewArray { desc, dims } => write!(f, "multianewarray {desc} {dims}"),
            Insn::LineNumber { line, .. } => write!(f, "line {line}"),
            Insn::Frame => f.write_str("frame"),
        }
    }
}

//! JVM opcodes as they appear in the instruction tree.
//!
//! The tree never contains the size-specialised encodings (`iload_0`, `ldc_w`,
//! `goto_w`, `wide`, ...). The codec expands them on read and re-selects the
//! compact form on write, so every opcode here has exactly one meaning.
//!
//! Besides the raw enumeration this module classifies opcodes into the
//! categories the reconstruction engine dispatches on: literal pushes, unary and
//! binary operators, array element access and stores.

use strum::{Display, EnumString, FromRepr, IntoStaticStr};

use crate::classfile::types::Type;

/// A JVM opcode.
///
/// The discriminant is the byte value from the JVM specification, so
/// [`Opcode::from_repr`] decodes a raw opcode byte.
///
/// # Examples
///
/// ```rust
/// use classfold::classfile::Opcode;
///
/// assert_eq!(Opcode::from_repr(0x60), Some(Opcode::Iadd));
/// assert_eq!(Opcode::IconstM1.to_string(), "iconst_m1");
/// assert_eq!(Opcode::Iconst3.to_string(), "iconst_3");
/// ```
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    AconstNull = 0x01,
    IconstM1 = 0x02,
    #[strum(to_string = "iconst_0")]
    Iconst0 = 0x03,
    #[strum(to_string = "iconst_1")]
    Iconst1 = 0x04,
    #[strum(to_string = "iconst_2")]
    Iconst2 = 0x05,
    #[strum(to_string = "iconst_3")]
    Iconst3 = 0x06,
    #[strum(to_string = "iconst_4")]
    Iconst4 = 0x07,
    #[strum(to_string = "iconst_5")]
    Iconst5 = 0x08,
    #[strum(to_string = "lconst_0")]
    Lconst0 = 0x09,
    #[strum(to_string = "lconst_1")]
    Lconst1 = 0x0a,
    #[strum(to_string = "fconst_0")]
    Fconst0 = 0x0b,
    #[strum(to_string = "fconst_1")]
    Fconst1 = 0x0c,
    #[strum(to_string = "fconst_2")]
    Fconst2 = 0x0d,
    #[strum(to_string = "dconst_0")]
    Dconst0 = 0x0e,
    #[strum(to_string = "dconst_1")]
    Dconst1 = 0x0f,
    Bipush = 0x10,
    Sipush = 0x11,
    Ldc = 0x12,
    Iload = 0x15,
    Lload = 0x16,
    Fload = 0x17,
    Dload = 0x18,
    Aload = 0x19,
    Iaload = 0x2e,
    Laload = 0x2f,
    Faload = 0x30,
    Daload = 0x31,
    Aaload = 0x32,
    Baload = 0x33,
    Caload = 0x34,
    Saload = 0x35,
    Istore = 0x36,
    Lstore = 0x37,
    Fstore = 0x38,
    Dstore = 0x39,
    Astore = 0x3a,
    Iastore = 0x4f,
    Lastore = 0x50,
    Fastore = 0x51,
    Dastore = 0x52,
    Aastore = 0x53,
    Bastore = 0x54,
    Castore = 0x55,
    Sastore = 0x56,
    Pop = 0x57,
    Pop2 = 0x58,
    Dup = 0x59,
    DupX1 = 0x5a,
    DupX2 = 0x5b,
    Dup2 = 0x5c,
    Dup2X1 = 0x5d,
    Dup2X2 = 0x5e,
    Swap = 0x5f,
    Iadd = 0x60,
    Ladd = 0x61,
    Fadd = 0x62,
    Dadd = 0x63,
    Isub = 0x64,
    Lsub = 0x65,
    Fsub = 0x66,
    Dsub = 0x67,
    Imul = 0x68,
    Lmul = 0x69,
    Fmul = 0x6a,
    Dmul = 0x6b,
    Idiv = 0x6c,
    Ldiv = 0x6d,
    Fdiv = 0x6e,
    Ddiv = 0x6f,
    Irem = 0x70,
    Lrem = 0x71,
    Frem = 0x72,
    Drem = 0x73,
    Ineg = 0x74,
    Lneg = 0x75,
    Fneg = 0x76,
    Dneg = 0x77,
    Ishl = 0x78,
    Lshl = 0x79,
    Ishr = 0x7a,
    Lshr = 0x7b,
    Iushr = 0x7c,
    Lushr = 0x7d,
    Iand = 0x7e,
    Land = 0x7f,
    Ior = 0x80,
    Lor = 0x81,
    Ixor = 0x82,
    Lxor = 0x83,
    Iinc = 0x84,
    I2l = 0x85,
    I2f = 0x86,
    I2d = 0x87,
    L2i = 0x88,
    L2f = 0x89,
    L2d = 0x8a,
    F2i = 0x8b,
    F2l = 0x8c,
    F2d = 0x8d,
    D2i = 0x8e,
    D2l = 0x8f,
    D2f = 0x90,
    I2b = 0x91,
    I2c = 0x92,
    I2s = 0x93,
    Lcmp = 0x94,
    Fcmpl = 0x95,
    Fcmpg = 0x96,
    Dcmpl = 0x97,
    Dcmpg = 0x98,
    Ifeq = 0x99,
    Ifne = 0x9a,
    Iflt = 0x9b,
    Ifge = 0x9c,
    Ifgt = 0x9d,
    Ifle = 0x9e,
    IfIcmpeq = 0x9f,
    IfIcmpne = 0xa0,
    IfIcmplt = 0xa1,
    IfIcmpge = 0xa2,
    IfIcmpgt = 0xa3,
    IfIcmple = 0xa4,
    IfAcmpeq = 0xa5,
    IfAcmpne = 0xa6,
    Goto = 0xa7,
    Jsr = 0xa8,
    Ret = 0xa9,
    Tableswitch = 0xaa,
    Lookupswitch = 0xab,
    Ireturn = 0xac,
    Lreturn = 0xad,
    Freturn = 0xae,
    Dreturn = 0xaf,
    Areturn = 0xb0,
    Return = 0xb1,
    Getstatic = 0xb2,
    Putstatic = 0xb3,
    Getfield = 0xb4,
    Putfield = 0xb5,
    Invokevirtual = 0xb6,
    Invokespecial = 0xb7,
    Invokestatic = 0xb8,
    Invokeinterface = 0xb9,
    Invokedynamic = 0xba,
    New = 0xbb,
    Newarray = 0xbc,
    Anewarray = 0xbd,
    Arraylength = 0xbe,
    Athrow = 0xbf,
    Checkcast = 0xc0,
    Instanceof = 0xc1,
    Monitorenter = 0xc2,
    Monitorexit = 0xc3,
    Multianewarray = 0xc5,
    Ifnull = 0xc6,
    Ifnonnull = 0xc7,
}

/// Operand type of a binary arithmetic or comparison opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    /// `int` (and the sub-int types on the operand stack)
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl NumericKind {
    /// The type an operand of this kind has on the operand stack.
    #[must_use]
    pub fn stack_type(self) -> Type {
        match self {
            NumericKind::Int => Type::Int,
            NumericKind::Long => Type::Long,
            NumericKind::Float => Type::Float,
            NumericKind::Double => Type::Double,
        }
    }
}

impl Opcode {
    /// Returns the raw opcode byte.
    #[must_use]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Returns the JVM mnemonic, e.g. `"invokestatic"`.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Returns `true` for opcodes that push a literal without consuming anything.
    #[must_use]
    pub fn is_literal_push(self) -> bool {
        matches!(
            self,
            Opcode::AconstNull
                | Opcode::IconstM1
                | Opcode::Iconst0
                | Opcode::Iconst1
                | Opcode::Iconst2
                | Opcode::Iconst3
                | Opcode::Iconst4
                | Opcode::Iconst5
                | Opcode::Lconst0
                | Opcode::Lconst1
                | Opcode::Fconst0
                | Opcode::Fconst1
                | Opcode::Fconst2
                | Opcode::Dconst0
                | Opcode::Dconst1
                | Opcode::Bipush
                | Opcode::Sipush
                | Opcode::Ldc
        )
    }

    /// For a binary arithmetic opcode, returns the operand kind of both operands.
    ///
    /// Shifts are included: their left operand has this kind while the shift
    /// distance is always an `int`.
    #[must_use]
    pub fn binary_kind(self) -> Option<NumericKind> {
        use Opcode::*;
        match self {
            Iadd | Isub | Imul | Idiv | Irem | Ishl | Ishr | Iushr | Iand | Ior | Ixor => {
                Some(NumericKind::Int)
            }
            Ladd | Lsub | Lmul | Ldiv | Lrem | Lshl | Lshr | Lushr | Land | Lor | Lxor | Lcmp => {
                Some(NumericKind::Long)
            }
            Fadd | Fsub | Fmul | Fdiv | Frem | Fcmpl | Fcmpg => Some(NumericKind::Float),
            Dadd | Dsub | Dmul | Ddiv | Drem | Dcmpl | Dcmpg => Some(NumericKind::Double),
            _ => None,
        }
    }

    /// Returns `true` for the shift opcodes, whose right operand is an `int`
    /// regardless of the left operand kind.
    #[must_use]
    pub fn is_shift(self) -> bool {
        matches!(
            self,
            Opcode::Ishl | Opcode::Ishr | Opcode::Iushr | Opcode::Lshl | Opcode::Lshr | Opcode::Lushr
        )
    }

    /// For a unary operator (negation or primitive conversion), returns the
    /// natural type of its single operand.
    #[must_use]
    pub fn unary_operand(self) -> Option<Type> {
        use Opcode::*;
        match self {
            Ineg | I2l | I2f | I2d | I2b | I2c | I2s => Some(Type::Int),
            Lneg | L2i | L2f | L2d => Some(Type::Long),
            Fneg | F2i | F2l | F2d => Some(Type::Float),
            Dneg | D2i | D2l | D2f => Some(Type::Double),
            _ => None,
        }
    }

    /// For an array element load, returns the component type it reads.
    ///
    /// `baload` serves both `byte[]` and `boolean[]` and `aaload` any reference
    /// array; both return `None` because the caller has to disambiguate.
    #[must_use]
    pub fn array_load_component(self) -> Option<Type> {
        match self {
            Opcode::Iaload => Some(Type::Int),
            Opcode::Laload => Some(Type::Long),
            Opcode::Faload => Some(Type::Float),
            Opcode::Daload => Some(Type::Double),
            Opcode::Caload => Some(Type::Char),
            Opcode::Saload => Some(Type::Short),
            _ => None,
        }
    }

    /// Returns `true` for the array element load opcodes.
    #[must_use]
    pub fn is_array_load(self) -> bool {
        matches!(
            self,
            Opcode::Iaload
                | Opcode::Laload
                | Opcode::Faload
                | Opcode::Daload
                | Opcode::Aaload
                | Opcode::Baload
                | Opcode::Caload
                | Opcode::Saload
        )
    }

    /// Returns `true` for the array element store opcodes.
    #[must_use]
    pub fn is_array_store(self) -> bool {
        matches!(
            self,
            Opcode::Iastore
                | Opcode::Lastore
                | Opcode::Fastore
                | Opcode::Dastore
                | Opcode::Aastore
                | Opcode::Bastore
                | Opcode::Castore
                | Opcode::Sastore
        )
    }

    /// Returns the element store opcode for arrays of the given component type.
    #[must_use]
    pub fn array_store_for(component: &Type) -> Opcode {
        match component {
            Type::Boolean | Type::Byte => Opcode::Bastore,
            Type::Char => Opcode::Castore,
            Type::Short => Opcode::Sastore,
            Type::Int => Opcode::Iastore,
            Type::Long => Opcode::Lastore,
            Type::Float => Opcode::Fastore,
            Type::Double => Opcode::Dastore,
            _ => Opcode::Aastore,
        }
    }

    /// Returns `true` for the method invocation opcodes, `invokedynamic` included.
    #[must_use]
    pub fn is_invoke(self) -> bool {
        matches!(
            self,
            Opcode::Invokevirtual
                | Opcode::Invokespecial
                | Opcode::Invokestatic
                | Opcode::Invokeinterface
                | Opcode::Invokedynamic
        )
    }
}

/// `newarray` operand codes for the primitive component types.
pub mod array_type {
    use crate::classfile::types::Type;

    /// `T_BOOLEAN`
    pub const T_BOOLEAN: i32 = 4;
    /// `T_CHAR`
    pub const T_CHAR: i32 = 5;
    /// `T_FLOAT`
    pub const T_FLOAT: i32 = 6;
    /// `T_DOUBLE`
    pub const T_DOUBLE: i32 = 7;
    /// `T_BYTE`
    pub const T_BYTE: i32 = 8;
    /// `T_SHORT`
    pub const T_SHORT: i32 = 9;
    /// `T_INT`
    pub const T_INT: i32 = 10;
    /// `T_LONG`
    pub const T_LONG: i32 = 11;

    /// Maps a `newarray` operand to its component type.
    #[must_use]
    pub fn component(code: i32) -> Option<Type> {
        match code {
            T_BOOLEAN => Some(Type::Boolean),
            T_CHAR => Some(Type::Char),
            T_FLOAT => Some(Type::Float),
            T_DOUBLE => Some(Type::Double),
            T_BYTE => Some(Type::Byte),
            T_SHORT => Some(Type::Short),
            T_INT => Some(Type::Int),
            T_LONG => Some(Type::Long),
            _ => None,
        }
    }

    /// Maps a primitive component type to its `newarray` operand.
    #[must_use]
    pub fn code(component: &Type) -> Option<i32> {
        match component {
            Type::Boolean => Some(T_BOOLEAN),
            Type::Char => Some(T_CHAR),
            Type::Float => Some(T_FLOAT),
            Type::Double => Some(T_DOUBLE),
            Type::Byte => Some(T_BYTE),
            Type::Short => Some(T_SHORT),
            Type::Int => Some(T_INT),
            Type::Long => Some(T_LONG),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_mnemonics() {
        assert_eq!(Opcode::AconstNull.mnemonic(), "aconst_null");
        assert_eq!(Opcode::Iconst0.mnemonic(), "iconst_0");
        assert_eq!(Opcode::Lconst1.mnemonic(), "lconst_1");
        assert_eq!(Opcode::Invokestatic.mnemonic(), "invokestatic");
        assert_eq!(Opcode::I2b.mnemonic(), "i2b");
        assert_eq!(Opcode::from_str("getstatic").ok(), Some(Opcode::Getstatic));
    }

    #[test]
    fn test_from_repr() {
        assert_eq!(Opcode::from_repr(0xb8), Some(Opcode::Invokestatic));
        assert_eq!(Opcode::from_repr(0x1a), None); // iload_0 never appears in a tree
        assert_eq!(Opcode::Getstatic.byte(), 0xb2);
    }

    #[test]
    fn test_classification() {
        assert_eq!(Opcode::Lushr.binary_kind(), Some(NumericKind::Long));
        assert!(Opcode::Lushr.is_shift());
        assert_eq!(Opcode::Dcmpg.binary_kind(), Some(NumericKind::Double));
        assert_eq!(Opcode::I2c.unary_operand(), Some(Type::Int));
        assert_eq!(Opcode::Baload.array_load_component(), None);
        assert!(Opcode::Aastore.is_array_store());
        assert_eq!(Opcode::array_store_for(&Type::Boolean), Opcode::Bastore);
        assert_eq!(array_type::component(array_type::T_INT), Some(Type::Int));
    }
}

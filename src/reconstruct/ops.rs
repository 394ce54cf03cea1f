//! Exact JVM semantics of the arithmetic, comparison and conversion opcodes.
//!
//! Every function takes operands in the form the operand stack holds them
//! (`boolean`, `byte`, `char` and `short` as `int`) and returns `Ok(None)` if
//! an operand has the wrong kind. Integer division by zero throws on the JVM
//! and is reported as [`Error::InvocationFailed`].

use std::cmp::Ordering;

use crate::{classfile::Opcode, runtime::Value, Error, Result};

fn divide_by_zero(opcode: Opcode) -> Error {
    Error::invocation(opcode.mnemonic(), "java.lang.ArithmeticException: / by zero")
}

/// Applies a negation or primitive conversion.
///
/// # Errors
///
/// Never fails today; the signature matches [`binary`].
pub fn unary(opcode: Opcode, operand: &Value) -> Result<Option<Value>> {
    use Opcode::*;
    let value = match opcode {
        Ineg | I2l | I2f | I2d | I2b | I2c | I2s => {
            let Some(v) = operand.as_int() else {
                return Ok(None);
            };
            match opcode {
                Ineg => Value::Int(v.wrapping_neg()),
                I2l => Value::Long(i64::from(v)),
                I2f => Value::Float(v as f32),
                I2d => Value::Double(f64::from(v)),
                I2b => Value::Byte(v as i8),
                I2c => Value::Char(v as u16),
                _ => Value::Short(v as i16),
            }
        }
        Lneg | L2i | L2f | L2d => {
            let Some(v) = operand.as_long() else {
                return Ok(None);
            };
            match opcode {
                Lneg => Value::Long(v.wrapping_neg()),
                L2i => Value::Int(v as i32),
                L2f => Value::Float(v as f32),
                _ => Value::Double(v as f64),
            }
        }
        // `as` from float to integer saturates and maps NaN to zero, which is
        // exactly what f2i, f2l, d2i and d2l do.
        Fneg | F2i | F2l | F2d => {
            let Some(v) = operand.as_float() else {
                return Ok(None);
            };
            match opcode {
                Fneg => Value::Float(-v),
                F2i => Value::Int(v as i32),
                F2l => Value::Long(v as i64),
                _ => Value::Double(f64::from(v)),
            }
        }
        Dneg | D2i | D2l | D2f => {
            let Some(v) = operand.as_double() else {
                return Ok(None);
            };
            match opcode {
                Dneg => Value::Double(-v),
                D2i => Value::Int(v as i32),
                D2l => Value::Long(v as i64),
                _ => Value::Float(v as f32),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn int_op(opcode: Opcode, a: i32, b: i32) -> Result<Value> {
    use Opcode::*;
    let shift = (b & 0x1f) as u32;
    let value = match opcode {
        Iadd => a.wrapping_add(b),
        Isub => a.wrapping_sub(b),
        Imul => a.wrapping_mul(b),
        Idiv if b == 0 => return Err(divide_by_zero(opcode)),
        Idiv => a.wrapping_div(b),
        Irem if b == 0 => return Err(divide_by_zero(opcode)),
        Irem => a.wrapping_rem(b),
        Ishl => a.wrapping_shl(shift),
        Ishr => a.wrapping_shr(shift),
        Iushr => ((a as u32) >> shift) as i32,
        Iand => a & b,
        Ior => a | b,
        _ => a ^ b,
    };
    Ok(Value::Int(value))
}

fn long_op(opcode: Opcode, a: i64, b: i64) -> Result<Value> {
    use Opcode::*;
    let shift = (b & 0x3f) as u32;
    let value = match opcode {
        Ladd => a.wrapping_add(b),
        Lsub => a.wrapping_sub(b),
        Lmul => a.wrapping_mul(b),
        Ldiv if b == 0 => return Err(divide_by_zero(opcode)),
        Ldiv => a.wrapping_div(b),
        Lrem if b == 0 => return Err(divide_by_zero(opcode)),
        Lrem => a.wrapping_rem(b),
        Lshl => a.wrapping_shl(shift),
        Lshr => a.wrapping_shr(shift),
        Lushr => ((a as u64) >> shift) as i64,
        Land => a & b,
        Lor => a | b,
        Lxor => a ^ b,
        _ => return Ok(Value::Int(a.cmp(&b) as i32)),
    };
    Ok(Value::Long(value))
}

/// `fcmpl`/`dcmpl` push -1 on NaN, `fcmpg`/`dcmpg` push 1.
fn compare<T: PartialOrd>(a: T, b: T, nan: i32) -> Value {
    Value::Int(match a.partial_cmp(&b) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        None => nan,
    })
}

fn float_op(opcode: Opcode, a: f32, b: f32) -> Value {
    use Opcode::*;
    match opcode {
        Fadd => Value::Float(a + b),
        Fsub => Value::Float(a - b),
        Fmul => Value::Float(a * b),
        Fdiv => Value::Float(a / b),
        Frem => Value::Float(a % b),
        Fcmpl => compare(a, b, -1),
        _ => compare(a, b, 1),
    }
}

fn double_op(opcode: Opcode, a: f64, b: f64) -> Value {
    use Opcode::*;
    match opcode {
        Dadd => Value::Double(a + b),
        Dsub => Value::Double(a - b),
        Dmul => Value::Double(a * b),
        Ddiv => Value::Double(a / b),
        Drem => Value::Double(a % b),
        Dcmpl => compare(a, b, -1),
        _ => compare(a, b, 1),
    }
}

/// Applies a binary arithmetic, shift, bitwise or comparison opcode.
///
/// `left` is the deeper operand (pushed first). Shift distances are `int`s
/// for both families.
///
/// # Errors
///
/// Returns [`Error::InvocationFailed`] for an integer division or remainder
/// by zero.
pub fn binary(opcode: Opcode, left: &Value, right: &Value) -> Result<Option<Value>> {
    use crate::classfile::NumericKind;

    let Some(kind) = opcode.binary_kind() else {
        return Ok(None);
    };
    let value = match kind {
        NumericKind::Int => match (left.as_int(), right.as_int()) {
            (Some(a), Some(b)) => int_op(opcode, a, b)?,
            _ => return Ok(None),
        },
        NumericKind::Long => {
            let b = if opcode.is_shift() {
                right.as_int().map(i64::from)
            } else {
                right.as_long()
            };
            match (left.as_long(), b) {
                (Some(a), Some(b)) => long_op(opcode, a, b)?,
                _ => return Ok(None),
            }
        }
        NumericKind::Float => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => float_op(opcode, a, b),
            _ => return Ok(None),
        },
        NumericKind::Double => match (left.as_double(), right.as_double()) {
            (Some(a), Some(b)) => double_op(opcode, a, b),
            _ => return Ok(None),
        },
    };
    Ok(Some(value))
}

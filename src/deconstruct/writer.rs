//! Turns values back into instructions.

use crate::{
    classfile::{array_type, Constant, Insn, Opcode, Type},
    deconstruct::DeconstructionResult,
    reconstruct::StackInfo,
    registry::{MemberKey, Registries},
    runtime::{format, ClassLoader, Value},
    Result,
};

/// Emits instruction sequences that push a given value.
///
/// # Examples
///
/// ```rust
/// use classfold::classfile::{Insn, Opcode, Type};
/// use classfold::deconstruct::BytecodeWriter;
/// use classfold::registry::Registries;
/// use classfold::runtime::Value;
///
/// let registries = Registries::new();
/// let writer = BytecodeWriter::new(&registries);
/// let result = writer.deconstruct(&Type::Boolean, &Value::Boolean(true))?.unwrap();
/// assert_eq!(result.insns, vec![Insn::Simple(Opcode::Iconst1)]);
/// # Ok::<(), classfold::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct BytecodeWriter<'a> {
    registries: &'a Registries,
    loader: Option<&'a dyn ClassLoader>,
}

impl<'a> BytecodeWriter<'a> {
    /// Creates a writer using the deconstructors of `registries`.
    #[must_use]
    pub fn new(registries: &'a Registries) -> Self {
        BytecodeWriter {
            registries,
            loader: None,
        }
    }

    /// Lets strategies read canonical instances through `loader`.
    #[must_use]
    pub fn with_loader(mut self, loader: Option<&'a dyn ClassLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// The configured class loader.
    #[must_use]
    pub fn loader(&self) -> Option<&'a dyn ClassLoader> {
        self.loader
    }

    /// Emits instructions leaving `value` on the stack in a slot of type `ty`.
    ///
    /// Returns `Ok(None)` if there is no way to write the value: no
    /// deconstructor for its runtime type, or a primitive slot for a
    /// reference value.
    ///
    /// # Errors
    ///
    /// Fails if a deconstruction strategy fails to read the value.
    pub fn deconstruct(&self, ty: &Type, value: &Value) -> Result<Option<DeconstructionResult>> {
        if let Some(primitive) = value.primitive_type() {
            return Ok(self.primitive(ty, &primitive, value));
        }
        let result = match value {
            Value::Null if ty.is_primitive() => return Ok(None),
            Value::Null => DeconstructionResult::new(
                vec![Insn::Simple(Opcode::AconstNull)],
                StackInfo::Constant(Value::Null),
            ),
            Value::String(s) if format::modified_utf8_len(s) > format::MAX_UTF8_CONSTANT => {
                return Ok(None)
            }
            Value::String(s) => DeconstructionResult::new(
                vec![Insn::Ldc(Constant::String(s.to_string()))],
                StackInfo::Constant(value.clone()),
            ),
            Value::Class(class) => DeconstructionResult::new(
                vec![Insn::Ldc(Constant::Type(class.clone()))],
                StackInfo::Constant(value.clone()),
            ),
            Value::Enum(constant) => {
                let desc = Type::object(constant.owner.clone()).descriptor();
                DeconstructionResult::new(
                    vec![Insn::getstatic(&constant.owner, &constant.name, desc)],
                    StackInfo::StaticField(MemberKey::field(&constant.owner, &constant.name)),
                )
            }
            Value::Array(array) => {
                let mut insns = int_literal(array.elements.len() as i32);
                match array_type::code(&array.component) {
                    Some(code) => insns.push(Insn::Int {
                        opcode: Opcode::Newarray,
                        operand: code,
                    }),
                    None => {
                        let Some(name) = array.component.internal_name() else {
                            return Ok(None);
                        };
                        insns.push(Insn::type_insn(Opcode::Anewarray, name));
                    }
                }
                let store = Opcode::array_store_for(&array.component);
                let default = Value::default_for(&array.component);
                let mut infos = Vec::with_capacity(array.elements.len());
                for (index, element) in array.elements.iter().enumerate() {
                    if *element == default {
                        infos.push(StackInfo::Constant(default.clone()));
                        continue;
                    }
                    let Some(written) = self.deconstruct(&array.component, element)? else {
                        return Ok(None);
                    };
                    insns.push(Insn::Simple(Opcode::Dup));
                    insns.extend(int_literal(index as i32));
                    insns.extend(written.insns);
                    insns.push(Insn::Simple(store));
                    infos.push(written.info);
                }
                DeconstructionResult::new(
                    insns,
                    StackInfo::ArrayLiteral {
                        component: array.component.clone(),
                        elements: infos,
                    },
                )
            }
            Value::Object(object) => {
                let Some(strategy) = self.registries.deconstructor(object.class_name()) else {
                    return Ok(None);
                };
                return strategy.deconstruct(self, ty, value);
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    /// Primitive literal, boxed through `valueOf` for reference slots.
    ///
    /// `None` if the value cannot be widened to the slot's stack kind.
    fn primitive(&self, ty: &Type, primitive: &Type, value: &Value) -> Option<DeconstructionResult> {
        if ty.is_primitive() {
            let value = value.clone().coerce(ty);
            if !value.fits_stack_kind(ty) {
                return None;
            }
            let insns = primitive_literal(&value)?;
            return Some(DeconstructionResult::new(insns, StackInfo::Constant(value)));
        }
        let boxed = ty.primitive_or_unboxed().unwrap_or_else(|| primitive.clone());
        let value = value.clone().coerce(&boxed);
        if !value.fits_stack_kind(&boxed) {
            return None;
        }
        let mut insns = primitive_literal(&value)?;
        let wrapper = boxed.wrapper()?;
        let desc = format!("({}){}", boxed.descriptor(), Type::object(wrapper).descriptor());
        let key = MemberKey::method(wrapper, "valueOf", desc.clone());
        insns.push(Insn::invokestatic(wrapper, "valueOf", desc));
        Some(DeconstructionResult::new(
            insns,
            StackInfo::StaticMethod {
                key,
                args: vec![StackInfo::Constant(value)],
            },
        ))
    }
}

/// The shortest instruction pushing an `int`.
#[must_use]
pub fn int_literal(value: i32) -> Vec<Insn> {
    let insn = match value {
        -1 => Insn::Simple(Opcode::IconstM1),
        0 => Insn::Simple(Opcode::Iconst0),
        1 => Insn::Simple(Opcode::Iconst1),
        2 => Insn::Simple(Opcode::Iconst2),
        3 => Insn::Simple(Opcode::Iconst3),
        4 => Insn::Simple(Opcode::Iconst4),
        5 => Insn::Simple(Opcode::Iconst5),
        v if i8::try_from(v).is_ok() => Insn::Int {
            opcode: Opcode::Bipush,
            operand: v,
        },
        v if i16::try_from(v).is_ok() => Insn::Int {
            opcode: Opcode::Sipush,
            operand: v,
        },
        v => Insn::Ldc(Constant::Int(v)),
    };
    vec![insn]
}

/// The shortest instruction pushing a primitive value.
///
/// `-0.0` always goes through `ldc`: `fconst_0` and `dconst_0` push `+0.0`.
fn primitive_literal(value: &Value) -> Option<Vec<Insn>> {
    let insn = match value {
        Value::Long(0) => Insn::Simple(Opcode::Lconst0),
        Value::Long(1) => Insn::Simple(Opcode::Lconst1),
        Value::Long(v) => Insn::Ldc(Constant::Long(*v)),
        Value::Float(v) if v.to_bits() == 0.0f32.to_bits() => Insn::Simple(Opcode::Fconst0),
        Value::Float(v) if *v == 1.0 => Insn::Simple(Opcode::Fconst1),
        Value::Float(v) if *v == 2.0 => Insn::Simple(Opcode::Fconst2),
        Value::Float(v) => Insn::Ldc(Constant::Float(*v)),
        Value::Double(v) if v.to_bits() == 0.0f64.to_bits() => Insn::Simple(Opcode::Dconst0),
        Value::Double(v) if *v == 1.0 => Insn::Simple(Opcode::Dconst1),
        Value::Double(v) => Insn::Ldc(Constant::Double(*v)),
        other => return Some(int_literal(other.as_int()?)),
    };
    Some(vec![insn])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::STRING;

    fn write(ty: &Type, value: &Value) -> Option<Vec<Insn>> {
        let registries = Registries::new();
        BytecodeWriter::new(&registries)
            .deconstruct(ty, value)
            .unwrap()
            .map(|result| result.insns)
    }

    #[test]
    fn test_compact_int_forms() {
        assert_eq!(int_literal(5), vec![Insn::Simple(Opcode::Iconst5)]);
        assert_eq!(
            int_literal(-100),
            vec![Insn::Int {
                opcode: Opcode::Bipush,
                operand: -100
            }]
        );
        assert_eq!(
            int_literal(1000),
            vec![Insn::Int {
                opcode: Opcode::Sipush,
                operand: 1000
            }]
        );
        assert_eq!(int_literal(70000), vec![Insn::Ldc(Constant::Int(70000))]);
    }

    #[test]
    fn test_negative_zero_uses_ldc() {
        assert_eq!(
            write(&Type::Double, &Value::Double(-0.0)),
            Some(vec![Insn::Ldc(Constant::Double(-0.0))])
        );
        assert_eq!(
            write(&Type::Float, &Value::Float(0.0)),
            Some(vec![Insn::Simple(Opcode::Fconst0)])
        );
    }

    #[test]
    fn test_boxes_for_reference_slots() {
        assert_eq!(
            write(&Type::object("java/lang/Object"), &Value::Int(7)),
            Some(vec![
                Insn::Int {
                    opcode: Opcode::Bipush,
                    operand: 7
                },
                Insn::invokestatic(
                    "java/lang/Integer",
                    "valueOf",
                    "(I)Ljava/lang/Integer;"
                ),
            ])
        );
    }

    #[test]
    fn test_array_skips_defaults() {
        let value = Value::array(
            Type::object(STRING),
            vec![Value::Null, Value::string("b")],
        );
        assert_eq!(
            write(&Type::array_of(Type::object(STRING)), &value),
            Some(vec![
                Insn::Simple(Opcode::Iconst2),
                Insn::type_insn(Opcode::Anewarray, STRING),
                Insn::Simple(Opcode::Dup),
                Insn::Simple(Opcode::Iconst1),
                Insn::ldc_string("b"),
                Insn::Simple(Opcode::Aastore),
            ])
        );
    }

    #[test]
    fn test_enum_and_class() {
        assert_eq!(
            write(&Type::object("a/Color"), &Value::enum_constant("a/Color", "RED", 0)),
            Some(vec![Insn::getstatic("a/Color", "RED", "La/Color;")])
        );
        assert_eq!(
            write(&Type::object("java/lang/Class"), &Value::Class(Type::Int)),
            Some(vec![Insn::Ldc(Constant::Type(Type::Int))])
        );
    }

    #[test]
    fn test_unwritable() {
        assert_eq!(write(&Type::Int, &Value::Null), None);
        assert_eq!(write(&Type::Int, &Value::Long(1)), None);
        assert_eq!(write(&Type::object("java/lang/Integer"), &Value::Double(1.0)), None);
    }

    #[test]
    fn test_oversized_string_is_unwritable() {
        let string = Type::object(STRING);
        let limit = "a".repeat(format::MAX_UTF8_CONSTANT);
        assert!(write(&string, &Value::from(limit)).is_some());
        assert_eq!(write(&string, &Value::from("a".repeat(70000))), None);
        let nuls = "\0".repeat(format::MAX_UTF8_CONSTANT / 2 + 1);
        assert_eq!(write(&string, &Value::from(nuls)), None);
    }

    #[test]
    fn test_widens_to_slot() {
        assert_eq!(
            write(&Type::Long, &Value::Int(7)),
            Some(vec![Insn::Ldc(Constant::Long(7))])
        );
        assert_eq!(
            write(&Type::Double, &Value::Float(2.0)),
            Some(vec![Insn::Ldc(Constant::Double(2.0))])
        );
        assert_eq!(
            write(&Type::object("java/lang/Long"), &Value::Int(1)),
            Some(vec![
                Insn::Simple(Opcode::Lconst1),
                Insn::invokestatic("java/lang/Long", "valueOf", "(J)Ljava/lang/Long;"),
            ])
        );
    }
}

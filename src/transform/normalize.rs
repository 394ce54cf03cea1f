//! Primitive type tokens.
//!
//! `int.class` compiles to `getstatic java/lang/Integer.TYPE`. The run works
//! on the direct form `ldc I` instead, which reconstruction treats as a plain
//! class literal; emission restores the field read, since `ldc` cannot load a
//! primitive type.

use crate::{
    classfile::{ClassNode, Constant, Insn, Opcode, Type, CLASS},
    diagnostics::{EventKind, EventLog},
};

const TYPE_FIELD: &str = "TYPE";

fn token(insn: &Insn) -> Option<Type> {
    match insn {
        Insn::Field {
            opcode: Opcode::Getstatic,
            field,
        } if field.name == TYPE_FIELD && Type::parse(&field.desc).is_ok_and(|ty| ty.is_object(CLASS)) => {
            Type::unwrapped(&field.owner)
        }
        _ => None,
    }
}

/// Replaces every `getstatic <Wrapper>.TYPE` with `ldc <primitive>`.
///
/// Returns the number of replaced loads.
pub fn normalize(class: &mut ClassNode, events: &EventLog) -> usize {
    let mut count = 0;
    for method in &mut class.methods {
        for id in method.insns.ids() {
            let Some(ty) = method.insns.get(id).and_then(token) else {
                continue;
            };
            if let Some(insn) = method.insns.get_mut(id) {
                *insn = Insn::Ldc(Constant::Type(ty));
                count += 1;
            }
        }
    }
    if count > 0 {
        events
            .record(EventKind::TypeLoadNormalized)
            .class(class.name.clone())
            .message(format!("{count} primitive type loads"));
    }
    count
}

/// Restores `getstatic <Wrapper>.TYPE` for every `ldc <primitive>`.
pub fn denormalize(class: &mut ClassNode) {
    let class_desc = Type::object(CLASS).descriptor();
    for method in &mut class.methods {
        for id in method.insns.ids() {
            let Some(insn) = method.insns.get_mut(id) else {
                continue;
            };
            if let Insn::Ldc(Constant::Type(ty)) = insn {
                if let Some(wrapper) = ty.wrapper() {
                    *insn = Insn::getstatic(wrapper, TYPE_FIELD, class_desc.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::{AccessFlags, InsnList, MethodNode},
        test::class_with_method,
    };

    #[test]
    fn test_normalize_roundtrip() {
        let original = vec![
            Insn::getstatic("java/lang/Integer", "TYPE", "Ljava/lang/Class;"),
            Insn::getstatic("java/lang/Integer", "MAX_VALUE", "I"),
            Insn::getstatic("java/lang/Void", "TYPE", "Ljava/lang/Class;"),
            Insn::Simple(Opcode::Return),
        ];
        let mut class = class_with_method("a/B", "f", "()V", original.clone());
        let events = EventLog::new();

        assert_eq!(normalize(&mut class, &events), 2);
        assert!(events.has(EventKind::TypeLoadNormalized));
        assert_eq!(
            class.methods[0].insns.get(class.methods[0].insns.first().unwrap()),
            Some(&Insn::Ldc(Constant::Type(Type::Int)))
        );

        denormalize(&mut class);
        assert_eq!(class.methods[0].insns.to_vec(), original);
    }

    #[test]
    fn test_object_types_untouched() {
        let mut class = ClassNode::new("a/B");
        class.methods.push(MethodNode::new(
            AccessFlags::STATIC,
            "f",
            "()V",
            InsnList::from_insns([Insn::Ldc(Constant::Type(Type::object("a/B")))]),
        ));
        denormalize(&mut class);
        assert_eq!(
            class.methods[0].insns.to_vec(),
            vec![Insn::Ldc(Constant::Type(Type::object("a/B")))]
        );
    }
}

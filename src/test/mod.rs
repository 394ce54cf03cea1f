//! Factories for class trees, contexts and host objects used by unit tests.

use std::{any::Any, sync::Arc};

use rustc_hash::FxHashSet;

use crate::{
    classfile::{AccessFlags, ClassNode, FieldNode, Insn, InsnList, LabelId, MethodNode, CLINIT},
    diagnostics::BytecodeLocation,
    reconstruct::ReconstructionContext,
    runtime::{HostObject, InputClasses, Value},
    Error, Result,
};

/// A context at a fixed location, without receiver type or loader.
pub fn ctx() -> ReconstructionContext {
    ReconstructionContext::new(BytecodeLocation::new("test/Fixture", "run", "()V"))
}

/// Safe labels of a bare instruction list and an empty input index.
pub fn engine_fixture(insns: &InsnList) -> (FxHashSet<LabelId>, InputClasses) {
    let targets = insns.jump_targets();
    let safe = insns
        .iter()
        .filter_map(|(_, insn)| match insn {
            Insn::Label(label) if !targets.contains(label) => Some(*label),
            _ => None,
        })
        .collect();
    (safe, InputClasses::new())
}

/// A `public static final` field.
pub fn static_final(name: &str, desc: &str) -> FieldNode {
    FieldNode::new(
        AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL,
        name,
        desc,
    )
}

/// A class with a single static method.
pub fn class_with_method(class: &str, name: &str, desc: &str, insns: Vec<Insn>) -> ClassNode {
    let mut node = ClassNode::new(class);
    node.methods.push(MethodNode::new(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        name,
        desc,
        InsnList::from_insns(insns),
    ));
    node
}

/// A class with `static final` fields and a static initializer.
pub fn class_with_clinit(class: &str, fields: &[(&str, &str)], insns: Vec<Insn>) -> ClassNode {
    let mut node = ClassNode::new(class);
    for (name, desc) in fields {
        node.fields.push(static_final(name, desc));
    }
    node.methods.push(MethodNode::new(
        AccessFlags::STATIC,
        CLINIT,
        "()V",
        InsnList::from_insns(insns),
    ));
    node
}

/// A host stand-in for `java.time.Duration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duration {
    pub seconds: i64,
    pub nanos: i32,
}

impl Duration {
    pub fn value(seconds: i64, nanos: i32) -> Value {
        Value::Object(Arc::new(Duration { seconds, nanos }))
    }
}

impl HostObject for Duration {
    fn class_name(&self) -> &str {
        "java/time/Duration"
    }

    fn equals(&self, other: &Value) -> bool {
        match other {
            Value::Object(object) => object.as_any().downcast_ref::<Duration>() == Some(self),
            _ => false,
        }
    }

    fn to_java_string(&self) -> String {
        format!("PT{}.{:09}S", self.seconds, self.nanos)
    }

    fn hash_code(&self) -> Option<i32> {
        Some((self.seconds ^ (self.seconds >> 32)) as i32 + 51 * self.nanos)
    }

    fn get_field(&self, name: &str) -> Result<Value> {
        match name {
            "seconds" => Ok(Value::Long(self.seconds)),
            "nanos" => Ok(Value::Int(self.nanos)),
            _ => Err(Error::MemberNotFound(format!("java/time/Duration.{name}"))),
        }
    }

    fn invoke(&self, name: &str, desc: &str, _args: &[Value]) -> Result<Value> {
        match (name, desc) {
            ("getSeconds", "()J") => Ok(Value::Long(self.seconds)),
            ("getNano", "()I") => Ok(Value::Int(self.nanos)),
            _ => Err(Error::MemberNotFound(format!("java/time/Duration.{name}{desc}"))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Facts about the classes being transformed, readable without loading them.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    classfile::{AccessFlags, ClassNode, Constant, Type},
    runtime::value::{EnumConstant, Value},
};

#[derive(Debug, Default, Clone)]
struct InputClass {
    enum_constants: Vec<Arc<EnumConstant>>,
    constants: FxHashMap<String, Value>,
    methods: FxHashSet<String>,
}

/// Index over the input classes of a run.
///
/// Records the enum constants of input enums, in declaration order, the
/// `ConstantValue` of every `static final` field that has one, and which
/// methods each class declares.
#[derive(Debug, Default, Clone)]
pub struct InputClasses {
    classes: FxHashMap<String, InputClass>,
}

impl InputClasses {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index from class trees.
    pub fn from_classes<'a>(classes: impl IntoIterator<Item = &'a ClassNode>) -> Self {
        let mut index = InputClasses::new();
        for class in classes {
            index.add(class);
        }
        index
    }

    /// Adds or replaces the facts about one class.
    pub fn add(&mut self, class: &ClassNode) {
        let mut entry = InputClass::default();
        let is_enum = class.is_enum();
        let self_desc = Type::object(class.name.clone()).descriptor();
        let mut ordinal = 0;
        for field in &class.fields {
            if !field.access.contains(AccessFlags::STATIC) {
                continue;
            }
            if is_enum && field.access.contains(AccessFlags::ENUM) && field.desc == self_desc {
                entry.enum_constants.push(Arc::new(EnumConstant {
                    owner: class.name.clone(),
                    name: field.name.clone(),
                    ordinal,
                }));
                ordinal += 1;
            }
            if !field.access.contains(AccessFlags::FINAL) {
                continue;
            }
            if let (Some(constant), Ok(ty)) = (&field.value, Type::parse(&field.desc)) {
                if let Some(value) = constant_value(constant, &ty) {
                    entry.constants.insert(field.name.clone(), value);
                }
            }
        }
        entry.methods = class
            .methods
            .iter()
            .map(|method| format!("{}{}", method.name, method.desc))
            .collect();
        self.classes.insert(class.name.clone(), entry);
    }

    /// Returns `true` if `name` is one of the inputs.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// The enum constants of an input enum, in declaration order.
    #[must_use]
    pub fn enum_constants(&self, owner: &str) -> Option<&[Arc<EnumConstant>]> {
        self.classes
            .get(owner)
            .map(|class| class.enum_constants.as_slice())
            .filter(|constants| !constants.is_empty())
    }

    /// Looks up one enum constant by name.
    #[must_use]
    pub fn enum_constant(&self, owner: &str, name: &str) -> Option<Arc<EnumConstant>> {
        self.enum_constants(owner)?
            .iter()
            .find(|constant| constant.name == name)
            .cloned()
    }

    /// Returns `true` if the input class `owner` declares the method itself.
    #[must_use]
    pub fn declares_method(&self, owner: &str, name: &str, desc: &str) -> bool {
        self.classes
            .get(owner)
            .is_some_and(|class| class.methods.contains(&format!("{name}{desc}")))
    }

    /// The `ConstantValue` of a `static final` field of an input class.
    #[must_use]
    pub fn constant_field(&self, owner: &str, name: &str) -> Option<Value> {
        self.classes.get(owner)?.constants.get(name).cloned()
    }
}

/// Converts a `ConstantValue` attribute into the value its field holds.
#[must_use]
pub fn constant_value(constant: &Constant, ty: &Type) -> Option<Value> {
    let value = match constant {
        Constant::Int(v) => Value::Int(*v).coerce(ty),
        Constant::Long(v) => Value::Long(*v),
        Constant::Float(v) => Value::Float(*v),
        Constant::Double(v) => Value::Double(*v),
        Constant::String(s) => Value::string(s),
        Constant::Type(_) | Constant::Handle(_) => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{FieldNode, ENUM};

    fn color_enum() -> ClassNode {
        let mut class = ClassNode::new("a/Color");
        class.access |= AccessFlags::ENUM | AccessFlags::FINAL;
        class.super_name = Some(ENUM.to_string());
        let flags = AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL | AccessFlags::ENUM;
        class.fields.push(FieldNode::new(flags, "RED", "La/Color;"));
        class.fields.push(FieldNode::new(flags, "GREEN", "La/Color;"));
        class.fields.push(FieldNode::new(
            AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::FINAL | AccessFlags::SYNTHETIC,
            "$VALUES",
            "[La/Color;",
        ));
        let mut flag = FieldNode::new(AccessFlags::STATIC | AccessFlags::FINAL, "DEBUG", "Z");
        flag.value = Some(Constant::Int(1));
        class.fields.push(flag);
        let mut mutable = FieldNode::new(AccessFlags::PUBLIC | AccessFlags::STATIC, "LEVEL", "I");
        mutable.value = Some(Constant::Int(3));
        class.fields.push(mutable);
        class
    }

    #[test]
    fn test_enum_constants_in_order() {
        let index = InputClasses::from_classes([&color_enum()]);
        let constants = index.enum_constants("a/Color").unwrap();
        assert_eq!(constants.len(), 2);
        assert_eq!(constants[1].name, "GREEN");
        assert_eq!(constants[1].ordinal, 1);
        assert!(index.enum_constant("a/Color", "BLUE").is_none());
    }

    #[test]
    fn test_constant_fields_coerced() {
        let index = InputClasses::from_classes([&color_enum()]);
        assert_eq!(index.constant_field("a/Color", "DEBUG"), Some(Value::Boolean(true)));
        assert_eq!(index.constant_field("a/Color", "RED"), None);
        assert_eq!(index.constant_field("a/Color", "LEVEL"), None);
        assert!(index.contains("a/Color"));
        assert!(!index.declares_method("a/Color", "toString", "()Ljava/lang/String;"));
    }
}

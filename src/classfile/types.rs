//! Field and method descriptors.
//!
//! [`Type`] is the parsed form of a field descriptor (`I`, `Ljava/lang/String;`,
//! `[[J`, ...) and [`MethodDescriptor`] the parsed form of a method descriptor
//! (`(ILjava/lang/String;)V`). Both render back to the exact descriptor text,
//! and [`Type`] knows the naming conventions `Class.getName()` and
//! `Class.getSimpleName()` use, which lets type-name queries be answered
//! without ever loading the class.

use std::fmt;

use crate::Result;

/// A JVM type as described by a field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// `V`, only valid as a method return type
    Void,
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `L<internal name>;`
    Object(String),
    /// `[<component>`
    Array(Box<Type>),
}

/// Internal name of `java.lang.Object`.
pub const OBJECT: &str = "java/lang/Object";
/// Internal name of `java.lang.String`.
pub const STRING: &str = "java/lang/String";
/// Internal name of `java.lang.Class`.
pub const CLASS: &str = "java/lang/Class";
/// Internal name of `java.lang.Enum`.
pub const ENUM: &str = "java/lang/Enum";

impl Type {
    /// Parses a single field descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the descriptor is empty, truncated
    /// or followed by trailing characters.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use classfold::classfile::Type;
    ///
    /// let ty = Type::parse("[Ljava/lang/String;")?;
    /// assert_eq!(ty, Type::array_of(Type::object("java/lang/String")));
    /// assert_eq!(ty.descriptor(), "[Ljava/lang/String;");
    /// # Ok::<(), classfold::Error>(())
    /// ```
    pub fn parse(descriptor: &str) -> Result<Type> {
        let (ty, rest) = Self::parse_prefix(descriptor)?;
        if !rest.is_empty() {
            return Err(malformed_error!(
                "Trailing characters in descriptor {}",
                descriptor
            ));
        }
        Ok(ty)
    }

    /// Parses one type from the front of `input`, returning it and the remainder.
    fn parse_prefix(input: &str) -> Result<(Type, &str)> {
        let mut chars = input.chars();
        let Some(first) = chars.next() else {
            return Err(malformed_error!("Empty type descriptor"));
        };
        let rest = chars.as_str();
        let ty = match first {
            'V' => Type::Void,
            'Z' => Type::Boolean,
            'B' => Type::Byte,
            'C' => Type::Char,
            'S' => Type::Short,
            'I' => Type::Int,
            'J' => Type::Long,
            'F' => Type::Float,
            'D' => Type::Double,
            'L' => {
                let Some(end) = rest.find(';') else {
                    return Err(malformed_error!("Unterminated class descriptor {}", input));
                };
                if end == 0 {
                    return Err(malformed_error!("Empty class name in {}", input));
                }
                return Ok((Type::Object(rest[..end].to_string()), &rest[end + 1..]));
            }
            '[' => {
                let (component, rest) = Self::parse_prefix(rest)?;
                if component == Type::Void {
                    return Err(malformed_error!("Array of void in {}", input));
                }
                return Ok((Type::Array(Box::new(component)), rest));
            }
            other => {
                return Err(malformed_error!(
                    "Unknown descriptor character '{}' in {}",
                    other,
                    input
                ))
            }
        };
        Ok((ty, rest))
    }

    /// Creates an object type from an internal name (`java/lang/String`).
    #[must_use]
    pub fn object(internal_name: impl Into<String>) -> Type {
        Type::Object(internal_name.into())
    }

    /// Creates an array type with the given component.
    #[must_use]
    pub fn array_of(component: Type) -> Type {
        Type::Array(Box::new(component))
    }

    /// Builds the type an internal name denotes as the operand of `anewarray`,
    /// `checkcast` or `ldc`: array internal names are descriptors, everything
    /// else is a plain class name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an unparsable array descriptor.
    pub fn from_internal_name(name: &str) -> Result<Type> {
        if name.starts_with('[') {
            Type::parse(name)
        } else {
            Ok(Type::Object(name.to_string()))
        }
    }

    /// Renders the type back to its descriptor.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            Type::Void => out.push('V'),
            Type::Boolean => out.push('Z'),
            Type::Byte => out.push('B'),
            Type::Char => out.push('C'),
            Type::Short => out.push('S'),
            Type::Int => out.push('I'),
            Type::Long => out.push('J'),
            Type::Float => out.push('F'),
            Type::Double => out.push('D'),
            Type::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            Type::Array(component) => {
                out.push('[');
                component.write_descriptor(out);
            }
        }
    }

    /// The internal name used as the operand of type instructions.
    ///
    /// Object types yield their class name, arrays their descriptor, and
    /// primitives `None` because they have no internal name.
    #[must_use]
    pub fn internal_name(&self) -> Option<String> {
        match self {
            Type::Object(name) => Some(name.clone()),
            Type::Array(_) => Some(self.descriptor()),
            _ => None,
        }
    }

    /// The name `Class.getName()` reports for this type.
    ///
    /// ```rust
    /// use classfold::classfile::Type;
    ///
    /// assert_eq!(Type::Int.class_name(), "int");
    /// assert_eq!(Type::object("java/util/Map$Entry").class_name(), "java.util.Map$Entry");
    /// assert_eq!(Type::array_of(Type::object("java/lang/String")).class_name(), "[Ljava.lang.String;");
    /// ```
    #[must_use]
    pub fn class_name(&self) -> String {
        match self {
            Type::Void => "void".to_string(),
            Type::Boolean => "boolean".to_string(),
            Type::Byte => "byte".to_string(),
            Type::Char => "char".to_string(),
            Type::Short => "short".to_string(),
            Type::Int => "int".to_string(),
            Type::Long => "long".to_string(),
            Type::Float => "float".to_string(),
            Type::Double => "double".to_string(),
            Type::Object(name) => name.replace('/', "."),
            Type::Array(_) => self.descriptor().replace('/', "."),
        }
    }

    /// The name `Class.getSimpleName()` reports for this type.
    ///
    /// Nested classes drop their enclosing prefix up to the last `$`; anonymous
    /// and local classes are not distinguished from nested ones.
    #[must_use]
    pub fn simple_name(&self) -> String {
        match self {
            Type::Object(name) => {
                let tail = name.rsplit('/').next().unwrap_or(name);
                match tail.rsplit_once('$') {
                    Some((_, nested)) if !nested.is_empty() => nested.to_string(),
                    _ => tail.to_string(),
                }
            }
            Type::Array(component) => format!("{}[]", component.simple_name()),
            primitive => primitive.class_name(),
        }
    }

    /// Returns `true` for the eight primitive types (not `void`).
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Type::Void | Type::Object(_) | Type::Array(_))
    }

    /// Returns `true` for object and array types.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Object(_) | Type::Array(_))
    }

    /// Returns `true` for the types stored as an `int` on the operand stack.
    #[must_use]
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            Type::Boolean | Type::Byte | Type::Char | Type::Short | Type::Int
        )
    }

    /// Returns `true` if a field of this type can carry a `ConstantValue`
    /// attribute: primitives and `java.lang.String`.
    #[must_use]
    pub fn is_constant_value_type(&self) -> bool {
        self.is_primitive() || self.is_object(STRING)
    }

    /// Returns `true` if this is the object type with the given internal name.
    #[must_use]
    pub fn is_object(&self, internal_name: &str) -> bool {
        matches!(self, Type::Object(name) if name == internal_name)
    }

    /// Returns the component type of an array type.
    #[must_use]
    pub fn component(&self) -> Option<&Type> {
        match self {
            Type::Array(component) => Some(component),
            _ => None,
        }
    }

    /// The operand stack size of a value of this type, in slots.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Type::Void => 0,
            Type::Long | Type::Double => 2,
            _ => 1,
        }
    }

    /// The internal name of the wrapper class that boxes this primitive.
    #[must_use]
    pub fn wrapper(&self) -> Option<&'static str> {
        match self {
            Type::Void => Some("java/lang/Void"),
            Type::Boolean => Some("java/lang/Boolean"),
            Type::Byte => Some("java/lang/Byte"),
            Type::Char => Some("java/lang/Character"),
            Type::Short => Some("java/lang/Short"),
            Type::Int => Some("java/lang/Integer"),
            Type::Long => Some("java/lang/Long"),
            Type::Float => Some("java/lang/Float"),
            Type::Double => Some("java/lang/Double"),
            _ => None,
        }
    }

    /// Maps a wrapper class internal name back to the primitive it boxes.
    #[must_use]
    pub fn unwrapped(internal_name: &str) -> Option<Type> {
        match internal_name {
            "java/lang/Void" => Some(Type::Void),
            "java/lang/Boolean" => Some(Type::Boolean),
            "java/lang/Byte" => Some(Type::Byte),
            "java/lang/Character" => Some(Type::Char),
            "java/lang/Short" => Some(Type::Short),
            "java/lang/Integer" => Some(Type::Int),
            "java/lang/Long" => Some(Type::Long),
            "java/lang/Float" => Some(Type::Float),
            "java/lang/Double" => Some(Type::Double),
            _ => None,
        }
    }

    /// The primitive a value of this static type carries, looking through
    /// wrapper classes: `I` and `Ljava/lang/Integer;` both give `I`.
    #[must_use]
    pub fn primitive_or_unboxed(&self) -> Option<Type> {
        match self {
            Type::Object(name) => Type::unwrapped(name).filter(|ty| *ty != Type::Void),
            ty if ty.is_primitive() => Some(ty.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name())
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order
    pub params: Vec<Type>,
    /// Return type, [`Type::Void`] for `V`
    pub ret: Type,
}

impl MethodDescriptor {
    /// Parses a method descriptor such as `(IJ)Ljava/lang/String;`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the descriptor is not well formed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use classfold::classfile::{MethodDescriptor, Type};
    ///
    /// let desc = MethodDescriptor::parse("(I[J)Ljava/lang/String;")?;
    /// assert_eq!(desc.params, vec![Type::Int, Type::array_of(Type::Long)]);
    /// assert_eq!(desc.ret, Type::object("java/lang/String"));
    /// # Ok::<(), classfold::Error>(())
    /// ```
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor> {
        let Some(mut rest) = descriptor.strip_prefix('(') else {
            return Err(malformed_error!("Method descriptor {} lacks '('", descriptor));
        };
        let mut params = Vec::new();
        loop {
            if let Some(after) = rest.strip_prefix(')') {
                rest = after;
                break;
            }
            let (param, after) = Type::parse_prefix(rest)?;
            if param == Type::Void {
                return Err(malformed_error!("Void parameter in {}", descriptor));
            }
            params.push(param);
            rest = after;
        }
        let ret = Type::parse(rest)?;
        Ok(MethodDescriptor { params, ret })
    }

    /// Renders the descriptor back to text.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for param in &self.params {
            out.push_str(&param.descriptor());
        }
        out.push(')');
        out.push_str(&self.ret.descriptor());
        out
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

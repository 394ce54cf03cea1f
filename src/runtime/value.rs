//! Runtime values produced by reconstruction.
//!
//! [`Value`] mirrors the values a JVM would hold on its operand stack or in a
//! field, restricted to what can be reasoned about without running the
//! program: primitives, strings, class literals, arrays, enum constants and
//! opaque objects handed out by the host runtime.

use std::{any::Any, fmt, sync::Arc};

use crate::{
    classfile::{Type, CLASS, STRING},
    runtime::format,
    Result,
};

/// An object owned by the host runtime.
///
/// Implementations stand in for instances the inliner cannot look into: it
/// only calls the methods below, and trusts them to behave deterministically
/// for types registered as constant types.
pub trait HostObject: Send + Sync + fmt::Debug {
    /// Internal name of the runtime class, e.g. `java/time/Duration`.
    fn class_name(&self) -> &str;

    /// `Object.equals`.
    fn equals(&self, other: &Value) -> bool;

    /// `Object.toString`. Defaults to the identity form `name@hash`.
    fn to_java_string(&self) -> String {
        let addr = std::ptr::from_ref(self).cast::<()>() as usize;
        format!(
            "{}@{:x}",
            self.class_name().replace('/', "."),
            (addr as u64 ^ ((addr as u64) >> 32)) as u32
        )
    }

    /// `Object.hashCode`, `None` when it is identity based.
    fn hash_code(&self) -> Option<i32> {
        None
    }

    /// Reads an instance field.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MemberNotFound`] if the object has no such
    /// field, or [`crate::Error::AccessDenied`] if reading it is refused.
    fn get_field(&self, name: &str) -> Result<Value> {
        Err(crate::Error::MemberNotFound(format!(
            "{}.{}",
            self.class_name(),
            name
        )))
    }

    /// Invokes an instance method.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MemberNotFound`] for unknown methods and
    /// [`crate::Error::InvocationFailed`] if the call throws.
    fn invoke(&self, name: &str, desc: &str, _args: &[Value]) -> Result<Value> {
        Err(crate::Error::MemberNotFound(format!(
            "{}.{}{}",
            self.class_name(),
            name,
            desc
        )))
    }

    /// Downcasting hook for deconstructors that know the concrete type.
    fn as_any(&self) -> &dyn Any;
}

/// An array with its component type.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    /// Component type
    pub component: Type,
    /// Elements in index order
    pub elements: Vec<Value>,
}

/// An enum constant, identified by its declaring class and field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumConstant {
    /// Internal name of the enum class
    pub owner: String,
    /// Constant name, as returned by `name()`
    pub name: String,
    /// Declaration index, as returned by `ordinal()`
    pub ordinal: i32,
}

/// A value on the operand stack or in a field.
///
/// Equality follows `Object.equals`: floating point values compare by bit
/// pattern, arrays element by element, host objects through
/// [`HostObject::equals`]. Boxed and primitive forms are not distinguished.
#[derive(Debug, Clone)]
pub enum Value {
    /// `null`
    Null,
    /// `boolean`
    Boolean(bool),
    /// `byte`
    Byte(i8),
    /// `char`, a UTF-16 code unit
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `java.lang.String`
    String(Arc<str>),
    /// `java.lang.Class`, known only by its type; never requires loading
    Class(Type),
    /// An array
    Array(Arc<ArrayValue>),
    /// An enum constant
    Enum(Arc<EnumConstant>),
    /// Any other object, owned by the host runtime
    Object(Arc<dyn HostObject>),
}

impl Value {
    /// Creates a string value.
    pub fn string(value: impl AsRef<str>) -> Value {
        Value::String(Arc::from(value.as_ref()))
    }

    /// Creates an array value.
    #[must_use]
    pub fn array(component: Type, elements: Vec<Value>) -> Value {
        Value::Array(Arc::new(ArrayValue {
            component,
            elements,
        }))
    }

    /// Creates an enum constant value.
    pub fn enum_constant(owner: impl Into<String>, name: impl Into<String>, ordinal: i32) -> Value {
        Value::Enum(Arc::new(EnumConstant {
            owner: owner.into(),
            name: name.into(),
            ordinal,
        }))
    }

    /// The default value of a field or array element of the given type.
    #[must_use]
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Boolean => Value::Boolean(false),
            Type::Byte => Value::Byte(0),
            Type::Char => Value::Char(0),
            Type::Short => Value::Short(0),
            Type::Int => Value::Int(0),
            Type::Long => Value::Long(0),
            Type::Float => Value::Float(0.0),
            Type::Double => Value::Double(0.0),
            _ => Value::Null,
        }
    }

    /// Internal name of the runtime class of this value, `None` for `null`.
    ///
    /// Primitives report their wrapper class, as they would once boxed.
    #[must_use]
    pub fn runtime_class(&self) -> Option<String> {
        let name = match self {
            Value::Null => return None,
            Value::String(_) => STRING.to_string(),
            Value::Class(_) => CLASS.to_string(),
            Value::Array(array) => Type::array_of(array.component.clone()).descriptor(),
            Value::Enum(constant) => constant.owner.clone(),
            Value::Object(object) => object.class_name().to_string(),
            primitive => primitive.primitive_type()?.wrapper()?.to_string(),
        };
        Some(name)
    }

    /// The primitive type of a primitive value.
    #[must_use]
    pub fn primitive_type(&self) -> Option<Type> {
        match self {
            Value::Boolean(_) => Some(Type::Boolean),
            Value::Byte(_) => Some(Type::Byte),
            Value::Char(_) => Some(Type::Char),
            Value::Short(_) => Some(Type::Short),
            Value::Int(_) => Some(Type::Int),
            Value::Long(_) => Some(Type::Long),
            Value::Float(_) => Some(Type::Float),
            Value::Double(_) => Some(Type::Double),
            _ => None,
        }
    }

    /// Returns `true` for `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as the JVM holds it in an `int` stack slot.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Boolean(v) => Some(i32::from(*v)),
            Value::Byte(v) => Some(i32::from(*v)),
            Value::Char(v) => Some(i32::from(*v)),
            Value::Short(v) => Some(i32::from(*v)),
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value of a `long`.
    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// The value of a `float`.
    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value of a `double`.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The value of a `boolean`, accepting the `int` stack form.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// The value of a `char`, accepting the `int` stack form.
    #[must_use]
    pub fn as_char(&self) -> Option<u16> {
        match self {
            Value::Char(v) => Some(*v),
            Value::Int(v) => Some(*v as u16),
            _ => None,
        }
    }

    /// The contents of a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The array behind an array value.
    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Adapts a value to the slot type it is stored into.
    ///
    /// `int` stack values narrow to `boolean`, `byte`, `char` or `short` the
    /// way the corresponding array stores and field writes truncate them, and
    /// sub-`int` values widen back to `int`. Primitive widening conversions
    /// (`int` to `long`, `float` or `double`, `long` to `float` or `double`,
    /// `float` to `double`) apply for wider slots. Wrapper types behave like
    /// their primitive. Everything else, including narrowing from `long`,
    /// `float` or `double`, is returned unchanged.
    #[must_use]
    pub fn coerce(self, ty: &Type) -> Value {
        let Some(target) = ty.primitive_or_unboxed() else {
            return self;
        };
        if let Some(int) = self.as_int() {
            return match target {
                Type::Boolean => Value::Boolean(int & 1 != 0),
                Type::Byte => Value::Byte(int as i8),
                Type::Char => Value::Char(int as u16),
                Type::Short => Value::Short(int as i16),
                Type::Int => Value::Int(int),
                Type::Long => Value::Long(i64::from(int)),
                Type::Float => Value::Float(int as f32),
                Type::Double => Value::Double(f64::from(int)),
                _ => self,
            };
        }
        match (self, target) {
            (Value::Long(v), Type::Float) => Value::Float(v as f32),
            (Value::Long(v), Type::Double) => Value::Double(v as f64),
            (Value::Float(v), Type::Double) => Value::Double(f64::from(v)),
            (value, _) => value,
        }
    }

    /// Whether the value occupies the same operand stack kind as `ty`:
    /// `int` for `boolean` through `int`, otherwise the exact primitive.
    #[must_use]
    pub fn fits_stack_kind(&self, ty: &Type) -> bool {
        match ty {
            Type::Boolean | Type::Byte | Type::Char | Type::Short | Type::Int => {
                self.as_int().is_some()
            }
            Type::Long => matches!(self, Value::Long(_)),
            Type::Float => matches!(self, Value::Float(_)),
            Type::Double => matches!(self, Value::Double(_)),
            _ => false,
        }
    }

    /// `String.valueOf(value)`.
    ///
    /// `None` for a `char` holding a lone surrogate, which no Rust string can
    /// carry.
    #[must_use]
    pub fn java_string(&self) -> Option<String> {
        let text = match self {
            Value::Null => "null".to_string(),
            Value::Boolean(v) => v.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Char(v) => String::from_utf16(&[*v]).ok()?,
            Value::Short(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => format::float_to_string(*v),
            Value::Double(v) => format::double_to_string(*v),
            Value::String(s) => s.to_string(),
            Value::Class(ty) if ty.is_primitive() || *ty == Type::Void => ty.class_name(),
            Value::Class(ty) => format!("class {}", ty.class_name()),
            Value::Array(array) => {
                let addr = Arc::as_ptr(array) as usize;
                format!(
                    "{}@{:x}",
                    Type::array_of(array.component.clone()).class_name(),
                    addr as u32
                )
            }
            Value::Enum(constant) => constant.name.clone(),
            Value::Object(object) => object.to_java_string(),
        };
        Some(text)
    }

    /// `Object.hashCode()`, `None` where it depends on object identity.
    #[must_use]
    pub fn java_hash_code(&self) -> Option<i32> {
        match self {
            Value::Null => Some(0),
            Value::Boolean(v) => Some(if *v { 1231 } else { 1237 }),
            Value::Byte(v) => Some(i32::from(*v)),
            Value::Char(v) => Some(i32::from(*v)),
            Value::Short(v) => Some(i32::from(*v)),
            Value::Int(v) => Some(*v),
            Value::Long(v) => Some((*v ^ ((*v as u64) >> 32) as i64) as i32),
            Value::Float(v) => Some(format::float_to_int_bits(*v)),
            Value::Double(v) => {
                let bits = format::double_to_long_bits(*v);
                Some((bits ^ ((bits as u64) >> 32) as i64) as i32)
            }
            Value::String(s) => Some(format::string_hash(s)),
            Value::Object(object) => object.hash_code(),
            Value::Class(_) | Value::Array(_) | Value::Enum(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                format::float_to_int_bits(*a) == format::float_to_int_bits(*b)
            }
            (Value::Double(a), Value::Double(b)) => {
                format::double_to_long_bits(*a) == format::double_to_long_bits(*b)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Enum(a), Value::Enum(b)) => a.owner == b.owner && a.name == b.name,
            (Value::Object(a), other) => a.equals(other),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Char(c) => write!(f, "'{}'", String::from_utf16_lossy(&[*c])),
            Value::Long(v) => write!(f, "{v}L"),
            Value::Float(v) => write!(f, "{}f", format::float_to_string(*v)),
            Value::Class(ty) => write!(f, "{}.class", ty.class_name()),
            Value::Array(array) => {
                write!(f, "{}[", array.component.class_name())?;
                for (i, element) in array.elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str("]")
            }
            Value::Enum(constant) => write!(
                f,
                "{}.{}",
                constant.owner.rsplit('/').next().unwrap_or(&constant.owner),
                constant.name
            ),
            other => match other.java_string() {
                Some(text) => f.write_str(&text),
                None => f.write_str("?"),
            },
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

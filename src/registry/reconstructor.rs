//! Strategies that compute the value of a field read or method call.
//!
//! The registry maps a [`MemberKey`] to a [`Reconstructor`]. Once the engine
//! has reconstructed the receiver and arguments of an access, it hands them to
//! the strategy as a [`Call`]. A strategy answers with a value, with
//! `Ok(None)` when it declines (the access is not constant after all), or
//! with an error when the member misbehaves.

use std::{fmt, sync::Arc};

use crate::{
    classfile::INIT,
    registry::MemberKey,
    runtime::{ClassLoader, HostClass, Value},
    Error, Result,
};

/// A reconstructed member access, ready to be evaluated.
#[derive(Clone, Copy)]
pub struct Call<'a> {
    /// The accessed member
    pub key: &'a MemberKey,
    /// The descriptor at the access site: the field type for field reads,
    /// the method descriptor for calls
    pub desc: &'a str,
    /// The instance for instance members
    pub receiver: Option<&'a Value>,
    /// Arguments, coerced to the parameter types
    pub args: &'a [Value],
    /// The configured class loader, if any
    pub loader: Option<&'a dyn ClassLoader>,
}

impl<'a> Call<'a> {
    /// An [`Error::InvocationFailed`] for this member.
    #[must_use]
    pub fn fail(&self, message: impl Into<String>) -> Error {
        Error::invocation(self.key.to_string(), message)
    }

    /// Argument `index`.
    ///
    /// # Errors
    ///
    /// Fails if the call has fewer arguments.
    pub fn arg(&self, index: usize) -> Result<&'a Value> {
        self.args
            .get(index)
            .ok_or_else(|| self.fail(format!("missing argument {index}")))
    }

    /// The receiver, failing with a `NullPointerException` for `null`.
    ///
    /// # Errors
    ///
    /// Fails for static calls and `null` receivers.
    pub fn this(&self) -> Result<&'a Value> {
        match self.receiver {
            Some(Value::Null) => Err(self.fail("java.lang.NullPointerException")),
            Some(value) => Ok(value),
            None => Err(self.fail("missing receiver")),
        }
    }

    /// The receiver as a string.
    ///
    /// # Errors
    ///
    /// Fails if the receiver is not a string.
    pub fn this_str(&self) -> Result<&'a str> {
        self.this()?
            .as_str()
            .ok_or_else(|| self.fail("receiver is not a string"))
    }

    /// Argument `index` as an `int` (sub-`int` types widened).
    ///
    /// # Errors
    ///
    /// Fails if the argument is missing or not an integer.
    pub fn int(&self, index: usize) -> Result<i32> {
        self.arg(index)?
            .as_int()
            .ok_or_else(|| self.fail(format!("argument {index} is not an int")))
    }

    /// Argument `index` as a `long`.
    ///
    /// # Errors
    ///
    /// Fails if the argument is missing or not a long.
    pub fn long(&self, index: usize) -> Result<i64> {
        self.arg(index)?
            .as_long()
            .ok_or_else(|| self.fail(format!("argument {index} is not a long")))
    }

    /// Argument `index` as a `float`.
    ///
    /// # Errors
    ///
    /// Fails if the argument is missing or not a float.
    pub fn float(&self, index: usize) -> Result<f32> {
        self.arg(index)?
            .as_float()
            .ok_or_else(|| self.fail(format!("argument {index} is not a float")))
    }

    /// Argument `index` as a `double`.
    ///
    /// # Errors
    ///
    /// Fails if the argument is missing or not a double.
    pub fn double(&self, index: usize) -> Result<f64> {
        self.arg(index)?
            .as_double()
            .ok_or_else(|| self.fail(format!("argument {index} is not a double")))
    }

    /// Argument `index` as a `char`.
    ///
    /// # Errors
    ///
    /// Fails if the argument is missing or not a char.
    pub fn char(&self, index: usize) -> Result<u16> {
        self.arg(index)?
            .as_char()
            .ok_or_else(|| self.fail(format!("argument {index} is not a char")))
    }

    /// Argument `index` as a `boolean`.
    ///
    /// # Errors
    ///
    /// Fails if the argument is missing or not a boolean.
    pub fn bool(&self, index: usize) -> Result<bool> {
        self.arg(index)?
            .as_bool()
            .ok_or_else(|| self.fail(format!("argument {index} is not a boolean")))
    }

    /// Argument `index` as a non-null string.
    ///
    /// # Errors
    ///
    /// Fails with a `NullPointerException` for `null` and if the argument is
    /// not a string.
    pub fn str(&self, index: usize) -> Result<&'a str> {
        match self.arg(index)? {
            Value::Null => Err(self.fail("java.lang.NullPointerException")),
            value => value
                .as_str()
                .ok_or_else(|| self.fail(format!("argument {index} is not a string"))),
        }
    }

    /// Loads the owner of the called member through the class loader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] without a loader or if it does not
    /// know the owner.
    pub fn owner_class(&self) -> Result<Arc<dyn HostClass>> {
        self.loader
            .and_then(|loader| loader.load_class(&self.key.owner))
            .ok_or_else(|| Error::ClassNotFound(self.key.owner.clone()))
    }
}

/// Computes the value of one member access.
pub trait Reconstructor: Send + Sync + fmt::Debug {
    /// Whether this strategy applies to the given receiver. Static members
    /// pass `None`.
    fn accepts(&self, receiver: Option<&Value>) -> bool {
        let _ = receiver;
        true
    }

    /// Evaluates the access.
    ///
    /// # Errors
    ///
    /// Returns a hard failure if the member is missing, refuses access or
    /// throws.
    fn reconstruct(&self, call: &Call<'_>) -> Result<Option<Value>>;
}

/// Signature of the built-in reconstructors.
pub type NativeFn = fn(&Call<'_>) -> Result<Option<Value>>;

/// A reconstructor implemented natively in Rust.
#[derive(Clone)]
pub struct NativeReconstructor {
    name: String,
    f: Arc<dyn Fn(&Call<'_>) -> Result<Option<Value>> + Send + Sync>,
}

impl NativeReconstructor {
    /// Wraps a function or closure.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Call<'_>) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        NativeReconstructor {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

impl fmt::Debug for NativeReconstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeReconstructor({})", self.name)
    }
}

impl Reconstructor for NativeReconstructor {
    fn reconstruct(&self, call: &Call<'_>) -> Result<Option<Value>> {
        (self.f)(call)
    }
}

/// A field whose value is already known.
#[derive(Debug, Clone)]
pub struct ConstantFieldReconstructor {
    value: Value,
}

impl ConstantFieldReconstructor {
    /// Creates a reconstructor that always yields `value`.
    #[must_use]
    pub fn new(value: Value) -> Self {
        ConstantFieldReconstructor { value }
    }

    /// The constant.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Reconstructor for ConstantFieldReconstructor {
    fn reconstruct(&self, _call: &Call<'_>) -> Result<Option<Value>> {
        Ok(Some(self.value.clone()))
    }
}

/// Reads a field through the host runtime: static fields from the owner
/// class, instance fields from the receiver object.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFieldReconstructor;

impl Reconstructor for HostFieldReconstructor {
    fn reconstruct(&self, call: &Call<'_>) -> Result<Option<Value>> {
        match call.receiver {
            None => {
                let class = call.owner_class()?;
                class.get_static(&call.key.name, call.desc).map(Some)
            }
            Some(Value::Object(object)) => object.get_field(&call.key.name).map(Some),
            Some(Value::Null) => Err(call.fail("java.lang.NullPointerException")),
            Some(_) => Err(Error::MemberNotFound(call.key.to_string())),
        }
    }
}

/// Predicate restricting a method reconstructor to compatible receivers.
pub type InstancePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Invokes a method through the host runtime.
///
/// Static methods and constructors go to the owner class; instance methods to
/// the receiver object, or to the owner class for receivers that are not host
/// objects.
#[derive(Clone, Default)]
pub struct HostMethodReconstructor {
    predicate: Option<InstancePredicate>,
}

impl HostMethodReconstructor {
    /// A reconstructor accepting every receiver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A reconstructor for instance methods, restricted to receivers the
    /// predicate accepts.
    pub fn with_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        HostMethodReconstructor {
            predicate: Some(Arc::new(predicate)),
        }
    }
}

impl fmt::Debug for HostMethodReconstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMethodReconstructor")
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Reconstructor for HostMethodReconstructor {
    fn accepts(&self, receiver: Option<&Value>) -> bool {
        match (&self.predicate, receiver) {
            (Some(predicate), Some(receiver)) => predicate(receiver),
            _ => true,
        }
    }

    fn reconstruct(&self, call: &Call<'_>) -> Result<Option<Value>> {
        let desc = call.key.descriptor().unwrap_or("()V");
        if call.key.name == INIT {
            return call.owner_class()?.construct(desc, call.args).map(Some);
        }
        match call.receiver {
            None => call
                .owner_class()?
                .invoke_static(&call.key.name, desc, call.args)
                .map(Some),
            Some(Value::Null) => Err(call.fail("java.lang.NullPointerException")),
            Some(Value::Object(object)) => object.invoke(&call.key.name, desc, call.args).map(Some),
            Some(receiver) => call
                .owner_class()?
                .invoke_virtual(receiver, &call.key.name, desc, call.args)
                .map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MapClassLoader, SimpleClass};

    #[test]
    fn test_host_field_reads_static() -> Result<()> {
        let loader = MapClassLoader::new()
            .with_class(SimpleClass::new("a/B").with_static("X", Value::Int(5)));
        let key = MemberKey::field("a/B", "X");
        let call = Call {
            key: &key,
            desc: "I",
            receiver: None,
            args: &[],
            loader: Some(&loader),
        };
        assert_eq!(HostFieldReconstructor.reconstruct(&call)?, Some(Value::Int(5)));
        Ok(())
    }

    /// A host class declaring `X` twice, told apart by type.
    #[derive(Debug)]
    struct Shadowed;

    impl HostClass for Shadowed {
        fn name(&self) -> &str {
            "a/Shadowed"
        }

        fn get_static(&self, name: &str, desc: &str) -> Result<Value> {
            match (name, desc) {
                ("X", "I") => Ok(Value::Int(1)),
                ("X", "J") => Ok(Value::Long(2)),
                _ => Err(Error::MemberNotFound(format!("a/Shadowed.{name}:{desc}"))),
            }
        }
    }

    #[test]
    fn test_host_field_passes_descriptor() -> Result<()> {
        let loader = MapClassLoader::new().with_class(Shadowed);
        let key = MemberKey::field("a/Shadowed", "X");
        let read = |desc: &str| {
            HostFieldReconstructor.reconstruct(&Call {
                key: &key,
                desc,
                receiver: None,
                args: &[],
                loader: Some(&loader),
            })
        };
        assert_eq!(read("I")?, Some(Value::Int(1)));
        assert_eq!(read("J")?, Some(Value::Long(2)));
        assert!(matches!(read("Z"), Err(Error::MemberNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_host_field_without_loader() {
        let key = MemberKey::field("a/B", "X");
        let call = Call {
            key: &key,
            desc: "I",
            receiver: None,
            args: &[],
            loader: None,
        };
        assert!(matches!(
            HostFieldReconstructor.reconstruct(&call),
            Err(Error::ClassNotFound(_))
        ));
    }

    #[test]
    fn test_predicate() {
        let reconstructor = HostMethodReconstructor::with_predicate(|v| v.as_str().is_some());
        assert!(reconstructor.accepts(Some(&Value::string("x"))));
        assert!(!reconstructor.accepts(Some(&Value::Int(1))));
        assert!(reconstructor.accepts(None));
    }

    #[test]
    fn test_call_argument_helpers() {
        let key = MemberKey::method("a/B", "f", "(ILjava/lang/String;)V");
        let args = [Value::Int(3), Value::Null];
        let call = Call {
            key: &key,
            desc: "(ILjava/lang/String;)V",
            receiver: None,
            args: &args,
            loader: None,
        };
        assert_eq!(call.int(0).ok(), Some(3));
        assert!(call.str(1).is_err());
        assert!(call.long(0).is_err());
        assert!(call.arg(2).is_err());
    }
}

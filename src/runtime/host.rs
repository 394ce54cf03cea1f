//! The host runtime: classes the inliner can query but not look into.
//!
//! A [`ClassLoader`] resolves internal names to [`HostClass`]es, which answer
//! static field reads, static calls, constructor calls and enum constant
//! lookups. [`SimpleClass`] and [`MapClassLoader`] assemble a host runtime
//! from closures, for embedding callers and tests alike.

use std::{fmt, sync::Arc};

use rustc_hash::FxHashMap;

use crate::{
    runtime::value::{EnumConstant, Value},
    Error, Result,
};

/// Resolves classes of the host runtime by internal name.
pub trait ClassLoader: Send + Sync + fmt::Debug {
    /// Loads a class, or returns `None` if this loader does not know it.
    fn load_class(&self, name: &str) -> Option<Arc<dyn HostClass>>;
}

/// A class of the host runtime.
///
/// Every accessor reports a missing member as [`Error::MemberNotFound`] and
/// a refused access as [`Error::AccessDenied`]; a member that throws yields
/// [`Error::InvocationFailed`].
pub trait HostClass: Send + Sync + fmt::Debug {
    /// Internal name.
    fn name(&self) -> &str;

    /// The enum constants in declaration order; empty for non-enums.
    fn enum_constants(&self) -> Vec<Arc<EnumConstant>> {
        Vec::new()
    }

    /// Reads a static field.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn get_static(&self, name: &str, desc: &str) -> Result<Value> {
        let _ = desc;
        Err(Error::MemberNotFound(format!("{}.{}", self.name(), name)))
    }

    /// Invokes a static method.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn invoke_static(&self, name: &str, desc: &str, args: &[Value]) -> Result<Value> {
        let _ = args;
        Err(Error::MemberNotFound(format!("{}.{}{}", self.name(), name, desc)))
    }

    /// Invokes an instance method on a receiver that is not a host object,
    /// such as a string or enum constant.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn invoke_virtual(&self, receiver: &Value, name: &str, desc: &str, args: &[Value]) -> Result<Value> {
        match receiver {
            Value::Object(object) => object.invoke(name, desc, args),
            _ => Err(Error::MemberNotFound(format!("{}.{}{}", self.name(), name, desc))),
        }
    }

    /// Invokes a constructor.
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    fn construct(&self, desc: &str, args: &[Value]) -> Result<Value> {
        let _ = args;
        Err(Error::MemberNotFound(format!("{}.<init>{}", self.name(), desc)))
    }
}

type StaticFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A host class assembled from values and closures.
///
/// # Examples
///
/// ```rust
/// use classfold::runtime::{HostClass, SimpleClass, Value};
///
/// let class = SimpleClass::new("com/example/Version")
///     .with_static("MAJOR", Value::Int(3))
///     .with_static_method("compose", "(II)I", |args| {
///         Ok(Value::Int(args[0].as_int().unwrap_or(0) * 100 + args[1].as_int().unwrap_or(0)))
///     });
///
/// assert_eq!(class.get_static("MAJOR", "I")?, Value::Int(3));
/// assert_eq!(class.invoke_static("compose", "(II)I", &[Value::Int(3), Value::Int(1)])?, Value::Int(301));
/// assert!(class.get_static("MINOR", "I").is_err());
/// # Ok::<(), classfold::Error>(())
/// ```
#[derive(Clone)]
pub struct SimpleClass {
    name: String,
    statics: FxHashMap<String, Value>,
    methods: FxHashMap<(String, String), StaticFn>,
    constructors: FxHashMap<String, StaticFn>,
    enum_constants: Vec<Arc<EnumConstant>>,
}

impl SimpleClass {
    /// Creates a class without members.
    pub fn new(name: impl Into<String>) -> Self {
        SimpleClass {
            name: name.into(),
            statics: FxHashMap::default(),
            methods: FxHashMap::default(),
            constructors: FxHashMap::default(),
            enum_constants: Vec::new(),
        }
    }

    /// Creates an enum class whose constants are also readable as static fields.
    pub fn enumeration(name: impl Into<String>, constants: &[&str]) -> Self {
        let mut class = SimpleClass::new(name);
        for (ordinal, constant) in constants.iter().enumerate() {
            let constant = Arc::new(EnumConstant {
                owner: class.name.clone(),
                name: (*constant).to_string(),
                ordinal: ordinal as i32,
            });
            class
                .statics
                .insert(constant.name.clone(), Value::Enum(constant.clone()));
            class.enum_constants.push(constant);
        }
        class
    }

    /// Adds a static field.
    #[must_use]
    pub fn with_static(mut self, name: impl Into<String>, value: Value) -> Self {
        self.statics.insert(name.into(), value);
        self
    }

    /// Adds a static method.
    #[must_use]
    pub fn with_static_method<F>(mut self, name: impl Into<String>, desc: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.methods.insert((name.into(), desc.into()), Arc::new(f));
        self
    }

    /// Adds a constructor.
    #[must_use]
    pub fn with_constructor<F>(mut self, desc: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.constructors.insert(desc.into(), Arc::new(f));
        self
    }
}

impl fmt::Debug for SimpleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleClass")
            .field("name", &self.name)
            .field("statics", &self.statics.len())
            .field("methods", &self.methods.len())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

impl HostClass for SimpleClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn enum_constants(&self) -> Vec<Arc<EnumConstant>> {
        self.enum_constants.clone()
    }

    fn get_static(&self, name: &str, _desc: &str) -> Result<Value> {
        self.statics
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MemberNotFound(format!("{}.{}", self.name, name)))
    }

    fn invoke_static(&self, name: &str, desc: &str, args: &[Value]) -> Result<Value> {
        match self.methods.get(&(name.to_string(), desc.to_string())) {
            Some(f) => f(args),
            None => Err(Error::MemberNotFound(format!("{}.{}{}", self.name, name, desc))),
        }
    }

    fn construct(&self, desc: &str, args: &[Value]) -> Result<Value> {
        match self.constructors.get(desc) {
            Some(f) => f(args),
            None => Err(Error::MemberNotFound(format!("{}.<init>{}", self.name, desc))),
        }
    }
}

/// A class loader backed by a map of host classes.
#[derive(Debug, Clone, Default)]
pub struct MapClassLoader {
    classes: FxHashMap<String, Arc<dyn HostClass>>,
}

impl MapClassLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class under its own name.
    #[must_use]
    pub fn with_class(mut self, class: impl HostClass + 'static) -> Self {
        self.insert(Arc::new(class));
        self
    }

    /// Registers a class under its own name.
    pub fn insert(&mut self, class: Arc<dyn HostClass>) {
        self.classes.insert(class.name().to_string(), class);
    }
}

impl ClassLoader for MapClassLoader {
    fn load_class(&self, name: &str) -> Option<Arc<dyn HostClass>> {
        self.classes.get(name).cloned()
    }
}

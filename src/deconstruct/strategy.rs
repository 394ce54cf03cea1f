//! Deconstruction strategies for host objects.
//!
//! The writer handles primitives, strings, class literals, arrays and enum
//! constants by itself. Everything else needs a [`Deconstructor`] registered
//! for its runtime type, which knows how the type can be rebuilt:
//!
//! - [`ConstructorDeconstructor`] - `new T(a, b, ...)`
//! - [`StaticFactoryDeconstructor`] - `T.of(a, b, ...)`
//! - [`CanonicalInstanceDeconstructor`] - a well-known static field, e.g.
//!   `Duration.ZERO`, equal to the value
//! - [`PreferredDeconstructor`] - the first of several strategies that applies
//! - [`SelectingDeconstructor`] - a callback choosing a strategy per value
//!
//! Arguments are read from the value through [`DataAccessor`]s and written
//! recursively.

use std::{fmt, sync::Arc};

use crate::{
    classfile::{FieldRef, Insn, Opcode, Type},
    deconstruct::{BytecodeWriter, DeconstructionResult},
    reconstruct::StackInfo,
    registry::MemberKey,
    runtime::Value,
    Error, Result,
};

/// Rebuilds values of one runtime type.
pub trait Deconstructor: Send + Sync + fmt::Debug {
    /// Emits instructions pushing `value` into a slot of type `ty`, or
    /// `Ok(None)` if this strategy cannot express it.
    ///
    /// # Errors
    ///
    /// Fails if reading the value's state fails.
    fn deconstruct(
        &self,
        writer: &BytecodeWriter<'_>,
        ty: &Type,
        value: &Value,
    ) -> Result<Option<DeconstructionResult>>;
}

/// How one constructor or factory argument is read from the value.
///
/// Each accessor declares the type of the argument it produces, so values are
/// widened and boxed for the parameter they feed.
#[derive(Debug, Clone, PartialEq)]
pub enum DataAccessor {
    /// A no-argument instance method
    Getter {
        /// Method name
        name: String,
        /// Return type, which is also the parameter type
        ty: Type,
    },
    /// An instance field
    Field {
        /// Field name
        name: String,
        /// Field type, which is also the parameter type
        ty: Type,
    },
}

impl DataAccessor {
    /// Accessor calling `name()` with return descriptor `desc`.
    ///
    /// # Errors
    ///
    /// Fails if `desc` is not a field descriptor.
    pub fn getter(name: impl Into<String>, desc: &str) -> Result<Self> {
        Ok(DataAccessor::Getter {
            name: name.into(),
            ty: Type::parse(desc)?,
        })
    }

    /// Accessor reading the field `name` of descriptor `desc`.
    ///
    /// # Errors
    ///
    /// Fails if `desc` is not a field descriptor.
    pub fn field(name: impl Into<String>, desc: &str) -> Result<Self> {
        Ok(DataAccessor::Field {
            name: name.into(),
            ty: Type::parse(desc)?,
        })
    }

    /// The argument type.
    #[must_use]
    pub fn ty(&self) -> &Type {
        match self {
            DataAccessor::Getter { ty, .. } | DataAccessor::Field { ty, .. } => ty,
        }
    }

    /// Reads the argument from `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemberNotFound`] if `value` is not a host object or
    /// lacks the member, or whatever the host object reports.
    pub fn read(&self, value: &Value) -> Result<Value> {
        let Value::Object(object) = value else {
            return Err(Error::MemberNotFound(format!("{self} on {value}")));
        };
        let read = match self {
            DataAccessor::Getter { name, ty } => {
                object.invoke(name, &format!("(){}", ty.descriptor()), &[])?
            }
            DataAccessor::Field { name, .. } => object.get_field(name)?,
        };
        Ok(read.coerce(self.ty()))
    }
}

impl fmt::Display for DataAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataAccessor::Getter { name, ty } => write!(f, "{name}(){}", ty.descriptor()),
            DataAccessor::Field { name, ty } => write!(f, "{name}:{}", ty.descriptor()),
        }
    }
}

/// Reads and writes every argument. `None` if any argument cannot be written.
fn write_arguments(
    writer: &BytecodeWriter<'_>,
    accessors: &[DataAccessor],
    value: &Value,
) -> Result<Option<(Vec<Insn>, Vec<StackInfo>)>> {
    let mut insns = Vec::new();
    let mut infos = Vec::with_capacity(accessors.len());
    for accessor in accessors {
        let arg = accessor.read(value)?;
        let Some(written) = writer.deconstruct(accessor.ty(), &arg)? else {
            return Ok(None);
        };
        insns.extend(written.insns);
        infos.push(written.info);
    }
    Ok(Some((insns, infos)))
}

fn argument_descriptor(accessors: &[DataAccessor]) -> String {
    let params: String = accessors.iter().map(|a| a.ty().descriptor()).collect();
    format!("({params})")
}

/// `new owner(args...)`.
#[derive(Debug, Clone)]
pub struct ConstructorDeconstructor {
    owner: String,
    accessors: Vec<DataAccessor>,
}

impl ConstructorDeconstructor {
    /// Calls the constructor of `owner` whose parameters are the accessor
    /// types, in order.
    pub fn new(owner: impl Into<String>, accessors: Vec<DataAccessor>) -> Self {
        ConstructorDeconstructor {
            owner: owner.into(),
            accessors,
        }
    }
}

impl Deconstructor for ConstructorDeconstructor {
    fn deconstruct(
        &self,
        writer: &BytecodeWriter<'_>,
        _ty: &Type,
        value: &Value,
    ) -> Result<Option<DeconstructionResult>> {
        let Some((args, infos)) = write_arguments(writer, &self.accessors, value)? else {
            return Ok(None);
        };
        let desc = format!("{}V", argument_descriptor(&self.accessors));
        let mut insns = vec![
            Insn::type_insn(Opcode::New, self.owner.clone()),
            Insn::Simple(Opcode::Dup),
        ];
        insns.extend(args);
        insns.push(Insn::init(self.owner.clone(), desc.clone()));
        Ok(Some(DeconstructionResult::new(
            insns,
            StackInfo::Constructor {
                key: MemberKey::method(self.owner.clone(), "<init>", desc),
                args: infos,
            },
        )))
    }
}

/// `owner.name(args...)`, a static factory.
#[derive(Debug, Clone)]
pub struct StaticFactoryDeconstructor {
    owner: String,
    name: String,
    ret: Type,
    accessors: Vec<DataAccessor>,
}

impl StaticFactoryDeconstructor {
    /// Calls `owner.name`, returning `ret`, with the accessor values.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        ret: Type,
        accessors: Vec<DataAccessor>,
    ) -> Self {
        StaticFactoryDeconstructor {
            owner: owner.into(),
            name: name.into(),
            ret,
            accessors,
        }
    }
}

impl Deconstructor for StaticFactoryDeconstructor {
    fn deconstruct(
        &self,
        writer: &BytecodeWriter<'_>,
        _ty: &Type,
        value: &Value,
    ) -> Result<Option<DeconstructionResult>> {
        let Some((mut insns, infos)) = write_arguments(writer, &self.accessors, value)? else {
            return Ok(None);
        };
        let desc = format!("{}{}", argument_descriptor(&self.accessors), self.ret.descriptor());
        insns.push(Insn::invokestatic(self.owner.clone(), self.name.clone(), desc.clone()));
        Ok(Some(DeconstructionResult::new(
            insns,
            StackInfo::StaticMethod {
                key: MemberKey::method(self.owner.clone(), self.name.clone(), desc),
                args: infos,
            },
        )))
    }
}

/// Refers to a well-known static field holding an equal instance.
///
/// Candidate values are either given up front or read through the writer's
/// class loader when needed.
#[derive(Debug, Clone, Default)]
pub struct CanonicalInstanceDeconstructor {
    candidates: Vec<(FieldRef, Option<Value>)>,
}

impl CanonicalInstanceDeconstructor {
    /// An empty candidate list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate whose value is read from the host runtime.
    #[must_use]
    pub fn with_field(mut self, field: FieldRef) -> Self {
        self.candidates.push((field, None));
        self
    }

    /// Adds a candidate with a known value.
    #[must_use]
    pub fn with_value(mut self, field: FieldRef, value: Value) -> Self {
        self.candidates.push((field, Some(value)));
        self
    }
}

impl Deconstructor for CanonicalInstanceDeconstructor {
    fn deconstruct(
        &self,
        writer: &BytecodeWriter<'_>,
        _ty: &Type,
        value: &Value,
    ) -> Result<Option<DeconstructionResult>> {
        for (field, known) in &self.candidates {
            let candidate = match known {
                Some(candidate) => candidate.clone(),
                None => {
                    let Some(class) = writer.loader().and_then(|l| l.load_class(&field.owner))
                    else {
                        continue;
                    };
                    class.get_static(&field.name, &field.desc)?
                }
            };
            if candidate == *value {
                return Ok(Some(DeconstructionResult::new(
                    vec![Insn::getstatic(
                        field.owner.clone(),
                        field.name.clone(),
                        field.desc.clone(),
                    )],
                    StackInfo::StaticField(MemberKey::from(field)),
                )));
            }
        }
        Ok(None)
    }
}

/// Tries strategies in order and takes the first that applies.
///
/// Put a [`CanonicalInstanceDeconstructor`] first to prefer a shared instance
/// over a fresh construction.
#[derive(Debug, Clone, Default)]
pub struct PreferredDeconstructor {
    strategies: Vec<Arc<dyn Deconstructor>>,
}

impl PreferredDeconstructor {
    /// Creates the chain.
    #[must_use]
    pub fn new(strategies: Vec<Arc<dyn Deconstructor>>) -> Self {
        PreferredDeconstructor { strategies }
    }
}

impl Deconstructor for PreferredDeconstructor {
    fn deconstruct(
        &self,
        writer: &BytecodeWriter<'_>,
        ty: &Type,
        value: &Value,
    ) -> Result<Option<DeconstructionResult>> {
        for strategy in &self.strategies {
            if let Some(result) = strategy.deconstruct(writer, ty, value)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

/// Callback choosing a strategy for a value.
pub type Selector = dyn Fn(&Value) -> Result<Option<Arc<dyn Deconstructor>>> + Send + Sync;

/// Chooses among strategies by inspecting the value, e.g. a one-argument
/// factory when a component is zero and a two-argument one otherwise.
#[derive(Clone)]
pub struct SelectingDeconstructor {
    selector: Arc<Selector>,
}

impl SelectingDeconstructor {
    /// Wraps a selector callback.
    pub fn new<F>(selector: F) -> Self
    where
        F: Fn(&Value) -> Result<Option<Arc<dyn Deconstructor>>> + Send + Sync + 'static,
    {
        SelectingDeconstructor {
            selector: Arc::new(selector),
        }
    }
}

impl fmt::Debug for SelectingDeconstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SelectingDeconstructor")
    }
}

impl Deconstructor for SelectingDeconstructor {
    fn deconstruct(
        &self,
        writer: &BytecodeWriter<'_>,
        ty: &Type,
        value: &Value,
    ) -> Result<Option<DeconstructionResult>> {
        match (self.selector)(value)? {
            Some(strategy) => strategy.deconstruct(writer, ty, value),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{registry::Registries, test::Duration};

    const DURATION: &str = "java/time/Duration";

    fn registries_with(strategy: Arc<dyn Deconstructor>) -> Registries {
        let mut registries = Registries::new();
        registries.register_deconstructor(DURATION, strategy);
        registries
    }

    fn write(registries: &Registries, value: &Value) -> Option<Vec<Insn>> {
        BytecodeWriter::new(registries)
            .deconstruct(&Type::object(DURATION), value)
            .unwrap()
            .map(|result| result.insns)
    }

    fn factory(name: &str, accessors: Vec<DataAccessor>) -> Arc<dyn Deconstructor> {
        Arc::new(StaticFactoryDeconstructor::new(
            DURATION,
            name,
            Type::object(DURATION),
            accessors,
        ))
    }

    #[test]
    fn test_constructor_widens_arguments() -> Result<()> {
        let strategy = ConstructorDeconstructor::new(
            DURATION,
            vec![
                DataAccessor::getter("getSeconds", "J")?,
                DataAccessor::field("nanos", "I")?,
            ],
        );
        let registries = registries_with(Arc::new(strategy));
        assert_eq!(
            write(&registries, &Duration::value(3, 5)),
            Some(vec![
                Insn::type_insn(Opcode::New, DURATION),
                Insn::Simple(Opcode::Dup),
                Insn::Ldc(crate::classfile::Constant::Long(3)),
                Insn::Simple(Opcode::Iconst5),
                Insn::init(DURATION, "(JI)V"),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_int_field_widens_to_long_parameter() -> Result<()> {
        let strategy = ConstructorDeconstructor::new(
            DURATION,
            vec![DataAccessor::field("nanos", "J")?],
        );
        let registries = registries_with(Arc::new(strategy));
        assert_eq!(
            write(&registries, &Duration::value(0, 7)),
            Some(vec![
                Insn::type_insn(Opcode::New, DURATION),
                Insn::Simple(Opcode::Dup),
                Insn::Ldc(crate::classfile::Constant::Long(7)),
                Insn::init(DURATION, "(J)V"),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_narrowing_accessor_is_unwritable() -> Result<()> {
        let strategy = ConstructorDeconstructor::new(
            DURATION,
            vec![DataAccessor::field("seconds", "I")?],
        );
        let registries = registries_with(Arc::new(strategy));
        assert_eq!(write(&registries, &Duration::value(3, 0)), None);
        Ok(())
    }

    #[test]
    fn test_selecting_by_shape() -> Result<()> {
        let seconds = factory("ofSeconds", vec![DataAccessor::getter("getSeconds", "J")?]);
        let both = factory(
            "ofSeconds",
            vec![
                DataAccessor::getter("getSeconds", "J")?,
                DataAccessor::field("nanos", "J")?,
            ],
        );
        let selecting = SelectingDeconstructor::new(move |value| {
            let nanos = DataAccessor::field("nanos", "I")?.read(value)?;
            Ok(Some(if nanos == Value::Int(0) {
                seconds.clone()
            } else {
                both.clone()
            }))
        });
        let registries = registries_with(Arc::new(selecting));

        let short = write(&registries, &Duration::value(1, 0)).unwrap();
        assert_eq!(
            short.last(),
            Some(&Insn::invokestatic(DURATION, "ofSeconds", "(J)Ljava/time/Duration;"))
        );
        let long = write(&registries, &Duration::value(1, 7)).unwrap();
        assert_eq!(
            long.last(),
            Some(&Insn::invokestatic(DURATION, "ofSeconds", "(JJ)Ljava/time/Duration;"))
        );
        assert!(long.contains(&Insn::Ldc(crate::classfile::Constant::Long(7))));
        Ok(())
    }

    #[test]
    fn test_canonical_instance_preferred() -> Result<()> {
        let zero = FieldRef::new(DURATION, "ZERO", "Ljava/time/Duration;");
        let preferred = PreferredDeconstructor::new(vec![
            Arc::new(CanonicalInstanceDeconstructor::new().with_value(zero, Duration::value(0, 0))),
            factory("ofSeconds", vec![DataAccessor::getter("getSeconds", "J")?]),
        ]);
        let registries = registries_with(Arc::new(preferred));
        assert_eq!(
            write(&registries, &Duration::value(0, 0)),
            Some(vec![Insn::getstatic(DURATION, "ZERO", "Ljava/time/Duration;")])
        );
        assert_eq!(
            write(&registries, &Duration::value(2, 0)).map(|insns| insns.len()),
            Some(2)
        );
        Ok(())
    }

    #[test]
    fn test_no_strategy() {
        assert_eq!(write(&Registries::new(), &Duration::value(1, 0)), None);
    }
}

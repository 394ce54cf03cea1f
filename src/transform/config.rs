//! Configuration for a transformation run.

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    classfile::FieldRef,
    deconstruct::Deconstructor,
    reconstruct::DEFAULT_MAX_DEPTH,
    registry::{HostFieldReconstructor, MemberKey, Registries, ReconstructorRef},
    runtime::ClassLoader,
};

/// Configuration for the [`Transformer`](crate::transform::Transformer).
///
/// Everything a caller can add on top of the built-in registries: trusted
/// types, extra reconstructors and deconstructors, fields to force, and the
/// host runtime to query.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Upper bound on fixed-point rounds (default: 64).
    pub max_rounds: usize,

    /// Bound on the nesting of a single reconstruction (default: 256).
    pub max_depth: usize,

    /// Extra constant types, as internal names.
    pub constant_types: Vec<String>,

    /// Static fields whose host value is trusted as constant.
    pub known_constant_fields: Vec<FieldRef>,

    /// Extra member reconstructors, consulted before the built-in ones.
    pub reconstructors: Vec<(MemberKey, ReconstructorRef)>,

    /// Deconstructors by runtime type internal name.
    pub deconstructors: Vec<(String, Arc<dyn Deconstructor>)>,

    /// Static fields resolved in force mode.
    pub force_fields: BTreeSet<MemberKey>,

    /// The host runtime. Without one, only input classes and built-ins are
    /// available.
    pub class_loader: Option<Arc<dyn ClassLoader>>,

    /// Resolve `static final` fields from their initializer stores (default: true).
    pub propagate_fields: bool,

    /// Remove static initializers left empty (default: true).
    pub prune_initializers: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_rounds: 64,
            max_depth: DEFAULT_MAX_DEPTH,
            constant_types: Vec::new(),
            known_constant_fields: Vec::new(),
            reconstructors: Vec::new(),
            deconstructors: Vec::new(),
            force_fields: BTreeSet::new(),
            class_loader: None,
            propagate_fields: true,
            prune_initializers: true,
        }
    }
}

impl TransformConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the round bound.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the reconstruction nesting bound.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Trusts a type's instance surface.
    #[must_use]
    pub fn with_constant_type(mut self, name: impl Into<String>) -> Self {
        self.constant_types.push(name.into());
        self
    }

    /// Trusts the host value of a static field.
    #[must_use]
    pub fn with_known_constant_field(mut self, field: FieldRef) -> Self {
        self.known_constant_fields.push(field);
        self
    }

    /// Adds a member reconstructor.
    #[must_use]
    pub fn with_reconstructor(mut self, key: MemberKey, reconstructor: ReconstructorRef) -> Self {
        self.reconstructors.push((key, reconstructor));
        self
    }

    /// Adds a deconstructor for a runtime type.
    #[must_use]
    pub fn with_deconstructor(
        mut self,
        type_name: impl Into<String>,
        deconstructor: Arc<dyn Deconstructor>,
    ) -> Self {
        self.deconstructors.push((type_name.into(), deconstructor));
        self
    }

    /// Forces resolution of a static field.
    #[must_use]
    pub fn with_force_field(mut self, key: MemberKey) -> Self {
        self.force_fields.insert(key);
        self
    }

    /// Sets the host runtime.
    #[must_use]
    pub fn with_class_loader(mut self, loader: Arc<dyn ClassLoader>) -> Self {
        self.class_loader = Some(loader);
        self
    }

    /// Switches field propagation.
    #[must_use]
    pub fn with_propagate_fields(mut self, enabled: bool) -> Self {
        self.propagate_fields = enabled;
        self
    }

    /// Switches initializer pruning.
    #[must_use]
    pub fn with_prune_initializers(mut self, enabled: bool) -> Self {
        self.prune_initializers = enabled;
        self
    }

    /// Returns `true` if `key` is forced.
    #[must_use]
    pub fn is_forced(&self, key: &MemberKey) -> bool {
        self.force_fields.contains(key)
    }

    /// Builds the per-run registry overlay from this configuration.
    #[must_use]
    pub fn registries(&self) -> Registries {
        let mut registries = Registries::new();
        for name in &self.constant_types {
            registries.add_constant_type(name.clone());
        }
        for field in &self.known_constant_fields {
            registries.register_reconstructor(MemberKey::from(field), Arc::new(HostFieldReconstructor));
        }
        for (key, reconstructor) in &self.reconstructors {
            registries.register_reconstructor(key.clone(), reconstructor.clone());
        }
        for (name, deconstructor) in &self.deconstructors {
            registries.register_deconstructor(name.clone(), deconstructor.clone());
        }
        registries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransformConfig::default();
        assert_eq!(config.max_rounds, 64);
        assert!(config.propagate_fields);
        assert!(config.prune_initializers);
        assert!(config.class_loader.is_none());
    }

    #[test]
    fn test_registries_overlay() {
        let field = FieldRef::new("com/example/Build", "VERSION", "Ljava/lang/String;");
        let config = TransformConfig::new()
            .with_constant_type("java/time/Duration")
            .with_known_constant_field(field.clone())
            .with_force_field(MemberKey::field("com/example/Build", "STAMP"));

        let registries = config.registries();
        assert!(registries.is_constant_type("java/time/Duration"));
        assert!(registries.is_constant_type("java/lang/String"));
        assert!(registries.reconstructor(&MemberKey::from(&field)).is_some());
        assert!(config.is_forced(&MemberKey::field("com/example/Build", "STAMP")));
        assert!(!config.is_forced(&MemberKey::field("com/example/Build", "VERSION")));
    }
}

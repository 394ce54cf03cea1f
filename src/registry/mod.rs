//! Member identities and the strategy tables keyed by them.
//!
//! Lookups go through two layers. The [`BaseRegistry`] is built once per
//! process from the [built-in](builtins) reconstructors and is never mutated
//! afterwards. Each run owns a [`Registries`] overlay holding whatever the
//! caller configured plus the field values the run itself resolves; the
//! overlay is consulted first.
//!
//! # Examples
//!
//! ```rust
//! use classfold::registry::{MemberKey, Registries};
//!
//! let registries = Registries::new();
//! let key = MemberKey::method("java/lang/String", "length", "()I");
//! assert!(registries.reconstructor(&key).is_some());
//! assert!(registries.is_constant_type("java/lang/Integer"));
//! ```

pub mod builtins;
mod key;
mod reconstructor;

use std::{collections::BTreeMap, sync::Arc, sync::OnceLock};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::deconstruct::Deconstructor;

pub use key::{members_of, MemberKey, MemberKind};
pub use reconstructor::{
    Call, ConstantFieldReconstructor, HostFieldReconstructor, HostMethodReconstructor,
    InstancePredicate, NativeFn, NativeReconstructor, Reconstructor,
};

/// Shared strategy handle.
pub type ReconstructorRef = Arc<dyn Reconstructor>;

/// The process-wide, read-only registry.
#[derive(Debug)]
pub struct BaseRegistry {
    reconstructors: BTreeMap<MemberKey, ReconstructorRef>,
    constant_types: FxHashSet<String>,
}

static BASE_REGISTRY: OnceLock<BaseRegistry> = OnceLock::new();

impl BaseRegistry {
    fn build() -> Self {
        let mut reconstructors = BTreeMap::new();
        builtins::register(&mut reconstructors);
        let constant_types = builtins::CONSTANT_TYPES
            .iter()
            .map(|name| (*name).to_string())
            .collect();
        BaseRegistry {
            reconstructors,
            constant_types,
        }
    }

    /// The built-in strategy for a member.
    #[must_use]
    pub fn reconstructor(&self, key: &MemberKey) -> Option<&ReconstructorRef> {
        self.reconstructors.get(key)
    }

    /// Returns `true` if `name` is a built-in constant type.
    #[must_use]
    pub fn is_constant_type(&self, name: &str) -> bool {
        self.constant_types.contains(name)
    }

    /// Number of built-in reconstructors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reconstructors.len()
    }

    /// Returns `true` if no reconstructor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reconstructors.is_empty()
    }
}

/// The base registry, built on first use.
pub fn base() -> &'static BaseRegistry {
    BASE_REGISTRY.get_or_init(BaseRegistry::build)
}

/// The registries of one run: the base layer plus a private overlay.
#[derive(Debug, Clone)]
pub struct Registries {
    base: &'static BaseRegistry,
    reconstructors: BTreeMap<MemberKey, ReconstructorRef>,
    deconstructors: FxHashMap<String, Arc<dyn Deconstructor>>,
    constant_types: FxHashSet<String>,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    /// Creates a run registry with an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Registries {
            base: base(),
            reconstructors: BTreeMap::new(),
            deconstructors: FxHashMap::default(),
            constant_types: FxHashSet::default(),
        }
    }

    /// The strategy for a member, overlay first.
    #[must_use]
    pub fn reconstructor(&self, key: &MemberKey) -> Option<ReconstructorRef> {
        self.reconstructors
            .get(key)
            .or_else(|| self.base.reconstructor(key))
            .cloned()
    }

    /// Adds or replaces an overlay strategy.
    pub fn register_reconstructor(&mut self, key: MemberKey, reconstructor: ReconstructorRef) {
        self.reconstructors.insert(key, reconstructor);
    }

    /// Every registered member of `owner`, both layers, in key order.
    #[must_use]
    pub fn members_of(&self, owner: &str) -> Vec<MemberKey> {
        let mut keys: Vec<MemberKey> = members_of(&self.reconstructors, owner)
            .chain(members_of(&self.base.reconstructors, owner))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Returns `true` if instances of `name` are trusted to be deterministic.
    #[must_use]
    pub fn is_constant_type(&self, name: &str) -> bool {
        self.constant_types.contains(name) || self.base.is_constant_type(name)
    }

    /// Trusts an extra type.
    pub fn add_constant_type(&mut self, name: impl Into<String>) {
        self.constant_types.insert(name.into());
    }

    /// The deconstruction strategy for a runtime type.
    #[must_use]
    pub fn deconstructor(&self, type_name: &str) -> Option<Arc<dyn Deconstructor>> {
        self.deconstructors.get(type_name).cloned()
    }

    /// Adds or replaces the deconstruction strategy for a runtime type.
    pub fn register_deconstructor(
        &mut self,
        type_name: impl Into<String>,
        deconstructor: Arc<dyn Deconstructor>,
    ) {
        self.deconstructors.insert(type_name.into(), deconstructor);
    }
}

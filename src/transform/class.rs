//! Per-class state of a run.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::{
    classfile::{AccessFlags, ClassNode, Insn, InsnId, LabelId, MethodNode, Opcode},
    runtime::Value,
    Error, Result,
};

/// The resolution state of one declared field.
///
/// The value is assigned at most once; a second assignment is an internal
/// inconsistency and aborts the run.
#[derive(Debug, Clone, Default)]
pub struct TransformedField {
    value: Option<Value>,
}

impl TransformedField {
    /// The resolved value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns `true` once a value is resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// Fixes the value of the field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldAlreadyResolved`] if a value is already set.
    pub fn resolve(&mut self, name: &str, value: Value) -> Result<()> {
        if self.value.is_some() {
            return Err(Error::FieldAlreadyResolved(name.to_string()));
        }
        self.value = Some(value);
        Ok(())
    }
}

/// A class being transformed, with the indices the round phases need.
#[derive(Debug, Clone)]
pub struct TransformedClass {
    node: ClassNode,
    safe_labels: Vec<FxHashSet<LabelId>>,
    clinit: Option<usize>,
    stores: BTreeMap<String, Vec<InsnId>>,
    fields: BTreeMap<String, TransformedField>,
    inlined: FxHashSet<(usize, InsnId)>,
    changed: bool,
}

impl TransformedClass {
    /// Wraps a class tree and indexes it.
    #[must_use]
    pub fn new(node: ClassNode) -> Self {
        let fields = node
            .fields
            .iter()
            .map(|field| (field.name.clone(), TransformedField::default()))
            .collect();
        let mut class = TransformedClass {
            node,
            safe_labels: Vec::new(),
            clinit: None,
            stores: BTreeMap::new(),
            fields,
            inlined: FxHashSet::default(),
            changed: false,
        };
        class.reindex();
        class
    }

    /// Internal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// The class tree.
    #[must_use]
    pub fn node(&self) -> &ClassNode {
        &self.node
    }

    /// Mutable access to the class tree. Call [`TransformedClass::reindex`]
    /// after changing jumps or the method list.
    pub fn node_mut(&mut self) -> &mut ClassNode {
        &mut self.node
    }

    /// Consumes the state, returning the tree.
    #[must_use]
    pub fn into_node(self) -> ClassNode {
        self.node
    }

    /// Labels of method `index` that nothing jumps to.
    #[must_use]
    pub fn safe_labels(&self, index: usize) -> Option<&FxHashSet<LabelId>> {
        self.safe_labels.get(index)
    }

    /// Index of the static initializer.
    #[must_use]
    pub fn clinit(&self) -> Option<usize> {
        self.clinit
    }

    /// The static initializer.
    #[must_use]
    pub fn clinit_method(&self) -> Option<&MethodNode> {
        self.clinit.and_then(|index| self.node.methods.get(index))
    }

    /// `putstatic` sites of the static initializer storing to own field `name`,
    /// in program order.
    #[must_use]
    pub fn store_sites(&self, name: &str) -> &[InsnId] {
        self.stores.get(name).map_or(&[], Vec::as_slice)
    }

    /// The resolution state of field `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&TransformedField> {
        self.fields.get(name)
    }

    /// Mutable resolution state of field `name`.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut TransformedField> {
        self.fields.get_mut(name)
    }

    /// Returns `true` if the instruction at `id` of method `method` was
    /// emitted by an earlier replacement.
    #[must_use]
    pub fn is_inlined(&self, method: usize, id: InsnId) -> bool {
        self.inlined.contains(&(method, id))
    }

    /// Marks an instruction as emitted by a replacement.
    pub fn mark_inlined(&mut self, method: usize, id: InsnId) {
        self.inlined.insert((method, id));
    }

    /// Returns `true` if any phase changed the class.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Records a change.
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Returns `true` if any method reads the static field `owner.name`.
    #[must_use]
    pub fn reads_field(&self, owner: &str, name: &str) -> bool {
        self.node.methods.iter().any(|method| {
            method.insns.iter().any(|(_, insn)| {
                matches!(insn, Insn::Field { opcode: Opcode::Getstatic, field }
                    if field.owner == owner && field.name == name)
            })
        })
    }

    /// Returns `true` if the static initializer can observe own field `name`
    /// before its last store: a `getstatic` of it, or a call to a method of
    /// this class that reads it, placed ahead of that store.
    ///
    /// Such a field cannot move into a `ConstantValue`, which the JVM assigns
    /// before the initializer runs.
    #[must_use]
    pub fn reads_before_store(&self, name: &str) -> bool {
        let (Some(clinit), Some(last)) = (self.clinit_method(), self.store_sites(name).last()) else {
            return false;
        };
        let owner = self.node.name.as_str();
        let reads = |insn: &Insn| {
            matches!(insn, Insn::Field { opcode: Opcode::Getstatic, field }
                if field.owner == owner && field.name == name)
        };
        for (id, insn) in clinit.insns.iter() {
            if id == *last {
                return false;
            }
            if reads(insn) {
                return true;
            }
            if let Insn::Method { method, .. } = insn {
                if method.owner != owner {
                    continue;
                }
                let callee = self
                    .node
                    .methods
                    .iter()
                    .find(|m| m.name == method.name && m.desc == method.desc);
                if callee.is_some_and(|callee| callee.insns.iter().any(|(_, insn)| reads(insn))) {
                    return true;
                }
            }
        }
        false
    }

    /// Recomputes safe labels, the initializer index and its store sites.
    pub fn reindex(&mut self) {
        self.safe_labels = self.node.methods.iter().map(MethodNode::safe_labels).collect();
        self.clinit = self.node.clinit_index();
        self.stores.clear();
        let Some(clinit) = self.clinit_method() else {
            return;
        };
        let mut stores: BTreeMap<String, Vec<InsnId>> = BTreeMap::new();
        for (id, insn) in clinit.insns.iter() {
            if let Insn::Field {
                opcode: Opcode::Putstatic,
                field,
            } = insn
            {
                if field.owner == self.node.name {
                    stores.entry(field.name.clone()).or_default().push(id);
                }
            }
        }
        self.stores = stores;
    }

    /// Removes the static initializer if it does nothing but return.
    ///
    /// Returns `true` if it was removed.
    pub fn prune_initializer(&mut self) -> bool {
        let Some(index) = self.clinit else {
            return false;
        };
        let method = &self.node.methods[index];
        let empty = method.try_catch.is_empty()
            && method
                .insns
                .iter()
                .all(|(_, insn)| insn.is_pseudo() || *insn == Insn::Simple(Opcode::Return));
        if !empty {
            return false;
        }
        self.node.methods.remove(index);
        self.inlined = self
            .inlined
            .drain()
            .filter(|(method, _)| *method != index)
            .map(|(method, id)| if method > index { (method - 1, id) } else { (method, id) })
            .collect();
        self.changed = true;
        self.reindex();
        true
    }

    /// Static final fields not resolved yet, in name order.
    #[must_use]
    pub fn unresolved_static_finals(&self) -> Vec<(String, String)> {
        self.node
            .fields
            .iter()
            .filter(|field| field.access.contains(AccessFlags::STATIC | AccessFlags::FINAL))
            .filter(|field| self.fields.get(&field.name).is_some_and(|f| !f.is_resolved()))
            .map(|field| (field.name.clone(), field.desc.clone()))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::{CLINIT, InsnList},
        test::static_final,
    };

    fn class_with_clinit(insns: Vec<Insn>) -> TransformedClass {
        let mut node = ClassNode::new("a/B");
        node.fields.push(static_final("X", "I"));
        node.methods.push(MethodNode::new(
            AccessFlags::STATIC,
            CLINIT,
            "()V",
            InsnList::from_insns(insns),
        ));
        TransformedClass::new(node)
    }

    #[test]
    fn test_store_sites_and_reads() {
        let class = class_with_clinit(vec![
            Insn::Simple(Opcode::Iconst1),
            Insn::putstatic("a/B", "X", "I"),
            Insn::Simple(Opcode::Iconst2),
            Insn::putstatic("a/B", "X", "I"),
            Insn::putstatic("other/C", "X", "I"),
            Insn::Simple(Opcode::Return),
        ]);
        assert_eq!(class.store_sites("X").len(), 2);
        assert!(class.store_sites("Y").is_empty());
        assert!(!class.reads_field("a/B", "X"));
        assert_eq!(class.unresolved_static_finals(), vec![("X".to_string(), "I".to_string())]);
    }

    #[test]
    fn test_reads_before_store() {
        let early = class_with_clinit(vec![
            Insn::getstatic("a/B", "X", "I"),
            Insn::Simple(Opcode::Pop),
            Insn::Simple(Opcode::Iconst1),
            Insn::putstatic("a/B", "X", "I"),
            Insn::Simple(Opcode::Return),
        ]);
        assert!(early.reads_before_store("X"));

        let late = class_with_clinit(vec![
            Insn::Simple(Opcode::Iconst1),
            Insn::putstatic("a/B", "X", "I"),
            Insn::getstatic("a/B", "X", "I"),
            Insn::Simple(Opcode::Pop),
            Insn::Simple(Opcode::Return),
        ]);
        assert!(!late.reads_before_store("X"));

        let mut node = early.into_node();
        node.methods[0].insns = InsnList::from_insns([
            Insn::invokestatic("a/B", "peek", "()I"),
            Insn::Simple(Opcode::Pop),
            Insn::Simple(Opcode::Iconst1),
            Insn::putstatic("a/B", "X", "I"),
            Insn::Simple(Opcode::Return),
        ]);
        node.methods.push(MethodNode::new(
            AccessFlags::STATIC,
            "peek",
            "()I",
            InsnList::from_insns([Insn::getstatic("a/B", "X", "I"), Insn::Simple(Opcode::Ireturn)]),
        ));
        assert!(TransformedClass::new(node).reads_before_store("X"));
    }

    #[test]
    fn test_prune_initializer() {
        let mut class = class_with_clinit(vec![Insn::Label(LabelId(0)), Insn::Simple(Opcode::Return)]);
        assert!(class.prune_initializer());
        assert!(class.clinit().is_none());
        assert!(class.is_changed());

        let mut class = class_with_clinit(vec![
            Insn::Simple(Opcode::Iconst1),
            Insn::putstatic("a/B", "X", "I"),
            Insn::Simple(Opcode::Return),
        ]);
        assert!(!class.prune_initializer());
    }

    #[test]
    fn test_single_assignment() {
        let mut field = TransformedField::default();
        assert!(field.resolve("a/B.X", Value::Int(1)).is_ok());
        assert!(matches!(
            field.resolve("a/B.X", Value::Int(1)),
            Err(Error::FieldAlreadyResolved(_))
        ));
        assert_eq!(field.value(), Some(&Value::Int(1)));
    }
}

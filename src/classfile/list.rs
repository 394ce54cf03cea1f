//! Arena-backed doubly linked instruction list.
//!
//! Nodes live in a vector and link to each other through [`InsnId`] indices,
//! so handles stay valid while instructions are inserted and removed around
//! them. Removed nodes are unlinked and tombstoned rather than compacted; an
//! id is never reused within one list.

use rustc_hash::FxHashSet;

use crate::classfile::insn::{Insn, LabelId};

/// Stable handle to a node of an [`InsnList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsnId(u32);

impl InsnId {
    /// The arena index behind this handle.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Node {
    insn: Insn,
    prev: Option<InsnId>,
    next: Option<InsnId>,
    live: bool,
}

/// The instruction list of one method body.
///
/// # Examples
///
/// ```rust
/// use classfold::classfile::{Insn, InsnList, Opcode};
///
/// let mut list = InsnList::new();
/// let a = list.push(Insn::Simple(Opcode::Iconst1));
/// let b = list.push(Insn::Simple(Opcode::Ireturn));
/// list.insert_before(a, Insn::Simple(Opcode::Nop));
/// assert_eq!(list.len(), 3);
/// assert_eq!(list.prev(b), Some(a));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InsnList {
    nodes: Vec<Node>,
    first: Option<InsnId>,
    last: Option<InsnId>,
    len: usize,
    next_label: u32,
}

impl InsnList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from instructions in program order.
    pub fn from_insns(insns: impl IntoIterator<Item = Insn>) -> Self {
        let mut list = InsnList::new();
        for insn in insns {
            list.push(insn);
        }
        list
    }

    /// Number of live nodes, pseudo-instructions included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list has no live nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First live node.
    #[must_use]
    pub fn first(&self) -> Option<InsnId> {
        self.first
    }

    /// Last live node.
    #[must_use]
    pub fn last(&self) -> Option<InsnId> {
        self.last
    }

    /// Returns `true` if `id` denotes a live node of this list.
    #[must_use]
    pub fn contains(&self, id: InsnId) -> bool {
        self.nodes.get(id.index()).is_some_and(|node| node.live)
    }

    /// The instruction at `id`, or `None` once removed.
    #[must_use]
    pub fn get(&self, id: InsnId) -> Option<&Insn> {
        self.nodes
            .get(id.index())
            .filter(|node| node.live)
            .map(|node| &node.insn)
    }

    /// Mutable access to the instruction at `id`.
    pub fn get_mut(&mut self, id: InsnId) -> Option<&mut Insn> {
        self.nodes
            .get_mut(id.index())
            .filter(|node| node.live)
            .map(|node| &mut node.insn)
    }

    /// The node after `id`.
    #[must_use]
    pub fn next(&self, id: InsnId) -> Option<InsnId> {
        self.nodes
            .get(id.index())
            .filter(|node| node.live)
            .and_then(|node| node.next)
    }

    /// The node before `id`.
    #[must_use]
    pub fn prev(&self, id: InsnId) -> Option<InsnId> {
        self.nodes
            .get(id.index())
            .filter(|node| node.live)
            .and_then(|node| node.prev)
    }

    fn alloc(&mut self, insn: Insn) -> InsnId {
        if let Insn::Label(LabelId(label)) = insn {
            self.next_label = self.next_label.max(label + 1);
        }
        let id = InsnId(self.nodes.len() as u32);
        self.nodes.push(Node {
            insn,
            prev: None,
            next: None,
            live: true,
        });
        self.len += 1;
        id
    }

    /// Appends an instruction.
    pub fn push(&mut self, insn: Insn) -> InsnId {
        let id = self.alloc(insn);
        match self.last {
            Some(last) => {
                self.nodes[last.index()].next = Some(id);
                self.nodes[id.index()].prev = Some(last);
            }
            None => self.first = Some(id),
        }
        self.last = Some(id);
        id
    }

    /// Inserts `insn` directly before the live node `anchor`.
    ///
    /// Inserting before a removed node appends instead, which never happens
    /// for anchors obtained from the same pass.
    pub fn insert_before(&mut self, anchor: InsnId, insn: Insn) -> InsnId {
        if !self.contains(anchor) {
            return self.push(insn);
        }
        let id = self.alloc(insn);
        let prev = self.nodes[anchor.index()].prev;
        self.nodes[id.index()].prev = prev;
        self.nodes[id.index()].next = Some(anchor);
        self.nodes[anchor.index()].prev = Some(id);
        match prev {
            Some(prev) => self.nodes[prev.index()].next = Some(id),
            None => self.first = Some(id),
        }
        id
    }

    /// Inserts a sequence before `anchor`, keeping its order, and returns the
    /// new ids.
    pub fn insert_all_before(&mut self, anchor: InsnId, insns: Vec<Insn>) -> Vec<InsnId> {
        insns
            .into_iter()
            .map(|insn| self.insert_before(anchor, insn))
            .collect()
    }

    /// Unlinks a node. Removing an already removed node is a no-op.
    pub fn remove(&mut self, id: InsnId) {
        if !self.contains(id) {
            return;
        }
        let (prev, next) = {
            let node = &mut self.nodes[id.index()];
            node.live = false;
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(prev) => self.nodes[prev.index()].next = next,
            None => self.first = next,
        }
        match next {
            Some(next) => self.nodes[next.index()].prev = prev,
            None => self.last = prev,
        }
        self.len -= 1;
    }

    /// Ids from `first` up to but excluding `end` (or to the end of the list).
    #[must_use]
    pub fn span(&self, first: InsnId, end: Option<InsnId>) -> Vec<InsnId> {
        let mut out = Vec::new();
        let mut cursor = Some(first).filter(|id| self.contains(*id));
        while let Some(id) = cursor {
            if Some(id) == end {
                break;
            }
            out.push(id);
            cursor = self.next(id);
        }
        out
    }

    /// The real instructions of a span, pseudo-instructions skipped.
    #[must_use]
    pub fn span_insns(&self, first: InsnId, end: Option<InsnId>) -> Vec<Insn> {
        self.span(first, end)
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter(|insn| !insn.is_pseudo())
            .cloned()
            .collect()
    }

    /// Removes the real instructions of a span.
    ///
    /// Labels, line numbers and frames inside the span stay in place: other
    /// instructions, try-catch ranges and debug info may refer to them.
    pub fn remove_span(&mut self, first: InsnId, end: Option<InsnId>) {
        for id in self.span(first, end) {
            if self.get(id).is_some_and(|insn| !insn.is_pseudo()) {
                self.remove(id);
            }
        }
    }

    /// Allocates a fresh label id, unique within this list.
    pub fn new_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    /// Iterates over live nodes in program order.
    pub fn iter(&self) -> InsnIter<'_> {
        InsnIter {
            list: self,
            cursor: self.first,
        }
    }

    /// Snapshot of the live ids in program order.
    #[must_use]
    pub fn ids(&self) -> Vec<InsnId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// The node holding `label`, if present.
    #[must_use]
    pub fn find_label(&self, label: LabelId) -> Option<InsnId> {
        self.iter()
            .find(|(_, insn)| matches!(insn, Insn::Label(l) if *l == label))
            .map(|(id, _)| id)
    }

    /// Labels targeted by a jump or switch of this list.
    #[must_use]
    pub fn jump_targets(&self) -> FxHashSet<LabelId> {
        self.iter().flat_map(|(_, insn)| insn.targets()).collect()
    }

    /// All live instructions in program order, pseudo-instructions included.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Insn> {
        self.iter().map(|(_, insn)| insn.clone()).collect()
    }
}

/// Iterator over the live nodes of an [`InsnList`].
pub struct InsnIter<'a> {
    list: &'a InsnList,
    cursor: Option<InsnId>,
}

impl<'a> Iterator for InsnIter<'a> {
    type Item = (InsnId, &'a Insn);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = &self.list.nodes[id.index()];
        self.cursor = node.next;
        Some((id, &node.insn))
    }
}

impl<'a> IntoIterator for &'a InsnList {
    type Item = (InsnId, &'a Insn);
    type IntoIter = InsnIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Insn> for InsnList {
    fn from_iter<T: IntoIterator<Item = Insn>>(iter: T) -> Self {
        InsnList::from_insns(iter)
    }
}

//! Canonical identities of fields and methods.

use std::{collections::BTreeMap, fmt, ops::Bound};

use crate::classfile::{FieldRef, MethodRef};

/// Whether a key names a field or a method; methods carry their descriptor.
///
/// Ordering puts fields before methods, then methods by descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    /// A field
    Field,
    /// A method with its descriptor
    Method(String),
}

/// Identity of a field or method: owner, name and, for methods, descriptor.
///
/// Keys order by owner, then name, then fields before methods, then
/// descriptor, so all members of one class form a contiguous range of an
/// ordered map (see [`members_of`]).
///
/// # Examples
///
/// ```rust
/// use classfold::registry::MemberKey;
///
/// let field = MemberKey::field("java/lang/Integer", "MAX_VALUE");
/// let method = MemberKey::method("java/lang/Integer", "MAX_VALUE", "()I");
/// assert!(field < method);
/// assert_eq!(method.to_string(), "java/lang/Integer.MAX_VALUE()I");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey {
    /// Internal name of the declaring class
    pub owner: String,
    /// Member name
    pub name: String,
    /// Field or method
    pub kind: MemberKind,
}

impl MemberKey {
    /// Key of a field.
    pub fn field(owner: impl Into<String>, name: impl Into<String>) -> Self {
        MemberKey {
            owner: owner.into(),
            name: name.into(),
            kind: MemberKind::Field,
        }
    }

    /// Key of a method.
    pub fn method(owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        MemberKey {
            owner: owner.into(),
            name: name.into(),
            kind: MemberKind::Method(desc.into()),
        }
    }

    /// Returns `true` for field keys.
    #[must_use]
    pub fn is_field(&self) -> bool {
        self.kind == MemberKind::Field
    }

    /// The method descriptor, `None` for fields.
    #[must_use]
    pub fn descriptor(&self) -> Option<&str> {
        match &self.kind {
            MemberKind::Field => None,
            MemberKind::Method(desc) => Some(desc),
        }
    }

    /// Smallest possible key of `owner`.
    fn lower_bound(owner: &str) -> Self {
        MemberKey::field(owner, "")
    }
}

impl From<&FieldRef> for MemberKey {
    fn from(field: &FieldRef) -> Self {
        MemberKey::field(field.owner.clone(), field.name.clone())
    }
}

impl From<&MethodRef> for MemberKey {
    fn from(method: &MethodRef) -> Self {
        MemberKey::method(method.owner.clone(), method.name.clone(), method.desc.clone())
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)?;
        if let MemberKind::Method(desc) = &self.kind {
            f.write_str(desc)?;
        }
        Ok(())
    }
}

/// The entries of `map` whose key belongs to `owner`, in key order.
pub fn members_of<'a, V>(
    map: &'a BTreeMap<MemberKey, V>,
    owner: &'a str,
) -> impl Iterator<Item = (&'a MemberKey, &'a V)> + 'a {
    map.range((Bound::Included(MemberKey::lower_bound(owner)), Bound::Unbounded))
        .take_while(move |(key, _)| key.owner == owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        let mut keys = vec![
            MemberKey::method("a/B", "x", "()V"),
            MemberKey::field("a/B", "y"),
            MemberKey::field("a/B", "x"),
            MemberKey::method("a/A", "z", "()V"),
            MemberKey::method("a/B", "x", "()I"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                MemberKey::method("a/A", "z", "()V"),
                MemberKey::field("a/B", "x"),
                MemberKey::method("a/B", "x", "()I"),
                MemberKey::method("a/B", "x", "()V"),
                MemberKey::field("a/B", "y"),
            ]
        );
    }

    #[test]
    fn test_members_of_is_a_range() {
        let mut map = BTreeMap::new();
        map.insert(MemberKey::field("a/A", "X"), 1);
        map.insert(MemberKey::field("a/B", "X"), 2);
        map.insert(MemberKey::method("a/B", "f", "()V"), 3);
        map.insert(MemberKey::field("a/BB", "X"), 4);
        let values: Vec<_> = members_of(&map, "a/B").map(|(_, v)| *v).collect();
        assert_eq!(values, vec![2, 3]);
    }

    #[test]
    fn test_from_refs() {
        let key = MemberKey::from(&FieldRef::new("a/B", "X", "I"));
        assert!(key.is_field());
        let key = MemberKey::from(&MethodRef::new("a/B", "f", "(I)V"));
        assert_eq!(key.descriptor(), Some("(I)V"));
    }
}

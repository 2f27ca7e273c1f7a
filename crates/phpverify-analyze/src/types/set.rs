//! Union types: deduplicated sets of [`TypeValue`]s

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::predicates;
use super::value::TypeValue;

const IMMUTABLE: u8 = 1 << 0;
const PRECISE: u8 = 1 << 1;

/// A union of type values.
///
/// Cloning is cheap: the values live behind an `Arc` and are copied only when
/// a shared set is appended to. A mutable set appends in place and loses its
/// precision; an immutable set always returns a fresh copy.
#[derive(Clone, Default)]
pub struct TypeSet {
    values: Arc<BTreeSet<TypeValue>>,
    flags: u8,
}

impl TypeSet {
    /// Create a new, empty mutable set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding exactly one value
    pub fn single(value: TypeValue) -> Self {
        let mut values = BTreeSet::new();
        values.insert(value);
        Self {
            values: Arc::new(values),
            flags: 0,
        }
    }

    /// Set holding one concrete type name
    pub fn concrete(name: impl Into<String>) -> Self {
        Self::single(TypeValue::Concrete(name.into()))
    }

    pub fn from_values(values: impl IntoIterator<Item = TypeValue>) -> Self {
        Self {
            values: Arc::new(values.into_iter().collect()),
            flags: 0,
        }
    }

    /// The universal `{mixed}` set
    pub fn mixed() -> Self {
        Self::concrete("mixed").immutable()
    }

    pub fn void() -> Self {
        Self::concrete("void").immutable()
    }

    /// Immutable copy: appending to it never touches `self`
    pub fn immutable(mut self) -> Self {
        self.flags |= IMMUTABLE;
        self
    }

    /// Mark the set as precise (it came from an explicit declaration)
    pub fn precise(mut self) -> Self {
        self.flags |= PRECISE;
        self
    }

    pub fn is_immutable(&self) -> bool {
        self.flags & IMMUTABLE != 0
    }

    pub fn is_precise(&self) -> bool {
        self.flags & PRECISE != 0
    }

    /// Union with `other`.
    ///
    /// On a mutable set the values are added in place. On an immutable set a
    /// new set is returned, precise only when both inputs were.
    pub fn append(&mut self, other: &TypeSet) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            let keep_immutable = self.flags & IMMUTABLE;
            *self = other.clone();
            self.flags = (self.flags & PRECISE) | keep_immutable;
            return;
        }
        if Arc::ptr_eq(&self.values, &other.values) {
            return;
        }

        if self.is_immutable() {
            let mut values: BTreeSet<TypeValue> = (*self.values).clone();
            values.extend(other.values.iter().cloned());
            let precise = self.is_precise() && other.is_precise();
            self.values = Arc::new(values);
            self.flags = IMMUTABLE | if precise { PRECISE } else { 0 };
        } else {
            Arc::make_mut(&mut self.values).extend(other.values.iter().cloned());
            self.flags &= !PRECISE;
        }
    }

    /// Union returning a new set; `self` is left untouched
    pub fn union(&self, other: &TypeSet) -> TypeSet {
        let mut result = self.clone().immutable();
        result.append(other);
        result
    }

    /// Add a single value
    pub fn insert(&mut self, value: TypeValue) {
        self.append(&TypeSet::single(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &TypeValue) -> bool {
        self.values.contains(value)
    }

    /// Exactly the one concrete type `name`
    pub fn is(&self, name: &str) -> bool {
        self.len() == 1 && self.values.iter().all(|v| v.is(name))
    }

    /// Contains the concrete type `name`
    pub fn contains_name(&self, name: &str) -> bool {
        self.values.iter().any(|v| v.is(name))
    }

    /// Every member is a concrete array type
    pub fn is_array(&self) -> bool {
        !self.is_empty()
            && self
                .values
                .iter()
                .all(|v| v.as_concrete().map(predicates::is_array).unwrap_or(false))
    }

    /// Whether any member still needs resolving
    pub fn is_lazy(&self) -> bool {
        self.values.iter().any(TypeValue::is_lazy)
    }

    /// Values in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &TypeValue> {
        self.values.iter()
    }

    /// First value matching `pred`
    pub fn find(&self, pred: impl Fn(&TypeValue) -> bool) -> Option<&TypeValue> {
        self.values.iter().find(|v| pred(v))
    }

    /// Concrete names in canonical order
    pub fn concrete_names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().filter_map(TypeValue::as_concrete)
    }

    /// New set with every value passed through `f`
    pub fn map(&self, f: impl Fn(&TypeValue) -> TypeValue) -> TypeSet {
        TypeSet {
            values: Arc::new(self.values.iter().map(f).collect()),
            flags: self.flags,
        }
    }

    /// New set keeping the values accepted by `pred`
    pub fn filter(&self, pred: impl Fn(&TypeValue) -> bool) -> TypeSet {
        TypeSet {
            values: Arc::new(self.values.iter().filter(|v| pred(v)).cloned().collect()),
            flags: self.flags,
        }
    }

    /// `T[]` for every member
    pub fn array_of(&self) -> TypeSet {
        self.map(|v| TypeValue::array_of(v.clone()))
    }

    /// `elem(T)` for every member
    pub fn elem_of(&self) -> TypeSet {
        self.map(|v| TypeValue::elem_of(v.clone()))
    }

    /// Sorted, `|`-joined rendering of the members
    pub fn canonical(&self) -> String {
        let mut parts: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        parts.sort();
        parts.join("|")
    }
}

impl PartialEq for TypeSet {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for TypeSet {}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl fmt::Debug for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeSet({})", self.canonical())
    }
}

impl FromIterator<TypeValue> for TypeSet {
    fn from_iter<I: IntoIterator<Item = TypeValue>>(iter: I) -> Self {
        TypeSet::from_values(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutable_append_in_place() {
        let mut set = TypeSet::concrete("int").precise();
        set.append(&TypeSet::concrete("string"));
        assert_eq!(set.to_string(), "int|string");
        assert!(!set.is_precise());
    }

    #[test]
    fn test_immutable_append_copies() {
        let base = TypeSet::concrete("int").immutable();
        let mut copy = base.clone();
        copy.append(&TypeSet::concrete("string"));
        assert_eq!(base.to_string(), "int");
        assert_eq!(copy.to_string(), "int|string");
        assert!(copy.is_immutable());
    }

    #[test]
    fn test_clone_does_not_alias() {
        let mut a = TypeSet::concrete("int");
        let b = a.clone();
        a.append(&TypeSet::concrete("float"));
        assert_eq!(b.to_string(), "int");
    }

    #[test]
    fn test_precision_of_union() {
        let a = TypeSet::concrete("int").precise().immutable();
        let b = TypeSet::concrete("string").precise();
        assert!(a.union(&b).is_precise());
        assert!(!a.union(&TypeSet::concrete("float")).is_precise());
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = TypeSet::from_values([TypeValue::concrete("b"), TypeValue::concrete("a")]);
        let b = TypeSet::from_values([TypeValue::concrete("a"), TypeValue::concrete("b")]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "a|b");
    }

    #[test]
    fn test_is_array() {
        let set = TypeSet::from_values([TypeValue::concrete("int[]"), TypeValue::concrete("\\A[]")]);
        assert!(set.is_array());
        assert!(!TypeSet::concrete("int").is_array());
        assert!(!TypeSet::new().is_array());
    }
}

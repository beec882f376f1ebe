// patter-lang - Shared insertion-ordered collections
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The collection type backing `Variant::Collection`.
//!
//! Collections are ordered mappings from `Variant` to `Variant` that
//! preserve insertion order. Unlike every other value type, collections are
//! reference-shared: cloning a collection-valued `Variant` clones the
//! handle, not the contents, so mutation through any copy is visible
//! through all of them. Cross-thread access is serialized by the internal
//! mutex.
//!
//! Because collections are shared references, equality and hashing for
//! collection keys are by identity, not by contents.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::variant::Variant;

/// A shared, insertion-ordered mapping from `Variant` keys to `Variant`
/// values.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    inner: Arc<Mutex<IndexMap<Variant, Variant>>>,
}

impl Collection {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Collection {
            inner: Arc::new(Mutex::new(IndexMap::new())),
        }
    }

    /// Create a collection from key-value pairs, preserving their order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Variant, Variant)>) -> Self {
        Collection {
            inner: Arc::new(Mutex::new(pairs.into_iter().collect())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<Variant, Variant>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite a key-value pair. A new key appends at the end.
    pub fn insert(&self, key: Variant, value: Variant) {
        self.lock().insert(key, value);
    }

    /// Look up a value by key.
    pub fn get(&self, key: &Variant) -> Option<Variant> {
        self.lock().get(key).cloned()
    }

    /// Remove an entry by key, preserving the order of the remainder.
    /// Returns the removed value if the key was present.
    pub fn remove(&self, key: &Variant) -> Option<Variant> {
        self.lock().shift_remove(key)
    }

    /// Whether the key exists.
    pub fn contains_key(&self, key: &Variant) -> bool {
        self.lock().contains_key(key)
    }

    /// Entry at a position in insertion order.
    pub fn get_index(&self, index: usize) -> Option<(Variant, Variant)> {
        self.lock()
            .get_index(index)
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the collection has no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy out all entries in insertion order.
    pub fn snapshot(&self) -> Vec<(Variant, Variant)> {
        self.lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace every value with `Null`, releasing whatever the values held.
    ///
    /// The runtime calls this on shutdown for every collection-valued
    /// property so that reference cycles rooted at properties are broken.
    pub fn clear_values(&self) {
        for value in self.lock().values_mut() {
            *value = Variant::Null;
        }
    }

    /// Whether two handles refer to the same underlying collection.
    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Collection {}

impl Hash for Collection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr_id().hash(state);
    }
}

/// A cursor over a collection, used by `loop … over` execution.
///
/// Iterators index into the shared collection rather than snapshotting it,
/// so entries removed mid-loop shorten the walk. They are never serialized.
#[derive(Debug, Clone)]
pub struct CollectionIter {
    collection: Collection,
    index: usize,
}

impl CollectionIter {
    /// Create an iterator positioned at the first entry.
    pub fn new(collection: Collection) -> Self {
        CollectionIter {
            collection,
            index: 0,
        }
    }

    /// The collection being iterated.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Key of the current entry, if the cursor is in range.
    pub fn key(&self) -> Option<Variant> {
        self.collection.get_index(self.index).map(|(k, _)| k)
    }

    /// Value of the current entry, if the cursor is in range.
    pub fn value(&self) -> Option<Variant> {
        self.collection.get_index(self.index).map(|(_, v)| v)
    }

    /// Advance to the next entry. Returns true while the cursor remains in
    /// range.
    pub fn advance(&mut self) -> bool {
        self.index += 1;
        self.index < self.collection.len()
    }

    /// Whether the cursor has moved past the last entry.
    pub fn at_end(&self) -> bool {
        self.index >= self.collection.len()
    }
}

impl PartialEq for CollectionIter {
    fn eq(&self, other: &Self) -> bool {
        self.collection.ptr_eq(&other.collection) && self.index == other.index
    }
}

impl Eq for CollectionIter {}

impl Hash for CollectionIter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.collection.ptr_id().hash(state);
        self.index.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let coll = Collection::new();
        coll.insert(Variant::Integer(3), Variant::from("c"));
        coll.insert(Variant::Integer(1), Variant::from("a"));
        coll.insert(Variant::Integer(2), Variant::from("b"));

        let keys: Vec<Variant> = coll.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![Variant::Integer(3), Variant::Integer(1), Variant::Integer(2)]
        );
    }

    #[test]
    fn test_reference_sharing() {
        let a = Collection::new();
        let b = a.clone();
        a.insert(Variant::Integer(1), Variant::Integer(100));
        assert_eq!(b.get(&Variant::Integer(1)), Some(Variant::Integer(100)));
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_identity_equality() {
        let a = Collection::new();
        let b = Collection::new();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_remove_preserves_order() {
        let coll = Collection::from_pairs(vec![
            (Variant::Integer(1), Variant::from("a")),
            (Variant::Integer(2), Variant::from("b")),
            (Variant::Integer(3), Variant::from("c")),
        ]);
        coll.remove(&Variant::Integer(2));
        let keys: Vec<Variant> = coll.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Variant::Integer(1), Variant::Integer(3)]);
    }

    #[test]
    fn test_iterator_walks_in_order() {
        let coll = Collection::from_pairs(vec![
            (Variant::Integer(1), Variant::from("a")),
            (Variant::Integer(2), Variant::from("b")),
        ]);
        let mut itr = CollectionIter::new(coll);
        assert_eq!(itr.key(), Some(Variant::Integer(1)));
        assert_eq!(itr.value(), Some(Variant::from("a")));
        assert!(itr.advance());
        assert_eq!(itr.value(), Some(Variant::from("b")));
        assert!(!itr.advance());
        assert!(itr.at_end());
    }

    #[test]
    fn test_clear_values_breaks_cycle() {
        let outer = Collection::new();
        let inner = Collection::new();
        inner.insert(Variant::from("back"), Variant::Collection(outer.clone()));
        outer.insert(Variant::from("fwd"), Variant::Collection(inner.clone()));

        outer.clear_values();
        assert_eq!(outer.get(&Variant::from("fwd")), Some(Variant::Null));
        // The inner collection still points at outer, but outer no longer
        // holds inner, so dropping both handles releases everything.
    }
}

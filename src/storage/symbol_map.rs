use std::collections::{btree_map, BTreeMap, BTreeSet};

use crate::types::Symbol;

/// Ordered set of symbols.
pub type SymbolSet = BTreeSet<Symbol>;

/// Ordered map keyed by symbol.
///
/// Iteration follows `(namespace, identity)` order, which keeps serialized
/// output reproducible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolMap<V> {
    inner: BTreeMap<Symbol, V>,
}

impl<V> Default for SymbolMap<V> {
    fn default() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }
}

impl<V> SymbolMap<V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Inserts without overwriting. Returns false if `key` was present.
    pub fn insert(&mut self, key: Symbol, value: V) -> bool {
        match self.inner.entry(key) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Inserts or overwrites, returning the previous value.
    pub fn set(&mut self, key: Symbol, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: Symbol) -> Option<V> {
        self.inner.remove(&key)
    }

    /// Looks up `key`.
    pub fn get(&self, key: Symbol) -> Option<&V> {
        self.inner.get(&key)
    }

    /// Looks up `key` mutably.
    pub fn get_mut(&mut self, key: Symbol) -> Option<&mut V> {
        self.inner.get_mut(&key)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: Symbol) -> bool {
        self.inner.contains_key(&key)
    }

    /// Returns the value for `key`, inserting `default()` first if absent.
    pub fn get_or_insert_with(&mut self, key: Symbol, default: impl FnOnce() -> V) -> &mut V {
        self.inner.entry(key).or_insert_with(default)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Symbol, &V)> + '_ {
        self.inner.iter().map(|(key, value)| (*key, value))
    }

    /// Mutable entries in key order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Symbol, &mut V)> + '_ {
        self.inner.iter_mut().map(|(key, value)| (*key, value))
    }

    /// Keys in order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = Symbol> + '_ {
        self.inner.keys().copied()
    }

    /// Values in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.inner.values()
    }

    /// Entries whose key lies in `namespace`, in identity order.
    pub fn namespace(&self, namespace: u64) -> impl Iterator<Item = (Symbol, &V)> + '_ {
        let lower = Symbol::new(namespace, 0);
        let upper = Symbol::new(namespace, u64::MAX);
        self.inner
            .range(lower..=upper)
            .map(|(key, value)| (*key, value))
    }
}

impl<V> FromIterator<(Symbol, V)> for SymbolMap<V> {
    fn from_iter<T: IntoIterator<Item = (Symbol, V)>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl<V> IntoIterator for SymbolMap<V> {
    type Item = (Symbol, V);
    type IntoIter = btree_map::IntoIter<Symbol, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

use std::collections::BTreeMap;

use crate::types::{Identity, Symbol, Triple};

use super::commit::{CreaseOperation, DataOperation, Diff, MinimumLength};

/// Namespace identity substitutions applied while replaying a diff.
///
/// Namespaces without an entry map to themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelocationTable {
    map: BTreeMap<Identity, Identity>,
}

impl RelocationTable {
    /// The identity table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps namespace `from` to `to`, returning the previous target.
    pub fn insert(&mut self, from: Identity, to: Identity) -> Option<Identity> {
        self.map.insert(from, to)
    }

    /// Target of `namespace`, if it has an entry.
    pub fn get(&self, namespace: Identity) -> Option<Identity> {
        self.map.get(&namespace).copied()
    }

    /// Returns true if every namespace maps to itself.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries in ascending source order.
    pub fn iter(&self) -> impl Iterator<Item = (Identity, Identity)> + '_ {
        self.map.iter().map(|(&from, &to)| (from, to))
    }

    /// Moves `symbol` into its relocated namespace.
    pub fn relocate(&self, symbol: Symbol) -> Symbol {
        match self.get(symbol.namespace) {
            Some(namespace) => Symbol::new(namespace, symbol.identity),
            None => symbol,
        }
    }

    /// Relocates all three positions of `triple`.
    pub fn relocate_triple(&self, triple: Triple) -> Triple {
        Triple::new(
            self.relocate(triple.entity),
            self.relocate(triple.attribute),
            self.relocate(triple.value),
        )
    }

    /// The table mapping every target back to its source.
    pub fn inverse(&self) -> Self {
        self.map.iter().map(|(&from, &to)| (to, from)).collect()
    }
}

impl FromIterator<(Identity, Identity)> for RelocationTable {
    fn from_iter<I: IntoIterator<Item = (Identity, Identity)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

impl Diff {
    /// Copy of the diff with every symbol relocated and every list re-sorted.
    pub fn relocated(&self, table: &RelocationTable) -> Diff {
        let symbols = |list: &[Symbol]| {
            let mut out: Vec<Symbol> = list.iter().map(|&s| table.relocate(s)).collect();
            out.sort_unstable();
            out
        };
        let triples = |list: &[Triple]| {
            let mut out: Vec<Triple> = list.iter().map(|&t| table.relocate_triple(t)).collect();
            out.sort_unstable();
            out
        };
        let creases = |list: &[CreaseOperation]| {
            let mut out: Vec<CreaseOperation> = list
                .iter()
                .map(|op| CreaseOperation {
                    symbol: table.relocate(op.symbol),
                    ..*op
                })
                .collect();
            out.sort_unstable();
            out
        };
        let data = |list: &[DataOperation]| {
            let mut out: Vec<DataOperation> = list
                .iter()
                .map(|op| DataOperation {
                    symbol: table.relocate(op.symbol),
                    ..*op
                })
                .collect();
            out.sort_unstable();
            out
        };
        let mut minimum_lengths: Vec<MinimumLength> = self
            .minimum_lengths
            .iter()
            .map(|entry| MinimumLength {
                symbol: table.relocate(entry.symbol),
                ..*entry
            })
            .collect();
        minimum_lengths.sort_unstable_by_key(|entry| entry.symbol);
        let mut decreases = creases(&self.decreases);
        decreases.reverse();
        Diff {
            data_source: self.data_source.clone(),
            data_restore: self.data_restore.clone(),
            manifest_symbols: symbols(&self.manifest_symbols),
            release_symbols: symbols(&self.release_symbols),
            link_triples: triples(&self.link_triples),
            unlink_triples: triples(&self.unlink_triples),
            increases: creases(&self.increases),
            decreases,
            replaces: data(&self.replaces),
            restores: data(&self.restores),
            minimum_lengths,
        }
    }
}

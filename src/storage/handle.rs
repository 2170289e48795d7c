use crate::primitives::bits::BitBuffer;
use crate::types::{Symbol, Triple};

use super::symbol_map::{SymbolMap, SymbolSet};

/// One of the six orderings a handle indexes its triples under.
///
/// The first letter is the position the owning handle occupies, the second
/// the first-level key, the third the members of the second-level set.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SubIndex {
    /// Owner is entity; attribute → values.
    Eav,
    /// Owner is attribute; value → entities.
    Ave,
    /// Owner is value; entity → attributes.
    Vea,
    /// Owner is entity; value → attributes.
    Eva,
    /// Owner is attribute; entity → values.
    Aev,
    /// Owner is value; attribute → entities.
    Vae,
}

impl SubIndex {
    /// All six orderings.
    pub const ALL: [SubIndex; 6] = [
        SubIndex::Eav,
        SubIndex::Ave,
        SubIndex::Vea,
        SubIndex::Eva,
        SubIndex::Aev,
        SubIndex::Vae,
    ];

    const fn slot(self) -> usize {
        self as usize
    }

    /// Triple positions `(owner, key, member)` of this ordering.
    pub const fn positions(self) -> [usize; 3] {
        match self {
            SubIndex::Eav => [0, 1, 2],
            SubIndex::Ave => [1, 2, 0],
            SubIndex::Vea => [2, 0, 1],
            SubIndex::Eva => [0, 2, 1],
            SubIndex::Aev => [1, 0, 2],
            SubIndex::Vae => [2, 1, 0],
        }
    }

    /// Places owner, key and member at the positions this ordering assigns them.
    pub fn arrange(self, owner: Symbol, key: Symbol, member: Symbol) -> Triple {
        let [owner_pos, key_pos, member_pos] = self.positions();
        let mut slots = [owner; 3];
        slots[key_pos] = key;
        slots[member_pos] = member;
        debug_assert_eq!(slots[owner_pos], owner);
        Triple::from(slots)
    }

    /// Splits `triple` into the (owner, key, member) of this ordering.
    pub fn split(self, triple: &Triple) -> (Symbol, Symbol, Symbol) {
        let [owner_pos, key_pos, member_pos] = self.positions();
        (
            triple.position(owner_pos),
            triple.position(key_pos),
            triple.position(member_pos),
        )
    }
}

/// Two-level index: first key → set of third-position symbols.
pub type IndexLevel = SymbolMap<SymbolSet>;

/// In-memory record of one manifest symbol.
#[derive(Clone, Debug, Default)]
pub struct Handle {
    pub(crate) data: BitBuffer,
    indices: [IndexLevel; 6],
}

impl Handle {
    /// A handle with no data and no triples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Data length in bits.
    pub fn len(&self) -> u64 {
        self.data.len()
    }

    /// Returns true if the handle holds no data bits.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The handle's bit string.
    pub fn data(&self) -> &BitBuffer {
        &self.data
    }

    /// One of the six sub-indices.
    pub fn index(&self, which: SubIndex) -> &IndexLevel {
        &self.indices[which.slot()]
    }

    /// Returns true if any sub-index has an entry.
    pub fn has_triples(&self) -> bool {
        self.indices.iter().any(|level| !level.is_empty())
    }

    /// A handle may be released once it is empty and unreferenced.
    pub fn is_releasable(&self) -> bool {
        self.is_empty() && !self.has_triples()
    }

    pub(crate) fn link(&mut self, which: SubIndex, key: Symbol, member: Symbol) -> bool {
        self.indices[which.slot()]
            .get_or_insert_with(key, SymbolSet::new)
            .insert(member)
    }

    pub(crate) fn unlink(&mut self, which: SubIndex, key: Symbol, member: Symbol) -> bool {
        let level = &mut self.indices[which.slot()];
        let Some(set) = level.get_mut(key) else {
            return false;
        };
        let removed = set.remove(&member);
        if set.is_empty() {
            level.remove(key);
        }
        removed
    }
}

#![forbid(unsafe_code)]
//! Identifiers and the crate-wide error type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Integer identity of a handle inside a namespace, or of a namespace itself.
pub type Identity = u64;

/// A storage unit address: a handle identity scoped by a namespace identity.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Symbol {
    /// Owning namespace.
    pub namespace: Identity,
    /// Handle identity inside the namespace.
    pub identity: Identity,
}

impl Symbol {
    /// Builds a symbol from its two identities.
    pub const fn new(namespace: Identity, identity: Identity) -> Self {
        Self {
            namespace,
            identity,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.identity)
    }
}

impl FromStr for Symbol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (ns, id) = s
            .split_once(':')
            .ok_or_else(|| Error::Serialization(format!("malformed symbol '{s}'")))?;
        let namespace = ns
            .parse()
            .map_err(|_| Error::Serialization(format!("malformed namespace in '{s}'")))?;
        let identity = id
            .parse()
            .map_err(|_| Error::Serialization(format!("malformed identity in '{s}'")))?;
        Ok(Symbol::new(namespace, identity))
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// An ordered (entity, attribute, value) tuple of symbols.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Triple {
    /// Position 0.
    pub entity: Symbol,
    /// Position 1.
    pub attribute: Symbol,
    /// Position 2.
    pub value: Symbol,
}

impl Triple {
    /// Builds a triple from its three positions.
    pub const fn new(entity: Symbol, attribute: Symbol, value: Symbol) -> Self {
        Self {
            entity,
            attribute,
            value,
        }
    }

    /// Returns the symbol at position `pos` (0 = entity, 1 = attribute, 2 = value).
    pub fn position(&self, pos: usize) -> Symbol {
        match pos {
            0 => self.entity,
            1 => self.attribute,
            _ => self.value,
        }
    }

    /// Returns true if `symbol` occupies any of the three positions.
    pub fn mentions(&self, symbol: Symbol) -> bool {
        self.entity == symbol || self.attribute == symbol || self.value == symbol
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.entity, self.attribute, self.value)
    }
}

impl From<[Symbol; 3]> for Triple {
    fn from(value: [Symbol; 3]) -> Self {
        Triple::new(value[0], value[1], value[2])
    }
}

impl Serialize for Triple {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.entity, self.attribute, self.value].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Triple {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        <[Symbol; 3]>::deserialize(deserializer).map(Triple::from)
    }
}

/// Errors surfaced by the store, the diff engine and the repository.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The symbol is not manifest in the backend.
    #[error("unknown symbol {0}")]
    UnknownSymbol(Symbol),
    /// An offset/length pair reaches beyond the current data length.
    #[error("range {offset}+{length} exceeds length {available} of {symbol}")]
    OutOfRange {
        /// Symbol addressed.
        symbol: Symbol,
        /// Requested start bit.
        offset: u64,
        /// Requested bit count.
        length: u64,
        /// Current data length in bits.
        available: u64,
    },
    /// Two destinations of one simultaneous replace overlap.
    #[error("overlapping destination ranges in {0}")]
    OverlappingDestinations(Symbol),
    /// A diff cannot be applied to the target in its current state.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// A pool slice was read that the diff never wrote.
    #[error("uninitialized slice {offset}+{length} in {pool}")]
    UninitializedSlice {
        /// Name of the pool (`dataSource` or `dataRestore`).
        pool: &'static str,
        /// Start bit.
        offset: u64,
        /// Bit count.
        length: u64,
    },
    /// State that should be impossible was observed.
    #[error("corruption: {0}")]
    Corruption(String),
    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The repository has no version with this identity.
    #[error("version {0} not found")]
    VersionNotFound(Symbol),
    /// No path connects the requested versions.
    #[error("no path to version {0}")]
    NoPath(Symbol),
    /// Applying a diff failed after the target was already mutated.
    #[error("apply interrupted after mutating the target: {0}")]
    PartialApply(Box<Error>),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

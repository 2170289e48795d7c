//! Diff persistence: JSON text and UTF-8 symbols in a store.

use tracing::debug;

use crate::storage::predefined::{get_text, set_text, DIFF, TYPE};
use crate::storage::Backend;
use crate::types::{Error, Identity, Result, Symbol, Triple};

use super::commit::{CreaseOperation, DataOperation, Diff};

/// Serde adapter writing a data pool as nibble-swapped hex.
///
/// Pools are byte granular on the wire; trailing padding bits read back as
/// zeros and are never referenced by an operation.
pub(super) mod pool {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::primitives::bits::{copy::bytes_for, hex, BitBuffer};

    pub fn serialize<S: Serializer>(buffer: &BitBuffer, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = &buffer.as_bytes()[..bytes_for(buffer.len())];
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BitBuffer, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
        Ok(BitBuffer::from_bytes(&bytes, bytes.len() as u64 * 8))
    }
}

fn check_slices(ops: &[DataOperation], available: u64, name: &'static str) -> Result<()> {
    for op in ops {
        let fits = op
            .src_offset
            .checked_add(op.length)
            .is_some_and(|end| end <= available);
        if !fits {
            return Err(Error::Serialization(format!(
                "{name} slice {}+{} exceeds {available} bits",
                op.src_offset, op.length
            )));
        }
    }
    Ok(())
}

/// Restores the replay order of the crease lists and rejects empty,
/// overflowing or overlapping runs.
fn order_creases(diff: &mut Diff) -> Result<()> {
    diff.increases.sort_unstable();
    diff.decreases.sort_unstable();
    let mut runs: Vec<&CreaseOperation> = diff.increases.iter().chain(&diff.decreases).collect();
    runs.sort_unstable();
    for run in &runs {
        if run.length == 0 || run.offset.checked_add(run.length).is_none() {
            return Err(Error::Serialization(format!(
                "crease {}+{} of {} is malformed",
                run.offset, run.length, run.symbol
            )));
        }
    }
    for pair in runs.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.symbol == b.symbol && a.offset + a.length > b.offset {
            return Err(Error::Serialization(format!(
                "creases at {} and {} of {} overlap",
                a.offset, b.offset, a.symbol
            )));
        }
    }
    diff.decreases.reverse();
    Ok(())
}

fn order_minimum_lengths(diff: &mut Diff) -> Result<()> {
    diff.minimum_lengths.sort_unstable_by_key(|entry| entry.symbol);
    match diff
        .minimum_lengths
        .windows(2)
        .find(|pair| pair[0].symbol == pair[1].symbol)
    {
        Some(pair) => Err(Error::Serialization(format!(
            "{} has two minimum lengths",
            pair[0].symbol
        ))),
        None => Ok(()),
    }
}

impl Diff {
    /// Serializes the diff to its JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a diff, rejecting data operations that reach past their pool
    /// and overlapping creases. Crease and length lists are put back into
    /// replay order.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut diff: Diff = serde_json::from_str(text)?;
        check_slices(&diff.replaces, diff.data_source.len(), "dataSource")?;
        check_slices(&diff.restores, diff.data_restore.len(), "dataRestore")?;
        order_creases(&mut diff)?;
        order_minimum_lengths(&mut diff)?;
        Ok(diff)
    }

    /// Stores the diff as a new UTF-8 symbol of `namespace` typed `Diff`.
    pub fn link<B: Backend + ?Sized>(&self, backend: &mut B, namespace: Identity) -> Result<Symbol> {
        let json = self.to_json()?;
        let symbol = backend.create_symbol(namespace)?;
        set_text(backend, symbol, &json)?;
        backend.set_triple(Triple::new(symbol, TYPE, DIFF), true);
        debug!(symbol = %symbol, bytes = json.len(), "diff.link");
        Ok(symbol)
    }

    /// Loads a diff previously stored with [`Diff::link`].
    pub fn load<B: Backend + ?Sized>(backend: &B, symbol: Symbol) -> Result<Self> {
        if !backend.get_triple(Triple::new(symbol, TYPE, DIFF)) {
            return Err(Error::Precondition(format!("{symbol} is not a diff")));
        }
        let json = get_text(backend, symbol)?
            .ok_or_else(|| Error::Serialization(format!("{symbol} does not hold text")))?;
        Self::from_json(&json)
    }

    /// Removes a stored diff together with its triples.
    pub fn unlink<B: Backend + ?Sized>(backend: &mut B, symbol: Symbol) -> Result<bool> {
        backend.unlink_symbol(symbol)
    }
}

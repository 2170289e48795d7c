use std::collections::BTreeSet;

use crate::query::{QueryMask, TripleQuery};
use crate::types::{Error, Identity, Result, Symbol, Triple};

/// One copy of a bit range between (possibly identical) symbols.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DataReplacement {
    /// Symbol written to.
    pub dst: Symbol,
    /// First bit written.
    pub dst_offset: u64,
    /// Symbol read from.
    pub src: Symbol,
    /// First bit read.
    pub src_offset: u64,
    /// Number of bits copied.
    pub length: u64,
}

/// Operations every store-like target offers.
///
/// Implemented by [`super::MemoryBackend`] and by the diff
/// [`crate::diff::Recorder`], which mirrors each call onto the backend it wraps
/// while recording it.
///
/// Range failures are reported as errors and change nothing. Requests that
/// are already satisfied, or whose preconditions do not hold, return `false`
/// and change nothing.
pub trait Backend {
    /// Manifests `symbol`, claiming its identity. False if already manifest.
    fn manifest_symbol(&mut self, symbol: Symbol) -> bool;

    /// Manifests the cheapest free identity of `namespace`.
    fn create_symbol(&mut self, namespace: Identity) -> Result<Symbol>;

    /// Releases `symbol` if it has no data and takes part in no triple.
    fn release_symbol(&mut self, symbol: Symbol) -> bool;

    /// Returns true if `symbol` is manifest.
    fn has_symbol(&self, symbol: Symbol) -> bool;

    /// Manifest symbols of `namespace` in identity order.
    fn namespace_symbols(&self, namespace: Identity) -> Vec<Symbol>;

    /// Data length of `symbol` in bits.
    fn get_length(&self, symbol: Symbol) -> Result<u64>;

    /// Inserts (`length > 0`, zero-filled) or deletes (`length < 0`) bits at `offset`.
    fn crease_length(&mut self, symbol: Symbol, offset: u64, length: i64) -> Result<()>;

    /// Reads `length` bits at `offset`, zero padded to whole bytes.
    fn read_data(&self, symbol: Symbol, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Overwrites `length` bits at `offset` with the leading bits of `data`.
    fn write_data(&mut self, symbol: Symbol, offset: u64, length: u64, data: &[u8]) -> Result<()>;

    /// Performs every copy as if all sources were read before any write.
    ///
    /// Fails as a whole if any range is out of bounds or two destinations
    /// overlap.
    fn replace_data_simultaneously(&mut self, replacements: &[DataReplacement]) -> Result<()>;

    /// Links or unlinks `triple`. False if it is already in the requested state.
    fn set_triple(&mut self, triple: Triple, linked: bool) -> bool;

    /// Streams the triples matching `triple` under `mask`.
    fn query_triples(&self, mask: QueryMask, triple: Triple) -> TripleQuery<'_>;

    /// Copies a single bit range.
    fn replace_data(
        &mut self,
        dst: Symbol,
        dst_offset: u64,
        src: Symbol,
        src_offset: u64,
        length: u64,
    ) -> Result<()> {
        self.replace_data_simultaneously(&[DataReplacement {
            dst,
            dst_offset,
            src,
            src_offset,
            length,
        }])
    }

    /// Returns true if `triple` is linked.
    fn get_triple(&self, triple: Triple) -> bool {
        self.query_triples(QueryMask::MMM, triple).next().is_some()
    }

    /// Every linked triple mentioning `symbol`, in ascending order.
    fn triples_of(&self, symbol: Symbol) -> BTreeSet<Triple> {
        let probe = Triple::new(symbol, symbol, symbol);
        let mut found = BTreeSet::new();
        for mask in [QueryMask::MVV, QueryMask::VMV, QueryMask::VVM] {
            found.extend(self.query_triples(mask, probe));
        }
        found
    }

    /// Unlinks every triple mentioning `symbol`, drops its data and releases it.
    ///
    /// The triples are collected before anything is unlinked.
    fn unlink_symbol(&mut self, symbol: Symbol) -> Result<bool> {
        if !self.has_symbol(symbol) {
            return Ok(false);
        }
        for triple in self.triples_of(symbol) {
            self.set_triple(triple, false);
        }
        let length = self.get_length(symbol)?;
        if length > 0 {
            self.crease_length(symbol, 0, -signed_length(length)?)?;
        }
        Ok(self.release_symbol(symbol))
    }

    /// True only for targets that record rather than store.
    fn is_recording(&self) -> bool {
        false
    }
}

/// Converts a bit count into a crease length.
pub fn signed_length(length: u64) -> Result<i64> {
    i64::try_from(length)
        .map_err(|_| Error::Precondition(format!("length {length} exceeds the crease range")))
}

/// Checks a simultaneous replace batch against the current lengths of `backend`.
pub(crate) fn validate_replacements<B: Backend + ?Sized>(
    backend: &B,
    replacements: &[DataReplacement],
) -> Result<()> {
    for op in replacements {
        check_range(backend, op.src, op.src_offset, op.length)?;
        check_range(backend, op.dst, op.dst_offset, op.length)?;
    }
    let mut spans: Vec<(Symbol, u64, u64)> = replacements
        .iter()
        .filter(|op| op.length > 0)
        .map(|op| (op.dst, op.dst_offset, op.dst_offset + op.length))
        .collect();
    spans.sort_unstable();
    for pair in spans.windows(2) {
        if pair[0].0 == pair[1].0 && pair[0].2 > pair[1].1 {
            return Err(Error::OverlappingDestinations(pair[0].0));
        }
    }
    Ok(())
}

pub(crate) fn check_range<B: Backend + ?Sized>(
    backend: &B,
    symbol: Symbol,
    offset: u64,
    length: u64,
) -> Result<u64> {
    let available = backend.get_length(symbol)?;
    match offset.checked_add(length) {
        Some(end) if end <= available => Ok(available),
        _ => Err(Error::OutOfRange {
            symbol,
            offset,
            length,
            available,
        }),
    }
}

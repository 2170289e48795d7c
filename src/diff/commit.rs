use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::bits::BitBuffer;
use crate::storage::Backend;
use crate::types::{Symbol, Triple};

use super::json::pool;
use super::offsets::{final_position, original_position};
use super::recorder::{Lifecycle, Recorder, SymbolOperations};

/// Bits inserted into or deleted from a symbol at an intermediate offset.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreaseOperation {
    /// Symbol whose data changes length.
    pub symbol: Symbol,
    /// Intermediate offset of the run.
    pub offset: u64,
    /// Number of bits.
    pub length: u64,
}

/// Bits of a symbol taken from one of the diff's data pools.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataOperation {
    /// Symbol written to.
    pub symbol: Symbol,
    /// Intermediate offset written to.
    pub dst_offset: u64,
    /// Offset in the pool.
    pub src_offset: u64,
    /// Number of bits.
    pub length: u64,
}

/// Smallest data length a symbol needs before the diff can be applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MinimumLength {
    /// Symbol constrained.
    pub symbol: Symbol,
    /// Required length when applying forward.
    pub forward: u64,
    /// Required length when applying in reverse.
    pub reverse: u64,
}

/// A committed, read-only change set.
///
/// Increases are sorted ascending and decreases descending by
/// `(symbol, offset)`, so replaying either list in order never moves an
/// offset that is still to be processed. Replace operations read from
/// `dataSource`, restore operations from `dataRestore`; both address the
/// intermediate space.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    #[serde(default, skip_serializing_if = "BitBuffer::is_empty", with = "pool")]
    pub(crate) data_source: BitBuffer,
    #[serde(default, skip_serializing_if = "BitBuffer::is_empty", with = "pool")]
    pub(crate) data_restore: BitBuffer,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) manifest_symbols: Vec<Symbol>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) release_symbols: Vec<Symbol>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "linkTripleOperations")]
    pub(crate) link_triples: Vec<Triple>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "unlinkTripleOperations")]
    pub(crate) unlink_triples: Vec<Triple>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "increaseLengthOperations")]
    pub(crate) increases: Vec<CreaseOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "decreaseLengthOperations")]
    pub(crate) decreases: Vec<CreaseOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "replaceDataOperations")]
    pub(crate) replaces: Vec<DataOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "restoreDataOperations")]
    pub(crate) restores: Vec<DataOperation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) minimum_lengths: Vec<MinimumLength>,
}

impl Diff {
    /// Returns true if applying the diff changes nothing.
    pub fn is_empty(&self) -> bool {
        self.manifest_symbols.is_empty()
            && self.release_symbols.is_empty()
            && self.link_triples.is_empty()
            && self.unlink_triples.is_empty()
            && self.increases.is_empty()
            && self.decreases.is_empty()
            && self.replaces.is_empty()
            && self.restores.is_empty()
    }

    /// Symbols the diff manifests.
    pub fn manifest_symbols(&self) -> &[Symbol] {
        &self.manifest_symbols
    }

    /// Symbols the diff releases.
    pub fn release_symbols(&self) -> &[Symbol] {
        &self.release_symbols
    }

    /// Triples the diff links.
    pub fn link_triples(&self) -> &[Triple] {
        &self.link_triples
    }

    /// Triples the diff unlinks.
    pub fn unlink_triples(&self) -> &[Triple] {
        &self.unlink_triples
    }

    /// Insertions, ascending.
    pub fn increases(&self) -> &[CreaseOperation] {
        &self.increases
    }

    /// Deletions, descending.
    pub fn decreases(&self) -> &[CreaseOperation] {
        &self.decreases
    }

    /// Writes taken from `dataSource`.
    pub fn replaces(&self) -> &[DataOperation] {
        &self.replaces
    }

    /// Writes taken from `dataRestore`.
    pub fn restores(&self) -> &[DataOperation] {
        &self.restores
    }

    /// Length requirements per symbol, ordered by symbol.
    pub fn minimum_lengths(&self) -> &[MinimumLength] {
        &self.minimum_lengths
    }

    /// Length requirement of `symbol`; zero for symbols without data operations.
    pub fn minimum_length(&self, symbol: Symbol, reverse: bool) -> u64 {
        self.minimum_lengths
            .binary_search_by_key(&symbol, |entry| entry.symbol)
            .map_or(0, |idx| {
                let entry = &self.minimum_lengths[idx];
                if reverse {
                    entry.reverse
                } else {
                    entry.forward
                }
            })
    }

    /// Rewrites both pools to hold only the bits their operations reference.
    pub fn compact(&mut self) {
        self.data_source = repack(&self.data_source, &mut self.replaces);
        self.data_restore = repack(&self.data_restore, &mut self.restores);
    }
}

fn repack(pool: &BitBuffer, ops: &mut [DataOperation]) -> BitBuffer {
    let mut packed = BitBuffer::new();
    for op in ops.iter_mut() {
        if let Some(bits) = pool.read(op.src_offset, op.length) {
            op.src_offset = packed.append(&bits, op.length);
        }
    }
    packed
}

fn minimum_length(ops: &SymbolOperations) -> MinimumLength {
    let crease_points = ops.creases.iter().flat_map(|op| [op.offset, op.end()]);
    let slice_points = ops
        .replaces
        .iter()
        .chain(&ops.restores)
        .flat_map(|slice| [slice.dst, slice.dst + slice.len]);
    let (mut forward, mut reverse) = (0, 0);
    for point in crease_points.chain(slice_points) {
        forward = forward.max(original_position(&ops.creases, point));
        reverse = reverse.max(final_position(&ops.creases, point));
    }
    MinimumLength {
        symbol: ops.symbol,
        forward,
        reverse,
    }
}

impl<B: Backend + ?Sized> Recorder<'_, B> {
    /// Freezes the recording into a [`Diff`].
    ///
    /// The wrapped backend keeps every recorded change.
    pub fn commit(self) -> Diff {
        let mut diff = Diff::default();
        for (symbol, &idx) in self.index.iter() {
            let ops = &self.entries[idx];
            match ops.lifecycle {
                Some(Lifecycle::Manifest) => diff.manifest_symbols.push(symbol),
                Some(Lifecycle::Release) => diff.release_symbols.push(symbol),
                None => {}
            }
            for (&attribute, values) in &ops.triples {
                for (&value, &linked) in values {
                    let triple = Triple::new(symbol, attribute, value);
                    if linked {
                        diff.link_triples.push(triple);
                    } else {
                        diff.unlink_triples.push(triple);
                    }
                }
            }
            for op in &ops.creases {
                let record = CreaseOperation {
                    symbol,
                    offset: op.offset,
                    length: op.length,
                };
                if op.inserted {
                    diff.increases.push(record);
                } else {
                    diff.decreases.push(record);
                }
            }
            let records = |slices: &[super::slices::Slice]| {
                slices
                    .iter()
                    .map(|slice| DataOperation {
                        symbol,
                        dst_offset: slice.dst,
                        src_offset: slice.src,
                        length: slice.len,
                    })
                    .collect::<Vec<_>>()
            };
            diff.replaces.extend(records(&ops.replaces));
            diff.restores.extend(records(&ops.restores));
            if !(ops.creases.is_empty() && ops.replaces.is_empty() && ops.restores.is_empty()) {
                diff.minimum_lengths.push(minimum_length(ops));
            }
        }
        diff.decreases.reverse();
        diff.data_source = self.data_source;
        diff.data_restore = self.data_restore;
        if self.options.compact_pools {
            diff.compact();
        }
        debug!(
            manifest = diff.manifest_symbols.len(),
            release = diff.release_symbols.len(),
            link = diff.link_triples.len(),
            unlink = diff.unlink_triples.len(),
            increases = diff.increases.len(),
            decreases = diff.decreases.len(),
            replaces = diff.replaces.len(),
            restores = diff.restores.len(),
            "diff.commit"
        );
        diff
    }
}

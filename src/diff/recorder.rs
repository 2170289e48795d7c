use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::primitives::bits::{copy::bytes_for, BitBuffer};
use crate::query::{QueryMask, TripleQuery};
use crate::storage::{
    check_range, validate_replacements, Backend, DataReplacement, RecorderOptions,
    SymbolMap,
};
use crate::types::{Error, Identity, Result, Symbol, Triple};

use super::offsets::{self, Crease, InsertionPoint, Piece, Pieces};
use super::slices::{self, Segment, Slice};

/// Net lifecycle change of a symbol within one recording.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Lifecycle {
    Manifest,
    Release,
}

/// Everything pending for one symbol.
#[derive(Clone, Debug)]
pub(crate) struct SymbolOperations {
    pub symbol: Symbol,
    pub lifecycle: Option<Lifecycle>,
    /// Triple toggles with this symbol as entity: attribute → value → linked.
    pub triples: BTreeMap<Symbol, BTreeMap<Symbol, bool>>,
    pub creases: Vec<Crease>,
    /// Final content of intermediate ranges, taken from `dataSource`.
    pub replaces: Vec<Slice>,
    /// Original content of intermediate ranges, taken from `dataRestore`.
    pub restores: Vec<Slice>,
}

impl SymbolOperations {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            lifecycle: None,
            triples: BTreeMap::new(),
            creases: Vec::new(),
            replaces: Vec::new(),
            restores: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.lifecycle.is_none()
            && self.triples.is_empty()
            && self.creases.is_empty()
            && self.replaces.is_empty()
            && self.restores.is_empty()
    }
}

/// Original bits about to be destroyed: intermediate offset, length, bits.
type Saved = Vec<(u64, u64, Vec<u8>)>;

/// A backend wrapper recording every mutation into a reversible diff.
///
/// Each call is forwarded to the wrapped backend first; only calls the
/// backend accepts are recorded. [`Recorder::commit`] turns the recording
/// into a [`super::Diff`].
pub struct Recorder<'a, B: Backend + ?Sized> {
    pub(super) backend: &'a mut B,
    pub(super) options: RecorderOptions,
    pub(super) entries: Vec<SymbolOperations>,
    pub(super) index: SymbolMap<usize>,
    pub(super) data_source: BitBuffer,
    pub(super) data_restore: BitBuffer,
}

impl<'a, B: Backend + ?Sized> Recorder<'a, B> {
    /// Starts recording against `backend`.
    pub fn new(backend: &'a mut B) -> Self {
        Self::with_options(backend, RecorderOptions::default())
    }

    /// Starts recording against `backend` with explicit options.
    pub fn with_options(backend: &'a mut B, options: RecorderOptions) -> Self {
        Self {
            backend,
            options,
            entries: Vec::new(),
            index: SymbolMap::new(),
            data_source: BitBuffer::new(),
            data_restore: BitBuffer::new(),
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        self.backend
    }

    /// Number of symbols with pending operations.
    pub fn touched(&self) -> usize {
        self.entries.len()
    }

    fn lookup(&self, symbol: Symbol) -> Option<&SymbolOperations> {
        self.index.get(symbol).map(|&idx| &self.entries[idx])
    }

    fn entry_index(&mut self, symbol: Symbol) -> usize {
        if let Some(&idx) = self.index.get(symbol) {
            return idx;
        }
        self.entries.push(SymbolOperations::new(symbol));
        let idx = self.entries.len() - 1;
        self.index.set(symbol, idx);
        idx
    }

    /// Drops the entry of `symbol` once nothing is pending for it.
    fn settle(&mut self, symbol: Symbol) {
        let Some(&idx) = self.index.get(symbol) else {
            return;
        };
        if !self.entries[idx].is_empty() {
            return;
        }
        self.index.remove(symbol);
        self.entries.swap_remove(idx);
        if let Some(moved) = self.entries.get(idx) {
            self.index.set(moved.symbol, idx);
        }
    }

    fn pieces(&self, symbol: Symbol, offset: u64, length: u64) -> Pieces {
        let creases = self.lookup(symbol).map_or(&[][..], |ops| &ops.creases[..]);
        offsets::pieces(creases, offset, length)
    }

    fn toggle_lifecycle(&mut self, symbol: Symbol, event: Lifecycle) {
        let idx = self.entry_index(symbol);
        let entry = &mut self.entries[idx];
        entry.lifecycle = match entry.lifecycle {
            None => Some(event),
            Some(previous) if previous != event => None,
            kept => kept,
        };
        self.settle(symbol);
    }

    /// Reads the original bits of the kept parts of `pieces` that no restore
    /// slice holds yet.
    fn collect_restores(&self, symbol: Symbol, pieces: &[Piece]) -> Result<Saved> {
        let restores = self.lookup(symbol).map_or(&[][..], |ops| &ops.restores[..]);
        let mut saved = Vec::new();
        for piece in pieces.iter().filter(|piece| !piece.inserted) {
            for (offset, len) in slices::gaps(restores, piece.inter, piece.inter_end()) {
                let fin = piece.fin + (offset - piece.inter);
                let bits = self.backend.read_data(symbol, fin, len)?;
                saved.push((offset, len, bits));
            }
        }
        Ok(saved)
    }

    fn store_restores(&mut self, idx: usize, saved: Saved) {
        let ops = &mut self.entries[idx];
        for (dst, len, bits) in saved {
            let src = self.data_restore.append(&bits, len);
            slices::add(&mut ops.restores, Slice { dst, src, len });
        }
    }

    /// Resolves a final source range to pool runs, chasing pending replace
    /// slices of the source back into `dataSource` and copying the rest.
    fn resolve_source(&mut self, symbol: Symbol, offset: u64, length: u64) -> Result<Vec<(u64, u64)>> {
        let mut runs = Vec::new();
        for piece in self.pieces(symbol, offset, length) {
            let replaces = self.lookup(symbol).map_or(&[][..], |ops| &ops.replaces[..]);
            let segments = slices::segments(replaces, piece.inter, piece.inter_end());
            for segment in segments {
                match segment {
                    Segment::Covered { src, len } => slices::push_run(&mut runs, src, len),
                    Segment::Gap { offset: gap, len } => {
                        let fin = piece.fin + (gap - piece.inter);
                        let bits = self.backend.read_data(symbol, fin, len)?;
                        let src = self.data_source.append(&bits, len);
                        slices::push_run(&mut runs, src, len);
                    }
                }
            }
        }
        Ok(runs)
    }

    /// Points the final range `[offset, offset + length)` of `symbol` at the
    /// given pool runs.
    fn record_replace(&mut self, symbol: Symbol, offset: u64, length: u64, runs: &[(u64, u64)]) {
        let pieces = self.pieces(symbol, offset, length);
        let idx = self.entry_index(symbol);
        let replaces = &mut self.entries[idx].replaces;
        let mut runs = runs.iter().copied();
        let mut current = runs.next();
        for piece in pieces {
            slices::cut(replaces, piece.inter, piece.inter_end());
            let mut placed = 0;
            while placed < piece.len {
                let Some((src, len)) = current else {
                    break;
                };
                let take = len.min(piece.len - placed);
                slices::add(
                    replaces,
                    Slice {
                        dst: piece.inter + placed,
                        src,
                        len: take,
                    },
                );
                placed += take;
                current = (take < len).then_some((src + take, len - take)).or_else(|| runs.next());
            }
        }
    }

    fn record_insert(&mut self, symbol: Symbol, offset: u64, length: u64) {
        let idx = self.entry_index(symbol);
        let ops = &mut self.entries[idx];
        let (at, remaining) = match offsets::insertion_point(&ops.creases, offset) {
            InsertionPoint::Annihilate(pos) => {
                let deleted = ops.creases[pos];
                let revived = deleted.length.min(length);
                let src = self.data_source.append_zeros(revived);
                slices::add(
                    &mut ops.replaces,
                    Slice {
                        dst: deleted.offset,
                        src,
                        len: revived,
                    },
                );
                ops.creases[pos].offset += revived;
                ops.creases[pos].length -= revived;
                trace!(symbol = %symbol, revived, "diff.record.annihilate");
                (deleted.end(), length - revived)
            }
            InsertionPoint::At(at) => (at, length),
        };
        if remaining > 0 {
            slices::split_at(&mut ops.replaces, at);
            slices::split_at(&mut ops.restores, at);
            slices::shift_up(&mut ops.replaces, at, remaining);
            slices::shift_up(&mut ops.restores, at, remaining);
            offsets::insert_bits(&mut ops.creases, at, remaining);
        }
        offsets::normalize(&mut ops.creases);
        self.settle(symbol);
    }

    fn record_delete(&mut self, symbol: Symbol, pieces: &[Piece], saved: Saved) {
        let idx = self.entry_index(symbol);
        self.store_restores(idx, saved);
        let ops = &mut self.entries[idx];
        for piece in pieces.iter().rev() {
            slices::cut(&mut ops.replaces, piece.inter, piece.inter_end());
            if piece.inserted {
                offsets::drop_inserted(&mut ops.creases, piece.inter, piece.len);
                slices::shift_down(&mut ops.replaces, piece.inter_end(), piece.len);
                slices::shift_down(&mut ops.restores, piece.inter_end(), piece.len);
            } else {
                offsets::add_deleted(&mut ops.creases, piece.inter, piece.len);
            }
        }
        offsets::normalize(&mut ops.creases);
        self.settle(symbol);
    }
}

impl<B: Backend + ?Sized> fmt::Debug for Recorder<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("touched", &self.entries.len())
            .field("data_source", &self.data_source.len())
            .field("data_restore", &self.data_restore.len())
            .finish()
    }
}

impl<B: Backend + ?Sized> Backend for Recorder<'_, B> {
    fn manifest_symbol(&mut self, symbol: Symbol) -> bool {
        if !self.backend.manifest_symbol(symbol) {
            return false;
        }
        self.toggle_lifecycle(symbol, Lifecycle::Manifest);
        true
    }

    fn create_symbol(&mut self, namespace: Identity) -> Result<Symbol> {
        let symbol = self.backend.create_symbol(namespace)?;
        self.toggle_lifecycle(symbol, Lifecycle::Manifest);
        Ok(symbol)
    }

    fn release_symbol(&mut self, symbol: Symbol) -> bool {
        if !self.backend.release_symbol(symbol) {
            return false;
        }
        self.toggle_lifecycle(symbol, Lifecycle::Release);
        true
    }

    fn has_symbol(&self, symbol: Symbol) -> bool {
        self.backend.has_symbol(symbol)
    }

    fn namespace_symbols(&self, namespace: Identity) -> Vec<Symbol> {
        self.backend.namespace_symbols(namespace)
    }

    fn get_length(&self, symbol: Symbol) -> Result<u64> {
        self.backend.get_length(symbol)
    }

    fn crease_length(&mut self, symbol: Symbol, offset: u64, length: i64) -> Result<()> {
        let available = self.backend.get_length(symbol)?;
        let magnitude = length.unsigned_abs();
        if length >= 0 {
            if offset > available {
                return Err(Error::OutOfRange {
                    symbol,
                    offset,
                    length: magnitude,
                    available,
                });
            }
            self.backend.crease_length(symbol, offset, length)?;
            if magnitude > 0 {
                self.record_insert(symbol, offset, magnitude);
            }
        } else {
            check_range(&*self.backend, symbol, offset, magnitude)?;
            let pieces = self.pieces(symbol, offset, magnitude);
            let saved = self.collect_restores(symbol, &pieces)?;
            self.backend.crease_length(symbol, offset, length)?;
            self.record_delete(symbol, &pieces, saved);
        }
        trace!(symbol = %symbol, offset, length, "diff.record.crease");
        Ok(())
    }

    fn read_data(&self, symbol: Symbol, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.backend.read_data(symbol, offset, length)
    }

    fn write_data(&mut self, symbol: Symbol, offset: u64, length: u64, data: &[u8]) -> Result<()> {
        check_range(&*self.backend, symbol, offset, length)?;
        if data.len() < bytes_for(length) {
            return Err(Error::Precondition(format!(
                "{} bytes cannot hold {length} bits",
                data.len()
            )));
        }
        let pieces = self.pieces(symbol, offset, length);
        let saved = self.collect_restores(symbol, &pieces)?;
        self.backend.write_data(symbol, offset, length, data)?;
        if length == 0 {
            return Ok(());
        }
        let src = self.data_source.append(data, length);
        let idx = self.entry_index(symbol);
        self.store_restores(idx, saved);
        self.record_replace(symbol, offset, length, &[(src, length)]);
        trace!(symbol = %symbol, offset, length, "diff.record.write");
        Ok(())
    }

    fn replace_data_simultaneously(&mut self, replacements: &[DataReplacement]) -> Result<()> {
        validate_replacements(&*self.backend, replacements)?;
        let mut sources = Vec::with_capacity(replacements.len());
        let mut saves = Vec::with_capacity(replacements.len());
        for op in replacements {
            sources.push(self.resolve_source(op.src, op.src_offset, op.length)?);
            let pieces = self.pieces(op.dst, op.dst_offset, op.length);
            saves.push(self.collect_restores(op.dst, &pieces)?);
        }
        self.backend.replace_data_simultaneously(replacements)?;
        for ((op, runs), saved) in replacements.iter().zip(sources).zip(saves) {
            if op.length == 0 {
                continue;
            }
            let idx = self.entry_index(op.dst);
            self.store_restores(idx, saved);
            self.record_replace(op.dst, op.dst_offset, op.length, &runs);
        }
        trace!(count = replacements.len(), "diff.record.replace");
        Ok(())
    }

    fn set_triple(&mut self, triple: Triple, linked: bool) -> bool {
        if linked {
            for pos in 0..3 {
                self.manifest_symbol(triple.position(pos));
            }
        }
        if !self.backend.set_triple(triple, linked) {
            return false;
        }
        let idx = self.entry_index(triple.entity);
        let toggles = &mut self.entries[idx].triples;
        let values = toggles.entry(triple.attribute).or_default();
        if values.remove(&triple.value).is_none() {
            values.insert(triple.value, linked);
        }
        if values.is_empty() {
            toggles.remove(&triple.attribute);
        }
        self.settle(triple.entity);
        true
    }

    fn query_triples(&self, mask: QueryMask, triple: Triple) -> TripleQuery<'_> {
        self.backend.query_triples(mask, triple)
    }

    fn is_recording(&self) -> bool {
        true
    }
}

//! Crease bookkeeping in the intermediate address space of one symbol.
//!
//! The intermediate space holds the original bits with the diff's inserted
//! bits spliced in and its deleted bits still present. Creases are sorted by
//! offset, never overlap, and adjacent creases of the same kind are merged.
//! Together they split the space into kept, inserted and deleted runs.

use smallvec::SmallVec;

/// A run of inserted or deleted bits at an intermediate offset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Crease {
    pub offset: u64,
    pub length: u64,
    pub inserted: bool,
}

impl Crease {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RunKind {
    Kept,
    Inserted,
    Deleted,
}

/// A maximal stretch of one kind. `fin` is where the run starts in the
/// current (final) space; deleted runs occupy no final bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Run {
    pub inter: u64,
    pub fin: u64,
    pub len: u64,
    pub kind: RunKind,
    pub crease: Option<usize>,
}

impl Run {
    fn final_len(&self) -> u64 {
        match self.kind {
            RunKind::Deleted => 0,
            _ => self.len,
        }
    }
}

/// Walks the creases into runs, ending with an unbounded kept run.
pub(crate) fn runs(creases: &[Crease]) -> Vec<Run> {
    let mut out = Vec::with_capacity(creases.len() * 2 + 1);
    let (mut inter, mut fin) = (0u64, 0u64);
    for (idx, op) in creases.iter().enumerate() {
        if op.offset > inter {
            let len = op.offset - inter;
            out.push(Run {
                inter,
                fin,
                len,
                kind: RunKind::Kept,
                crease: None,
            });
            fin += len;
        }
        let run = Run {
            inter: op.offset,
            fin,
            len: op.length,
            kind: if op.inserted {
                RunKind::Inserted
            } else {
                RunKind::Deleted
            },
            crease: Some(idx),
        };
        fin += run.final_len();
        out.push(run);
        inter = op.end();
    }
    out.push(Run {
        inter,
        fin,
        len: u64::MAX - inter,
        kind: RunKind::Kept,
        crease: None,
    });
    out
}

/// Part of a final range lying in a single kept or inserted run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Piece {
    pub inter: u64,
    pub fin: u64,
    pub len: u64,
    pub inserted: bool,
}

impl Piece {
    pub fn inter_end(&self) -> u64 {
        self.inter + self.len
    }
}

/// Pieces of one final range; most ranges touch only a few runs.
pub(crate) type Pieces = SmallVec<[Piece; 4]>;

/// Maps the final range `[offset, offset + length)` onto intermediate pieces.
pub(crate) fn pieces(creases: &[Crease], offset: u64, length: u64) -> Pieces {
    let mut out = Pieces::new();
    if length == 0 {
        return out;
    }
    let end = offset + length;
    for run in runs(creases) {
        if run.kind == RunKind::Deleted {
            continue;
        }
        let run_end = run.fin + run.len;
        let lo = run.fin.max(offset);
        let hi = run_end.min(end);
        if lo < hi {
            out.push(Piece {
                inter: run.inter + (lo - run.fin),
                fin: lo,
                len: hi - lo,
                inserted: run.kind == RunKind::Inserted,
            });
        }
        if run_end >= end {
            break;
        }
    }
    out
}

/// Where bits inserted at a final offset land.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum InsertionPoint {
    /// A deleted run sits at the offset; index of its crease.
    Annihilate(usize),
    /// Intermediate offset of the insertion.
    At(u64),
}

pub(crate) fn insertion_point(creases: &[Crease], offset: u64) -> InsertionPoint {
    let runs = runs(creases);
    if let Some(idx) = runs
        .iter()
        .find(|run| run.kind == RunKind::Deleted && run.fin == offset)
        .and_then(|run| run.crease)
    {
        return InsertionPoint::Annihilate(idx);
    }
    let inter = runs
        .iter()
        .find(|run| run.kind != RunKind::Deleted && run.fin <= offset && offset - run.fin < run.len)
        .map_or(offset, |run| run.inter + (offset - run.fin));
    InsertionPoint::At(inter)
}

/// Splices `length` inserted bits in at intermediate offset `at`, growing an
/// inserted run that touches `at` if there is one.
pub(crate) fn insert_bits(creases: &mut Vec<Crease>, at: u64, length: u64) {
    let host = creases
        .iter()
        .position(|op| op.inserted && op.offset <= at && at <= op.end());
    for (idx, op) in creases.iter_mut().enumerate() {
        if Some(idx) != host && op.offset >= at {
            op.offset += length;
        }
    }
    match host {
        Some(idx) => creases[idx].length += length,
        None => {
            let pos = creases.partition_point(|op| op.offset < at);
            creases.insert(
                pos,
                Crease {
                    offset: at,
                    length,
                    inserted: true,
                },
            );
        }
    }
}

/// Removes `length` inserted bits at intermediate offset `at` from the space.
pub(crate) fn drop_inserted(creases: &mut [Crease], at: u64, length: u64) {
    let Some(idx) = creases
        .iter()
        .position(|op| op.inserted && op.offset <= at && at + length <= op.end())
    else {
        return;
    };
    creases[idx].length -= length;
    for op in &mut creases[idx + 1..] {
        op.offset -= length;
    }
}

/// Marks the kept bits `[at, at + length)` as deleted.
pub(crate) fn add_deleted(creases: &mut Vec<Crease>, at: u64, length: u64) {
    let pos = creases.partition_point(|op| op.offset < at);
    creases.insert(
        pos,
        Crease {
            offset: at,
            length,
            inserted: false,
        },
    );
}

/// Drops empty creases and merges touching creases of the same kind.
pub(crate) fn normalize(creases: &mut Vec<Crease>) {
    let mut merged: Vec<Crease> = Vec::with_capacity(creases.len());
    for op in creases.drain(..).filter(|op| op.length > 0) {
        match merged.last_mut() {
            Some(last) if last.inserted == op.inserted && last.end() == op.offset => {
                last.length += op.length;
            }
            _ => merged.push(op),
        }
    }
    *creases = merged;
}

fn below(creases: &[Crease], at: u64, inserted: bool) -> u64 {
    creases
        .iter()
        .filter(|op| op.inserted == inserted && op.offset < at)
        .map(|op| (at - op.offset).min(op.length))
        .sum()
}

/// Position in the original space of intermediate offset `at`.
pub(crate) fn original_position(creases: &[Crease], at: u64) -> u64 {
    at - below(creases, at, true)
}

/// Position in the final space of intermediate offset `at`.
pub(crate) fn final_position(creases: &[Crease], at: u64) -> u64 {
    at - below(creases, at, false)
}

//! Sorted, non-overlapping mappings from intermediate ranges of a symbol to
//! ranges of a diff data pool.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Slice {
    /// Intermediate offset in the symbol.
    pub dst: u64,
    /// Offset in the pool.
    pub src: u64,
    pub len: u64,
}

impl Slice {
    fn end(&self) -> u64 {
        self.dst + self.len
    }

    fn joins(&self, next: &Slice) -> bool {
        self.end() == next.dst && self.src + self.len == next.src
    }
}

/// Splits the slice straddling `at`, if any, so that no slice crosses it.
pub(crate) fn split_at(slices: &mut Vec<Slice>, at: u64) {
    let Some(idx) = slices
        .iter()
        .position(|slice| slice.dst < at && at < slice.end())
    else {
        return;
    };
    let slice = slices[idx];
    let head = at - slice.dst;
    slices[idx].len = head;
    slices.insert(
        idx + 1,
        Slice {
            dst: at,
            src: slice.src + head,
            len: slice.len - head,
        },
    );
}

/// Removes all coverage of `[start, end)`.
pub(crate) fn cut(slices: &mut Vec<Slice>, start: u64, end: u64) {
    if start >= end {
        return;
    }
    split_at(slices, start);
    split_at(slices, end);
    slices.retain(|slice| slice.end() <= start || slice.dst >= end);
}

pub(crate) fn shift_up(slices: &mut [Slice], from: u64, by: u64) {
    for slice in slices.iter_mut().filter(|slice| slice.dst >= from) {
        slice.dst += by;
    }
}

pub(crate) fn shift_down(slices: &mut [Slice], from: u64, by: u64) {
    for slice in slices.iter_mut().filter(|slice| slice.dst >= from) {
        slice.dst -= by;
    }
}

/// Inserts a slice over an uncovered range, merging with contiguous neighbours.
pub(crate) fn add(slices: &mut Vec<Slice>, slice: Slice) {
    if slice.len == 0 {
        return;
    }
    let at = slices.partition_point(|other| other.dst < slice.dst);
    slices.insert(at, slice);
    if at + 1 < slices.len() && slices[at].joins(&slices[at + 1]) {
        slices[at].len += slices[at + 1].len;
        slices.remove(at + 1);
    }
    if at > 0 && slices[at - 1].joins(&slices[at]) {
        slices[at - 1].len += slices[at].len;
        slices.remove(at);
    }
}

/// Coverage of one stretch of an intermediate range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    /// Covered by a slice starting at pool offset `src`.
    Covered { src: u64, len: u64 },
    /// Not covered; `offset` is intermediate.
    Gap { offset: u64, len: u64 },
}

/// Splits `[start, end)` into covered and uncovered stretches, in order.
pub(crate) fn segments(slices: &[Slice], start: u64, end: u64) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut cursor = start;
    let first = slices.partition_point(|slice| slice.end() <= start);
    for slice in &slices[first..] {
        if slice.dst >= end {
            break;
        }
        if slice.dst > cursor {
            out.push(Segment::Gap {
                offset: cursor,
                len: slice.dst - cursor,
            });
            cursor = slice.dst;
        }
        let stop = slice.end().min(end);
        out.push(Segment::Covered {
            src: slice.src + (cursor - slice.dst),
            len: stop - cursor,
        });
        cursor = stop;
    }
    if cursor < end {
        out.push(Segment::Gap {
            offset: cursor,
            len: end - cursor,
        });
    }
    out
}

/// Uncovered stretches of `[start, end)` as `(offset, len)`.
pub(crate) fn gaps(slices: &[Slice], start: u64, end: u64) -> Vec<(u64, u64)> {
    segments(slices, start, end)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Gap { offset, len } => Some((offset, len)),
            Segment::Covered { .. } => None,
        })
        .collect()
}

/// Appends a pool range to `runs`, extending the last one when contiguous.
pub(crate) fn push_run(runs: &mut Vec<(u64, u64)>, src: u64, len: u64) {
    if len == 0 {
        return;
    }
    match runs.last_mut() {
        Some((last_src, last_len)) if *last_src + *last_len == src => *last_len += len,
        _ => runs.push((src, len)),
    }
}

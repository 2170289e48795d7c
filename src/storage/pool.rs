use crate::types::Identity;

/// A run of free identities. `count == None` is the open range reaching to
/// the top of the identity space.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IdentityRange {
    /// First free identity of the run.
    pub start: Identity,
    /// Number of free identities, or `None` for the unbounded top range.
    pub count: Option<u64>,
}

impl IdentityRange {
    fn bounded(start: Identity, count: u64) -> Self {
        Self {
            start,
            count: Some(count),
        }
    }

    /// Exclusive end, `None` for a range reaching the top of the space.
    pub fn end(&self) -> Option<Identity> {
        self.count.and_then(|count| self.start.checked_add(count))
    }

    /// Returns true if `id` lies in this run.
    pub fn contains(&self, id: Identity) -> bool {
        id >= self.start && self.count.map_or(true, |count| id - self.start < count)
    }

    fn coalesce_with(&mut self, other: &IdentityRange) -> bool {
        if self.end() != Some(other.start) {
            return false;
        }
        self.count = match (self.count, other.count) {
            (Some(a), Some(b)) => a.checked_add(b),
            _ => None,
        };
        true
    }
}

/// Sorted run-length set of the free identities of one namespace.
///
/// Runs are disjoint and never adjacent; the highest run is unbounded unless
/// the top identity was claimed explicitly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdentityPool {
    ranges: Vec<IdentityRange>,
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self {
            ranges: vec![IdentityRange {
                start: 0,
                count: None,
            }],
        }
    }
}

impl IdentityPool {
    /// A pool in which every identity is free.
    pub fn new() -> Self {
        Self::default()
    }

    /// The free runs in ascending order.
    pub fn ranges(&self) -> &[IdentityRange] {
        &self.ranges
    }

    /// The cheapest free identity.
    pub fn get(&self) -> Option<Identity> {
        self.ranges.first().map(|range| range.start)
    }

    /// Returns true if `id` is free.
    pub fn contains(&self, id: Identity) -> bool {
        self.bisect(id)
            .is_some_and(|idx| self.ranges[idx].contains(id))
    }

    /// Claims `id`. Returns false if it was not free.
    pub fn remove(&mut self, id: Identity) -> bool {
        let Some(idx) = self.bisect(id) else {
            return false;
        };
        let range = self.ranges[idx];
        if !range.contains(id) {
            return false;
        }
        if id == range.start {
            match (range.count, id.checked_add(1)) {
                (Some(1), _) | (_, None) => {
                    self.ranges.remove(idx);
                }
                (Some(count), Some(next)) => {
                    self.ranges[idx] = IdentityRange::bounded(next, count - 1);
                }
                (None, Some(next)) => self.ranges[idx].start = next,
            }
            return true;
        }
        let head = IdentityRange::bounded(range.start, id - range.start);
        self.ranges[idx] = head;
        let tail_count = range.count.map(|count| count - (id - range.start) - 1);
        if tail_count != Some(0) {
            if let Some(next) = id.checked_add(1) {
                self.ranges.insert(
                    idx + 1,
                    IdentityRange {
                        start: next,
                        count: tail_count,
                    },
                );
            }
        }
        true
    }

    /// Returns `id` to the pool. Returns false if it was already free.
    pub fn insert(&mut self, id: Identity) -> bool {
        let prev = self.bisect(id);
        if let Some(idx) = prev {
            if self.ranges[idx].contains(id) {
                return false;
            }
        }
        let next = prev.map_or(0, |idx| idx + 1);
        let mut single = IdentityRange {
            start: id,
            count: (id != Identity::MAX).then_some(1),
        };
        let joins_next = next < self.ranges.len() && single.coalesce_with(&self.ranges[next]);
        if joins_next {
            self.ranges.remove(next);
        }
        match prev {
            Some(idx) if self.ranges[idx].coalesce_with(&single) => {}
            _ => self.ranges.insert(next, single),
        }
        true
    }

    /// Index of the last run starting at or below `id`.
    fn bisect(&self, id: Identity) -> Option<usize> {
        self.ranges
            .partition_point(|range| range.start <= id)
            .checked_sub(1)
    }
}

use std::fmt;

use crate::types::Triple;

/// Lazy, finite stream of query matches.
///
/// Once the stream is exhausted [`TripleQuery::matched`] reports how many
/// triples it produced.
pub struct TripleQuery<'a> {
    inner: Box<dyn Iterator<Item = Triple> + 'a>,
    yielded: usize,
    exhausted: bool,
}

impl<'a> TripleQuery<'a> {
    /// Wraps an iterator of matches.
    pub fn new(inner: impl Iterator<Item = Triple> + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            yielded: 0,
            exhausted: false,
        }
    }

    /// A query with no matches.
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Total number of matches, available once the stream is exhausted.
    pub fn matched(&self) -> Option<usize> {
        self.exhausted.then_some(self.yielded)
    }

    /// Drains the remaining matches and returns the total count.
    pub fn finish(mut self) -> usize {
        while self.next().is_some() {}
        self.yielded
    }
}

impl Iterator for TripleQuery<'_> {
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        if self.exhausted {
            return None;
        }
        match self.inner.next() {
            Some(triple) => {
                self.yielded += 1;
                Some(triple)
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl fmt::Debug for TripleQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripleQuery")
            .field("yielded", &self.yielded)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callbacks tracking store activity.
///
/// [`super::MemoryBackend`] reports every successful mutation and every query
/// it serves. Implementations must be cheap; they run inline with the store.
pub trait StoreMetrics: Send + Sync {
    /// A symbol became manifest.
    fn symbol_manifested(&self);

    /// A symbol was released.
    fn symbol_released(&self);

    /// A triple was linked.
    fn triple_linked(&self);

    /// A triple was unlinked.
    fn triple_unlinked(&self);

    /// A crease changed the length of a symbol.
    ///
    /// # Parameters
    /// * `bits` - Signed number of bits inserted (positive) or deleted (negative).
    fn crease(&self, bits: i64);

    /// A query was started.
    ///
    /// # Parameters
    /// * `mask` - Numeric code of the query mask.
    fn query(&self, mask: u8);
}

/// A no-op implementation of [`StoreMetrics`].
#[derive(Default)]
pub struct NoopMetrics;

impl StoreMetrics for NoopMetrics {
    fn symbol_manifested(&self) {}
    fn symbol_released(&self) {}
    fn triple_linked(&self) {}
    fn triple_unlinked(&self) {}
    fn crease(&self, _bits: i64) {}
    fn query(&self, _mask: u8) {}
}

/// A thread-safe counter-based implementation of [`StoreMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of symbols manifested.
    pub symbols_manifested: AtomicU64,

    /// Number of symbols released.
    pub symbols_released: AtomicU64,

    /// Number of triples linked.
    pub triples_linked: AtomicU64,

    /// Number of triples unlinked.
    pub triples_unlinked: AtomicU64,

    /// Total bits inserted by creases.
    pub bits_inserted: AtomicU64,

    /// Total bits deleted by creases.
    pub bits_deleted: AtomicU64,

    /// Queries with at least one varying position.
    pub scans: AtomicU64,

    /// Queries with no varying position.
    pub probes: AtomicU64,
}

impl StoreMetrics for CounterMetrics {
    fn symbol_manifested(&self) {
        self.symbols_manifested.fetch_add(1, Ordering::Relaxed);
    }

    fn symbol_released(&self) {
        self.symbols_released.fetch_add(1, Ordering::Relaxed);
    }

    fn triple_linked(&self) {
        self.triples_linked.fetch_add(1, Ordering::Relaxed);
    }

    fn triple_unlinked(&self) {
        self.triples_unlinked.fetch_add(1, Ordering::Relaxed);
    }

    fn crease(&self, bits: i64) {
        if bits >= 0 {
            self.bits_inserted
                .fetch_add(bits.unsigned_abs(), Ordering::Relaxed);
        } else {
            self.bits_deleted
                .fetch_add(bits.unsigned_abs(), Ordering::Relaxed);
        }
    }

    fn query(&self, mask: u8) {
        let mut code = mask;
        let mut varies = false;
        for _ in 0..3 {
            varies |= code % 3 == 1;
            code /= 3;
        }
        if varies {
            self.scans.fetch_add(1, Ordering::Relaxed);
        } else {
            self.probes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`], which has zero overhead
/// as it discards all recorded metrics.
pub fn default_metrics() -> Arc<dyn StoreMetrics> {
    Arc::new(NoopMetrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_splits_creases_and_queries() {
        let metrics = CounterMetrics::default();
        metrics.crease(12);
        metrics.crease(-5);
        metrics.query(0);
        metrics.query(13);
        metrics.query(26);
        assert_eq!(metrics.bits_inserted.load(Ordering::Relaxed), 12);
        assert_eq!(metrics.bits_deleted.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.scans.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.probes.load(Ordering::Relaxed), 2);
    }
}

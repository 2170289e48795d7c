use std::fmt;
use std::sync::Arc;

use super::metrics::StoreMetrics;

/// Configuration options supplied when creating a [`super::MemoryBackend`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn StoreMetrics>>,
    /// Whether to manifest the meta namespace and the predefined symbols
    pub seed_predefined: bool,
}

impl StoreOptions {
    /// Creates StoreOptions with default settings.
    pub fn new() -> Self {
        Self {
            metrics: None,
            seed_predefined: true,
        }
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn StoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables or disables seeding of the predefined symbols.
    pub fn seed_predefined(mut self, enabled: bool) -> Self {
        self.seed_predefined = enabled;
        self
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("metrics", &self.metrics.is_some())
            .field("seed_predefined", &self.seed_predefined)
            .finish()
    }
}

/// Configuration for a diff recorder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecorderOptions {
    /// Whether commit rewrites the data pools to hold only referenced bits.
    pub compact_pools: bool,
}

impl RecorderOptions {
    /// Creates RecorderOptions with default settings.
    pub fn new() -> Self {
        Self {
            compact_pools: true,
        }
    }

    /// Enables or disables pool compaction at commit.
    pub fn compact_pools(mut self, enabled: bool) -> Self {
        self.compact_pools = enabled;
        self
    }
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self::new()
    }
}

#![forbid(unsafe_code)]

//! Symbol storage: identity pools, handles with their six triple
//! sub-indices, and the in-memory backend.
//!
//! Every store-like target implements [`Backend`], the contract the diff
//! recorder mirrors and replays against.

mod backend;
mod handle;
pub mod json;
mod memory;
mod metrics;
mod options;
mod pool;
pub mod predefined;
mod symbol_map;

pub use backend::{signed_length, Backend, DataReplacement};
pub(crate) use backend::{check_range, validate_replacements};
pub use handle::{Handle, IndexLevel, SubIndex};
pub use memory::MemoryBackend;
pub use metrics::{default_metrics, CounterMetrics, NoopMetrics, StoreMetrics};
pub use options::{RecorderOptions, StoreOptions};
pub use pool::{IdentityPool, IdentityRange};
pub use symbol_map::{SymbolMap, SymbolSet};

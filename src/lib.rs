//! Symatem: a triple store whose symbols own bit-granular data, with
//! reversible diffs and a version DAG on top.
//!
//! * [`storage`] holds the [`storage::Backend`] trait and the in-memory
//!   [`storage::MemoryBackend`].
//! * [`query`] streams triples matching one of the 27 query masks.
//! * [`diff`] records mutations into a [`diff::Diff`] that replays forward
//!   or in reverse.
//! * [`repository`] moves checkouts between versions connected by diffs.

#![warn(missing_docs)]

pub mod diff;
pub mod logging;
pub mod primitives;
pub mod query;
pub mod repository;
pub mod storage;
pub mod types;

pub use diff::{Diff, Recorder, RelocationTable};
pub use query::{QueryMask, TripleQuery};
pub use repository::Repository;
pub use storage::{Backend, MemoryBackend};
pub use types::{Error, Identity, Result, Symbol, Triple};

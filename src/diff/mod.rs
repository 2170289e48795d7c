#![forbid(unsafe_code)]
//! Reversible change sets.
//!
//! A [`Recorder`] wraps any [`crate::storage::Backend`], forwards every
//! mutation to it and keeps a compact description of the net effect. Its
//! [`Recorder::commit`] produces a [`Diff`], which can be replayed forward or
//! in reverse against any backend, optionally with its namespaces moved by a
//! [`RelocationTable`], and persisted as JSON or as a store symbol.
//!
//! Offsets inside a diff address the intermediate space of each symbol: the
//! original bits with inserted bits spliced in and deleted bits still in
//! place.

mod apply;
mod commit;
mod json;
mod offsets;
mod recorder;
mod relocation;
mod slices;

pub use commit::{CreaseOperation, DataOperation, Diff, MinimumLength};
pub use recorder::Recorder;
pub use relocation::RelocationTable;

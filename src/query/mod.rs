#![forbid(unsafe_code)]

//! Masked triple queries.
//!
//! A query pairs a [`QueryMask`] with a triple. Matched positions filter,
//! varying positions enumerate and ignored positions pass through unchanged,
//! so results are distinct over the non-ignored positions.

mod cursor;
pub(crate) mod dispatch;
mod mask;

pub use cursor::TripleQuery;
pub use mask::{Binding, QueryMask};

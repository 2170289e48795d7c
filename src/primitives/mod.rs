//! Low-level primitives shared by the store and the diff engine.

/// Bit-level utilities.
///
/// Unaligned bit copies, the padded [`bits::BitBuffer`] and hex text encoding.
pub mod bits;

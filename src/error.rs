//! Crate-wide error types.
//!
//! Most of the conditions spec.md calls "precondition violations" (a
//! malformed block-cut input, a `root` outside the graph) stay panics —
//! they're programmer errors, not conditions a caller can recover from at
//! runtime, and wrapping them in `Result` would just move the `.unwrap()`
//! to the caller. [`RegionError`] is the one place this crate surfaces a
//! recoverable error, because a `Region`'s `scale` comes from arithmetic a
//! caller controls (zoom level math) and can plausibly produce NaN.

use thiserror::Error;

/// Failure constructing a [`crate::region::Region`].
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum RegionError {
    /// `scale` was NaN or infinite; it can never be a valid cache key.
    #[error("region scale must be finite, got {0}")]
    NonFiniteScale(f64),
    /// `width` or `height` was zero; a region must cover at least one pixel.
    #[error("region extent must be non-empty, got {width}x{height}")]
    EmptyExtent {
        /// The offending width.
        width: u32,
        /// The offending height.
        height: u32,
    },
}

//! Byte-range planning.
//!
//! Splits a download of known length into N contiguous inclusive ranges and
//! renders the HTTP `Range` header for each.

mod range;

pub use range::{plan_ranges, ByteRange};

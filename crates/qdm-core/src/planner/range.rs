//! ByteRange type and fan-out planning.

use serde::Serialize;
use std::fmt;

/// A single planned chunk: byte range `[start, end]` (inclusive, 0-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "inverted range {start}-{end}");
        Self { start, end }
    }

    /// Number of bytes covered by this range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// HTTP Range header value: `bytes=start-end`.
    pub fn range_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Range value as libcurl expects it (no `bytes=` prefix).
    pub(crate) fn curl_range(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Builds the range plan for `content_length` bytes split `fanout` ways.
///
/// Ranges are sized from the highest index down: each takes
/// `floor(remaining / ranges_left)` and the last one computed absorbs whatever
/// is left, so rounding never drops or duplicates a byte. The returned ranges
/// are in ascending byte order.
///
/// Returns an empty vec when the length is unknown or zero. A fanout of 0 is
/// treated as 1, and a fanout larger than the length is capped so that no
/// range is empty.
pub fn plan_ranges(content_length: i64, fanout: usize) -> Vec<ByteRange> {
    if content_length <= 0 {
        return Vec::new();
    }
    let total = content_length as u64;
    let count = (fanout.max(1) as u64).min(total);

    let mut out = Vec::with_capacity(count as usize);
    let mut remaining = total;
    let mut offset = 0u64;

    for ranges_left in (1..=count).rev() {
        let len = if ranges_left == 1 {
            remaining
        } else {
            remaining / ranges_left
        };
        out.push(ByteRange::new(offset, offset + len - 1));
        offset += len;
        remaining -= len;
    }

    out
}

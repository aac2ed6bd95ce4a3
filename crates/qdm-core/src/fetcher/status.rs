//! Status code policy for chunk responses.

use crate::error::ChunkFetchError;
use crate::planner::ByteRange;

/// 206 is the only acceptable answer to a ranged request. A full-body fetch
/// accepts any 2xx.
pub(super) fn check_status(code: u32, range: Option<ByteRange>) -> Result<(), ChunkFetchError> {
    match (range, code) {
        (Some(_), 206) => Ok(()),
        (Some(_), 200) => Err(ChunkFetchError::RangeIgnored),
        (Some(_), 416) => Err(ChunkFetchError::RangeNotSatisfiable),
        (None, 200..=299) => Ok(()),
        (_, other) => Err(ChunkFetchError::Http(other)),
    }
}

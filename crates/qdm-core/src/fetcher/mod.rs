//! Single chunk fetch: one GET (ranged or not) streamed into one staged file.

mod status;

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::str;
use tokio_util::sync::CancellationToken;

use crate::error::ChunkFetchError;
use crate::http;
use crate::staging::StagedFile;

use status::check_status;

/// Hooks a fetch calls as the transfer advances. Both default to no-ops.
pub trait FetchObserver {
    /// The final response's headers are in and its status is acceptable.
    /// Called at most once, before any body byte is written.
    fn accepted(&mut self, _status: u32) {}

    /// `bytes` more body bytes were written to the staged file.
    fn received(&mut self, _bytes: u64) {}
}

impl FetchObserver for () {}

/// Result of a successful chunk fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    pub status: u32,
    pub bytes: u64,
}

/// Fetches `staged.range` of `url` (the whole body when the range is `None`)
/// and streams it into the staged file.
///
/// A ranged request must be answered with 206; a 200 means the server ignored
/// the range and is reported as [`ChunkFetchError::RangeIgnored`] without
/// writing any of the body. The cancellation token is polled from libcurl's
/// progress callback and before every write, so a cancelled fetch stops
/// promptly with [`ChunkFetchError::Cancelled`].
///
/// Runs in the current thread.
pub fn fetch_chunk(
    url: &str,
    staged: &StagedFile,
    cancel: &CancellationToken,
    observer: &mut dyn FetchObserver,
) -> Result<FetchOutcome, ChunkFetchError> {
    if cancel.is_cancelled() {
        return Err(ChunkFetchError::Cancelled);
    }
    let range = staged.range;
    let mut file = staged.open_for_write().map_err(ChunkFetchError::Storage)?;

    let mut easy = http::get_handle(url)?;
    if let Some(r) = range {
        easy.range(&r.curl_range())?;
    }

    let status: Cell<Option<u32>> = Cell::new(None);
    let accepted = Cell::new(false);
    let observer = RefCell::new(observer);
    let mut rejected: Option<ChunkFetchError> = None;
    let mut storage_error: Option<io::Error> = None;
    let mut received = 0u64;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = str::from_utf8(data) {
                let line = line.trim_end();
                if let Some(code) = http::parse_status_line(line) {
                    status.set(Some(code));
                } else if line.is_empty() {
                    // End of a header block; redirects and 1xx are followed by another one.
                    if let Some(code) = status.get() {
                        let interim = (100..200).contains(&code) || (300..400).contains(&code);
                        if !interim && !accepted.get() && check_status(code, range).is_ok() {
                            accepted.set(true);
                            observer.borrow_mut().accepted(code);
                        }
                    }
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            if cancel.is_cancelled() {
                return Ok(0);
            }
            if let Some(code) = status.get() {
                if let Err(e) = check_status(code, range) {
                    rejected = Some(e);
                    return Ok(0);
                }
            }
            match file.write_all(data) {
                Ok(()) => {
                    received += data.len() as u64;
                    observer.borrow_mut().received(data.len() as u64);
                    Ok(data.len())
                }
                Err(e) => {
                    storage_error = Some(e);
                    Ok(0)
                }
            }
        })?;
        transfer.progress_function(|_, _, _, _| http::keep_going(cancel))?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if e.is_aborted_by_callback() || cancel.is_cancelled() {
            return Err(ChunkFetchError::Cancelled);
        }
        if e.is_write_error() {
            if let Some(err) = rejected {
                return Err(err);
            }
            if let Some(io_err) = storage_error {
                return Err(ChunkFetchError::Storage(io_err));
            }
        }
        return Err(ChunkFetchError::Transport(e));
    }

    let code = match status.get() {
        Some(code) => code,
        None => easy.response_code()?,
    };
    check_status(code, range)?;
    file.flush().map_err(ChunkFetchError::Storage)?;

    if let Some(r) = range {
        if received != r.len() {
            return Err(ChunkFetchError::PartialTransfer {
                expected: r.len(),
                received,
            });
        }
    }

    Ok(FetchOutcome {
        status: code,
        bytes: received,
    })
}

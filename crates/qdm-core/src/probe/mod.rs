//! Capability probing.
//!
//! Issues a plain GET (no Range header) against the target URL and reads only
//! the response headers: `Content-Length`, `Accept-Ranges` and
//! `Content-Disposition`. The transfer is stopped as soon as the first body
//! byte arrives, so probing a large file does not download it.

mod flag;
mod parse;

pub use flag::FeatureFlag;

use serde::Serialize;
use std::str;
use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;
use crate::http;

/// What the probe learned about the remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// Final HTTP status after redirects.
    pub status: u32,
    /// Total size in bytes, or -1 if unknown.
    pub content_length: i64,
    pub range_support: FeatureFlag,
    pub pause_support: FeatureFlag,
    /// `Content-Disposition` value if present (file name hint).
    pub content_disposition: Option<String>,
}

/// Probes `url` and derives content length and range/pause support.
///
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
pub fn probe(url: &str, cancel: &CancellationToken) -> Result<ProbeResult, ProbeError> {
    if cancel.is_cancelled() {
        return Err(ProbeError::Cancelled);
    }

    let mut lines: Vec<String> = Vec::new();
    let mut easy = http::get_handle(url)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                lines.push(s.trim_end().to_string());
            }
            true
        })?;
        // Headers are complete once body data shows up; refuse it to end the transfer.
        transfer.write_function(|_| Ok(0))?;
        transfer.progress_function(|_, _, _, _| http::keep_going(cancel))?;
        transfer.perform()
    };

    match performed {
        Ok(()) => {}
        Err(e) if e.is_write_error() => {}
        Err(e) if e.is_aborted_by_callback() => return Err(ProbeError::Cancelled),
        Err(e) => return Err(ProbeError::Transport(e)),
    }

    let headers = parse::parse_headers(&lines);
    let status = match headers.status {
        Some(s) => s,
        None => easy.response_code()?,
    };
    if !(200..300).contains(&status) {
        return Err(ProbeError::Http { status });
    }

    let (range_support, pause_support) =
        parse::capabilities(headers.content_length, headers.accept_ranges.as_deref());

    tracing::debug!(
        url,
        status,
        content_length = headers.content_length,
        %range_support,
        "probe complete"
    );

    Ok(ProbeResult {
        status,
        content_length: headers.content_length,
        range_support,
        pause_support,
        content_disposition: headers.content_disposition,
    })
}

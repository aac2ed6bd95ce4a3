//! Shared libcurl handle setup for the probe and chunk fetches.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

const USER_AGENT: &str = concat!("qdm/", env!("CARGO_PKG_VERSION"));

/// Creates an `Easy` handle for a GET of `url` with the engine's defaults:
/// redirects followed, connect timeout, low-speed abort, and the progress
/// callback enabled so cancellation can be polled during the transfer.
pub(crate) fn get_handle(url: &str) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.useragent(USER_AGENT)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    // Stall detection: below 1 KiB/s for 60s aborts the transfer.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.progress(true)?;
    Ok(easy)
}

/// Progress callback body: returning false makes libcurl abort the transfer.
pub(crate) fn keep_going(cancel: &CancellationToken) -> bool {
    !cancel.is_cancelled()
}

/// Extracts the status code from a status line such as `HTTP/1.1 206 Partial Content`.
pub(crate) fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

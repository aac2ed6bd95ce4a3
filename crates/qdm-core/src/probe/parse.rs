//! Parse probe response header lines and derive capability flags.

use super::FeatureFlag;
use crate::http::parse_status_line;

/// Headers of the final response that the probe cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProbeHeaders {
    pub status: Option<u32>,
    /// `Content-Length`, or -1 when absent or unparsable.
    pub content_length: i64,
    /// Raw `Accept-Ranges` value if the header was present.
    pub accept_ranges: Option<String>,
    pub content_disposition: Option<String>,
}

/// Parse collected header lines. A new status line (redirect hop) discards
/// everything gathered for the previous response.
pub(crate) fn parse_headers(lines: &[String]) -> ProbeHeaders {
    let mut out = empty();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(status) = parse_status_line(line) {
            out = empty();
            out.status = Some(status);
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                out.content_length = value.parse::<i64>().unwrap_or(-1);
            } else if name.eq_ignore_ascii_case("accept-ranges") {
                out.accept_ranges = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-disposition") {
                out.content_disposition = Some(value.to_string());
            }
        }
    }

    out
}

fn empty() -> ProbeHeaders {
    ProbeHeaders {
        status: None,
        content_length: -1,
        accept_ranges: None,
        content_disposition: None,
    }
}

/// Range and pause support from content length and `Accept-Ranges`.
/// An unknown length rules out both, whatever the header says.
pub(crate) fn capabilities(
    content_length: i64,
    accept_ranges: Option<&str>,
) -> (FeatureFlag, FeatureFlag) {
    let flag = if content_length <= 0 {
        FeatureFlag::NotAllowed
    } else {
        match accept_ranges {
            None => FeatureFlag::Unknown,
            Some(v) if v.trim().eq_ignore_ascii_case("none") => FeatureFlag::NotAllowed,
            Some(_) => FeatureFlag::Allowed,
        }
    };
    (flag, flag)
}

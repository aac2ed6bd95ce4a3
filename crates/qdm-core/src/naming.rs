//! Picking a local file name when the caller does not supply one.
//!
//! Order: `Content-Disposition` filename, then the last URL path segment,
//! then [`FALLBACK_FILE_NAME`]. Every candidate is cleaned so it can be
//! joined onto the save directory without escaping it.

use url::Url;

pub const FALLBACK_FILE_NAME: &str = "download.bin";

/// NAME_MAX on Linux filesystems.
const MAX_NAME_BYTES: usize = 255;

/// Suggested file name for `url`, given the probe's `Content-Disposition` header.
pub fn suggest_file_name(url: &str, content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(disposition_file_name)
        .map(|name| clean_file_name(&name))
        .filter(|name| !name.is_empty())
        .or_else(|| {
            url_file_name(url)
                .map(|name| clean_file_name(&name))
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// `filename*=UTF-8''...` wins over plain `filename=`.
pub fn disposition_file_name(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let lower = value.to_ascii_lowercase();
                if let Some(encoded) = lower
                    .starts_with("utf-8''")
                    .then(|| &value["utf-8''".len()..])
                {
                    if let Some(decoded) = percent_decode(encoded).filter(|s| !s.is_empty()) {
                        return Some(decoded);
                    }
                }
            }
            "filename" => {
                let unquoted = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .map(|v| v.replace("\\\"", "\"").replace("\\\\", "\\"))
                    .unwrap_or_else(|| value.to_string());
                if !unquoted.is_empty() {
                    plain = Some(unquoted);
                }
            }
            _ => {}
        }
    }
    plain
}

/// Last non-empty path segment, percent-decoded.
pub fn url_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(segment).unwrap_or_else(|| segment.to_string());
    match decoded.as_str() {
        "." | ".." => None,
        _ => Some(decoded),
    }
}

/// Replaces separators, NUL, and control characters with `_`, squeezes runs
/// of `_`, trims dots and spaces from both ends, and caps the byte length.
pub fn clean_file_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c == '/' || c == '\\' || c.is_control() { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches(|c: char| c == '.' || c == ' ' || c == '_');
    let mut end = trimmed.len().min(MAX_NAME_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

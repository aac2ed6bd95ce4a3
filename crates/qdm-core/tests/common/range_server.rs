//! Tiny HTTP/1.1 server for integration tests. Serves one static body to GET
//! requests, honoring `Range: bytes=X-Y` unless told otherwise.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// Send `Accept-Ranges: bytes`.
    pub advertise_ranges: bool,
    /// Send `Accept-Ranges: none` (wins over `advertise_ranges`).
    pub refuse_ranges: bool,
    /// If false, Range is ignored and every GET gets 200 with the full body.
    pub support_ranges: bool,
    /// Omit Content-Length on full-body responses (close-delimited body).
    pub hide_length: bool,
    /// Answer ranged requests starting at this offset with 416.
    pub reject_range_from: Option<u64>,
    /// Answer every ranged request with 416.
    pub reject_all_ranges: bool,
    /// Ranged responses send headers, then hold the body back until
    /// [`RangeServer::release`] (or 30s).
    pub stall_ranged: bool,
    /// Answer every GET with this status and an empty body.
    pub error_status: Option<u16>,
    pub content_disposition: Option<String>,
}

impl RangeServerOptions {
    /// A well-behaved range server.
    pub fn ranged() -> Self {
        Self {
            advertise_ranges: true,
            support_ranges: true,
            ..Self::default()
        }
    }
}

pub struct RangeServer {
    pub url: String,
    ranged_requests: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl RangeServer {
    /// Let stalled ranged responses send their bodies.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    /// Ranged GETs seen so far.
    pub fn ranged_requests(&self) -> usize {
        self.ranged_requests.load(Ordering::SeqCst)
    }
}

/// Starts a server on a background thread. It runs until the process exits.
pub fn start(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    let ranged_requests = Arc::new(AtomicUsize::new(0));
    let released = Arc::new(AtomicBool::new(false));
    let counter = Arc::clone(&ranged_requests);
    let gate = Arc::clone(&released);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = Arc::clone(&opts);
            let counter = Arc::clone(&counter);
            let gate = Arc::clone(&gate);
            thread::spawn(move || handle(stream, &body, &opts, &counter, &gate));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/files/payload.bin", port),
        ranged_requests,
        released,
    }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: &RangeServerOptions,
    counter: &AtomicUsize,
    released: &AtomicBool,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    if let Some(status) = opts.error_status {
        let head = format!("HTTP/1.1 {} Error\r\nContent-Length: 0\r\n\r\n", status);
        let _ = stream.write_all(head.as_bytes());
        return;
    }

    let total = body.len() as u64;
    let mut extra = String::new();
    if opts.refuse_ranges {
        extra.push_str("Accept-Ranges: none\r\n");
    } else if opts.advertise_ranges {
        extra.push_str("Accept-Ranges: bytes\r\n");
    }
    if let Some(cd) = &opts.content_disposition {
        extra.push_str(&format!("Content-Disposition: {}\r\n", cd));
    }

    let range = range.filter(|_| opts.support_ranges);
    let Some((start, end)) = range else {
        let length = if opts.hide_length {
            "Connection: close\r\n".to_string()
        } else {
            format!("Content-Length: {}\r\n", total)
        };
        let head = format!("HTTP/1.1 200 OK\r\n{}{}\r\n", length, extra);
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(body);
        return;
    };

    counter.fetch_add(1, Ordering::SeqCst);
    let end = end.min(total.saturating_sub(1));
    if opts.reject_all_ranges || opts.reject_range_from == Some(start) || start > end {
        let head = format!(
            "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\n{}\r\n",
            total, extra
        );
        let _ = stream.write_all(head.as_bytes());
        return;
    }
    let slice = &body[start as usize..=end as usize];
    let head = format!(
        "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\n{}\r\n",
        start,
        end,
        total,
        slice.len(),
        extra
    );
    let _ = stream.write_all(head.as_bytes());
    if opts.stall_ranged {
        let _ = stream.flush();
        let mut waited = Duration::ZERO;
        while !released.load(Ordering::SeqCst) {
            if waited >= Duration::from_secs(30) {
                return;
            }
            thread::sleep(Duration::from_millis(20));
            waited += Duration::from_millis(20);
        }
    }
    let _ = stream.write_all(slice);
}

/// Method plus `(start, end_inclusive)` from `Range: bytes=X-Y`.
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let method = lines
        .next()
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or("");
    let range = lines
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .and_then(|(_, value)| {
            let bounds = value.trim().strip_prefix("bytes=")?;
            let (a, b) = bounds.split_once('-')?;
            let start = a.trim().parse::<u64>().ok()?;
            let end = match b.trim() {
                "" => u64::MAX,
                b => b.parse::<u64>().ok()?,
            };
            Some((start, end))
        });
    (method, range)
}

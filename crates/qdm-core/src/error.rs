//! Error taxonomy for the download session engine.
//!
//! Each phase has its own error type so callers can tell configuration,
//! probing, chunk transfer, reassembly and lifecycle misuse apart.
//! `SessionError` is what the session operations return.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::planner::ByteRange;
use crate::session::SessionState;

/// A single violated configuration constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigViolation {
    #[error("download URL is empty")]
    EmptyUrl,
    #[error("download URL {url:?} is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("URL scheme {0:?} is not supported (expected http or https)")]
    UnsupportedScheme(String),
    #[error("concurrency {value} is out of range (1..={max})")]
    ConcurrencyOutOfRange { value: usize, max: usize },
    #[error("save directory is empty")]
    EmptySaveDirectory,
    #[error("save directory {} does not exist", .0.display())]
    SaveDirectoryMissing(PathBuf),
    #[error("save directory {} is not a directory", .0.display())]
    SaveDirectoryNotADirectory(PathBuf),
    #[error("file name is empty")]
    EmptyFileName,
    #[error("file name {0:?} contains a path separator")]
    FileNameHasSeparator(String),
    #[error("file name {0:?} is not a valid file name")]
    InvalidFileName(String),
    #[error("destination {} already exists", .0.display())]
    DestinationExists(PathBuf),
}

/// Every constraint a `SessionConfig` violated, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid download configuration: {}", join_violations(.violations))]
pub struct ConfigError {
    pub violations: Vec<ConfigViolation>,
}

fn join_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure while probing the remote resource. Fatal to the session.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Transport(#[from] curl::Error),
    #[error("probe returned HTTP {status}")]
    Http { status: u32 },
    #[error("probe cancelled")]
    Cancelled,
}

/// Failure of a single chunk fetch.
#[derive(Debug, Error)]
pub enum ChunkFetchError {
    #[error("transfer failed: {0}")]
    Transport(#[from] curl::Error),
    /// Server answered a ranged request with 200 and the full body.
    #[error("server ignored the Range header (HTTP 200)")]
    RangeIgnored,
    #[error("range not satisfiable (HTTP 416)")]
    RangeNotSatisfiable,
    #[error("unexpected HTTP {0}")]
    Http(u32),
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    #[error("staged file write failed: {0}")]
    Storage(#[source] io::Error),
    #[error("fetch cancelled")]
    Cancelled,
    #[error("fetch worker exited without reporting")]
    WorkerLost,
}

/// Failure while combining staged files into the destination.
#[derive(Debug, Error)]
pub enum ReassemblyError {
    #[error("no staged files to combine")]
    NoStagedFiles,
    #[error("reassembly cancelled")]
    Cancelled,
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An operation was invoked out of order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot {operation} while the session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },
    #[error("download has already been started; use resume instead")]
    AlreadyStarted,
}

/// Error returned by `DownloadSession` operations, tagged with the failing phase.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("capability probe failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("chunk {index} {} failed: {source}", fmt_range(.range))]
    ChunkFetch {
        index: usize,
        range: Option<ByteRange>,
        #[source]
        source: ChunkFetchError,
    },
    #[error("staging {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reassembly failed: {0}")]
    Reassembly(#[from] ReassemblyError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("download aborted")]
    Aborted,
}

fn fmt_range(range: &Option<ByteRange>) -> String {
    match range {
        Some(r) => r.to_string(),
        None => "(full body)".to_string(),
    }
}

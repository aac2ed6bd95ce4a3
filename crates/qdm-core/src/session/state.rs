//! Session lifecycle states and per-chunk reports.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::planner::ByteRange;

/// Lifecycle of a download session.
///
/// `Created → Initialized → Running ⇄ Paused`, ending in `Completed` or
/// `Aborted`. Both end states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Initialized,
    Running,
    Paused,
    Aborted,
    Completed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Initialized => "initialized",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Aborted => "aborted",
            SessionState::Completed => "completed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Aborted | SessionState::Completed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a single chunk fetch stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ChunkState {
    /// Worker started, no accepted response yet.
    Launched,
    /// Response status accepted; body is streaming.
    Receiving { status: u32 },
    Done { bytes: u64 },
    Failed { error: String },
    Cancelled,
}

/// One launched chunk: its range, staged file and current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkReport {
    pub index: usize,
    /// `None` for a sequential full-body fetch.
    pub range: Option<ByteRange>,
    pub staged: PathBuf,
    pub state: ChunkState,
}

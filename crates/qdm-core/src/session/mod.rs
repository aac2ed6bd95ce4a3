//! Download session: owns configuration, capability flags and lifecycle, and
//! drives probe → plan → fan-out → reassemble.
//!
//! All operations take `&self`. State lives behind a mutex so another thread
//! can `pause`, `resume` or `abort` while `start` blocks on the transfer.
//! Nothing outside the session can mutate its flags or state directly.

mod fanout;
mod lifecycle;
mod progress;
mod state;

pub use state::{ChunkReport, ChunkState, SessionState};

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::ConfigError;
use crate::probe::{FeatureFlag, ProbeResult};
use crate::staging::StagingStore;
use progress::Progress;

/// Upper bound on concurrent connections per session.
pub const MAX_CONCURRENCY: usize = 64;

/// One download of one URL into one destination file.
pub struct DownloadSession {
    config: SessionConfig,
    save_full_path: PathBuf,
    /// Parent token; the fan-out and every fetch derive child tokens from it.
    cancel: CancellationToken,
    progress: Arc<Progress>,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    started: bool,
    probe: Option<ProbeResult>,
    staged: Vec<PathBuf>,
    staged_seq: u32,
    chunks: Vec<ChunkReport>,
}

/// Point-in-time view of a session, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub url: String,
    pub max_concurrency: usize,
    pub save_full_path: PathBuf,
    pub state: SessionState,
    pub content_length: i64,
    pub range_support: FeatureFlag,
    pub pause_support: FeatureFlag,
    pub bytes_received: u64,
    pub staged_files: Vec<PathBuf>,
    pub chunks: Vec<ChunkReport>,
}

impl DownloadSession {
    /// Validate `config` and create a session in the `Created` state.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate(MAX_CONCURRENCY)?;
        let save_full_path = config.save_full_path();
        Ok(Self {
            config,
            save_full_path,
            cancel: CancellationToken::new(),
            progress: Arc::new(Progress::default()),
            inner: Mutex::new(Inner {
                state: SessionState::Created,
                started: false,
                probe: None,
                staged: Vec::new(),
                staged_seq: 0,
                chunks: Vec::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn max_concurrency(&self) -> usize {
        self.config.max_concurrency
    }

    pub fn save_directory(&self) -> &Path {
        &self.config.save_directory
    }

    pub fn save_file_name(&self) -> &str {
        &self.config.save_file_name
    }

    pub fn save_full_path(&self) -> &Path {
        &self.save_full_path
    }

    /// Content length from the probe; -1 before initialization or when unknown.
    pub fn content_length(&self) -> i64 {
        self.lock().probe.as_ref().map_or(-1, |p| p.content_length)
    }

    pub fn range_support(&self) -> FeatureFlag {
        self.lock().probe.as_ref().map_or(FeatureFlag::Unknown, |p| p.range_support)
    }

    pub fn pause_support(&self) -> FeatureFlag {
        self.lock().probe.as_ref().map_or(FeatureFlag::Unknown, |p| p.pause_support)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().probe.is_some()
    }

    /// True once `start` has been accepted, whatever happened afterwards.
    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state() == SessionState::Paused
    }

    pub fn is_completed(&self) -> bool {
        self.state() == SessionState::Completed
    }

    pub fn is_aborted(&self) -> bool {
        self.state() == SessionState::Aborted
    }

    /// Body bytes counted so far (bytes arriving while paused are not counted).
    pub fn bytes_received(&self) -> u64 {
        self.progress.bytes()
    }

    /// Staged files not yet merged or released, in byte-range order.
    pub fn staged_files(&self) -> Vec<PathBuf> {
        self.lock().staged.clone()
    }

    /// Last staged-file sequence number handed out.
    pub fn staged_seq(&self) -> u32 {
        self.lock().staged_seq
    }

    /// Every launched chunk, in launch order.
    pub fn chunks(&self) -> Vec<ChunkReport> {
        self.lock().chunks.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        let (content_length, range_support, pause_support) = match &inner.probe {
            Some(p) => (p.content_length, p.range_support, p.pause_support),
            None => (-1, FeatureFlag::Unknown, FeatureFlag::Unknown),
        };
        SessionSnapshot {
            url: self.config.url.clone(),
            max_concurrency: self.config.max_concurrency,
            save_full_path: self.save_full_path.clone(),
            state: inner.state,
            content_length,
            range_support,
            pause_support,
            bytes_received: self.progress.bytes(),
            staged_files: inner.staged.clone(),
            chunks: inner.chunks.clone(),
        }
    }

    fn record_launch(&self, store: &StagingStore, report: ChunkReport) {
        let mut inner = self.lock();
        inner.staged = store.files().iter().map(|f| f.path.clone()).collect();
        inner.staged_seq = store.seq();
        inner.chunks.push(report);
    }

    fn sync_staged(&self, store: &StagingStore) {
        self.lock().staged = store.files().iter().map(|f| f.path.clone()).collect();
    }

    fn set_chunk_state(&self, index: usize, state: ChunkState) {
        let mut inner = self.lock();
        if let Some(chunk) = inner.chunks.iter_mut().find(|c| c.index == index) {
            chunk.state = state;
        }
    }
}

impl fmt::Display for DownloadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = self.snapshot();
        writeln!(f, "Download URL: {}", snap.url)?;
        writeln!(f, "Concurrent connections: {}", snap.max_concurrency)?;
        writeln!(f, "Save directory: {}", self.save_directory().display())?;
        writeln!(f, "Save file name: {}", self.save_file_name())?;
        writeln!(f, "Save full path: {}", snap.save_full_path.display())?;
        writeln!(f, "Content length: {}", snap.content_length)?;
        writeln!(f, "Pause allowed: {}", snap.pause_support)?;
        writeln!(f, "Concurrent connections allowed: {}", snap.range_support)?;
        writeln!(f, "Initialized: {}", self.is_initialized())?;
        writeln!(f, "Started: {}", self.is_started())?;
        writeln!(f, "Running: {}", snap.state == SessionState::Running)?;
        writeln!(f, "Completed: {}", snap.state == SessionState::Completed)?;
        write!(f, "Aborted: {}", snap.state == SessionState::Aborted)
    }
}

impl fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadSession")
            .field("url", &self.config.url)
            .field("save_full_path", &self.save_full_path)
            .field("state", &self.state())
            .finish()
    }
}

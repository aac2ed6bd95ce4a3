//! Lifecycle operations: initialize, start, pause, resume, abort.

use std::fs::File;
use std::io;

use super::fanout::{plan_chunks, run_fanout};
use super::{DownloadSession, SessionState};
use crate::error::{ProbeError, ReassemblyError, SessionError, StateError};
use crate::probe::{self, FeatureFlag};
use crate::reassemble;
use crate::staging::StagingStore;

impl DownloadSession {
    /// Probe the URL and record content length and capability flags.
    /// Only valid in `Created`; the flags are derived once per session.
    pub fn initialize(&self) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Created {
            return Err(StateError::InvalidTransition {
                operation: "initialize",
                state,
            }
            .into());
        }

        let result = match probe::probe(self.url(), &self.cancel.child_token()) {
            Ok(result) => result,
            Err(ProbeError::Cancelled) => return Err(SessionError::Aborted),
            Err(e) => return Err(e.into()),
        };

        let mut inner = self.lock();
        match inner.state {
            SessionState::Created => {}
            SessionState::Aborted => return Err(SessionError::Aborted),
            other => {
                return Err(StateError::InvalidTransition {
                    operation: "initialize",
                    state: other,
                }
                .into())
            }
        }
        tracing::info!(
            url = self.url(),
            content_length = result.content_length,
            range_support = %result.range_support,
            pause_support = %result.pause_support,
            "session initialized"
        );
        inner.probe = Some(result);
        inner.state = SessionState::Initialized;
        Ok(())
    }

    /// Run the download to completion: placeholder file, fan-out (or a single
    /// sequential fetch), then reassembly into the destination.
    ///
    /// Blocks the calling thread. May be called once; a second call is a
    /// `StateError` and launches nothing. On any failure the session ends up
    /// `Aborted` and no completed destination file is left behind.
    pub fn start(&self) -> Result<(), SessionError> {
        let (chunks, expected_full_len) = {
            let mut inner = self.lock();
            if inner.started {
                return Err(StateError::AlreadyStarted.into());
            }
            let probe = match (inner.state, &inner.probe) {
                (SessionState::Initialized, Some(probe)) => probe,
                (state, _) => {
                    return Err(StateError::InvalidTransition {
                        operation: "start",
                        state,
                    }
                    .into())
                }
            };
            let plan = plan_chunks(probe, self.config.max_concurrency);
            inner.started = true;
            inner.state = SessionState::Running;
            plan
        };
        tracing::info!(
            url = self.url(),
            dest = %self.save_full_path.display(),
            chunks = chunks.len(),
            ranged = chunks.first().map_or(false, Option::is_some),
            "download started"
        );

        // Placeholder so the destination name is visible from the start.
        if let Err(source) = File::options()
            .write(true)
            .create_new(true)
            .open(&self.save_full_path)
        {
            self.finish_aborted();
            return Err(SessionError::Staging {
                path: self.save_full_path.clone(),
                source,
            });
        }

        let mut store = StagingStore::new(&self.save_full_path);
        if let Err(e) = run_fanout(self, &chunks, expected_full_len, &mut store) {
            self.discard(&mut store);
            return Err(e);
        }

        self.commit(&mut store)
    }

    /// Reassemble the staged files into the destination. An abort that lands
    /// here still wins: `combine` stops on the cancelled token, and an abort
    /// that slips in after its last check removes the merged destination.
    fn commit(&self, store: &mut StagingStore) -> Result<(), SessionError> {
        let combined = reassemble::combine(store.files(), &self.save_full_path, &self.cancel);
        match combined {
            Ok(()) => {
                store.take_files();
                let mut inner = self.lock();
                inner.staged.clear();
                if inner.state == SessionState::Aborted {
                    drop(inner);
                    if let Err(e) = remove_placeholder(&self.save_full_path) {
                        tracing::warn!(path = %self.save_full_path.display(), "could not remove aborted download: {}", e);
                    }
                    tracing::info!(dest = %self.save_full_path.display(), "aborted during final move; destination removed");
                    return Err(SessionError::Aborted);
                }
                inner.state = SessionState::Completed;
                tracing::info!(dest = %self.save_full_path.display(), "download completed");
                Ok(())
            }
            Err(ReassemblyError::Cancelled) => {
                tracing::info!(dest = %self.save_full_path.display(), "reassembly stopped by abort");
                self.discard(store);
                Err(SessionError::Aborted)
            }
            Err(e) => {
                // Unmerged staged files stay on disk for recovery.
                self.sync_staged(store);
                self.finish_aborted();
                tracing::error!(dest = %self.save_full_path.display(), "reassembly failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Mark the session paused. Advisory: in-flight transfers keep running,
    /// only byte accounting stops until `resume`.
    pub fn pause(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state != SessionState::Running {
            return Err(StateError::InvalidTransition {
                operation: "pause",
                state: inner.state,
            }
            .into());
        }
        if inner.probe.as_ref().map(|p| p.pause_support) == Some(FeatureFlag::NotAllowed) {
            tracing::warn!(url = self.url(), "server does not support resuming; pause is advisory only");
        }
        inner.state = SessionState::Paused;
        self.progress.set_paused(true);
        tracing::info!(url = self.url(), "download paused");
        Ok(())
    }

    pub fn resume(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state != SessionState::Paused {
            return Err(StateError::InvalidTransition {
                operation: "resume",
                state: inner.state,
            }
            .into());
        }
        inner.state = SessionState::Running;
        self.progress.set_paused(false);
        tracing::info!(url = self.url(), "download resumed");
        Ok(())
    }

    /// Abort the session from any non-terminal state, reassembly included.
    /// Cancels the session token, and with it every in-flight fetch, before
    /// returning. No-op once the session is terminal.
    pub fn abort(&self) {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return;
        }
        let previous = inner.state;
        inner.state = SessionState::Aborted;
        drop(inner);
        self.cancel.cancel();
        tracing::info!(url = self.url(), from = %previous, "download aborted");
    }

    fn finish_aborted(&self) {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            inner.state = SessionState::Aborted;
        }
        drop(inner);
        self.cancel.cancel();
    }

    /// Failure before reassembly: drop staged files and the placeholder.
    fn discard(&self, store: &mut StagingStore) {
        store.release_all();
        self.sync_staged(store);
        if let Err(e) = remove_placeholder(&self.save_full_path) {
            tracing::warn!(path = %self.save_full_path.display(), "could not remove placeholder: {}", e);
        }
        self.finish_aborted();
    }
}

fn remove_placeholder(path: &std::path::Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

//! Chunk fan-out: one worker thread per planned chunk, joined at a barrier.
//!
//! Chunks are launched in ascending range order. A launch waits until the
//! previous chunk's response has been accepted (206 for a range) or the chunk
//! has failed, so the first failure stops every later launch. Bodies stream
//! concurrently once accepted. The first failure also cancels the fan-out
//! token, which stops in-flight siblings.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::progress::Progress;
use super::state::{ChunkReport, ChunkState};
use super::DownloadSession;
use crate::error::{ChunkFetchError, SessionError};
use crate::fetcher::{self, FetchObserver, FetchOutcome};
use crate::planner::{plan_ranges, ByteRange};
use crate::probe::ProbeResult;
use crate::staging::{StagedFile, StagingStore};

const POLL: Duration = Duration::from_millis(100);

/// Chunks to fetch: ranged when the server allows it and more than one
/// connection is configured, otherwise a single full-body fetch (`None`).
/// The second value is the byte count a full-body fetch must produce, if known.
pub(super) fn plan_chunks(
    probe: &ProbeResult,
    max_concurrency: usize,
) -> (Vec<Option<ByteRange>>, Option<u64>) {
    if probe.range_support.is_allowed() && max_concurrency > 1 {
        let ranges = plan_ranges(probe.content_length, max_concurrency);
        if !ranges.is_empty() {
            return (ranges.into_iter().map(Some).collect(), None);
        }
    }
    let expected = (probe.content_length > 0).then_some(probe.content_length as u64);
    (vec![None], expected)
}

enum ChunkEvent {
    Accepted {
        index: usize,
        status: u32,
    },
    Finished {
        index: usize,
        result: Result<FetchOutcome, ChunkFetchError>,
    },
}

struct ChannelObserver {
    index: usize,
    tx: Sender<ChunkEvent>,
    progress: Arc<Progress>,
}

impl FetchObserver for ChannelObserver {
    fn accepted(&mut self, status: u32) {
        let _ = self.tx.send(ChunkEvent::Accepted {
            index: self.index,
            status,
        });
    }

    fn received(&mut self, bytes: u64) {
        self.progress.add(bytes);
    }
}

struct Worker {
    handle: JoinHandle<()>,
    range: Option<ByteRange>,
    accepted: bool,
    finished: bool,
}

struct FanOut<'a> {
    session: &'a DownloadSession,
    token: CancellationToken,
    tx: Sender<ChunkEvent>,
    rx: Receiver<ChunkEvent>,
    workers: Vec<Worker>,
    expected_full_len: Option<u64>,
    first_error: Option<SessionError>,
}

/// Fetch every chunk into its own staged file. Returns once all launched
/// workers have reported; `Err(SessionError::Aborted)` when the session was
/// aborted, otherwise the first chunk failure.
pub(super) fn run_fanout(
    session: &DownloadSession,
    chunks: &[Option<ByteRange>],
    expected_full_len: Option<u64>,
    store: &mut StagingStore,
) -> Result<(), SessionError> {
    let (tx, rx) = mpsc::channel();
    let mut fan = FanOut {
        session,
        token: session.cancel.child_token(),
        tx,
        rx,
        workers: Vec::with_capacity(chunks.len()),
        expected_full_len,
        first_error: None,
    };

    for (index, range) in chunks.iter().copied().enumerate() {
        if fan.first_error.is_some() || fan.token.is_cancelled() {
            tracing::debug!(
                skipped = chunks.len() - index,
                "fan-out stopped; remaining chunks not launched"
            );
            break;
        }
        let staged = match store.allocate(range) {
            Ok(staged) => staged,
            Err(source) => {
                fan.fail(SessionError::Staging {
                    path: session.save_full_path().to_path_buf(),
                    source,
                });
                break;
            }
        };
        session.record_launch(
            store,
            ChunkReport {
                index,
                range,
                staged: staged.path.clone(),
                state: ChunkState::Launched,
            },
        );
        fan.launch(index, staged);
        fan.wait_until(|f| f.workers[index].accepted || f.workers[index].finished);
    }

    fan.wait_until(|f| f.workers.iter().all(|w| w.finished));
    for worker in fan.workers.drain(..) {
        // Every worker has reported; join only reaps the thread.
        let _ = worker.handle.join();
    }

    if session.cancel.is_cancelled() {
        return Err(SessionError::Aborted);
    }
    match fan.first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl FanOut<'_> {
    fn launch(&mut self, index: usize, staged: StagedFile) {
        let token = self.token.child_token();
        let tx = self.tx.clone();
        let url = self.session.url().to_string();
        let progress = Arc::clone(&self.session.progress);
        let range = staged.range;
        tracing::debug!(index, range = ?range, staged = %staged.path.display(), "launching chunk");

        let handle = thread::spawn(move || {
            let mut observer = ChannelObserver {
                index,
                tx: tx.clone(),
                progress,
            };
            let result = fetcher::fetch_chunk(&url, &staged, &token, &mut observer);
            let _ = tx.send(ChunkEvent::Finished { index, result });
        });

        self.workers.push(Worker {
            handle,
            range,
            accepted: false,
            finished: false,
        });
    }

    fn wait_until(&mut self, done: impl Fn(&Self) -> bool) {
        while !done(self) {
            match self.rx.recv_timeout(POLL) {
                Ok(event) => self.apply(event),
                Err(RecvTimeoutError::Timeout) => self.reap_lost_workers(),
                // Unreachable while `self.tx` is alive.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn apply(&mut self, event: ChunkEvent) {
        match event {
            ChunkEvent::Accepted { index, status } => {
                self.workers[index].accepted = true;
                self.session
                    .set_chunk_state(index, ChunkState::Receiving { status });
            }
            ChunkEvent::Finished { index, result } => {
                self.workers[index].finished = true;
                let range = self.workers[index].range;
                let result = result.and_then(|outcome| self.check_full_len(range, outcome));
                match result {
                    Ok(outcome) => {
                        tracing::debug!(index, bytes = outcome.bytes, "chunk done");
                        self.session
                            .set_chunk_state(index, ChunkState::Done { bytes: outcome.bytes });
                    }
                    Err(ChunkFetchError::Cancelled) => {
                        tracing::debug!(index, "chunk cancelled");
                        self.session.set_chunk_state(index, ChunkState::Cancelled);
                    }
                    Err(e) => {
                        tracing::warn!(
                            index,
                            range = %range.map_or_else(|| "full body".to_string(), |r| r.range_header_value()),
                            "chunk failed: {}",
                            e
                        );
                        self.session.set_chunk_state(
                            index,
                            ChunkState::Failed {
                                error: e.to_string(),
                            },
                        );
                        self.fail(SessionError::ChunkFetch {
                            index,
                            range,
                            source: e,
                        });
                    }
                }
            }
        }
    }

    fn check_full_len(
        &self,
        range: Option<ByteRange>,
        outcome: FetchOutcome,
    ) -> Result<FetchOutcome, ChunkFetchError> {
        match (range, self.expected_full_len) {
            (None, Some(expected)) if outcome.bytes != expected => {
                Err(ChunkFetchError::PartialTransfer {
                    expected,
                    received: outcome.bytes,
                })
            }
            _ => Ok(outcome),
        }
    }

    /// Record the first failure and cancel the fan-out so siblings stop.
    fn fail(&mut self, err: SessionError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
        self.token.cancel();
    }

    /// A worker thread that exited without a `Finished` event panicked.
    fn reap_lost_workers(&mut self) {
        let lost: Vec<usize> = self
            .workers
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.finished && w.handle.is_finished())
            .map(|(i, _)| i)
            .collect();
        if lost.is_empty() {
            return;
        }
        // A worker sends before it exits; take anything already queued first.
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
        }
        for index in lost {
            if self.workers[index].finished {
                continue;
            }
            self.apply(ChunkEvent::Finished {
                index,
                result: Err(ChunkFetchError::WorkerLost),
            });
        }
    }
}

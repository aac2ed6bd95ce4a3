//! End-to-end downloads against a local HTTP server.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::range_server::{self, RangeServerOptions};
use common::{dir_entries, payload, session_config};
use qdm_core::error::{ChunkFetchError, ReassemblyError};
use qdm_core::planner::ByteRange;
use qdm_core::probe::FeatureFlag;
use qdm_core::session::ChunkState;
use qdm_core::{DownloadSession, SessionError, SessionState};
use tempfile::tempdir;

#[test]
fn ranged_download_fans_out_and_reassembles() {
    let body = payload(10_000);
    let server = range_server::start(body.clone(), RangeServerOptions::ranged());
    let dir = tempdir().unwrap();

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "out.bin", 4)).unwrap();
    session.initialize().unwrap();
    assert_eq!(session.state(), SessionState::Initialized);
    assert_eq!(session.content_length(), 10_000);
    assert_eq!(session.range_support(), FeatureFlag::Allowed);
    assert_eq!(session.pause_support(), FeatureFlag::Allowed);

    session.start().unwrap();
    assert!(session.is_completed());

    let chunks = session.chunks();
    let ranges: Vec<_> = chunks.iter().map(|c| c.range).collect();
    assert_eq!(
        ranges,
        vec![
            Some(ByteRange::new(0, 2499)),
            Some(ByteRange::new(2500, 4999)),
            Some(ByteRange::new(5000, 7499)),
            Some(ByteRange::new(7500, 9999)),
        ]
    );
    assert!(chunks
        .iter()
        .all(|c| c.state == ChunkState::Done { bytes: 2500 }));
    assert_eq!(server.ranged_requests(), 4);
    assert_eq!(session.bytes_received(), 10_000);
    assert_eq!(session.staged_seq(), 4);
    assert!(session.staged_files().is_empty());

    assert_eq!(std::fs::read(dir.path().join("out.bin")).unwrap(), body);
    assert_eq!(dir_entries(dir.path()), vec!["out.bin".to_string()]);
}

#[test]
fn uneven_length_is_fully_covered() {
    let body = payload(10_007);
    let server = range_server::start(body.clone(), RangeServerOptions::ranged());
    let dir = tempdir().unwrap();

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "odd.bin", 3)).unwrap();
    session.initialize().unwrap();
    session.start().unwrap();

    let chunks = session.chunks();
    let ranges: Vec<_> = chunks.iter().map(|c| c.range).collect();
    assert_eq!(
        ranges,
        vec![
            Some(ByteRange::new(0, 3334)),
            Some(ByteRange::new(3335, 6670)),
            Some(ByteRange::new(6671, 10_006)),
        ]
    );
    assert_eq!(std::fs::read(dir.path().join("odd.bin")).unwrap(), body);
}

#[test]
fn missing_accept_ranges_downloads_sequentially() {
    let body = payload(4096);
    let opts = RangeServerOptions {
        support_ranges: true,
        ..RangeServerOptions::default()
    };
    let server = range_server::start(body.clone(), opts);
    let dir = tempdir().unwrap();

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "seq.bin", 8)).unwrap();
    session.initialize().unwrap();
    assert_eq!(session.range_support(), FeatureFlag::Unknown);

    session.start().unwrap();
    let chunks = session.chunks();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].range, None);
    assert_eq!(chunks[0].state, ChunkState::Done { bytes: 4096 });
    assert_eq!(server.ranged_requests(), 0);
    assert_eq!(std::fs::read(dir.path().join("seq.bin")).unwrap(), body);
}

#[test]
fn single_connection_skips_ranges() {
    let body = payload(2048);
    let server = range_server::start(body.clone(), RangeServerOptions::ranged());
    let dir = tempdir().unwrap();

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "one.bin", 1)).unwrap();
    session.initialize().unwrap();
    assert_eq!(session.range_support(), FeatureFlag::Allowed);
    session.start().unwrap();

    assert_eq!(session.chunks().len(), 1);
    assert_eq!(server.ranged_requests(), 0);
    assert_eq!(std::fs::read(dir.path().join("one.bin")).unwrap(), body);
}

#[test]
fn unknown_length_streams_to_end_of_body() {
    let body = payload(3000);
    let opts = RangeServerOptions {
        advertise_ranges: true,
        support_ranges: true,
        hide_length: true,
        ..RangeServerOptions::default()
    };
    let server = range_server::start(body.clone(), opts);
    let dir = tempdir().unwrap();

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "stream.bin", 4)).unwrap();
    session.initialize().unwrap();
    assert_eq!(session.content_length(), -1);
    assert_eq!(session.range_support(), FeatureFlag::NotAllowed);

    session.start().unwrap();
    assert_eq!(session.chunks().len(), 1);
    assert_eq!(std::fs::read(dir.path().join("stream.bin")).unwrap(), body);
}

#[test]
fn range_not_satisfiable_aborts_without_destination() {
    let opts = RangeServerOptions {
        reject_all_ranges: true,
        ..RangeServerOptions::ranged()
    };
    let server = range_server::start(payload(10_000), opts);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("fail.bin");

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "fail.bin", 4)).unwrap();
    session.initialize().unwrap();
    let err = session.start().unwrap_err();

    match err {
        SessionError::ChunkFetch { index, range, source } => {
            assert_eq!(index, 0);
            assert_eq!(range, Some(ByteRange::new(0, 2499)));
            assert!(matches!(source, ChunkFetchError::RangeNotSatisfiable));
        }
        other => panic!("expected chunk failure, got {other:?}"),
    }
    assert!(session.is_aborted());
    assert!(!dest.exists());
    assert_eq!(session.chunks().len(), 1);
    assert_eq!(server.ranged_requests(), 1);
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn failure_mid_plan_stops_later_launches() {
    let opts = RangeServerOptions {
        reject_range_from: Some(5000),
        ..RangeServerOptions::ranged()
    };
    let server = range_server::start(payload(10_000), opts);
    let dir = tempdir().unwrap();

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "mid.bin", 4)).unwrap();
    session.initialize().unwrap();
    let err = session.start().unwrap_err();

    assert!(matches!(err, SessionError::ChunkFetch { index: 2, .. }));
    assert_eq!(
        err.to_string(),
        "chunk 2 [5000, 7499] failed: range not satisfiable (HTTP 416)"
    );
    let chunks = session.chunks();
    assert_eq!(chunks.len(), 3);
    assert!(matches!(chunks[2].state, ChunkState::Failed { .. }));
    assert_eq!(server.ranged_requests(), 3);
    assert!(session.is_aborted());
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn ignored_range_header_aborts() {
    let opts = RangeServerOptions {
        advertise_ranges: true,
        support_ranges: false,
        ..RangeServerOptions::default()
    };
    let server = range_server::start(payload(8000), opts);
    let dir = tempdir().unwrap();

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "full.bin", 4)).unwrap();
    session.initialize().unwrap();
    let err = session.start().unwrap_err();

    assert!(matches!(
        err,
        SessionError::ChunkFetch {
            index: 0,
            source: ChunkFetchError::RangeIgnored,
            ..
        }
    ));
    assert_eq!(session.chunks().len(), 1);
    assert!(session.is_aborted());
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn existing_staged_names_are_skipped() {
    let body = payload(1000);
    let server = range_server::start(body.clone(), RangeServerOptions::ranged());
    let dir = tempdir().unwrap();
    let squatter = dir.path().join("keep.bin.temp1.qdm");
    std::fs::write(&squatter, b"not ours").unwrap();

    let session =
        DownloadSession::new(session_config(&server.url, dir.path(), "keep.bin", 2)).unwrap();
    session.initialize().unwrap();
    session.start().unwrap();

    assert_eq!(std::fs::read(&squatter).unwrap(), b"not ours");
    assert_eq!(std::fs::read(dir.path().join("keep.bin")).unwrap(), body);
    assert_eq!(session.staged_seq(), 3);
}

#[test]
fn reassembly_failure_keeps_unmerged_parts() {
    let opts = RangeServerOptions {
        stall_ranged: true,
        ..RangeServerOptions::ranged()
    };
    let server = range_server::start(payload(8000), opts);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("broken.bin");

    let session = Arc::new(
        DownloadSession::new(session_config(&server.url, dir.path(), "broken.bin", 4)).unwrap(),
    );
    session.initialize().unwrap();
    let runner = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.start())
    };

    let until = Instant::now() + Duration::from_secs(10);
    while session.chunks().len() < 4
        || !session
            .chunks()
            .iter()
            .all(|c| matches!(c.state, ChunkState::Receiving { .. }))
    {
        assert!(Instant::now() < until, "chunks never streamed");
        thread::sleep(Duration::from_millis(20));
    }

    // The worker keeps writing through its open handle; the merge finds the name gone.
    let staged = session.staged_files();
    std::fs::remove_file(&staged[2]).unwrap();
    server.release();

    let err = runner.join().unwrap().unwrap_err();
    match err {
        SessionError::Reassembly(ReassemblyError::Io { action, path, .. }) => {
            assert_eq!(action, "open");
            assert_eq!(path, staged[2]);
        }
        other => panic!("expected reassembly failure, got {other:?}"),
    }
    assert!(session.is_aborted());
    assert_eq!(session.staged_files(), staged);
    assert!(staged[1].exists());
    assert!(staged[3].exists());
    assert_eq!(std::fs::read(&dest).unwrap(), b"");
}

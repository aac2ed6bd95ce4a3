//! Byte accounting shared between the session and its fetch workers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Received-byte counter. While paused, new bytes are not counted; the
/// transfers themselves keep running.
#[derive(Debug, Default)]
pub(crate) struct Progress {
    bytes: AtomicU64,
    paused: AtomicBool,
}

impl Progress {
    pub(crate) fn add(&self, n: u64) {
        if !self.paused.load(Ordering::Relaxed) {
            self.bytes.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }
}

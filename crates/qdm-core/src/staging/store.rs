//! Allocation, tracking and release of staged files.

use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use super::staged_path;
use crate::planner::ByteRange;

/// One chunk's temporary file and the byte range it holds
/// (`None` for a sequential full-body fetch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedFile {
    pub path: PathBuf,
    pub seq: u32,
    pub range: Option<ByteRange>,
}

impl StagedFile {
    /// Open the staged file for writing from the start, discarding any earlier content.
    pub fn open_for_write(&self) -> io::Result<File> {
        File::options()
            .write(true)
            .truncate(true)
            .open(&self.path)
    }
}

/// Hands out uniquely named staged files for one destination and keeps them
/// in allocation order. Only the session's coordinating thread touches it.
#[derive(Debug)]
pub struct StagingStore {
    dest: PathBuf,
    seq: u32,
    files: Vec<StagedFile>,
}

impl StagingStore {
    pub fn new(dest: &Path) -> Self {
        Self {
            dest: dest.to_path_buf(),
            seq: 0,
            files: Vec::new(),
        }
    }

    /// Create the next staged file. The sequence number is bumped before every
    /// attempt; names that already exist on disk are skipped.
    pub fn allocate(&mut self, range: Option<ByteRange>) -> io::Result<StagedFile> {
        loop {
            self.seq = self.seq.checked_add(1).ok_or_else(|| {
                io::Error::new(io::ErrorKind::Other, "staged file sequence exhausted")
            })?;
            let path = staged_path(&self.dest, self.seq);
            match File::options().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    let staged = StagedFile {
                        path,
                        seq: self.seq,
                        range,
                    };
                    self.files.push(staged.clone());
                    return Ok(staged);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(path = %path.display(), "staged name taken, trying next");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delete a staged file and drop it from the list. A file that is already
    /// gone is not an error.
    pub fn release(&mut self, staged: &StagedFile) -> io::Result<()> {
        self.files.retain(|f| f.path != staged.path);
        remove_if_present(&staged.path)
    }

    /// Best-effort delete of every tracked staged file. Failures are logged.
    pub fn release_all(&mut self) {
        for staged in std::mem::take(&mut self.files) {
            if let Err(e) = remove_if_present(&staged.path) {
                tracing::warn!(path = %staged.path.display(), "could not remove staged file: {}", e);
            }
        }
    }

    /// Staged files in allocation (and therefore byte-range) order.
    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    /// Hand the ordered list over (to the reassembler); the store forgets them.
    pub fn take_files(&mut self) -> Vec<StagedFile> {
        std::mem::take(&mut self.files)
    }

    /// Last sequence number handed out.
    pub fn seq(&self) -> u32 {
        self.seq
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

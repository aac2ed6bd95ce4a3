//! Ordered reassembly of staged files into the destination.
//!
//! The first staged file is opened for append and every later one is streamed
//! onto it in list order; the list is in ascending byte-range order, so the
//! result is the original byte stream. The first file is then moved onto the
//! destination and the others are deleted.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::error::ReassemblyError;
use crate::staging::StagedFile;

/// Combine `files` (in order) into `dest`.
///
/// `cancel` is checked before every append and once more before the move;
/// a cancelled combine stops with [`ReassemblyError::Cancelled`] and never
/// touches `dest`. If an append fails part way, nothing is deleted: every
/// staged file stays on disk for manual recovery and `dest` is left as it was.
pub fn combine(
    files: &[StagedFile],
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<(), ReassemblyError> {
    let (first, rest) = files.split_first().ok_or(ReassemblyError::NoStagedFiles)?;

    let mut out = File::options()
        .append(true)
        .open(&first.path)
        .map_err(|e| io_error("open", &first.path, e))?;

    for staged in rest {
        if cancel.is_cancelled() {
            return Err(ReassemblyError::Cancelled);
        }
        let mut input = File::open(&staged.path).map_err(|e| io_error("open", &staged.path, e))?;
        let copied =
            io::copy(&mut input, &mut out).map_err(|e| io_error("append", &staged.path, e))?;
        tracing::trace!(path = %staged.path.display(), bytes = copied, "merged staged file");
    }

    out.sync_all().map_err(|e| io_error("sync", &first.path, e))?;
    drop(out);

    if cancel.is_cancelled() {
        return Err(ReassemblyError::Cancelled);
    }
    move_file(&first.path, dest)?;

    for staged in rest {
        if let Err(e) = fs::remove_file(&staged.path) {
            // The destination is already complete; a leftover staged file is only clutter.
            tracing::warn!(path = %staged.path.display(), "could not remove merged staged file: {}", e);
        }
    }

    tracing::debug!(dest = %dest.display(), parts = files.len(), "reassembly complete");
    Ok(())
}

/// Rename `from` onto `to`. Only a cross-filesystem rename falls back to
/// copy + delete; any other rename error is returned as is.
fn move_file(from: &Path, to: &Path) -> Result<(), ReassemblyError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                from = %from.display(),
                to = %to.display(),
                "rename crosses filesystems, copying instead"
            );
            fs::copy(from, to).map_err(|e| io_error("copy", from, e))?;
            if let Err(e) = fs::remove_file(from) {
                tracing::warn!(path = %from.display(), "could not remove staged file after copy: {}", e);
            }
            Ok(())
        }
        Err(e) => Err(io_error("rename", from, e)),
    }
}

fn io_error(action: &'static str, path: &Path, source: io::Error) -> ReassemblyError {
    ReassemblyError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

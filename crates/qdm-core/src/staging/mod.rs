//! Staged (temporary) chunk files.
//!
//! Every chunk is written to its own file next to the destination, named
//! `<dest>.temp<N>.qdm`. The store hands out those files in launch order and
//! keeps the ordered list the reassembler consumes.

mod store;

pub use store::{StagedFile, StagingStore};

use std::path::{Path, PathBuf};

/// Extension marking files as this engine's staged chunk artifacts.
pub const TEMP_FILE_EXTENSION: &str = "qdm";

/// Staged file path for sequence number `seq`: `file.iso` → `file.iso.temp3.qdm`.
pub fn staged_path(dest: &Path, seq: u32) -> PathBuf {
    let mut o = dest.as_os_str().to_owned();
    o.push(format!(".temp{}.{}", seq, TEMP_FILE_EXTENSION));
    PathBuf::from(o)
}

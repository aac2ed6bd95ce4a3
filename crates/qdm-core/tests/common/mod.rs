#![allow(dead_code)]

pub mod range_server;

use std::path::Path;

use qdm_core::SessionConfig;

/// Deterministic, non-repeating test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

pub fn session_config(url: &str, dir: &Path, name: &str, connections: usize) -> SessionConfig {
    SessionConfig {
        url: url.to_string(),
        max_concurrency: connections,
        save_directory: dir.to_path_buf(),
        save_file_name: name.to_string(),
    }
}

/// Names of every entry in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read_dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

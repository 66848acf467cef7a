//! Shared helpers for the breeze integration tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Root for one test's scratch files; removed on drop.
pub fn scratch_dir() -> TempDir {
    tempfile::tempdir().expect("scratch dir")
}

/// Write `content` under `dir` at a `/`-separated relative path, the same
/// shape breeze recreates on the receive side.
pub fn write_file(dir: &Path, relative: &str, content: &[u8]) -> PathBuf {
    let path = relative
        .split('/')
        .fold(dir.to_path_buf(), |path, segment| path.join(segment));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("scratch parents");
    }
    std::fs::write(&path, content).expect("scratch file");
    path
}

/// Deterministic payload of `len` bytes. The period (a prime) never lines
/// up with the 512 KiB stream chunks, so reordered or repeated chunks
/// would show up as a checksum failure.
#[allow(clippy::cast_possible_truncation)]
pub fn chunked_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Assert a received file holds exactly the bytes the sender had on disk.
pub fn assert_received(source: &Path, received: &Path) {
    let sent = std::fs::read(source).expect("source bytes");
    let got = std::fs::read(received).expect("received bytes");
    assert_eq!(got, sent, "received bytes differ from source");
}

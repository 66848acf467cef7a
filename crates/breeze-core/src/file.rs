//! File enumeration and path safety.
//!
//! This module handles:
//! - Enumerating files and directories into transfer entries
//! - The relative-path safety predicate applied to every received path
//! - Size formatting for display
//!
//! Relative paths travel over the wire with `/` separators regardless of
//! platform, so the safety predicate works on the raw string rather than
//! on [`std::path::Path`] components.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};

/// A local file selected for sending.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path under which the file is recreated on the receiver,
    /// `/`-separated
    pub relative_path: String,
    /// Local source path, only meaningful on the sender
    pub absolute_path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Modification time, seconds since the Unix epoch (0 if unavailable)
    pub modified: i64,
}

impl FileEntry {
    /// Create an entry from a file path.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute path to the file
    /// * `base` - Base directory for computing the relative path
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn from_path(path: &Path, base: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let relative = path.strip_prefix(base).unwrap_or(path);
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(0));

        Ok(Self {
            relative_path,
            absolute_path: path.to_path_buf(),
            size: metadata.len(),
            modified,
        })
    }

    /// Get the file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path.rsplit('/').next().unwrap_or("unknown")
    }
}

/// Enumerate files for sending.
///
/// Plain files map to their basename; directories are walked recursively
/// and contribute their contents under the directory's own name. Hidden
/// files are skipped. An empty directory yields no entries.
///
/// # Errors
///
/// Returns an error if a named path does not exist or metadata cannot
/// be read.
pub fn collect_entries(paths: &[PathBuf]) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    for path in paths {
        if path.is_file() {
            let base = path.parent().unwrap_or(path);
            entries.push(FileEntry::from_path(path, base)?);
        } else if path.is_dir() {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            collect_directory(path, base, &mut entries)?;
        } else {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
    }

    Ok(entries)
}

fn collect_directory(dir: &Path, base: &Path, entries: &mut Vec<FileEntry>) -> Result<()> {
    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                continue;
            }
        }

        if path.is_file() {
            entries.push(FileEntry::from_path(path, base)?);
        }
    }

    Ok(())
}

/// Check whether a relative path received from a peer is safe to write
/// under the download directory.
///
/// Rejects absolute paths, paths containing a NUL byte, and paths with a
/// `..` component. Empty and `.` components are accepted. This is the sole
/// defense against directory traversal on the receive side and must run
/// before any filesystem call.
#[must_use]
pub fn is_safe_relative_path(path: &str) -> bool {
    if path.starts_with('/') {
        return false;
    }
    if path.contains('\0') {
        return false;
    }
    path.split('/').all(|component| component != "..")
}

/// Format a file size for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_absolute_path() {
        assert!(!is_safe_relative_path("/etc/passwd"));
        assert!(!is_safe_relative_path("/"));
    }

    #[test]
    fn test_rejects_parent_components() {
        assert!(!is_safe_relative_path("../x"));
        assert!(!is_safe_relative_path("a/../b"));
        assert!(!is_safe_relative_path("a/b/.."));
        assert!(!is_safe_relative_path(".."));
    }

    #[test]
    fn test_rejects_nul_byte() {
        assert!(!is_safe_relative_path("a\0b"));
    }

    #[test]
    fn test_accepts_ordinary_paths() {
        assert!(is_safe_relative_path(""));
        assert!(is_safe_relative_path("."));
        assert!(is_safe_relative_path("./x"));
        assert!(is_safe_relative_path(".gitignore"));
        assert!(is_safe_relative_path("a/b/c/d.txt"));
    }

    #[test]
    fn test_dotdot_as_name_fragment_is_accepted() {
        // Only the exact component ".." is a traversal
        assert!(is_safe_relative_path("..a/b"));
        assert!(is_safe_relative_path("a/..b.txt"));
    }

    #[test]
    fn test_entry_from_file() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("note.txt");
        std::fs::write(&path, b"twelve bytes").expect("write file");

        let entry = FileEntry::from_path(&path, temp_dir.path()).expect("entry");
        assert_eq!(entry.relative_path, "note.txt");
        assert_eq!(entry.size, 12);
        assert_eq!(entry.file_name(), "note.txt");
        assert!(entry.modified > 0);
    }

    #[test]
    fn test_collect_single_file_uses_basename() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let path = temp_dir.path().join("single.bin");
        std::fs::write(&path, b"x").expect("write file");

        let entries = collect_entries(&[path]).expect("collect");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "single.bin");
    }

    #[test]
    fn test_collect_directory_keeps_structure() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let dir = temp_dir.path().join("docs");
        std::fs::create_dir_all(dir.join("sub")).expect("mkdir");
        std::fs::write(dir.join("a.txt"), b"a").expect("write");
        std::fs::write(dir.join("sub/b.txt"), b"b").expect("write");

        let mut entries = collect_entries(&[dir]).expect("collect");
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].relative_path, "docs/a.txt");
        assert_eq!(entries[1].relative_path, "docs/sub/b.txt");
        assert!(entries.iter().all(|e| is_safe_relative_path(&e.relative_path)));
    }

    #[test]
    fn test_collect_empty_directory() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let dir = temp_dir.path().join("empty");
        std::fs::create_dir(&dir).expect("mkdir");

        let entries = collect_entries(&[dir]).expect("collect");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_collect_skips_hidden_files() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let dir = temp_dir.path().join("d");
        std::fs::create_dir(&dir).expect("mkdir");
        std::fs::write(dir.join(".hidden"), b"h").expect("write");
        std::fs::write(dir.join("shown.txt"), b"s").expect("write");

        let entries = collect_entries(&[dir]).expect("collect");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name(), "shown.txt");
    }

    #[test]
    fn test_collect_missing_path_errors() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let missing = temp_dir.path().join("nope.txt");

        let result = collect_entries(&[missing]);
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}

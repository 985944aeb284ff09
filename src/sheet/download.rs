//! Download handles for fetched workbook bytes.
//!
//! The browser-style object URL becomes a file in the application downloads
//! directory: [`DownloadHandle::create`] materialises the bytes,
//! [`DownloadHandle::release`] deletes them.  The handle is exclusively
//! owned by the view state that created it and must be released before a
//! replacement handle becomes active — [`crate::budget::BudgetSession`]
//! enforces that ordering.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter so concurrent handles never collide on a filename.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// DownloadHandle
// ---------------------------------------------------------------------------

/// Owned reference to a materialised workbook file.
///
/// Dropping an unreleased handle deletes the file best-effort; prefer the
/// explicit [`release`](Self::release) so failures are logged at the call
/// site that owns the replacement decision.
#[derive(Debug)]
pub struct DownloadHandle {
    path: PathBuf,
    released: bool,
}

impl DownloadHandle {
    /// Write `bytes` to a fresh `budget-<n>.xlsx` under `dir`, creating the
    /// directory as needed.
    pub fn create(dir: &Path, bytes: &[u8]) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("budget-{id}.xlsx"));
        fs::write(&path, bytes)?;

        log::debug!("download handle created: {}", path.display());
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Path of the materialised file, valid until release.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the underlying file.  Consumes the handle; after this the
    /// path is invalid.
    pub fn release(mut self) {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("download handle released: {}", self.path.display()),
            Err(e) => log::warn!(
                "failed to release download handle {}: {e}",
                self.path.display()
            ),
        }
    }
}

impl Drop for DownloadHandle {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_writes_bytes_to_disk() {
        let dir = tempdir().expect("temp dir");
        let handle = DownloadHandle::create(dir.path(), b"PK\x03\x04payload").unwrap();

        let on_disk = fs::read(handle.path()).unwrap();
        assert_eq!(on_disk, b"PK\x03\x04payload");
    }

    #[test]
    fn release_deletes_the_file() {
        let dir = tempdir().expect("temp dir");
        let handle = DownloadHandle::create(dir.path(), b"bytes").unwrap();
        let path = handle.path().to_path_buf();

        handle.release();
        assert!(!path.exists());
    }

    #[test]
    fn drop_deletes_unreleased_file() {
        let dir = tempdir().expect("temp dir");
        let path = {
            let handle = DownloadHandle::create(dir.path(), b"bytes").unwrap();
            handle.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn consecutive_handles_get_distinct_paths() {
        let dir = tempdir().expect("temp dir");
        let a = DownloadHandle::create(dir.path(), b"a").unwrap();
        let b = DownloadHandle::create(dir.path(), b"b").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn create_makes_missing_directories() {
        let dir = tempdir().expect("temp dir");
        let nested = dir.path().join("downloads");
        let handle = DownloadHandle::create(&nested, b"x").unwrap();
        assert!(handle.path().exists());
    }
}

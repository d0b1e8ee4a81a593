//! JSON-file-based storage backend.
//!
//! Stores the snapshot in a single JSON file under a configurable
//! directory (default: `$XDG_DATA_HOME/merchant-capture/`).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use core::future::{self, Future};

use crate::error::{CaptureError, Result};
use crate::models::Snapshot;

/// Application name used for the XDG data directory.
const APP_NAME: &str = "merchant-capture";

/// File holding the value stored under [`super::STATE_KEY`].
const STATE_FILE: &str = "extracted_data.json";
/// Sentinel file used for cross-process file locking.
const LOCK_FILE: &str = "storage.lock";

/// File-backed storage that persists the snapshot as JSON.
///
/// # Concurrency
///
/// Thread safety within a single process is provided by an in-process
/// [`Mutex`]. Cross-process safety is achieved via an advisory file lock
/// on `storage.lock` (using [`std::fs::File::lock`] /
/// [`std::fs::File::lock_shared`]).
///
/// Read operations acquire a shared lock (allowing concurrent readers),
/// while write operations acquire an exclusive lock.
///
/// # File layout
///
/// ```text
/// <dir>/
///   storage.lock          (cross-process lock sentinel)
///   extracted_data.json
/// ```
#[derive(Debug)]
pub struct FileStorage {
    /// Root directory containing the state file.
    dir: PathBuf,
    /// Mutex serializing concurrent in-process access.
    lock: Mutex<()>,
    /// Sentinel file for cross-process advisory locking.
    lock_file: fs::File,
}

impl FileStorage {
    /// Creates a new file storage rooted at the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist. Also
    /// opens (or creates) the `storage.lock` sentinel file used for
    /// cross-process advisory locking.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock
    /// file cannot be opened.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(storage_io_error)?;
        let lock_file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .map_err(storage_io_error)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
            lock_file,
        })
    }

    /// Returns the default XDG-compliant data directory for this application.
    ///
    /// On Linux: `$XDG_DATA_HOME/merchant-capture/` (typically
    /// `~/.local/share/merchant-capture/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform data directory cannot be determined.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|data_path| data_path.join(APP_NAME))
            .ok_or_else(|| {
                CaptureError::Storage("could not determine platform data directory".into())
            })
    }

    /// Returns the directory this storage writes to.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ── Private helpers ─────────────────────────────────────────────

    /// Returns the full path for a given file name.
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Acquires an in-process mutex guard and a shared (read) file lock,
    /// executes `op`, then releases the file lock.
    fn with_shared_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock_shared().map_err(storage_io_error)?;
        let result = op();
        // Only surface the unlock error when the operation succeeded;
        // otherwise the original error is more useful.
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Acquires an in-process mutex guard and an exclusive (write) file
    /// lock, executes `op`, then releases the file lock.
    fn with_exclusive_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock().map_err(storage_io_error)?;
        let result = op();
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Reads and parses the state file. Returns `None` if the file does
    /// not exist.
    fn read_state(&self) -> Result<Option<serde_json::Value>> {
        self.with_shared_lock(|| match fs::read_to_string(self.path(STATE_FILE)) {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(CaptureError::from),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_io_error(err)),
        })
    }

    /// Atomically writes the state file (write-to-tmp then rename).
    fn write_state(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot).map_err(CaptureError::from)?;
        self.with_exclusive_lock(|| {
            let tmp_path = self.path(&format!("{STATE_FILE}.tmp"));
            fs::write(&tmp_path, json).map_err(storage_io_error)?;
            fs::rename(&tmp_path, self.path(STATE_FILE)).map_err(storage_io_error)?;
            tracing::trace!(dir = %self.dir.display(), "state file written");
            Ok(())
        })
    }
}

// ── Free-standing helpers ───────────────────────────────────────────────

/// Wraps an I/O error into a [`CaptureError::Storage`].
fn storage_io_error(err: std::io::Error) -> CaptureError {
    CaptureError::Storage(Box::new(err))
}

/// Wraps a mutex poison error into a [`CaptureError::Storage`].
fn lock_poison_error<T>(err: &std::sync::PoisonError<T>) -> CaptureError {
    CaptureError::Storage(err.to_string().into())
}

// ── BlockingStorage implementation ──────────────────────────────────────

#[cfg(feature = "blocking")]
impl super::BlockingStorage for FileStorage {
    #[inline]
    fn load(&self) -> Result<Option<serde_json::Value>> {
        self.read_state()
    }
}

// ── Storage (async) implementation ──────────────────────────────────────

impl super::Storage for FileStorage {
    #[inline]
    fn load(&self) -> impl Future<Output = Result<Option<serde_json::Value>>> + Send {
        future::ready(self.read_state())
    }

    #[inline]
    fn save(&self, snapshot: &Snapshot) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.write_state(snapshot))
    }
}

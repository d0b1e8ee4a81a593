//! In-memory storage backend for testing.
//!
//! Provides [`InMemoryStorage`], a thread-safe in-memory implementation of
//! the storage traits. Ideal for unit tests and for sessions where nothing
//! should survive the process.

use std::sync::Mutex;

use core::future::{self, Future};

use crate::error::{CaptureError, Result};
use crate::models::Snapshot;

/// Thread-safe in-memory storage for testing.
///
/// This type implements both [`super::Storage`] (async) and
/// [`super::BlockingStorage`] (blocking) traits, providing a zero-setup
/// storage backend for tests.
///
/// The stored value is kept as raw JSON, exactly as a durable backend
/// would hand it back, so older layouts can be seeded with
/// [`InMemoryStorage::with_raw`].
///
/// # Example
///
/// ```rust
/// use merchant_capture::storage::InMemoryStorage;
///
/// let storage = InMemoryStorage::new();
/// assert_eq!(storage.save_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    /// All state behind a single mutex for thread-safe interior mutability.
    inner: Mutex<Inner>,
}

/// Inner mutable state.
#[derive(Debug, Default)]
struct Inner {
    /// Persisted value under the state key.
    value: Option<serde_json::Value>,
    /// Number of successful saves.
    saves: usize,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory storage.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage pre-seeded with a raw persisted value.
    #[inline]
    #[must_use]
    pub fn with_raw(value: serde_json::Value) -> Self {
        Self {
            inner: Mutex::new(Inner {
                value: Some(value),
                saves: 0,
            }),
        }
    }

    /// Returns the last saved snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is not a current-shape snapshot
    /// or the lock is poisoned.
    #[inline]
    pub fn persisted(&self) -> Result<Option<Snapshot>> {
        let raw = self.with_lock(|inner| inner.value.clone())?;
        raw.map(serde_json::from_value)
            .transpose()
            .map_err(CaptureError::from)
    }

    /// Returns how many times a snapshot has been saved.
    #[inline]
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.with_lock(|inner| inner.saves).unwrap_or_default()
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R> {
        let mut inner = self.inner.lock().map_err(|err| lock_error(&err))?;
        Ok(f(&mut inner))
    }

    /// Serializes and stores a snapshot.
    fn store(&self, snapshot: &Snapshot) -> Result<()> {
        let value = serde_json::to_value(snapshot)?;
        self.with_lock(|inner| {
            inner.value = Some(value);
            inner.saves += 1;
        })
    }
}

/// Wraps a mutex poison error.
fn lock_error<T>(err: &std::sync::PoisonError<T>) -> CaptureError {
    CaptureError::Storage(err.to_string().into())
}

// ── BlockingStorage implementation ──────────────────────────────────────

#[cfg(feature = "blocking")]
impl super::BlockingStorage for InMemoryStorage {
    #[inline]
    fn load(&self) -> Result<Option<serde_json::Value>> {
        self.with_lock(|inner| inner.value.clone())
    }
}

// ── Storage (async) implementation ──────────────────────────────────────

impl super::Storage for InMemoryStorage {
    #[inline]
    fn load(&self) -> impl Future<Output = Result<Option<serde_json::Value>>> + Send {
        future::ready(self.with_lock(|inner| inner.value.clone()))
    }

    #[inline]
    fn save(&self, snapshot: &Snapshot) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.store(snapshot))
    }
}

//! Runtime configuration for the capture store and bridge.

use core::time::Duration;
use std::path::PathBuf;

use crate::error::{CaptureError, Result};

/// Environment variable overriding the pending-slot deadline, in
/// milliseconds.
pub const PENDING_TIMEOUT_ENV: &str = "MERCHANT_CAPTURE_PENDING_TIMEOUT_MS";

/// Environment variable listing bridge origins, comma separated.
pub const ALLOWED_ORIGINS_ENV: &str = "MERCHANT_CAPTURE_ALLOWED_ORIGINS";

/// Environment variable overriding the storage directory.
pub const DATA_DIR_ENV: &str = "MERCHANT_CAPTURE_DATA_DIR";

/// How long a captured credential waits for identity before it is
/// persisted on its own.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(5);

/// Origins the read bridge answers when nothing else is configured.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000"];

/// Settings shared by the store, the bridge and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Deadline for a pending slot.
    pub pending_timeout: Duration,
    /// Origins allowed to read snapshots through the bridge.
    pub allowed_origins: Vec<String>,
    /// Storage directory override.
    pub data_dir: Option<PathBuf>,
}

impl Default for CaptureConfig {
    #[inline]
    fn default() -> Self {
        Self {
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|&origin| origin.to_owned())
                .collect(),
            data_dir: None,
        }
    }
}

impl CaptureConfig {
    /// Loads configuration from the process environment, falling back to
    /// defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Config`] if a variable is set but invalid.
    #[inline]
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Config`] if a value is present but invalid.
    #[inline]
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(PENDING_TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            let millis: u64 = raw.trim().parse().map_err(|err| {
                CaptureError::Config(format!("{PENDING_TIMEOUT_ENV}={raw}: {err}"))
            })?;
            if millis == 0 {
                return Err(CaptureError::Config(format!(
                    "{PENDING_TIMEOUT_ENV} must be positive"
                )));
            }
            config.pending_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(ALLOWED_ORIGINS_ENV) {
            config.allowed_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(raw) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(raw));
        }
        tracing::debug!(
            pending_timeout_ms = config.pending_timeout.as_millis(),
            origins = config.allowed_origins.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Sets the pending-slot deadline.
    #[inline]
    #[must_use]
    pub const fn pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }

    /// Replaces the bridge allow-list.
    #[inline]
    #[must_use]
    pub fn allowed_origins<I, T>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the storage directory.
    #[inline]
    #[must_use]
    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }
}

//! Error types for the merchant capture library.

/// All errors that can occur when using the capture store.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistent storage backend failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),

    /// The store task has shut down and no longer accepts commands.
    #[error("merchant store is no longer running")]
    StoreClosed,

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_from_serde_json() {
        let serde_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err = CaptureError::from(serde_err);
        assert!(matches!(err, CaptureError::Serialization(_)));
        assert!(err.to_string().contains("serialization error"));
    }

    #[test]
    fn error_storage_display() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let err = CaptureError::Storage(Box::new(inner));
        let msg = err.to_string();
        assert!(msg.contains("storage error"));
        assert!(msg.contains("read-only volume"));
    }

    #[test]
    fn error_store_closed_display() {
        assert!(CaptureError::StoreClosed.to_string().contains("no longer running"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CaptureError>();
    }
}

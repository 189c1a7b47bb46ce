//! Error types for storage collaborators.

use docindex_types::SyncError;
use thiserror::Error;

/// Error reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend-specific failure (I/O, remote error, malformed data)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Failed to decode stored data
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The operation was cancelled via its cancellation token
    #[error("Operation cancelled")]
    Cancelled,
}

impl StorageError {
    pub fn backend(message: impl Into<String>) -> Self {
        StorageError::Backend(message.into())
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Cancelled => SyncError::Cancelled,
            StorageError::Decode(e) => SyncError::Serialization(e),
            other => SyncError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_maps_to_cancelled() {
        let err: SyncError = StorageError::Cancelled.into();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_backend_maps_to_storage() {
        let err: SyncError = StorageError::backend("index down").into();
        assert!(matches!(err, SyncError::Storage(_)));
        assert_eq!(err.to_string(), "Storage error: Backend error: index down");
    }
}

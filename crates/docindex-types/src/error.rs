//! Error types for the doc-index-sync system.

use thiserror::Error;

/// Unified error type for sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error reported by a storage collaborator
    #[error("Storage error: {0}")]
    Storage(String),

    /// Connection attempt did not complete within the configured timeout
    #[error("Connect to storage timeout")]
    ConnectTimeout,

    /// The operation was cancelled via its cancellation token.
    ///
    /// Never treated as a fault by the engine; it unwinds silently.
    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether this error is a cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_not_a_fault() {
        assert!(SyncError::Cancelled.is_cancelled());
        assert!(!SyncError::ConnectTimeout.is_cancelled());
        assert!(!SyncError::Storage("boom".into()).is_cancelled());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            SyncError::ConnectTimeout.to_string(),
            "Connect to storage timeout"
        );
        assert_eq!(
            SyncError::Storage("index down".into()).to_string(),
            "Storage error: index down"
        );
    }
}

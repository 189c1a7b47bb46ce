//! Derived progress snapshots exposed to a host UI.
//!
//! Both states are recomputed from the queue and the known-document sets on
//! every change; nothing here is stored.

use serde::{Deserialize, Serialize};

/// Aggregate sync progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Number of documents waiting in the queue, plus the one currently
    /// being processed if any.
    pub queued_count: usize,
    /// Whether every known document has been indexed.
    ///
    /// Display only. Logic that needs a completion guarantee should await
    /// `wait_for_completed` instead of polling this flag.
    pub completed: bool,
    /// Total number of documents in the workspace, including the root.
    pub total_known: usize,
    /// Last error reported by the engine, cleared on reconnect.
    pub error_message: Option<String>,
}

impl SyncState {
    /// State reported while the local index backend is read-only.
    pub fn readonly() -> Self {
        Self {
            queued_count: 0,
            completed: true,
            total_known: 0,
            error_message: None,
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            queued_count: 0,
            completed: false,
            total_known: 0,
            error_message: None,
        }
    }
}

/// Per-document sync progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSyncState {
    /// Whether the document is waiting in the queue or being processed.
    pub queued: bool,
    /// Whether the document is present in the index and not queued.
    ///
    /// Display only, same caveat as [`SyncState::completed`].
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_not_completed() {
        let state = SyncState::default();
        assert!(!state.completed);
        assert_eq!(state.queued_count, 0);
        assert_eq!(state.error_message, None);
    }

    #[test]
    fn test_readonly_reports_completed() {
        let state = SyncState::readonly();
        assert!(state.completed);
        assert_eq!(state.queued_count, 0);
    }
}

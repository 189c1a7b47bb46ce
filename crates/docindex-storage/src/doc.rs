//! Document storage: snapshots, clocks, and the change-notification stream.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use docindex_types::{DocClock, DocId};

use crate::connection::ConnectionState;
use crate::error::StorageError;

/// A document's current binary snapshot.
#[derive(Debug, Clone)]
pub struct DocSnapshot {
    pub doc_id: DocId,
    pub bin: Vec<u8>,
}

/// One entry of the append-only update log.
#[derive(Debug, Clone)]
pub struct DocUpdate {
    pub doc_id: DocId,
    pub bin: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Callback invoked for every update-log entry.
///
/// Callbacks run on the storage's notification context and must only do
/// cheap bookkeeping (the engine's callback applies root updates and
/// enqueues jobs, nothing more).
pub type DocUpdateCallback = Arc<dyn Fn(DocUpdate) + Send + Sync>;

/// Subscription guard; the callback is unregistered when dropped.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Storage of CRDT documents and their update log.
#[async_trait]
pub trait DocStorage: Send + Sync {
    /// Current binary snapshot of a document, or `None` if it was deleted.
    async fn get_doc(&self, id: &DocId) -> Result<Option<DocSnapshot>, StorageError>;

    /// Current logical clock of a document, or `None` if it was deleted.
    async fn get_doc_timestamp(&self, id: &DocId) -> Result<Option<DocClock>, StorageError>;

    /// Register a callback for update-log entries.
    fn subscribe_doc_update(&self, callback: DocUpdateCallback) -> Subscription;

    fn connection(&self) -> &ConnectionState;
}

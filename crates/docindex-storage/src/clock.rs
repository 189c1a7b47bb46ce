//! Persistence of per-document indexed clocks.
//!
//! Indexed clocks are the sync engine's only durable state; everything else
//! is rebuilt from scratch on every (re)connect cycle. Clearing a clock
//! forces full reprocessing if the document ever reappears.

use async_trait::async_trait;

use docindex_types::{DocId, IndexedClock};

use crate::connection::ConnectionState;
use crate::error::StorageError;

/// Storage of indexed clocks.
#[async_trait]
pub trait ClockStorage: Send + Sync {
    async fn get_doc_indexed_clock(
        &self,
        id: &DocId,
    ) -> Result<Option<IndexedClock>, StorageError>;

    async fn set_doc_indexed_clock(&self, clock: IndexedClock) -> Result<(), StorageError>;

    async fn clear_doc_indexed_clock(&self, id: &DocId) -> Result<(), StorageError>;

    fn connection(&self) -> &ConnectionState;
}

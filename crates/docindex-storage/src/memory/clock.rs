//! In-memory indexed-clock storage.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use docindex_types::{DocId, IndexedClock};

use crate::clock::ClockStorage;
use crate::connection::ConnectionState;
use crate::error::StorageError;

/// In-memory [`ClockStorage`].
///
/// Unlike the other memory backends this one stands in for genuinely
/// durable storage; tests rely on it surviving engine restarts within a
/// process.
pub struct MemoryClockStorage {
    clocks: Mutex<HashMap<DocId, IndexedClock>>,
    connection: ConnectionState,
}

impl MemoryClockStorage {
    pub fn new() -> Self {
        Self {
            clocks: Mutex::new(HashMap::new()),
            connection: ConnectionState::connected(),
        }
    }

    pub fn len(&self) -> usize {
        self.clocks.lock().expect("clock lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection
    }
}

impl Default for MemoryClockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClockStorage for MemoryClockStorage {
    async fn get_doc_indexed_clock(
        &self,
        id: &DocId,
    ) -> Result<Option<IndexedClock>, StorageError> {
        let clocks = self.clocks.lock().expect("clock lock poisoned");
        Ok(clocks.get(id).cloned())
    }

    async fn set_doc_indexed_clock(&self, clock: IndexedClock) -> Result<(), StorageError> {
        let mut clocks = self.clocks.lock().expect("clock lock poisoned");
        clocks.insert(clock.doc_id.clone(), clock);
        Ok(())
    }

    async fn clear_doc_indexed_clock(&self, id: &DocId) -> Result<(), StorageError> {
        let mut clocks = self.clocks.lock().expect("clock lock poisoned");
        clocks.remove(id);
        Ok(())
    }

    fn connection(&self) -> &ConnectionState {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_set_get_clear() {
        let storage = MemoryClockStorage::new();
        let id = DocId::new("d1");
        assert!(storage.get_doc_indexed_clock(&id).await.unwrap().is_none());

        let clock = IndexedClock::new(id.clone(), Utc::now(), 1);
        storage.set_doc_indexed_clock(clock.clone()).await.unwrap();
        assert_eq!(
            storage.get_doc_indexed_clock(&id).await.unwrap(),
            Some(clock)
        );

        storage.clear_doc_indexed_clock(&id).await.unwrap();
        assert!(storage.get_doc_indexed_clock(&id).await.unwrap().is_none());
        assert!(storage.is_empty());
    }
}

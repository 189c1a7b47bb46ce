//! In-memory document storage with a synchronous update-log fanout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use docindex_types::{DocClock, DocId};

use crate::connection::ConnectionState;
use crate::doc::{DocSnapshot, DocStorage, DocUpdate, DocUpdateCallback, Subscription};
use crate::error::StorageError;

#[derive(Debug, Clone)]
struct StoredDoc {
    updates: Vec<Vec<u8>>,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<DocId, StoredDoc>,
    subscribers: HashMap<u64, DocUpdateCallback>,
    next_subscriber: u64,
}

/// In-memory [`DocStorage`].
///
/// Snapshots are the concatenation of all updates applied to a document; an
/// update whose bytes are a JSON array is merged element-wise, matching the
/// [`RootOp`](super::RootOp) encoding, so root snapshots replay cleanly.
pub struct MemoryDocStorage {
    inner: Arc<Mutex<Inner>>,
    connection: ConnectionState,
}

impl MemoryDocStorage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            connection: ConnectionState::connected(),
        }
    }

    /// Next timestamp for a mutation: wall clock, bumped so it strictly
    /// exceeds the document's previous clock at millisecond precision —
    /// [`IndexedClock::is_up_to_date`](docindex_types::IndexedClock) compares
    /// at that granularity, so two mutations in the same millisecond would
    /// otherwise look unchanged.
    fn advanced_timestamp(prev: Option<&StoredDoc>) -> DateTime<Utc> {
        let now = Utc::now();
        match prev {
            Some(doc) if now.timestamp_millis() <= doc.timestamp.timestamp_millis() => {
                doc.timestamp + chrono::Duration::milliseconds(1)
            }
            _ => now,
        }
    }

    /// Replace a document's content with a single snapshot.
    pub fn put_doc(&self, id: impl Into<DocId>, bin: Vec<u8>) {
        let id = id.into();
        let timestamp = {
            let mut inner = self.inner.lock().expect("doc storage lock poisoned");
            let timestamp = Self::advanced_timestamp(inner.docs.get(&id));
            inner.docs.insert(
                id.clone(),
                StoredDoc {
                    updates: vec![bin.clone()],
                    timestamp,
                },
            );
            timestamp
        };
        self.notify(DocUpdate {
            doc_id: id,
            bin,
            timestamp,
        });
    }

    /// Append one update-log entry to a document, advancing its clock.
    pub fn append_update(&self, id: impl Into<DocId>, bin: Vec<u8>) {
        let id = id.into();
        let timestamp = {
            let mut inner = self.inner.lock().expect("doc storage lock poisoned");
            let timestamp = Self::advanced_timestamp(inner.docs.get(&id));
            let doc = inner.docs.entry(id.clone()).or_insert_with(|| StoredDoc {
                updates: Vec::new(),
                timestamp,
            });
            doc.updates.push(bin.clone());
            doc.timestamp = timestamp;
            timestamp
        };
        self.notify(DocUpdate {
            doc_id: id,
            bin,
            timestamp,
        });
    }

    /// Re-notify subscribers without changing the document's clock.
    pub fn touch(&self, id: impl Into<DocId>) {
        let id = id.into();
        let update = {
            let inner = self.inner.lock().expect("doc storage lock poisoned");
            inner.docs.get(&id).map(|doc| DocUpdate {
                doc_id: id.clone(),
                bin: Self::merge_updates(&doc.updates),
                timestamp: doc.timestamp,
            })
        };
        if let Some(update) = update {
            self.notify(update);
        }
    }

    /// Delete a document. Subscribers are not notified; deletion is
    /// observed through the root structure.
    pub fn remove_doc(&self, id: &DocId) {
        let mut inner = self.inner.lock().expect("doc storage lock poisoned");
        inner.docs.remove(id);
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection
    }

    fn notify(&self, update: DocUpdate) {
        // Invoke callbacks outside the lock so they may call back into us.
        let callbacks: Vec<DocUpdateCallback> = {
            let inner = self.inner.lock().expect("doc storage lock poisoned");
            inner.subscribers.values().cloned().collect()
        };
        for callback in callbacks {
            callback(update.clone());
        }
    }

    fn merge_updates(updates: &[Vec<u8>]) -> Vec<u8> {
        if updates.len() == 1 {
            return updates[0].clone();
        }
        // Concatenate JSON-array updates element-wise; anything else keeps
        // only the latest update.
        let mut merged = Vec::new();
        for update in updates {
            match serde_json::from_slice::<Vec<serde_json::Value>>(update) {
                Ok(ops) => merged.extend(ops),
                Err(_) => return updates.last().cloned().unwrap_or_default(),
            }
        }
        serde_json::to_vec(&merged).expect("merged ops are always serializable")
    }
}

impl Default for MemoryDocStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocStorage for MemoryDocStorage {
    async fn get_doc(&self, id: &DocId) -> Result<Option<DocSnapshot>, StorageError> {
        let inner = self.inner.lock().expect("doc storage lock poisoned");
        Ok(inner.docs.get(id).map(|doc| DocSnapshot {
            doc_id: id.clone(),
            bin: Self::merge_updates(&doc.updates),
        }))
    }

    async fn get_doc_timestamp(&self, id: &DocId) -> Result<Option<DocClock>, StorageError> {
        let inner = self.inner.lock().expect("doc storage lock poisoned");
        Ok(inner
            .docs
            .get(id)
            .map(|doc| DocClock::new(id.clone(), doc.timestamp)))
    }

    fn subscribe_doc_update(&self, callback: DocUpdateCallback) -> Subscription {
        let id = {
            let mut inner = self.inner.lock().expect("doc storage lock poisoned");
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.insert(id, callback);
            id
        };

        let inner = Arc::clone(&self.inner);
        Subscription::new(move || {
            if let Ok(mut inner) = inner.lock() {
                inner.subscribers.remove(&id);
            }
        })
    }

    fn connection(&self) -> &ConnectionState {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::super::RootOp;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_snapshot_merges_root_ops() {
        let storage = MemoryDocStorage::new();
        storage.append_update("root", RootOp::encode(&[RootOp::upsert("d1", "A")]));
        storage.append_update("root", RootOp::encode(&[RootOp::upsert("d2", "B")]));

        let snapshot = storage
            .get_doc(&DocId::new("root"))
            .await
            .unwrap()
            .unwrap();
        let ops: Vec<serde_json::Value> = serde_json::from_slice(&snapshot.bin).unwrap();
        assert_eq!(ops.len(), 2);
    }

    #[tokio::test]
    async fn test_timestamp_advances_on_update_only() {
        let storage = MemoryDocStorage::new();
        storage.put_doc("d1", b"content".to_vec());
        let first = storage
            .get_doc_timestamp(&DocId::new("d1"))
            .await
            .unwrap()
            .unwrap();

        storage.touch("d1");
        let touched = storage
            .get_doc_timestamp(&DocId::new("d1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.timestamp, touched.timestamp);

        storage.put_doc("d1", b"changed".to_vec());
        let changed = storage
            .get_doc_timestamp(&DocId::new("d1"))
            .await
            .unwrap()
            .unwrap();
        assert!(changed.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_subscription_fanout_and_drop() {
        let storage = MemoryDocStorage::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let subscription = storage.subscribe_doc_update(Arc::new({
            let seen = Arc::clone(&seen);
            move |_update| {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        storage.put_doc("d1", b"one".to_vec());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        drop(subscription);
        storage.put_doc("d1", b"two".to_vec());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_doc_is_none() {
        let storage = MemoryDocStorage::new();
        assert!(storage.get_doc(&DocId::new("nope")).await.unwrap().is_none());
        assert!(storage
            .get_doc_timestamp(&DocId::new("nope"))
            .await
            .unwrap()
            .is_none());
    }
}

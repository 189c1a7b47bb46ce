//! Blocking, re-prioritizable job queue keyed by document id.
//!
//! A given id appears at most once as a pending job; pushing an id that is
//! already pending updates its priority in place. Jobs are yielded by
//! priority, ties broken by insertion order.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use docindex_types::{DocId, SyncError};

#[derive(Debug, Clone, Copy)]
struct Entry {
    priority: i64,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<DocId, Entry>,
    // Ordered view: smallest key is the next job to pop.
    order: BTreeSet<(Reverse<i64>, u64, DocId)>,
    next_seq: u64,
}

impl Inner {
    fn insert(&mut self, id: DocId, priority: i64, seq: u64) {
        self.order.insert((Reverse(priority), seq, id.clone()));
        self.entries.insert(id, Entry { priority, seq });
    }

    fn remove(&mut self, id: &DocId) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        self.order
            .remove(&(Reverse(entry.priority), entry.seq, id.clone()));
        Some(entry)
    }
}

/// Async priority queue of pending index jobs.
pub struct JobQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    /// Enqueue a job, or update its priority if it is already pending.
    ///
    /// Re-pushing keeps the original insertion order for FIFO tie-breaks.
    pub fn push(&self, id: DocId, priority: i64) {
        {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            let seq = match inner.remove(&id) {
                Some(existing) => existing.seq,
                None => {
                    let seq = inner.next_seq;
                    inner.next_seq += 1;
                    seq
                }
            };
            inner.insert(id, priority, seq);
        }
        self.notify.notify_one();
    }

    /// Update the priority of a pending job. No-op if the id is not queued.
    pub fn set_priority(&self, id: &DocId, priority: i64) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if let Some(existing) = inner.remove(id) {
            inner.insert(id.clone(), priority, existing.seq);
        }
    }

    /// Wait for a job and pop the highest-priority id.
    ///
    /// Returns [`SyncError::Cancelled`] if the token fires first.
    /// Cancellation wins over pending jobs, so a cancelled caller never
    /// takes work a successor should handle.
    pub async fn async_pop(&self, token: &CancellationToken) -> Result<DocId, SyncError> {
        loop {
            if token.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                if let Some((_, _, id)) = inner.order.first().cloned() {
                    inner.remove(&id);
                    return Ok(id);
                }
            }
            tokio::select! {
                _ = token.cancelled() => return Err(SyncError::Cancelled),
                _ = self.notify.notified() => {}
            }
        }
    }

    pub fn has(&self, id: &DocId) -> bool {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .entries
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").entries.len()
    }

    /// Ids of all pending jobs, in no particular order.
    pub fn ids(&self) -> Vec<DocId> {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .entries
            .keys()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.entries.clear();
        inner.order.clear();
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

//! Sync status: known-document sets, current job, and progress publication.
//!
//! All mutable engine state lives here. The root structure has its own lock
//! so a running crawl never blocks status reads or leaf change
//! notifications; everything else sits behind one bookkeeping lock.
//! Observers never touch either directly; every mutation publishes an
//! immutable [`StatusSnapshot`] through a watch channel, which gives
//! multicast and replay-latest semantics for free.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use docindex_storage::{DocUpdate, RootStructure};
use docindex_types::{DocId, DocMeta, DocSyncState, SyncError, SyncState};

use crate::queue::JobQueue;

/// Immutable view of the engine's progress, derived on every change.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: SyncState,
    queued: HashSet<DocId>,
    indexed: HashSet<DocId>,
    readonly: bool,
}

impl StatusSnapshot {
    fn initial() -> Self {
        Self {
            state: SyncState::default(),
            queued: HashSet::new(),
            indexed: HashSet::new(),
            readonly: false,
        }
    }

    /// Progress of a single document.
    pub fn doc_state(&self, id: &DocId) -> DocSyncState {
        if self.readonly {
            return DocSyncState {
                queued: false,
                completed: true,
            };
        }
        let queued = self.queued.contains(id);
        DocSyncState {
            queued,
            completed: self.indexed.contains(id) && !queued,
        }
    }
}

struct Inner {
    priority_settings: HashMap<DocId, i64>,
    root_ready: bool,
    docs_in_source: HashMap<DocId, DocMeta>,
    docs_in_index: HashMap<DocId, DocMeta>,
    current_job: Option<DocId>,
    error_message: Option<String>,
    readonly: bool,
}

/// Owner of all transient engine state.
pub struct SyncStatus {
    root_id: DocId,
    queue: JobQueue,
    // Lock order: root before inner, never the reverse.
    root: Mutex<Option<Box<dyn RootStructure>>>,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<Arc<StatusSnapshot>>,
    battery_save_tx: watch::Sender<bool>,
}

impl SyncStatus {
    pub fn new(root_id: DocId) -> Self {
        Self {
            root_id,
            queue: JobQueue::new(),
            root: Mutex::new(None),
            inner: Mutex::new(Inner {
                priority_settings: HashMap::new(),
                root_ready: false,
                docs_in_source: HashMap::new(),
                docs_in_index: HashMap::new(),
                current_job: None,
                error_message: None,
                readonly: false,
            }),
            snapshot_tx: watch::channel(Arc::new(StatusSnapshot::initial())).0,
            battery_save_tx: watch::channel(false).0,
        }
    }

    pub fn root_id(&self) -> &DocId {
        &self.root_id
    }

    pub fn snapshot_rx(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Enqueue a job with the document's configured priority offset.
    ///
    /// The root id is always pinned to the maximum priority.
    pub fn schedule_job(&self, id: &DocId) {
        let inner = self.inner.lock().expect("status lock poisoned");
        let priority = if *id == self.root_id {
            i64::MAX
        } else {
            inner.priority_settings.get(id).copied().unwrap_or(0)
        };
        self.queue.push(id.clone(), priority);
        self.publish(&inner);
    }

    /// Wait for the next job, honoring battery-save mode.
    pub async fn accept_job(&self, token: &CancellationToken) -> Result<DocId, SyncError> {
        let mut battery = self.battery_save_tx.subscribe();
        loop {
            if !*battery.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = token.cancelled() => return Err(SyncError::Cancelled),
                changed = battery.changed() => {
                    if changed.is_err() {
                        return Err(SyncError::Cancelled);
                    }
                }
            }
        }

        let id = self.queue.async_pop(token).await?;
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.current_job = Some(id.clone());
        self.publish(&inner);
        Ok(id)
    }

    /// Mark the current job as finished.
    pub fn complete_job(&self) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.current_job = None;
        self.publish(&inner);
    }

    /// Apply an additive priority offset for a document.
    ///
    /// Affects both the pending queue entry (if any) and all future
    /// scheduling of this id. Offsets on the root id are ignored; its
    /// priority is pinned so it is always serviced before any leaf.
    pub fn add_priority_offset(&self, id: &DocId, delta: i64) {
        if *id == self.root_id {
            return;
        }
        let mut inner = self.inner.lock().expect("status lock poisoned");
        let setting = inner.priority_settings.entry(id.clone()).or_insert(0);
        *setting = setting.saturating_add(delta);
        let priority = *setting;
        self.queue.set_priority(id, priority);
    }

    pub fn enable_battery_save(&self) {
        self.battery_save_tx.send_replace(true);
    }

    pub fn disable_battery_save(&self) {
        self.battery_save_tx.send_replace(false);
    }

    /// Install a freshly built root structure for this cycle.
    pub fn install_root(&self, root: Box<dyn RootStructure>) {
        *self.root.lock().expect("root lock poisoned") = Some(root);
    }

    /// Recompute the live document set from the root structure.
    ///
    /// Returns the ids so the caller can schedule them.
    pub fn rebuild_source(&self, include_trash: bool) -> Vec<DocId> {
        let docs = {
            let root = self.root.lock().expect("root lock poisoned");
            match root.as_ref() {
                Some(root) => root.all_documents(include_trash),
                None => return Vec::new(),
            }
        };

        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.docs_in_source = docs.into_iter().collect();
        let ids: Vec<DocId> = inner.docs_in_source.keys().cloned().collect();
        self.publish(&inner);
        ids
    }

    /// Start processing change notifications for the root document.
    pub fn set_root_ready(&self) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.root_ready = true;
        self.publish(&inner);
    }

    /// Install the document set reconstructed from the index backend.
    pub fn set_docs_in_index(&self, docs: HashMap<DocId, DocMeta>) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.docs_in_index = docs;
        self.publish(&inner);
    }

    /// Apply one update-log entry.
    ///
    /// Root updates mutate the root structure and reconcile the source set;
    /// leaf updates only enqueue. Updates arriving before the initial root
    /// snapshot is loaded are dropped; the seed pass covers them.
    pub fn handle_doc_update(&self, update: DocUpdate, include_trash: bool) {
        {
            let inner = self.inner.lock().expect("status lock poisoned");
            if !inner.root_ready {
                return;
            }
        }

        if update.doc_id == self.root_id {
            let all = {
                let mut root = self.root.lock().expect("root lock poisoned");
                let Some(root) = root.as_mut() else {
                    return;
                };
                if let Err(error) = root.apply_update(&update.bin) {
                    warn!(doc_id = %update.doc_id, %error, "Failed to apply root update");
                    return;
                }
                root.all_documents(include_trash)
            };

            let mut discovered = Vec::new();
            {
                let mut inner = self.inner.lock().expect("status lock poisoned");
                for (id, meta) in &all {
                    match inner.docs_in_source.get(id) {
                        None => {
                            discovered.push(id.clone());
                            inner.docs_in_source.insert(id.clone(), meta.clone());
                        }
                        Some(existing) if existing.title != meta.title => {
                            inner.docs_in_source.insert(id.clone(), meta.clone());
                        }
                        Some(_) => {}
                    }
                }
                inner.docs_in_source.retain(|id, _| all.contains_key(id));
                self.publish(&inner);
            }

            for id in discovered {
                self.schedule_job(&id);
            }
            self.schedule_job(&self.root_id);
        } else {
            let known = {
                let inner = self.inner.lock().expect("status lock poisoned");
                inner.docs_in_source.contains_key(&update.doc_id)
            };
            if known {
                self.schedule_job(&update.doc_id);
            }
        }
    }

    /// Clones of both document sets for the crawl diff.
    pub fn diff_sets(&self) -> (HashMap<DocId, DocMeta>, HashMap<DocId, DocMeta>) {
        let inner = self.inner.lock().expect("status lock poisoned");
        (inner.docs_in_source.clone(), inner.docs_in_index.clone())
    }

    pub fn is_in_index(&self, id: &DocId) -> bool {
        let inner = self.inner.lock().expect("status lock poisoned");
        inner.docs_in_index.contains_key(id)
    }

    pub fn mark_indexed(&self, id: DocId, meta: DocMeta) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.docs_in_index.insert(id, meta);
        self.publish(&inner);
    }

    pub fn remove_indexed(&self, id: &DocId) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.docs_in_index.remove(id);
        self.publish(&inner);
    }

    /// Run a closure against the live root structure, if one is installed.
    ///
    /// Only the root lock is held for the duration, so status bookkeeping
    /// and leaf change notifications stay available while a crawl runs.
    pub fn with_root<R>(&self, f: impl FnOnce(&dyn RootStructure) -> R) -> Option<R> {
        let root = self.root.lock().expect("root lock poisoned");
        root.as_deref().map(f)
    }

    pub fn set_error(&self, message: String) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.error_message = Some(message);
        self.publish(&inner);
    }

    pub fn clear_error(&self) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.error_message = None;
        self.publish(&inner);
    }

    pub fn set_readonly(&self) {
        let mut inner = self.inner.lock().expect("status lock poisoned");
        inner.readonly = true;
        self.publish(&inner);
    }

    /// Discard all transient state, keeping priority settings and the last
    /// error message.
    pub fn reset(&self) {
        *self.root.lock().expect("root lock poisoned") = None;
        let mut inner = self.inner.lock().expect("status lock poisoned");
        self.queue.clear();
        inner.root_ready = false;
        inner.docs_in_source.clear();
        inner.docs_in_index.clear();
        inner.current_job = None;
        inner.readonly = false;
        self.publish(&inner);
    }

    fn publish(&self, inner: &Inner) {
        let snapshot = if inner.readonly {
            StatusSnapshot {
                state: SyncState::readonly(),
                queued: HashSet::new(),
                indexed: HashSet::new(),
                readonly: true,
            }
        } else {
            let mut queued: HashSet<DocId> = self.queue.ids().into_iter().collect();
            if let Some(current) = &inner.current_job {
                queued.insert(current.clone());
            }
            let pending = self.queue.len();
            let in_flight = usize::from(inner.current_job.is_some());
            StatusSnapshot {
                state: SyncState {
                    queued_count: pending + in_flight,
                    completed: inner.root_ready && pending == 0 && in_flight == 0,
                    total_known: inner.docs_in_source.len() + 1,
                    error_message: inner.error_message.clone(),
                },
                queued,
                indexed: inner.docs_in_index.keys().cloned().collect(),
                readonly: false,
            }
        };
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docindex_storage::memory::{MemoryRootReader, RootOp};
    use docindex_storage::RootReader;

    fn status() -> SyncStatus {
        SyncStatus::new(DocId::new("root"))
    }

    fn seeded(ops: &[RootOp]) -> SyncStatus {
        let status = status();
        let mut root = MemoryRootReader.empty_root(status.root_id());
        root.apply_update(&RootOp::encode(ops)).unwrap();
        status.install_root(root);
        status
    }

    fn update(doc_id: &str, ops: &[RootOp]) -> DocUpdate {
        DocUpdate {
            doc_id: DocId::new(doc_id),
            bin: RootOp::encode(ops),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_schedule_and_accept_updates_state() {
        let status = status();
        let token = CancellationToken::new();
        let rx = status.snapshot_rx();

        status.schedule_job(&DocId::new("d1"));
        assert_eq!(rx.borrow().state.queued_count, 1);
        assert!(rx.borrow().doc_state(&DocId::new("d1")).queued);

        let id = status.accept_job(&token).await.unwrap();
        assert_eq!(id, DocId::new("d1"));
        // Still counted while in flight.
        assert_eq!(rx.borrow().state.queued_count, 1);

        status.complete_job();
        assert_eq!(rx.borrow().state.queued_count, 0);
    }

    #[tokio::test]
    async fn test_completed_requires_root_ready_and_empty_queue() {
        let status = seeded(&[RootOp::upsert("d1", "A")]);
        let rx = status.snapshot_rx();
        assert!(!rx.borrow().state.completed);

        status.set_root_ready();
        assert!(rx.borrow().state.completed);

        status.schedule_job(&DocId::new("d1"));
        assert!(!rx.borrow().state.completed);
    }

    #[tokio::test]
    async fn test_doc_completed_needs_index_membership() {
        let status = status();
        let rx = status.snapshot_rx();
        let d1 = DocId::new("d1");

        assert!(!rx.borrow().doc_state(&d1).completed);

        status.mark_indexed(d1.clone(), DocMeta::with_title("A"));
        assert!(rx.borrow().doc_state(&d1).completed);

        status.schedule_job(&d1);
        let state = rx.borrow().doc_state(&d1);
        assert!(state.queued);
        assert!(!state.completed);
    }

    #[tokio::test]
    async fn test_root_update_discovers_and_removes_docs() {
        let status = seeded(&[RootOp::upsert("d1", "A")]);
        status.set_root_ready();
        let _ = status.rebuild_source(false);
        let token = CancellationToken::new();

        status.handle_doc_update(
            update("root", &[RootOp::upsert("d2", "B"), RootOp::remove("d1")]),
            false,
        );

        let (source, _) = status.diff_sets();
        assert!(source.contains_key(&DocId::new("d2")));
        assert!(!source.contains_key(&DocId::new("d1")));

        // Root job was re-queued with top priority.
        let first = status.accept_job(&token).await.unwrap();
        assert_eq!(first, DocId::new("root"));
    }

    #[tokio::test]
    async fn test_leaf_update_only_schedules_known_docs() {
        let status = seeded(&[RootOp::upsert("d1", "A")]);
        status.set_root_ready();
        let _ = status.rebuild_source(false);

        status.handle_doc_update(update("stranger", &[]), false);
        let rx = status.snapshot_rx();
        assert!(!rx.borrow().doc_state(&DocId::new("stranger")).queued);

        status.handle_doc_update(update("d1", &[]), false);
        assert!(rx.borrow().doc_state(&DocId::new("d1")).queued);
    }

    #[tokio::test]
    async fn test_leaf_update_lands_while_root_is_borrowed() {
        let status = seeded(&[RootOp::upsert("d1", "A")]);
        status.set_root_ready();
        let _ = status.rebuild_source(false);

        // A crawl holds the root structure; the notification path must not
        // wait for it.
        status.with_root(|_root| {
            status.handle_doc_update(update("d1", &[]), false);
        });

        let rx = status.snapshot_rx();
        assert!(rx.borrow().doc_state(&DocId::new("d1")).queued);
    }

    #[tokio::test]
    async fn test_updates_before_root_ready_are_dropped() {
        let status = seeded(&[]);
        status.handle_doc_update(update("root", &[RootOp::upsert("d1", "A")]), false);
        let (source, _) = status.diff_sets();
        assert!(source.is_empty());
    }

    #[tokio::test]
    async fn test_reset_keeps_error_and_priorities() {
        let status = seeded(&[RootOp::upsert("d1", "A")]);
        status.set_root_ready();
        let _ = status.rebuild_source(false);
        status.schedule_job(&DocId::new("d1"));
        status.set_error("boom".to_string());
        status.add_priority_offset(&DocId::new("d1"), 10);

        status.reset();

        let rx = status.snapshot_rx();
        let snapshot = rx.borrow();
        assert_eq!(snapshot.state.queued_count, 0);
        assert_eq!(snapshot.state.total_known, 1);
        assert_eq!(snapshot.state.error_message.as_deref(), Some("boom"));
        drop(snapshot);

        // Priority offsets survive the reset.
        let token = CancellationToken::new();
        status.schedule_job(&DocId::new("d0"));
        status.schedule_job(&DocId::new("d1"));
        assert_eq!(status.accept_job(&token).await.unwrap(), DocId::new("d1"));
    }

    #[tokio::test]
    async fn test_root_priority_is_pinned() {
        let status = status();
        let token = CancellationToken::new();

        // Boost-and-revert cycles on the root id must not erode its
        // priority below any boosted leaf.
        status.add_priority_offset(&DocId::new("root"), 100);
        status.add_priority_offset(&DocId::new("root"), -100);
        status.add_priority_offset(&DocId::new("d1"), 50);

        status.schedule_job(&DocId::new("d1"));
        status.schedule_job(&DocId::new("root"));

        assert_eq!(status.accept_job(&token).await.unwrap(), DocId::new("root"));
    }

    #[tokio::test]
    async fn test_readonly_snapshot() {
        let status = status();
        status.set_readonly();
        let rx = status.snapshot_rx();
        assert!(rx.borrow().state.completed);
        assert_eq!(rx.borrow().state.queued_count, 0);
        let doc = rx.borrow().doc_state(&DocId::new("any"));
        assert!(doc.completed);
        assert!(!doc.queued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_battery_save_suspends_accept() {
        let status = Arc::new(status());
        let token = CancellationToken::new();

        status.enable_battery_save();
        status.schedule_job(&DocId::new("d1"));

        let accept = {
            let status = Arc::clone(&status);
            let token = token.clone();
            tokio::spawn(async move { status.accept_job(&token).await })
        };

        // Queue length is reported even while suspended.
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        assert!(!accept.is_finished());
        assert_eq!(status.snapshot_rx().borrow().state.queued_count, 1);

        status.disable_battery_save();
        assert_eq!(accept.await.unwrap().unwrap(), DocId::new("d1"));
    }
}

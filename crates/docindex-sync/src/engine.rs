//! The sync engine: supervision, crawl & diff, and leaf indexing.
//!
//! One worker task owns the whole pipeline. Change notifications only ever
//! enqueue work; every index write goes through the worker, so backend
//! writes are serialized without locks. Any unhandled error tears the cycle
//! down, discards all in-memory state, and reconnects after a fixed delay;
//! the persisted per-document clocks make the rebuild cheap because only
//! genuinely stale documents are reprocessed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use docindex_storage::{
    ClockStorage, ContentCrawler, CrawlInput, DocStorage, IndexStorage, RootReader,
};
use docindex_types::{
    AggregateResult, DocId, DocMeta, DocSyncState, IndexDocument, IndexTable, IndexedClock, Query,
    SearchOptions, SearchResult, SyncConfig, SyncError, SyncState,
};

use crate::router::{Prefer, QueryRouter};
use crate::status::SyncStatus;
use crate::stream::Throttle;

/// Schema version of the indexing logic. Bump to re-index all documents.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Reverts a priority offset when dropped.
///
/// Returned by [`SyncEngine::add_priority`]; hold it for as long as the
/// document should stay boosted (typically while it is open in the UI).
pub struct PriorityGuard {
    status: Arc<SyncStatus>,
    id: DocId,
    delta: i64,
}

impl Drop for PriorityGuard {
    fn drop(&mut self) {
        self.status
            .add_priority_offset(&self.id, 0i64.saturating_sub(self.delta));
    }
}

struct EngineShared {
    config: SyncConfig,
    doc: Arc<dyn DocStorage>,
    local: Arc<dyn IndexStorage>,
    clocks: Arc<dyn ClockStorage>,
    crawler: Arc<dyn ContentCrawler>,
    reader: Arc<dyn RootReader>,
    status: Arc<SyncStatus>,
    router: QueryRouter,
    // Incremented on every start(); a superseded worker must not touch
    // shared status on its way out.
    generation: AtomicU64,
}

/// Incremental index-synchronization engine for one workspace.
pub struct SyncEngine {
    shared: Arc<EngineShared>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root_id: DocId,
        doc: Arc<dyn DocStorage>,
        local: Arc<dyn IndexStorage>,
        remote: Option<Arc<dyn IndexStorage>>,
        clocks: Arc<dyn ClockStorage>,
        crawler: Arc<dyn ContentCrawler>,
        reader: Arc<dyn RootReader>,
        config: SyncConfig,
    ) -> Self {
        let router = QueryRouter::new(Arc::clone(&local), remote);
        Self {
            shared: Arc::new(EngineShared {
                config,
                doc,
                local,
                clocks,
                crawler,
                reader,
                status: Arc::new(SyncStatus::new(root_id)),
                router,
                generation: AtomicU64::new(0),
            }),
            cancel: Mutex::new(None),
        }
    }

    /// Start (or restart) the sync worker. A previous run is cancelled.
    pub fn start(&self) {
        let token = {
            let mut cancel = self.cancel.lock().expect("engine lock poisoned");
            if let Some(previous) = cancel.take() {
                previous.cancel();
            }
            let token = CancellationToken::new();
            *cancel = Some(token.clone());
            token
        };
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Leftovers of a superseded run; the cancelled worker skips its own
        // cleanup once a newer generation exists.
        self.shared.status.reset();

        let shared = Arc::clone(&self.shared);
        tokio::spawn(main_loop(shared, token, generation));
    }

    /// Cancel the sync worker. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().expect("engine lock poisoned").take() {
            token.cancel();
        }
    }

    /// Boost a document's scheduling priority by `delta` until the returned
    /// guard is dropped.
    pub fn add_priority(&self, id: DocId, delta: i64) -> PriorityGuard {
        self.shared.status.add_priority_offset(&id, delta);
        PriorityGuard {
            status: Arc::clone(&self.shared.status),
            id,
            delta,
        }
    }

    pub fn enable_battery_save(&self) {
        self.shared.status.enable_battery_save();
    }

    pub fn disable_battery_save(&self) {
        self.shared.status.disable_battery_save();
    }

    /// Latest aggregate progress snapshot.
    pub fn state(&self) -> SyncState {
        self.shared.status.snapshot_rx().borrow().state.clone()
    }

    /// Aggregate progress stream: replay-latest, throttled to one emission
    /// per configured interval (leading and trailing).
    pub fn state_stream(&self) -> impl Stream<Item = SyncState> + Send {
        let rx = self.shared.status.snapshot_rx();
        Throttle::new(
            WatchStream::new(rx).map(|snapshot| snapshot.state.clone()),
            self.shared.config.throttle_interval(),
        )
    }

    /// Per-document progress stream, same emission semantics as
    /// [`SyncEngine::state_stream`].
    pub fn doc_state_stream(&self, id: DocId) -> impl Stream<Item = DocSyncState> + Send {
        let rx = self.shared.status.snapshot_rx();
        Throttle::new(
            WatchStream::new(rx).map(move |snapshot| snapshot.doc_state(&id)),
            self.shared.config.throttle_interval(),
        )
    }

    /// Wait until every known document has been indexed.
    pub async fn wait_for_completed(&self, token: &CancellationToken) -> Result<(), SyncError> {
        let mut rx = self.shared.status.snapshot_rx();
        loop {
            if rx.borrow_and_update().state.completed {
                return Ok(());
            }
            tokio::select! {
                _ = token.cancelled() => return Err(SyncError::Cancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(SyncError::Cancelled);
                    }
                }
            }
        }
    }

    /// Wait until one document has been indexed.
    pub async fn wait_for_doc_completed(
        &self,
        id: &DocId,
        token: &CancellationToken,
    ) -> Result<(), SyncError> {
        let mut rx = self.shared.status.snapshot_rx();
        loop {
            if rx.borrow_and_update().doc_state(id).completed {
                return Ok(());
            }
            tokio::select! {
                _ = token.cancelled() => return Err(SyncError::Cancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(SyncError::Cancelled);
                    }
                }
            }
        }
    }

    pub async fn search(
        &self,
        table: IndexTable,
        query: Query,
        options: SearchOptions,
        prefer: Prefer,
    ) -> Result<SearchResult, SyncError> {
        self.shared.router.search(table, query, options, prefer).await
    }

    pub async fn aggregate(
        &self,
        table: IndexTable,
        query: Query,
        field: &str,
        options: SearchOptions,
        prefer: Prefer,
    ) -> Result<AggregateResult, SyncError> {
        self.shared
            .router
            .aggregate(table, query, field, options, prefer)
            .await
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn main_loop(shared: Arc<EngineShared>, token: CancellationToken, generation: u64) {
    if shared.local.is_readonly() {
        info!("local index is read-only, skipping sync");
        shared.status.set_readonly();
        return;
    }

    loop {
        let result = run_cycle(&shared, &token).await;

        if token.is_cancelled() {
            if shared.generation.load(Ordering::SeqCst) == generation {
                shared.status.reset();
            }
            return;
        }

        if let Err(error) = result {
            error!(%error, retry_in_secs = shared.config.retry_delay_secs, "sync cycle failed");
            shared.status.set_error(error.to_string());
        }
        shared.status.reset();

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(shared.config.retry_delay()) => {}
        }
    }
}

/// One connect-and-run cycle. Returns only on error or cancellation.
async fn run_cycle(shared: &EngineShared, token: &CancellationToken) -> Result<(), SyncError> {
    connect_all(shared, token).await?;
    shared.status.clear_error();
    info!(root = %shared.status.root_id(), "index sync started");

    // Subscribe before loading the root snapshot so no update is missed;
    // the root-ready flag gates processing until the seed pass is done.
    let _subscription = shared.doc.subscribe_doc_update({
        let status = Arc::clone(&shared.status);
        let include_trash = shared.config.include_trash;
        Arc::new(move |update| status.handle_doc_update(update, include_trash))
    });

    let root_id = shared.status.root_id().clone();
    let mut root = shared.reader.empty_root(&root_id);
    if let Some(snapshot) = shared.doc.get_doc(&root_id).await? {
        root.apply_update(&snapshot.bin)?;
    }
    shared.status.install_root(root);
    shared.status.schedule_job(&root_id);

    for id in shared.status.rebuild_source(shared.config.include_trash) {
        shared.status.schedule_job(&id);
    }
    shared.status.set_root_ready();

    let indexed = load_docs_in_index(shared).await?;
    shared.status.set_docs_in_index(indexed);

    loop {
        if token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let id = shared.status.accept_job(token).await?;
        if id == root_id {
            run_crawl_step(shared).await?;
        } else {
            run_leaf_step(shared, &id).await?;
        }
        shared.status.complete_job();
    }
}

/// Wait for all storage collaborators, bounded by the connect timeout.
async fn connect_all(shared: &EngineShared, token: &CancellationToken) -> Result<(), SyncError> {
    let wait = async {
        tokio::try_join!(
            shared.doc.connection().wait_for_connected(token),
            shared.local.connection().wait_for_connected(token),
            shared.clocks.connection().wait_for_connected(token),
        )?;
        Ok::<(), SyncError>(())
    };

    match tokio::time::timeout(shared.config.connect_timeout(), wait).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::ConnectTimeout),
    }
}

/// Rebuild the indexed-document set by querying the index backend.
async fn load_docs_in_index(shared: &EngineShared) -> Result<HashMap<DocId, DocMeta>, SyncError> {
    let result = shared
        .local
        .search(
            IndexTable::Doc,
            Query::All,
            SearchOptions::new().with_fields(vec!["doc_id".to_string(), "title".to_string()]),
        )
        .await?;

    Ok(result
        .nodes
        .into_iter()
        .map(|node| {
            let title = node.field("title").map(str::to_string);
            (node.id, DocMeta { title })
        })
        .collect())
}

/// Root job: diff the live document set against the index.
async fn run_crawl_step(shared: &EngineShared) -> Result<(), SyncError> {
    let (source, index) = shared.status.diff_sets();

    for (id, meta) in &source {
        match index.get(id) {
            Some(existing) if existing.title == meta.title => {}
            Some(_) => {
                shared
                    .local
                    .update(IndexTable::Doc, doc_record(id, meta))
                    .await?;
                shared.status.mark_indexed(id.clone(), meta.clone());
                debug!(doc_id = %id, "updated document title");
            }
            None => {
                shared
                    .local
                    .insert(IndexTable::Doc, doc_record(id, meta))
                    .await?;
                shared.status.mark_indexed(id.clone(), meta.clone());
                // Content is indexed separately from the title.
                shared.status.schedule_job(id);
                debug!(doc_id = %id, "discovered new document");
            }
        }
    }

    for id in index.keys() {
        if !source.contains_key(id) {
            shared.local.delete(IndexTable::Doc, id).await?;
            shared
                .local
                .delete_by_query(IndexTable::Block, Query::match_field("doc_id", id.as_str()))
                .await?;
            // Drop the clock so the id is fully reprocessed if it ever
            // reappears.
            shared.clocks.clear_doc_indexed_clock(id).await?;
            shared.status.remove_indexed(id);
            debug!(doc_id = %id, "removed vanished document");
        }
    }

    shared.local.refresh(IndexTable::Block).await?;
    shared.local.refresh(IndexTable::Doc).await?;
    Ok(())
}

fn doc_record(id: &DocId, meta: &DocMeta) -> IndexDocument {
    let mut record = IndexDocument::new(id.clone()).with_field("doc_id", id.as_str());
    if let Some(title) = &meta.title {
        record.insert_field("title", title);
    }
    record
}

/// Leaf job: re-derive one document's content records if it is stale.
async fn run_leaf_step(shared: &EngineShared, id: &DocId) -> Result<(), SyncError> {
    if !shared.status.is_in_index(id) {
        debug!(doc_id = %id, "skipping: not in index");
        return Ok(());
    }

    let Some(doc_clock) = shared.doc.get_doc_timestamp(id).await? else {
        debug!(doc_id = %id, "skipping: document deleted");
        return Ok(());
    };

    if let Some(indexed) = shared.clocks.get_doc_indexed_clock(id).await? {
        if indexed.is_up_to_date(&doc_clock, INDEX_FORMAT_VERSION) {
            debug!(doc_id = %id, "skipping: clock unchanged");
            return Ok(());
        }
    }

    let Some(snapshot) = shared.doc.get_doc(id).await? else {
        debug!(doc_id = %id, "skipping: snapshot gone");
        return Ok(());
    };

    let root_id = shared.status.root_id().clone();
    let crawled = shared.status.with_root(|root| {
        shared.crawler.crawl(CrawlInput {
            root_id: &root_id,
            doc_id: id,
            doc_bin: &snapshot.bin,
            root,
        })
    });

    let (blocks, preview) = match crawled {
        // Cycle is unwinding; no root structure installed.
        None => return Ok(()),
        Some(Ok(None)) => {
            debug!(doc_id = %id, "skipping: no indexable root block");
            return Ok(());
        }
        Some(Ok(Some(content))) => (content.blocks, content.preview),
        Some(Err(error)) => {
            // Best effort: index no content but still advance the clock so
            // a malformed document is not retried every cycle.
            warn!(doc_id = %id, %error, "content extraction failed");
            (Vec::new(), None)
        }
    };

    shared
        .local
        .delete_by_query(IndexTable::Block, Query::match_field("doc_id", id.as_str()))
        .await?;
    for block in blocks {
        shared.local.insert(IndexTable::Block, block).await?;
    }
    shared.local.refresh(IndexTable::Block).await?;

    if let Some(preview) = preview {
        shared
            .local
            .update(
                IndexTable::Doc,
                IndexDocument::new(id.clone()).with_field("summary", preview),
            )
            .await?;
        shared.local.refresh(IndexTable::Doc).await?;
    }

    shared
        .clocks
        .set_doc_indexed_clock(IndexedClock::new(
            id.clone(),
            doc_clock.timestamp,
            INDEX_FORMAT_VERSION,
        ))
        .await?;

    debug!(doc_id = %id, "indexed document content");
    Ok(())
}

//! Read-only query routing between the local and remote index backends.
//!
//! Routing is stateless and independent of indexing progress: callers that
//! need guaranteed freshness must await per-document completion separately.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use docindex_storage::IndexStorage;
use docindex_types::{
    AggregateResult, IndexTable, Query, SearchOptions, SearchResult, SyncError,
};

/// Which index backend a read should go to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Prefer {
    #[default]
    Local,
    Remote,
}

/// Routes search/aggregate calls to the preferred backend.
pub struct QueryRouter {
    local: Arc<dyn IndexStorage>,
    remote: Option<Arc<dyn IndexStorage>>,
}

impl QueryRouter {
    pub fn new(local: Arc<dyn IndexStorage>, remote: Option<Arc<dyn IndexStorage>>) -> Self {
        Self { local, remote }
    }

    /// The backend a preference resolves to.
    ///
    /// Remote is honored only when a remote backend is configured; otherwise
    /// every read falls back to the local index.
    fn backend(&self, prefer: Prefer) -> &Arc<dyn IndexStorage> {
        match (prefer, &self.remote) {
            (Prefer::Remote, Some(remote)) => remote,
            _ => &self.local,
        }
    }

    pub async fn search(
        &self,
        table: IndexTable,
        query: Query,
        options: SearchOptions,
        prefer: Prefer,
    ) -> Result<SearchResult, SyncError> {
        let backend = self.backend(prefer);
        backend
            .connection()
            .wait_for_connected(&CancellationToken::new())
            .await?;
        Ok(backend.search(table, query, options).await?)
    }

    pub async fn aggregate(
        &self,
        table: IndexTable,
        query: Query,
        field: &str,
        options: SearchOptions,
        prefer: Prefer,
    ) -> Result<AggregateResult, SyncError> {
        let backend = self.backend(prefer);
        backend
            .connection()
            .wait_for_connected(&CancellationToken::new())
            .await?;
        Ok(backend.aggregate(table, query, field, options).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docindex_storage::memory::MemoryIndexStorage;
    use docindex_types::IndexDocument;

    async fn seeded(title: &str) -> Arc<MemoryIndexStorage> {
        let index = Arc::new(MemoryIndexStorage::new());
        index
            .insert(
                IndexTable::Doc,
                IndexDocument::new("d1").with_field("title", title),
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_prefer_remote_uses_remote() {
        let local = seeded("local copy").await;
        let remote = seeded("remote copy").await;
        let router = QueryRouter::new(local, Some(remote));

        let result = router
            .search(
                IndexTable::Doc,
                Query::All,
                SearchOptions::new(),
                Prefer::Remote,
            )
            .await
            .unwrap();
        assert_eq!(result.nodes[0].field("title"), Some("remote copy"));
    }

    #[tokio::test]
    async fn test_prefer_remote_falls_back_without_remote() {
        let local = seeded("local copy").await;
        let router = QueryRouter::new(local, None);

        let result = router
            .search(
                IndexTable::Doc,
                Query::All,
                SearchOptions::new(),
                Prefer::Remote,
            )
            .await
            .unwrap();
        assert_eq!(result.nodes[0].field("title"), Some("local copy"));
    }

    #[tokio::test]
    async fn test_prefer_local_ignores_remote() {
        let local = seeded("local copy").await;
        let remote = seeded("remote copy").await;
        let router = QueryRouter::new(local, Some(remote));

        let result = router
            .search(
                IndexTable::Doc,
                Query::All,
                SearchOptions::new(),
                Prefer::Local,
            )
            .await
            .unwrap();
        assert_eq!(result.nodes[0].field("title"), Some("local copy"));
    }

    #[tokio::test]
    async fn test_aggregate_routes_like_search() {
        let local = seeded("x").await;
        let router = QueryRouter::new(local, None);

        let result = router
            .aggregate(
                IndexTable::Doc,
                Query::All,
                "title",
                SearchOptions::new(),
                Prefer::Remote,
            )
            .await
            .unwrap();
        assert_eq!(result.buckets.len(), 1);
        assert_eq!(result.buckets[0].key, "x");
    }
}

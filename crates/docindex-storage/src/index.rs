//! Index backend interface.
//!
//! Covers the write and read surface the sync engine needs. Writes are only
//! ever issued by the single worker task; reads (search/aggregate) may run
//! with unbounded concurrency through the query router.

use async_trait::async_trait;

use docindex_types::{
    AggregateResult, DocId, IndexDocument, IndexTable, Query, SearchOptions, SearchResult,
};

use crate::connection::ConnectionState;
use crate::error::StorageError;

/// A full-text index backend, local or remote.
#[async_trait]
pub trait IndexStorage: Send + Sync {
    /// Whether this backend rejects writes.
    ///
    /// A read-only local backend short-circuits the whole sync engine.
    fn is_readonly(&self) -> bool {
        false
    }

    /// Insert a new record.
    async fn insert(&self, table: IndexTable, doc: IndexDocument) -> Result<(), StorageError>;

    /// Merge fields into an existing record.
    async fn update(&self, table: IndexTable, doc: IndexDocument) -> Result<(), StorageError>;

    /// Delete a record by id.
    async fn delete(&self, table: IndexTable, id: &DocId) -> Result<(), StorageError>;

    /// Delete every record matching the query.
    async fn delete_by_query(&self, table: IndexTable, query: Query) -> Result<(), StorageError>;

    async fn search(
        &self,
        table: IndexTable,
        query: Query,
        options: SearchOptions,
    ) -> Result<SearchResult, StorageError>;

    async fn aggregate(
        &self,
        table: IndexTable,
        query: Query,
        field: &str,
        options: SearchOptions,
    ) -> Result<AggregateResult, StorageError>;

    /// Make previous writes to the table visible to subsequent reads.
    async fn refresh(&self, table: IndexTable) -> Result<(), StorageError>;

    fn connection(&self) -> &ConnectionState;
}

//! In-memory index backend.
//!
//! Supports the trait surface the sync engine consumes, with write counters
//! and failure injection for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use docindex_types::{
    AggregateBucket, AggregateResult, DocId, IndexDocument, IndexTable, Query, SearchNode,
    SearchOptions, SearchResult,
};

use crate::connection::ConnectionState;
use crate::error::StorageError;
use crate::index::IndexStorage;

#[derive(Default)]
struct Tables {
    doc: BTreeMap<DocId, IndexDocument>,
    block: BTreeMap<DocId, IndexDocument>,
}

impl Tables {
    fn table(&self, table: IndexTable) -> &BTreeMap<DocId, IndexDocument> {
        match table {
            IndexTable::Doc => &self.doc,
            IndexTable::Block => &self.block,
        }
    }

    fn table_mut(&mut self, table: IndexTable) -> &mut BTreeMap<DocId, IndexDocument> {
        match table {
            IndexTable::Doc => &mut self.doc,
            IndexTable::Block => &mut self.block,
        }
    }
}

/// In-memory [`IndexStorage`].
pub struct MemoryIndexStorage {
    tables: Mutex<Tables>,
    connection: ConnectionState,
    readonly: AtomicBool,
    fail_writes: AtomicBool,
    write_count: AtomicUsize,
    refresh_count: AtomicUsize,
}

impl MemoryIndexStorage {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            connection: ConnectionState::connected(),
            readonly: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_count: AtomicUsize::new(0),
            refresh_count: AtomicUsize::new(0),
        }
    }

    pub fn set_readonly(&self, readonly: bool) {
        self.readonly.store(readonly, Ordering::SeqCst);
    }

    /// Make every write fail with a backend error until disabled.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful mutating calls (insert/update/delete).
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }

    pub fn len(&self, table: IndexTable) -> usize {
        self.tables
            .lock()
            .expect("index lock poisoned")
            .table(table)
            .len()
    }

    pub fn is_empty(&self, table: IndexTable) -> bool {
        self.len(table) == 0
    }

    pub fn get(&self, table: IndexTable, id: &DocId) -> Option<IndexDocument> {
        self.tables
            .lock()
            .expect("index lock poisoned")
            .table(table)
            .get(id)
            .cloned()
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::backend("injected write failure"));
        }
        if self.readonly.load(Ordering::SeqCst) {
            return Err(StorageError::backend("index is read-only"));
        }
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn matches(doc: &IndexDocument, query: &Query) -> bool {
        match query {
            Query::All => true,
            Query::Match { field, value } => doc
                .fields
                .get(field)
                .map(|values| values.iter().any(|v| v == value))
                .unwrap_or(false),
        }
    }
}

impl Default for MemoryIndexStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexStorage for MemoryIndexStorage {
    fn is_readonly(&self) -> bool {
        self.readonly.load(Ordering::SeqCst)
    }

    async fn insert(&self, table: IndexTable, doc: IndexDocument) -> Result<(), StorageError> {
        self.check_write()?;
        let mut tables = self.tables.lock().expect("index lock poisoned");
        tables.table_mut(table).insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn update(&self, table: IndexTable, doc: IndexDocument) -> Result<(), StorageError> {
        self.check_write()?;
        let mut tables = self.tables.lock().expect("index lock poisoned");
        let entry = tables
            .table_mut(table)
            .entry(doc.id.clone())
            .or_insert_with(|| IndexDocument::new(doc.id.clone()));
        for (name, values) in doc.fields {
            entry.fields.insert(name, values);
        }
        Ok(())
    }

    async fn delete(&self, table: IndexTable, id: &DocId) -> Result<(), StorageError> {
        self.check_write()?;
        let mut tables = self.tables.lock().expect("index lock poisoned");
        tables.table_mut(table).remove(id);
        Ok(())
    }

    async fn delete_by_query(&self, table: IndexTable, query: Query) -> Result<(), StorageError> {
        self.check_write()?;
        let mut tables = self.tables.lock().expect("index lock poisoned");
        tables
            .table_mut(table)
            .retain(|_, doc| !Self::matches(doc, &query));
        Ok(())
    }

    async fn search(
        &self,
        table: IndexTable,
        query: Query,
        options: SearchOptions,
    ) -> Result<SearchResult, StorageError> {
        let tables = self.tables.lock().expect("index lock poisoned");
        let matched: Vec<&IndexDocument> = tables
            .table(table)
            .values()
            .filter(|doc| Self::matches(doc, &query))
            .collect();
        let total = matched.len();

        let limit = options.limit.unwrap_or(usize::MAX);
        let nodes = matched
            .into_iter()
            .take(limit)
            .map(|doc| {
                let fields = match &options.fields {
                    Some(wanted) => doc
                        .fields
                        .iter()
                        .filter(|(name, _)| wanted.iter().any(|w| w == *name))
                        .map(|(name, values)| (name.clone(), values.clone()))
                        .collect(),
                    None => doc.fields.clone(),
                };
                SearchNode {
                    id: doc.id.clone(),
                    fields,
                }
            })
            .collect();

        Ok(SearchResult { nodes, total })
    }

    async fn aggregate(
        &self,
        table: IndexTable,
        query: Query,
        field: &str,
        options: SearchOptions,
    ) -> Result<AggregateResult, StorageError> {
        let tables = self.tables.lock().expect("index lock poisoned");
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for doc in tables
            .table(table)
            .values()
            .filter(|doc| Self::matches(doc, &query))
        {
            if let Some(values) = doc.fields.get(field) {
                for value in values {
                    *counts.entry(value.clone()).or_default() += 1;
                }
            }
        }

        let limit = options.limit.unwrap_or(usize::MAX);
        let buckets = counts
            .into_iter()
            .take(limit)
            .map(|(key, count)| AggregateBucket { key, count })
            .collect();

        Ok(AggregateResult { buckets })
    }

    async fn refresh(&self, _table: IndexTable) -> Result<(), StorageError> {
        // Writes are immediately visible here; track the call for tests.
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn connection(&self) -> &ConnectionState {
        &self.connection
    }
}

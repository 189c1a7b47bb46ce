//! Record and query model of the index backend.
//!
//! The engine writes two logical tables: one record per document (title and
//! preview) and any number of content records per document, each tagged with
//! its owning document id so they can be removed in bulk. The query model
//! here is the minimal surface the sync core itself consumes; a real backend
//! will understand a richer language behind the same trait.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::doc::DocId;

/// Logical tables of the index backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexTable {
    /// One record per document: `doc_id`, `title`, `summary`.
    Doc,
    /// Content records derived by the crawler, keyed by their own record id
    /// and carrying a `doc_id` field.
    Block,
}

impl IndexTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexTable::Doc => "doc",
            IndexTable::Block => "block",
        }
    }
}

impl std::fmt::Display for IndexTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record stored in the index.
///
/// Fields are multi-valued; `update` on the backend merges fields into an
/// existing record rather than replacing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: DocId,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl IndexDocument {
    pub fn new(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_field(name, value);
        self
    }

    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(name.into()).or_default().push(value.into());
    }

    /// First value of a field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Minimal query language consumed by the sync core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// Matches every record in the table.
    All,
    /// Matches records where `field` contains `value`.
    Match { field: String, value: String },
}

impl Query {
    pub fn match_field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Match {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Options for a search call.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Fields to return on each node; `None` returns all stored fields.
    pub fields: Option<Vec<String>>,
    /// Maximum number of nodes to return; `None` means unbounded.
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One matching record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchNode {
    pub id: DocId,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl SearchNode {
    /// First value of a field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Result of a search call.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub nodes: Vec<SearchNode>,
    pub total: usize,
}

/// One aggregation bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateBucket {
    pub key: String,
    pub count: usize,
}

/// Result of an aggregate call over a single field.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub buckets: Vec<AggregateBucket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(IndexTable::Doc.as_str(), "doc");
        assert_eq!(IndexTable::Block.as_str(), "block");
    }

    #[test]
    fn test_index_document_fields() {
        let doc = IndexDocument::new("d1")
            .with_field("title", "Notes")
            .with_field("tag", "a")
            .with_field("tag", "b");

        assert_eq!(doc.field("title"), Some("Notes"));
        assert_eq!(doc.fields.get("tag").map(Vec::len), Some(2));
        assert_eq!(doc.field("missing"), None);
    }

    #[test]
    fn test_query_serde_shape() {
        let query = Query::match_field("doc_id", "d1");
        let json = serde_json::to_string(&query).unwrap();
        assert!(json.contains("\"type\":\"match\""));
        assert!(json.contains("\"field\":\"doc_id\""));

        let all = serde_json::to_string(&Query::All).unwrap();
        assert!(all.contains("\"type\":\"all\""));
    }
}

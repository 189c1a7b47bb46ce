//! JSON-op encoded root structure.

use std::any::Any;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use docindex_types::{DocId, DocMeta};

use crate::error::StorageError;
use crate::root::{RootReader, RootStructure};

/// One operation against the root structure.
///
/// Updates and snapshots are JSON arrays of these ops; later ops win.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RootOp {
    /// Add a document or change its title/trash state.
    Upsert {
        doc_id: DocId,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        trash: bool,
    },
    /// Remove a document entirely.
    Remove { doc_id: DocId },
}

impl RootOp {
    pub fn upsert(doc_id: impl Into<DocId>, title: impl Into<String>) -> Self {
        RootOp::Upsert {
            doc_id: doc_id.into(),
            title: Some(title.into()),
            trash: false,
        }
    }

    pub fn trash(doc_id: impl Into<DocId>, title: impl Into<String>) -> Self {
        RootOp::Upsert {
            doc_id: doc_id.into(),
            title: Some(title.into()),
            trash: true,
        }
    }

    pub fn remove(doc_id: impl Into<DocId>) -> Self {
        RootOp::Remove {
            doc_id: doc_id.into(),
        }
    }

    /// Encode a batch of ops as one update-log entry.
    pub fn encode(ops: &[RootOp]) -> Vec<u8> {
        serde_json::to_vec(ops).expect("root ops are always serializable")
    }
}

#[derive(Debug, Clone)]
struct RootEntry {
    title: Option<String>,
    trash: bool,
}

/// Root structure over [`RootOp`] updates.
#[derive(Debug, Default)]
pub struct MemoryRootStructure {
    entries: BTreeMap<DocId, RootEntry>,
}

impl MemoryRootStructure {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RootStructure for MemoryRootStructure {
    fn apply_update(&mut self, update: &[u8]) -> Result<(), StorageError> {
        let ops: Vec<RootOp> = serde_json::from_slice(update)?;
        for op in ops {
            match op {
                RootOp::Upsert {
                    doc_id,
                    title,
                    trash,
                } => {
                    self.entries.insert(doc_id, RootEntry { title, trash });
                }
                RootOp::Remove { doc_id } => {
                    self.entries.remove(&doc_id);
                }
            }
        }
        Ok(())
    }

    fn all_documents(&self, include_trash: bool) -> BTreeMap<DocId, DocMeta> {
        self.entries
            .iter()
            .filter(|(_, entry)| include_trash || !entry.trash)
            .map(|(id, entry)| {
                (
                    id.clone(),
                    DocMeta {
                        title: entry.title.clone(),
                    },
                )
            })
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reader producing [`MemoryRootStructure`] instances.
#[derive(Debug, Default, Clone)]
pub struct MemoryRootReader;

impl RootReader for MemoryRootReader {
    fn empty_root(&self, _root_id: &DocId) -> Box<dyn RootStructure> {
        Box::new(MemoryRootStructure::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_remove() {
        let mut root = MemoryRootStructure::new();
        root.apply_update(&RootOp::encode(&[
            RootOp::upsert("d1", "Title A"),
            RootOp::upsert("d2", "Title B"),
        ]))
        .unwrap();

        let docs = root.all_documents(false);
        assert_eq!(docs.len(), 2);
        assert_eq!(
            docs.get(&DocId::new("d1")).unwrap().title.as_deref(),
            Some("Title A")
        );

        root.apply_update(&RootOp::encode(&[RootOp::remove("d2")]))
            .unwrap();
        assert!(!root.all_documents(false).contains_key(&DocId::new("d2")));
    }

    #[test]
    fn test_trash_filtering() {
        let mut root = MemoryRootStructure::new();
        root.apply_update(&RootOp::encode(&[
            RootOp::upsert("d1", "Live"),
            RootOp::trash("d2", "Trashed"),
        ]))
        .unwrap();

        assert_eq!(root.all_documents(false).len(), 1);
        assert_eq!(root.all_documents(true).len(), 2);
    }

    #[test]
    fn test_later_op_wins() {
        let mut root = MemoryRootStructure::new();
        root.apply_update(&RootOp::encode(&[RootOp::upsert("d1", "Old")]))
            .unwrap();
        root.apply_update(&RootOp::encode(&[RootOp::upsert("d1", "New")]))
            .unwrap();

        let docs = root.all_documents(false);
        assert_eq!(
            docs.get(&DocId::new("d1")).unwrap().title.as_deref(),
            Some("New")
        );
    }

    #[test]
    fn test_malformed_update_rejected() {
        let mut root = MemoryRootStructure::new();
        let err = root.apply_update(b"not json").unwrap_err();
        assert!(matches!(err, StorageError::Decode(_)));
    }
}

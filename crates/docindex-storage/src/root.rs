//! Root structure decoding.
//!
//! The workspace root document enumerates every document (title, trash
//! state). Its encoding belongs to the host system; the engine only applies
//! raw updates to it and reads the live document set back out.

use std::any::Any;
use std::collections::BTreeMap;

use docindex_types::{DocId, DocMeta};

use crate::error::StorageError;

/// In-memory materialization of the workspace root document.
pub trait RootStructure: Send {
    /// Apply one raw update (or a full snapshot) from the update log.
    fn apply_update(&mut self, update: &[u8]) -> Result<(), StorageError>;

    /// The live document set. Trashed documents are included only when
    /// `include_trash` is set.
    fn all_documents(&self, include_trash: bool) -> BTreeMap<DocId, DocMeta>;

    /// Downcast hook for content crawlers that understand the concrete
    /// structure type.
    fn as_any(&self) -> &dyn Any;
}

/// Factory for root structures; understands the document-tree encoding.
pub trait RootReader: Send + Sync {
    /// Create an empty root structure for the given workspace.
    fn empty_root(&self, root_id: &DocId) -> Box<dyn RootStructure>;
}

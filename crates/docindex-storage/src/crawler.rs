//! Content extraction interface.
//!
//! Turning a document snapshot into index records is delegated to the host
//! system; the engine only decides *when* to crawl and what to do with the
//! result.

use docindex_types::{DocId, IndexDocument};

use crate::error::StorageError;
use crate::root::RootStructure;

/// Everything a crawler gets to look at for one document.
pub struct CrawlInput<'a> {
    pub root_id: &'a DocId,
    pub doc_id: &'a DocId,
    /// The document's current binary snapshot.
    pub doc_bin: &'a [u8],
    /// The live root structure, for context such as titles or tags.
    pub root: &'a dyn RootStructure,
}

/// Extracted content for one document.
#[derive(Debug, Clone, Default)]
pub struct CrawledDoc {
    /// Content records; each must carry a `doc_id` field so they can be
    /// deleted in bulk when the document changes or disappears.
    pub blocks: Vec<IndexDocument>,
    /// Short preview string stored on the document record.
    pub preview: Option<String>,
}

/// Derives index records from a document snapshot.
pub trait ContentCrawler: Send + Sync {
    /// Extract content records and a preview.
    ///
    /// `Ok(None)` means the document has no indexable root block and should
    /// be left untouched. Errors are treated as "no extractable content" by
    /// the engine; they never fail the sync cycle.
    fn crawl(&self, input: CrawlInput<'_>) -> Result<Option<CrawledDoc>, StorageError>;
}

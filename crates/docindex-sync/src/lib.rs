//! Incremental index synchronization for a workspace of documents.
//!
//! The engine keeps a search index consistent with a set of documents that
//! change continuously. A single root document enumerates the workspace;
//! crawl & diff jobs reconcile the index against it, and per-document leaf
//! jobs extract content for anything whose logical clock moved since it was
//! last indexed.
//!
//! Construct a [`SyncEngine`] from the storage traits in `docindex-storage`,
//! call [`SyncEngine::start`], and observe progress through
//! [`SyncEngine::state_stream`] or the `wait_for_*` helpers.

mod engine;
mod queue;
mod router;
mod status;
mod stream;

pub use engine::{PriorityGuard, SyncEngine, INDEX_FORMAT_VERSION};
pub use router::{Prefer, QueryRouter};
pub use status::{StatusSnapshot, SyncStatus};
pub use stream::Throttle;

//! Storage collaborator interfaces for the doc-index-sync engine.
//!
//! The sync engine never talks to a database or a search backend directly;
//! everything external is reached through the traits in this crate:
//!
//! - [`DocStorage`]: binary document snapshots, logical clocks, and the
//!   append-only change-notification stream
//! - [`IndexStorage`]: the full-text index backend (local or remote)
//! - [`ClockStorage`]: persistence of per-document indexed clocks, the only
//!   state that survives an engine restart
//! - [`RootReader`] / [`RootStructure`]: decoding of the workspace root
//!   document into a live document set
//! - [`ContentCrawler`]: extraction of index records from a document snapshot
//!
//! The `memory` module ships in-memory implementations of all of the above,
//! used by the engine's tests and as a local development backend.

pub mod clock;
pub mod connection;
pub mod crawler;
pub mod doc;
pub mod error;
pub mod index;
pub mod memory;
pub mod root;

pub use clock::ClockStorage;
pub use connection::ConnectionState;
pub use crawler::{ContentCrawler, CrawlInput, CrawledDoc};
pub use doc::{DocSnapshot, DocStorage, DocUpdate, DocUpdateCallback, Subscription};
pub use error::StorageError;
pub use index::IndexStorage;
pub use root::{RootReader, RootStructure};

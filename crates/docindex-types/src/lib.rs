//! Shared types for the doc-index-sync system.
//!
//! This crate defines the domain types exchanged between the sync engine and
//! its storage collaborators:
//!
//! - [`DocId`] / [`DocMeta`]: document identity and the metadata tracked per
//!   document (title)
//! - [`DocClock`] / [`IndexedClock`]: logical version stamps used to decide
//!   staleness without content comparison
//! - [`IndexTable`] / [`IndexDocument`]: the record model of the index backend
//! - [`Query`] / [`SearchOptions`] / [`SearchResult`]: the minimal query
//!   surface this core consumes
//! - [`SyncState`] / [`DocSyncState`]: derived progress snapshots
//! - [`SyncConfig`]: engine configuration with layered loading
//! - [`SyncError`]: unified error type

pub mod clock;
pub mod config;
pub mod doc;
pub mod error;
pub mod record;
pub mod state;

pub use clock::{DocClock, IndexedClock};
pub use config::SyncConfig;
pub use doc::{DocId, DocMeta};
pub use error::SyncError;
pub use record::{
    AggregateBucket, AggregateResult, IndexDocument, IndexTable, Query, SearchNode, SearchOptions,
    SearchResult,
};
pub use state::{DocSyncState, SyncState};

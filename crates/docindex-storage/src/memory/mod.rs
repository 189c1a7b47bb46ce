//! In-memory reference implementations of the storage traits.
//!
//! These back the engine's tests and serve as a local development backend.
//! Root-document updates use a small JSON op encoding ([`RootOp`]); a
//! snapshot is simply the concatenation of all ops applied so far.

mod clock;
mod doc;
mod index;
mod root;

pub use clock::MemoryClockStorage;
pub use doc::MemoryDocStorage;
pub use index::MemoryIndexStorage;
pub use root::{MemoryRootReader, MemoryRootStructure, RootOp};

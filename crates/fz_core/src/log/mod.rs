//! Temporal Log: chunks, entries, breakpoints and interval queries.
//!
//! [`LogStore`] keeps chunks (minor id 0) and entries (minor id 1 and up)
//! in key order. Per-Node chains over both are threaded separately; see
//! [`crate::chain`].

mod breakpoints;
mod chunk;
mod entry;
mod integrity;
mod interval;
mod store;
mod target;

pub use breakpoints::Breakpoints;
pub use chunk::Chunk;
pub use entry::Entry;
pub use integrity::{minor_ids_contiguous, IntegrityReport};
pub use interval::Direction;
pub use store::{AttachReport, EntryStaging, LogElement, LogStore};
pub use target::{ChainTarget, Slot};

//! Chain Threader: per-Node doubly linked chains through the Log.
//!
//! [`LogStore::thread_chains`](crate::LogStore::thread_chains) walks the
//! chunks once in time order and links each chunk, and each entry with an
//! explicit owner, after the current tail of its Node's chain. Entries
//! without an owner are only reachable through their chunk.

mod index;
mod thread;
mod walk;

pub use index::{ChainCursor, ChainIndex};
pub use thread::ChainReport;
pub use walk::ChainWalker;

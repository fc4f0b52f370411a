//! # fz Storage
//!
//! Byte-store backends for the fz knowledge and time-log store.
//!
//! Two things in fz need somewhere to put bytes:
//!
//! - **Segments** publish snapshots of the Entity Store and the Log so that
//!   a second process can find them by segment name.
//! - **Backing-store tables** hold one framed row per Node, Edge, Topic,
//!   Named List, chunk, entry and breakpoint.
//!
//! Both sit on a [`StorageBackend`]. Backends never interpret what they
//! hold; framing, checksums and row formats belong to `fz_core`.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - process-local segments and tests
//! - [`FileBackend`] - segments shared between processes, table files
//!
//! ## Example
//!
//! ```rust
//! use fz_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"202401010900").unwrap();
//! let data = backend.read_at(offset, 12).unwrap();
//! assert_eq!(&data, b"202401010900");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

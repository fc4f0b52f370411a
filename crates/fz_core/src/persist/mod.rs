//! Backing-store persistence.
//!
//! A store directory holds one table file per record type. Each table is a
//! magic followed by checksummed frames of CBOR rows, replaced whole on
//! every store:
//!
//! ```text
//! [FZTB][len u32][kind u8][cbor row][crc32] [len u32][kind u8][cbor row][crc32] ...
//! ```

mod backing;
mod dir;
mod filter;
mod image;
mod manifest;
pub(crate) mod rows;
mod table;

pub use backing::BackingStore;
pub use dir::StoreDir;
pub use filter::LogFilter;
pub use image::{GraphImage, LogImage};
pub use manifest::{Manifest, MANIFEST_MAGIC, MANIFEST_VERSION};
pub use table::{Table, TABLE_MAGIC};

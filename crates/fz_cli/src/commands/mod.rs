//! CLI command implementations.

pub mod history;
pub mod inspect;
pub mod interval;
pub mod lists;
pub mod verify;

use crate::error::{CliError, CliResult};
use fz_core::{BackingStore, Config, SegmentContext};
use std::path::Path;
use std::sync::Arc;

/// Opens an existing store without creating anything.
pub fn open_store(path: &Path) -> CliResult<BackingStore> {
    if !path.is_dir() {
        return Err(CliError::NoStore(path.to_path_buf()));
    }
    let config = Config::default()
        .create_if_missing(false)
        .sync_on_store(false);
    let store = BackingStore::open(path, config)?;
    if store.manifest().tables.is_empty() {
        return Err(CliError::NoStore(path.to_path_buf()));
    }
    Ok(store)
}

/// A standalone context for read-only loads.
pub fn scratch() -> Arc<SegmentContext> {
    SegmentContext::heap("fz-cli")
}

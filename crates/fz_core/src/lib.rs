//! # fz Core
//!
//! Entity graph and temporal log engine for fz.
//!
//! This crate provides:
//! - Segment management with an explicit active-segment context
//! - The Entity Store: Nodes, Edges, Topics and Named Lists
//! - The Log: chunks and entries keyed by minute-resolution [`TimeKey`]s
//! - Chain threading of chunks and entries per Node
//! - The Node History Index
//! - Backing-store load and store, whole or filtered by [`LogFilter`]
//!
//! ## Example
//!
//! ```rust
//! use fz_core::{Config, Entry, SegmentManager};
//!
//! let config = Config::default();
//! let mut segments = SegmentManager::new(config.clone());
//! segments.create_segment("log", 1 << 20)?;
//!
//! let log = segments.allocate_log_store_in_active_segment()?;
//! let mut log = log.write();
//! log.append_chunk("202401010900".parse()?, "202301010000".parse()?)?;
//! log.append_entry(Entry::new("202401010900.1".parse()?, None, "started"))?;
//! log.thread_chains(&config)?;
//! assert_eq!(log.num_entries(), 1);
//! # Ok::<(), fz_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
mod config;
mod error;
pub mod frame;
pub mod graph;
mod history;
pub mod log;
pub mod persist;
pub mod segment;
mod stats;
mod timekey;

pub use chain::{ChainCursor, ChainIndex, ChainReport, ChainWalker};
pub use config::Config;
pub use error::{CoreError, CoreResult, FailureKind, KeyError, RecordKind};
pub use frame::{Frame, FrameKind};
pub use graph::{
    identical_graphs, CompletionState, Edge, EdgeData, EdgeId, EditFlags, EffectiveTargetDate,
    EntityStore, GraphErrorCode, GraphRecord, Keyword, ListFeatures, ListInsert, NamedList, Node,
    NodeData, NodeId, NodeIdx, TdPattern, TdProperty, Topic, Topics, TARGETDATE_UNSPECIFIED,
};
pub use history::{NodeHistories, NodeHistory};
pub use log::{
    minor_ids_contiguous, AttachReport, Breakpoints, ChainTarget, Chunk, Direction, Entry,
    EntryStaging, IntegrityReport, LogElement, LogStore, Slot,
};
pub use persist::{BackingStore, GraphImage, LogFilter, LogImage, Manifest, StoreDir, Table};
pub use segment::{SegmentContext, SegmentManager, SegmentRole, SharedEntityStore, SharedLogStore};
pub use stats::{BulkReport, FailureCounters, FailureSnapshot};
pub use timekey::{TimeKey, MIN_YEAR, NULL_KEY_STR};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

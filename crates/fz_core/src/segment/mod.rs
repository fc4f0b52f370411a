//! Segments: bounded storage regions that containers allocate from.

mod context;
mod manager;

pub use context::SegmentContext;
pub use manager::{
    SegmentManager, SegmentRole, SharedEntityStore, SharedLogStore, SEGMENT_MAGIC,
};

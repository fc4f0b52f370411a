//! # fz Testkit
//!
//! Test utilities for fz.
//!
//! This crate provides:
//! - Fixtures for temporary backing stores and segment managers
//! - Scenario builders for common Logs and graphs
//! - Property-based test generators using proptest
//! - JSON snapshots for comparing Logs structurally
//!
//! ## Usage
//!
//! ```rust
//! use fz_testkit::prelude::*;
//!
//! let log = scenarios::two_node_log(heap_context("test"));
//! assert_eq!(log.num_chunks(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scenarios;
pub mod snapshot;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scenarios;
    pub use crate::snapshot::*;
}

pub use fixtures::*;
pub use generators::*;
pub use snapshot::*;

//! Error types for fz core.
//!
//! Failures fall into five families:
//!
//! - identity format ([`KeyError`], wrapped as [`CoreError::InvalidKey`])
//! - duplicate or conflicting identities ([`CoreError::Duplicate`],
//!   [`CoreError::NullKey`])
//! - referential ([`CoreError::UnknownReference`],
//!   [`CoreError::AlreadyLinked`])
//! - segment and allocation ([`CoreError::NoActiveSegment`] and friends)
//! - backing store ([`CoreError::Storage`], [`CoreError::Io`],
//!   [`CoreError::Codec`], ...)
//!
//! The first and fourth abort the operation at hand. Duplicate and
//! referential failures are recoverable: bulk operations count them per
//! [`FailureKind`] and carry on.

use serde::Serialize;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKind {
    /// A graph Node.
    Node,
    /// A graph Edge.
    Edge,
    /// A Topic tag.
    Topic,
    /// A Named List.
    NamedList,
    /// A Log chunk.
    Chunk,
    /// A Log entry.
    Entry,
    /// A Log breakpoint.
    Breakpoint,
    /// A Node history cache row.
    History,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Topic => "topic",
            Self::NamedList => "named list",
            Self::Chunk => "chunk",
            Self::Entry => "entry",
            Self::Breakpoint => "breakpoint",
            Self::History => "history",
        };
        f.write_str(name)
    }
}

/// A malformed or out-of-range time key.
///
/// [`KeyError::field`] returns the short label of the offending component
/// (`"year"`, `"month"`, ..., `"minor_id"`, or `"string size"`, `"format"`,
/// `"digits"` for strings).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// A calendar or sequence component is out of range.
    #[error("invalid {field} in time key")]
    Range {
        /// Name of the offending component.
        field: &'static str,
    },

    /// A canonical string does not have the expected shape.
    #[error("invalid time key {reason}: {input:?}")]
    Format {
        /// What was wrong with the string.
        reason: &'static str,
        /// The rejected input.
        input: String,
    },

    /// A UNIX time has no local calendar representation.
    #[error("time {0} has no local calendar representation")]
    Epoch(i64),
}

impl KeyError {
    /// Returns the short label of what was invalid.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Range { field } => field,
            Self::Format { reason, .. } => reason,
            Self::Epoch(_) => "epoch",
        }
    }

    pub(crate) fn range(field: &'static str) -> Self {
        Self::Range { field }
    }

    pub(crate) fn format(reason: &'static str, input: &str) -> Self {
        Self::Format {
            reason,
            input: input.to_string(),
        }
    }
}

/// Errors that can occur in fz core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] fz_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A time key could not be constructed.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    /// A record with a null identity was offered.
    #[error("{kind} with a null key")]
    NullKey {
        /// Kind of record.
        kind: RecordKind,
    },

    /// A record with the same identity already exists.
    #[error("duplicate {kind} {key}")]
    Duplicate {
        /// Kind of record.
        kind: RecordKind,
        /// Canonical identity string.
        key: String,
    },

    /// A reference points at a record that does not exist.
    #[error("unknown {kind} {key}")]
    UnknownReference {
        /// Kind of the missing record.
        kind: RecordKind,
        /// Canonical identity string.
        key: String,
    },

    /// A chunk or entry is already part of a Node chain.
    #[error("{key} is already linked into a node chain")]
    AlreadyLinked {
        /// Canonical identity string of the chain element.
        key: String,
    },

    /// No segment is active.
    #[error("no active segment")]
    NoActiveSegment,

    /// A segment was used while another one is active.
    #[error("segment {name} is not the active segment")]
    SegmentNotActive {
        /// The segment that was asked for.
        name: String,
    },

    /// A segment with this name already exists.
    #[error("segment {name} already exists")]
    SegmentExists {
        /// Segment name.
        name: String,
    },

    /// No segment with this name is known.
    #[error("segment {name} not found")]
    SegmentNotFound {
        /// Segment name.
        name: String,
    },

    /// Another process is the writer of this segment.
    #[error("segment {name} is locked by another writer")]
    SegmentLocked {
        /// Segment name.
        name: String,
    },

    /// A segment's byte budget is exhausted.
    #[error("segment {name} exhausted: requested {requested} bytes, {available} available")]
    SegmentExhausted {
        /// Segment name.
        name: String,
        /// Bytes requested.
        requested: u64,
        /// Bytes still available.
        available: u64,
    },

    /// The memory for a segment could not be reserved.
    #[error("unable to allocate {size} bytes for segment {name}")]
    SegmentAllocation {
        /// Segment name.
        name: String,
        /// Requested size.
        size: u64,
    },

    /// Another process has the backing store open.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// Invalid store format or version.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// A row could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// A log filter is contradictory.
    #[error("invalid filter: {message}")]
    InvalidFilter {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A structural check failed.
    #[error("integrity violation: {message}")]
    Integrity {
        /// Description of the violation.
        message: String,
    },

    /// A bulk operation exceeded its failure allowance.
    #[error("{operation} aborted after {failures} failed records")]
    TooManyFailures {
        /// Name of the bulk operation.
        operation: &'static str,
        /// Number of failures seen.
        failures: u64,
    },
}

impl CoreError {
    /// Creates a duplicate error.
    pub fn duplicate(kind: RecordKind, key: impl fmt::Display) -> Self {
        Self::Duplicate {
            kind,
            key: key.to_string(),
        }
    }

    /// Creates an unknown reference error.
    pub fn unknown_reference(kind: RecordKind, key: impl fmt::Display) -> Self {
        Self::UnknownReference {
            kind,
            key: key.to_string(),
        }
    }

    /// Creates an already-linked error.
    pub fn already_linked(key: impl fmt::Display) -> Self {
        Self::AlreadyLinked {
            key: key.to_string(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl fmt::Display) -> Self {
        Self::Codec {
            message: message.to_string(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Classifies this error for per-kind failure counters.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidKey(_) => FailureKind::InvalidKey,
            Self::NullKey { .. } => FailureKind::NullKey,
            Self::Duplicate { .. } => FailureKind::Duplicate,
            Self::UnknownReference { .. } => FailureKind::UnknownReference,
            Self::AlreadyLinked { .. } => FailureKind::AlreadyLinked,
            Self::NoActiveSegment
            | Self::SegmentNotActive { .. }
            | Self::SegmentExists { .. }
            | Self::SegmentNotFound { .. }
            | Self::SegmentLocked { .. }
            | Self::SegmentExhausted { .. }
            | Self::SegmentAllocation { .. } => FailureKind::Segment,
            Self::Storage(_)
            | Self::Io(_)
            | Self::StoreLocked
            | Self::InvalidFormat { .. }
            | Self::ChecksumMismatch { .. }
            | Self::Codec { .. } => FailureKind::Storage,
            Self::Integrity { .. } => FailureKind::Integrity,
            Self::InvalidFilter { .. }
            | Self::InvalidOperation { .. }
            | Self::TooManyFailures { .. } => FailureKind::Other,
        }
    }

    /// Returns true for failures a bulk operation may count and skip.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::NullKey
                | FailureKind::Duplicate
                | FailureKind::UnknownReference
                | FailureKind::AlreadyLinked
                | FailureKind::InvalidKey
                | FailureKind::Integrity
        )
    }
}

/// Classification used by bulk-operation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FailureKind {
    /// Malformed or out-of-range key.
    InvalidKey,
    /// Null identity.
    NullKey,
    /// Identity already present.
    Duplicate,
    /// Reference to a missing record.
    UnknownReference,
    /// Chain element linked twice.
    AlreadyLinked,
    /// Segment or allocation failure.
    Segment,
    /// Backing-store failure.
    Storage,
    /// Structural check failure.
    Integrity,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// All kinds, in counter order.
    pub const ALL: [FailureKind; 9] = [
        Self::InvalidKey,
        Self::NullKey,
        Self::Duplicate,
        Self::UnknownReference,
        Self::AlreadyLinked,
        Self::Segment,
        Self::Storage,
        Self::Integrity,
        Self::Other,
    ];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Short label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid-key",
            Self::NullKey => "null-key",
            Self::Duplicate => "duplicate",
            Self::UnknownReference => "unknown-reference",
            Self::AlreadyLinked => "already-linked",
            Self::Segment => "segment",
            Self::Storage => "storage",
            Self::Integrity => "integrity",
            Self::Other => "other",
        }
    }
}

impl From<ciborium::de::Error<io::Error>> for CoreError {
    fn from(err: ciborium::de::Error<io::Error>) -> Self {
        Self::codec(err)
    }
}

impl From<ciborium::ser::Error<io::Error>> for CoreError {
    fn from(err: ciborium::ser::Error<io::Error>) -> Self {
        Self::codec(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_error_reports_field() {
        assert_eq!(KeyError::range("month").field(), "month");
        assert_eq!(KeyError::format("digits", "2024x").field(), "digits");
    }

    #[test]
    fn classification_matches_families() {
        assert_eq!(
            CoreError::duplicate(RecordKind::Node, "202401010900.1").kind(),
            FailureKind::Duplicate
        );
        assert_eq!(
            CoreError::unknown_reference(RecordKind::Chunk, "202401010900").kind(),
            FailureKind::UnknownReference
        );
        assert_eq!(CoreError::NoActiveSegment.kind(), FailureKind::Segment);
        assert_eq!(CoreError::StoreLocked.kind(), FailureKind::Storage);
        assert_eq!(
            CoreError::from(KeyError::range("hour")).kind(),
            FailureKind::InvalidKey
        );
    }

    #[test]
    fn segment_errors_are_not_recoverable() {
        assert!(!CoreError::NoActiveSegment.is_recoverable());
        assert!(CoreError::duplicate(RecordKind::Edge, "a>b").is_recoverable());
    }

    #[test]
    fn messages_name_the_record() {
        let err = CoreError::duplicate(RecordKind::NamedList, "recent");
        assert_eq!(err.to_string(), "duplicate named list recent");
    }

    #[test]
    fn failure_kind_indices_are_dense() {
        for (i, kind) in FailureKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}

//! Direct references into the Log arenas.

use crate::timekey::TimeKey;
use std::fmt;

/// A cached arena position, valid for one layout generation of the Log.
///
/// Positions shift when a chunk or entry is inserted anywhere but the end,
/// or removed. The Log bumps its generation when that happens, and a slot
/// from an older generation is ignored in favour of a search by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub(crate) index: u32,
    pub(crate) generation: u64,
}

impl Slot {
    pub(crate) fn new(index: usize, generation: u64) -> Option<Self> {
        u32::try_from(index).ok().map(|index| Self { index, generation })
    }

    /// Arena position.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index as usize
    }

    /// Layout generation the position was taken in.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

/// One element of a per-Node chain: a chunk or an entry.
///
/// Carries the element's identity and, optionally, a direct reference to
/// its arena position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainTarget {
    /// A Log chunk.
    Chunk {
        /// Chunk id.
        key: TimeKey,
        /// Cached position in the chunk arena.
        slot: Option<Slot>,
    },
    /// A Log entry.
    Entry {
        /// Entry id.
        key: TimeKey,
        /// Cached position in the entry arena.
        slot: Option<Slot>,
    },
}

impl ChainTarget {
    /// Target for a chunk.
    #[must_use]
    pub const fn chunk(key: TimeKey, slot: Option<Slot>) -> Self {
        Self::Chunk { key, slot }
    }

    /// Target for an entry.
    #[must_use]
    pub const fn entry(key: TimeKey, slot: Option<Slot>) -> Self {
        Self::Entry { key, slot }
    }

    /// Identity of the target.
    #[must_use]
    pub const fn key(&self) -> TimeKey {
        match self {
            Self::Chunk { key, .. } | Self::Entry { key, .. } => *key,
        }
    }

    /// Cached position, if any.
    #[must_use]
    pub const fn slot(&self) -> Option<Slot> {
        match self {
            Self::Chunk { slot, .. } | Self::Entry { slot, .. } => *slot,
        }
    }

    /// True for chunk targets.
    #[must_use]
    pub const fn is_chunk(&self) -> bool {
        matches!(self, Self::Chunk { .. })
    }

    /// True for entry targets.
    #[must_use]
    pub const fn is_entry(&self) -> bool {
        matches!(self, Self::Entry { .. })
    }

    /// True when the identity is the null key.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.key().is_null()
    }

    /// The same target without a cached position.
    #[must_use]
    pub const fn without_slot(self) -> Self {
        match self {
            Self::Chunk { key, .. } => Self::Chunk { key, slot: None },
            Self::Entry { key, .. } => Self::Entry { key, slot: None },
        }
    }
}

impl fmt::Display for ChainTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunk { key, .. } => write!(f, "chunk {key}"),
            Self::Entry { key, .. } => write!(f, "entry {key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_accessors() {
        let key: TimeKey = "202401010900.2".parse().unwrap();
        let t = ChainTarget::entry(key, Slot::new(4, 1));
        assert!(t.is_entry());
        assert_eq!(t.key(), key);
        assert_eq!(t.slot().unwrap().index(), 4);
        assert_eq!(t.without_slot().slot(), None);
        assert_eq!(t.to_string(), "entry 202401010900.2");
        assert!(ChainTarget::chunk(TimeKey::NULL, None).is_null());
    }
}

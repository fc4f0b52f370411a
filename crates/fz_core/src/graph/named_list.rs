//! Named Lists of Node ids.

use crate::graph::id::NodeId;
use std::collections::{BTreeMap, VecDeque};
use std::ops::BitOr;

/// Feature bits of a Named List.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ListFeatures(u8);

impl ListFeatures {
    /// Append at the back.
    pub const NONE: Self = Self(0);
    /// Insert at the front instead of the back.
    pub const PREPEND: Self = Self(0x01);
    /// Ignore additions of ids already in the list.
    pub const UNIQUE: Self = Self(0x02);
    /// Evict from the far end when `maxsize` is exceeded.
    pub const FIFO: Self = Self(0x04);

    /// Creates features from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x07)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ListFeatures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Result of adding to a Named List.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListInsert {
    /// The id was added.
    Added,
    /// The id was added and the oldest member was evicted.
    Evicted(NodeId),
    /// A unique list already held the id.
    AlreadyPresent,
    /// A list without FIFO eviction is full.
    Full,
}

impl ListInsert {
    /// True when the id is now a member because of this call.
    #[must_use]
    pub const fn inserted(self) -> bool {
        matches!(self, Self::Added | Self::Evicted(_))
    }
}

/// An ordered collection of Node ids with a companion membership count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedList {
    name: String,
    members: VecDeque<NodeId>,
    counts: BTreeMap<NodeId, u32>,
    features: ListFeatures,
    maxsize: usize,
}

impl NamedList {
    /// Creates an empty list. `maxsize` 0 means unbounded.
    #[must_use]
    pub fn new(name: impl Into<String>, features: ListFeatures, maxsize: usize) -> Self {
        Self {
            name: name.into(),
            members: VecDeque::new(),
            counts: BTreeMap::new(),
            features,
            maxsize,
        }
    }

    /// Rebuilds a stored list with its members in their stored order.
    ///
    /// No feature policy is applied.
    #[must_use]
    pub fn from_members<I>(
        name: impl Into<String>,
        features: ListFeatures,
        maxsize: usize,
        members: I,
    ) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut list = Self::new(name, features, maxsize);
        for id in members {
            list.members.push_back(id);
            *list.counts.entry(id).or_insert(0) += 1;
        }
        list
    }

    /// List name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature bits.
    #[must_use]
    pub const fn features(&self) -> ListFeatures {
        self.features
    }

    /// Maximum size, 0 when unbounded.
    #[must_use]
    pub const fn maxsize(&self) -> usize {
        self.maxsize
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the list has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True if `id` is a member.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.counts.contains_key(&id)
    }

    /// Members in list order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + ExactSizeIterator + '_ {
        self.members.iter().copied()
    }

    /// Adds `id` according to the list's features.
    pub fn add(&mut self, id: NodeId) -> ListInsert {
        if self.features.contains(ListFeatures::UNIQUE) && self.contains(id) {
            return ListInsert::AlreadyPresent;
        }
        let fifo = self.features.contains(ListFeatures::FIFO);
        let full = self.maxsize > 0 && self.members.len() >= self.maxsize;
        if full && !fifo {
            return ListInsert::Full;
        }

        let prepend = self.features.contains(ListFeatures::PREPEND);
        if prepend {
            self.members.push_front(id);
        } else {
            self.members.push_back(id);
        }
        *self.counts.entry(id).or_insert(0) += 1;

        if full {
            // the oldest member sits at the opposite end
            let evicted = if prepend {
                self.members.pop_back()
            } else {
                self.members.pop_front()
            };
            if let Some(evicted) = evicted {
                self.forget_one(evicted);
                return ListInsert::Evicted(evicted);
            }
        }
        ListInsert::Added
    }

    /// Removes every occurrence of `id`; returns true if any was removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.counts.remove(&id).is_none() {
            return false;
        }
        self.members.retain(|m| *m != id);
        true
    }

    fn forget_one(&mut self, id: NodeId) {
        if let Some(count) = self.counts.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&id);
            }
        }
    }

    pub(crate) fn footprint_per_member() -> u64 {
        (2 * std::mem::size_of::<NodeId>() + std::mem::size_of::<u32>()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(minute: u8) -> NodeId {
        format!("2024010109{minute:02}").parse().unwrap()
    }

    #[test]
    fn append_and_prepend() {
        let mut list = NamedList::new("a", ListFeatures::NONE, 0);
        list.add(id(1));
        list.add(id(2));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![id(1), id(2)]);

        let mut list = NamedList::new("p", ListFeatures::PREPEND, 0);
        list.add(id(1));
        list.add(id(2));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![id(2), id(1)]);
    }

    #[test]
    fn unique_list_ignores_duplicates() {
        let mut list = NamedList::new("u", ListFeatures::UNIQUE, 0);
        assert_eq!(list.add(id(1)), ListInsert::Added);
        assert_eq!(list.add(id(1)), ListInsert::AlreadyPresent);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn non_unique_list_keeps_duplicates() {
        let mut list = NamedList::new("d", ListFeatures::NONE, 0);
        list.add(id(1));
        list.add(id(1));
        assert_eq!(list.len(), 2);
        assert!(list.remove(id(1)));
        assert!(list.is_empty());
        assert!(!list.contains(id(1)));
    }

    #[test]
    fn fifo_evicts_oldest() {
        let mut list = NamedList::new("f", ListFeatures::FIFO, 3);
        for m in 1..=3 {
            list.add(id(m));
        }
        assert_eq!(list.add(id(4)), ListInsert::Evicted(id(1)));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![id(2), id(3), id(4)]);
        assert!(!list.contains(id(1)));
    }

    #[test]
    fn prepend_fifo_evicts_from_back() {
        let mut list = NamedList::new("r", ListFeatures::FIFO | ListFeatures::PREPEND, 2);
        list.add(id(1));
        list.add(id(2));
        assert_eq!(list.add(id(3)), ListInsert::Evicted(id(1)));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![id(3), id(2)]);
    }

    #[test]
    fn full_list_without_fifo_refuses() {
        let mut list = NamedList::new("n", ListFeatures::NONE, 1);
        assert!(list.add(id(1)).inserted());
        assert_eq!(list.add(id(2)), ListInsert::Full);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn evicting_one_duplicate_keeps_membership() {
        let mut list = NamedList::new("x", ListFeatures::FIFO, 2);
        list.add(id(1));
        list.add(id(1));
        assert_eq!(list.add(id(2)), ListInsert::Evicted(id(1)));
        assert!(list.contains(id(1)));
    }
}

//! Node and Edge identifiers.

use crate::error::KeyError;
use crate::timekey::TimeKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Identity of a Node.
///
/// Node ids are TimeKeys, usually with minor `0`. A non-zero minor
/// distinguishes Nodes created within the same minute.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(TimeKey);

impl NodeId {
    /// The null Node id.
    pub const NULL: NodeId = NodeId(TimeKey::NULL);

    /// Wraps a key.
    #[inline]
    #[must_use]
    pub const fn new(key: TimeKey) -> Self {
        Self(key)
    }

    /// Returns the underlying key.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> TimeKey {
        self.0
    }

    /// True for the null id.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl From<TimeKey> for NodeId {
    fn from(key: TimeKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for NodeId {
    type Err = KeyError;

    /// Accepts `YYYYMMDDHHMM` as well as `YYYYMMDDHHMM.m`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        TimeKey::deserialize(deserializer).map(Self)
    }
}

/// Identity of an Edge: the (dependency, superior) pair.
///
/// Edges order by superior first and dependency second, so all dependencies
/// of one superior are contiguous in an ordered map.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EdgeId {
    dep: NodeId,
    sup: NodeId,
}

impl EdgeId {
    /// Creates an Edge id from its endpoints.
    #[must_use]
    pub const fn new(dep: NodeId, sup: NodeId) -> Self {
        Self { dep, sup }
    }

    /// The dependency endpoint.
    #[must_use]
    pub const fn dep(&self) -> NodeId {
        self.dep
    }

    /// The superior endpoint.
    #[must_use]
    pub const fn sup(&self) -> NodeId {
        self.sup
    }

    /// True when either endpoint is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.dep.is_null() || self.sup.is_null()
    }

    /// Smallest id with superior `sup`, for range scans.
    #[must_use]
    pub const fn first_of_superior(sup: NodeId) -> Self {
        Self {
            dep: NodeId::NULL,
            sup,
        }
    }
}

impl Ord for EdgeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sup
            .cmp(&other.sup)
            .then_with(|| self.dep.cmp(&other.dep))
    }
}

impl PartialOrd for EdgeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({self})")
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.dep, self.sup)
    }
}

impl FromStr for EdgeId {
    type Err = KeyError;

    /// Parses `dep>sup`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (dep, sup) = s
            .split_once('>')
            .ok_or_else(|| KeyError::format("format", s))?;
        Ok(Self::new(dep.parse()?, sup.parse()?))
    }
}

impl Serialize for EdgeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EdgeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn node(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn node_id_accepts_both_forms() {
        assert_eq!(node("202401010900").to_string(), "202401010900");
        assert_eq!(node("202401010900.2").to_string(), "202401010900.2");
        assert_ne!(node("202401010900"), node("202401010900.2"));
    }

    #[test]
    fn edge_id_string_is_dep_then_sup() {
        let e = EdgeId::new(node("202401010900"), node("202301010900"));
        assert_eq!(e.to_string(), "202401010900>202301010900");
        assert_eq!(e.to_string().parse::<EdgeId>().unwrap(), e);
        assert_eq!(
            "202401010900".parse::<EdgeId>().unwrap_err().field(),
            "format"
        );
    }

    #[test]
    fn edges_group_by_superior() {
        let a = node("202401010900");
        let b = node("202401011000");
        let x = node("202301010000");
        let y = node("202501010000");

        let set: BTreeSet<EdgeId> = [
            EdgeId::new(x, b),
            EdgeId::new(y, a),
            EdgeId::new(x, a),
            EdgeId::new(y, b),
        ]
        .into_iter()
        .collect();

        let order: Vec<EdgeId> = set.into_iter().collect();
        assert_eq!(
            order,
            vec![
                EdgeId::new(x, a),
                EdgeId::new(y, a),
                EdgeId::new(x, b),
                EdgeId::new(y, b),
            ]
        );
        assert!(EdgeId::first_of_superior(a) < EdgeId::new(x, a));
    }

    #[test]
    fn null_endpoints_make_null_edge() {
        assert!(EdgeId::new(NodeId::NULL, node("202401010900")).is_null());
        assert!(!EdgeId::new(node("202401010900"), node("202401010901")).is_null());
    }
}

//! Masked bulk edits of Nodes and Edges.

use crate::error::{CoreError, CoreResult};
use crate::graph::edge::Edge;
use crate::graph::node::{Node, TdPattern, TdProperty, TARGETDATE_UNSPECIFIED};
use std::collections::BTreeMap;
use std::ops::{BitOr, BitOrAssign};

/// Selects which fields an edit touches.
///
/// Bit values are part of the stored format of batch edit requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EditFlags(u32);

impl EditFlags {
    /// No fields.
    pub const NONE: Self = Self(0);
    /// Node topics.
    pub const TOPICS: Self = Self(0x1);
    /// Node valuation.
    pub const VALUATION: Self = Self(0x2);
    /// Node completion.
    pub const COMPLETION: Self = Self(0x4);
    /// Node required effort.
    pub const REQUIRED: Self = Self(0x8);
    /// Node text.
    pub const TEXT: Self = Self(0x10);
    /// Node target date.
    pub const TARGETDATE: Self = Self(0x20);
    /// Node target date property.
    pub const TDPROPERTY: Self = Self(0x40);
    /// Node repeat flag.
    pub const REPEATS: Self = Self(0x80);
    /// Node repeat pattern.
    pub const TDPATTERN: Self = Self(0x100);
    /// Node repeat multiplier.
    pub const TDEVERY: Self = Self(0x200);
    /// Node repetition count.
    pub const TDSPAN: Self = Self(0x400);
    /// Topic relevances.
    pub const TOPICRELS: Self = Self(0x800);
    /// Creation time.
    pub const TCREATED: Self = Self(0x1000);
    /// Superior/dependency relations.
    pub const SUPDEP: Self = Self(0x2000);
    /// Named list membership.
    pub const NNL: Self = Self(0x4000);
    /// Edge dependency.
    pub const DEPENDENCY: Self = Self(0x8000);
    /// Edge significance.
    pub const SIGNIFICANCE: Self = Self(0x1_0000);
    /// Edge importance.
    pub const IMPORTANCE: Self = Self(0x2_0000);
    /// Edge urgency.
    pub const URGENCY: Self = Self(0x4_0000);
    /// Edge priority.
    pub const PRIORITY: Self = Self(0x8_0000);

    /// Creates flags from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EditFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EditFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Replacement values for a masked Node edit.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Topic index to relevance pairs.
    pub topics: BTreeMap<u16, f32>,
    /// Valuation.
    pub valuation: f32,
    /// Completion ratio.
    pub completion: f32,
    /// Required effort in seconds.
    pub required: i64,
    /// Text body.
    pub text: String,
    /// Target date in UNIX seconds.
    pub targetdate: i64,
    /// Target date property.
    pub tdproperty: TdProperty,
    /// Repeat flag.
    pub repeats: bool,
    /// Repeat pattern.
    pub tdpattern: TdPattern,
    /// Repeat multiplier.
    pub tdevery: u32,
    /// Repetition count.
    pub tdspan: u32,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            topics: BTreeMap::new(),
            valuation: 0.0,
            completion: 0.0,
            required: 0,
            text: String::new(),
            targetdate: TARGETDATE_UNSPECIFIED,
            tdproperty: TdProperty::Unspecified,
            repeats: false,
            tdpattern: TdPattern::NonPeriodic,
            tdevery: 1,
            tdspan: 0,
        }
    }
}

/// Replacement values for a masked Edge edit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeData {
    /// Dependency.
    pub dependency: f32,
    /// Significance.
    pub significance: f32,
    /// Importance.
    pub importance: f32,
    /// Urgency.
    pub urgency: f32,
    /// Priority.
    pub priority: f32,
}

impl Node {
    /// Applies the masked fields of `data`.
    ///
    /// The property is applied before the repeat flag so that a single edit
    /// can switch a Node to a repeating fixed date.
    ///
    /// # Errors
    ///
    /// [`CoreError::Integrity`] if the edit would make a Node with an
    /// unspecified or variable property repeat. The Node is left untouched
    /// in that case.
    pub fn apply_edit(&mut self, flags: EditFlags, data: &NodeData) -> CoreResult<()> {
        let property = if flags.contains(EditFlags::TDPROPERTY) {
            data.tdproperty
        } else {
            self.tdproperty
        };
        if flags.contains(EditFlags::REPEATS) && data.repeats && !property.allows_repeats() {
            return Err(CoreError::integrity(format!(
                "node {} cannot repeat with a {property:?} target date",
                self.id
            )));
        }
        if flags.contains(EditFlags::TOPICS) {
            self.topics = data.topics.clone();
        } else if flags.contains(EditFlags::TOPICRELS) {
            for (topic, relevance) in &data.topics {
                if let Some(r) = self.topics.get_mut(topic) {
                    *r = *relevance;
                }
            }
        }
        if flags.contains(EditFlags::VALUATION) {
            self.valuation = data.valuation;
        }
        if flags.contains(EditFlags::COMPLETION) {
            self.completion = data.completion;
        }
        if flags.contains(EditFlags::REQUIRED) {
            self.required = data.required;
        }
        if flags.contains(EditFlags::TEXT) {
            self.text.clone_from(&data.text);
        }
        if flags.contains(EditFlags::TARGETDATE) {
            self.targetdate = data.targetdate;
        }
        if flags.contains(EditFlags::TDPROPERTY) {
            self.set_tdproperty(data.tdproperty);
        }
        if flags.contains(EditFlags::REPEATS) {
            self.repeats = data.repeats;
        }
        if flags.contains(EditFlags::TDPATTERN) {
            self.tdpattern = data.tdpattern;
        }
        if flags.contains(EditFlags::TDEVERY) {
            self.tdevery = data.tdevery;
        }
        if flags.contains(EditFlags::TDSPAN) {
            self.tdspan = data.tdspan;
        }
        Ok(())
    }
}

impl Edge {
    /// Applies the masked fields of `data`.
    pub fn apply_edit(&mut self, flags: EditFlags, data: &EdgeData) {
        if flags.contains(EditFlags::DEPENDENCY) {
            self.dependency = data.dependency;
        }
        if flags.contains(EditFlags::SIGNIFICANCE) {
            self.significance = data.significance;
        }
        if flags.contains(EditFlags::IMPORTANCE) {
            self.importance = data.importance;
        }
        if flags.contains(EditFlags::URGENCY) {
            self.urgency = data.urgency;
        }
        if flags.contains(EditFlags::PRIORITY) {
            self.priority = data.priority;
        }
    }
}

//! Graph Nodes.

use crate::error::{CoreError, CoreResult};
use crate::graph::id::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Target date value meaning "no date set".
pub const TARGETDATE_UNSPECIFIED: i64 = -1;

/// How a Node's target date is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TdProperty {
    /// No target date of its own.
    #[default]
    Unspecified,
    /// Inherits the earliest target date of its superiors.
    Inherit,
    /// A soft target that may move.
    Variable,
    /// A firm target.
    Fixed,
    /// An appointment at an exact time.
    Exact,
}

impl TdProperty {
    /// True for properties that may carry a repeat pattern.
    #[must_use]
    pub const fn allows_repeats(self) -> bool {
        !matches!(self, Self::Unspecified | Self::Variable)
    }
}

/// Repeat pattern of a Node with a periodic target date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TdPattern {
    /// Every day.
    Daily,
    /// Monday to Friday.
    Workdays,
    /// Every week.
    Weekly,
    /// Every other week.
    Biweekly,
    /// Every month.
    Monthly,
    /// An offset from the end of every month.
    EndOfMonthOffset,
    /// Every year.
    Yearly,
    /// Legacy span pattern.
    Span,
    /// Not periodic.
    #[default]
    NonPeriodic,
}

/// Interpretation of a Node's completion ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionState {
    /// Not started (`0.0`).
    NotStarted,
    /// Partially done, with the ratio in `(0, 1)`.
    InProgress(f32),
    /// Done (`1.0` or more).
    Done,
    /// Obsolete (`-1.0`).
    Obsolete,
    /// Replaced by another Node (`-2.0`).
    Replaced,
    /// Done in a different way (`-3.0`).
    DoneDifferently,
    /// No longer possible (`-4.0`).
    NoLongerPossible,
}

impl CompletionState {
    /// Classifies a raw completion value.
    #[must_use]
    pub fn from_ratio(completion: f32) -> Self {
        if completion >= 1.0 {
            Self::Done
        } else if completion > 0.0 {
            Self::InProgress(completion)
        } else if completion == 0.0 {
            Self::NotStarted
        } else if completion >= -1.5 {
            Self::Obsolete
        } else if completion >= -2.5 {
            Self::Replaced
        } else if completion >= -3.5 {
            Self::DoneDifferently
        } else {
            Self::NoLongerPossible
        }
    }

    /// The raw value stored for this state.
    #[must_use]
    pub const fn ratio(self) -> f32 {
        match self {
            Self::NotStarted => 0.0,
            Self::InProgress(r) => r,
            Self::Done => 1.0,
            Self::Obsolete => -1.0,
            Self::Replaced => -2.0,
            Self::DoneDifferently => -3.0,
            Self::NoLongerPossible => -4.0,
        }
    }

    /// True for states that close the Node.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        !matches!(self, Self::NotStarted | Self::InProgress(_))
    }
}

/// A Node of the Entity Graph.
///
/// Nodes are created once and edited in place. The incident-edge caches are
/// maintained by [`crate::EntityStore`] and cannot be edited directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) topics: BTreeMap<u16, f32>,
    pub(crate) valuation: f32,
    pub(crate) completion: f32,
    pub(crate) required: i64,
    pub(crate) text: String,
    pub(crate) targetdate: i64,
    pub(crate) tdproperty: TdProperty,
    pub(crate) repeats: bool,
    pub(crate) tdpattern: TdPattern,
    pub(crate) tdevery: u32,
    pub(crate) tdspan: u32,
    /// Edges in which this Node is the dependency (they lead to superiors).
    pub(crate) sup_edges: BTreeSet<EdgeId>,
    /// Edges in which this Node is the superior (they lead to dependencies).
    pub(crate) dep_edges: BTreeSet<EdgeId>,
}

impl Node {
    /// Creates a Node with default field values.
    #[must_use]
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
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
            sup_edges: BTreeSet::new(),
            dep_edges: BTreeSet::new(),
        }
    }

    /// Node id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Topic index to relevance pairs.
    #[must_use]
    pub fn topics(&self) -> &BTreeMap<u16, f32> {
        &self.topics
    }

    /// Adds a topic; returns false if it was already present.
    pub fn add_topic(&mut self, topic: u16, relevance: f32) -> bool {
        if self.topics.contains_key(&topic) {
            return false;
        }
        self.topics.insert(topic, relevance);
        true
    }

    /// Removes a topic.
    ///
    /// Returns `Ok(false)` if the Node does not carry the topic.
    ///
    /// # Errors
    ///
    /// Refuses to remove the last topic of a Node.
    pub fn remove_topic(&mut self, topic: u16) -> CoreResult<bool> {
        if !self.topics.contains_key(&topic) {
            return Ok(false);
        }
        if self.topics.len() == 1 {
            return Err(CoreError::invalid_operation(format!(
                "cannot remove the last topic of node {}",
                self.id
            )));
        }
        self.topics.remove(&topic);
        Ok(true)
    }

    /// The topic with the highest relevance (lowest index on ties).
    #[must_use]
    pub fn main_topic(&self) -> Option<u16> {
        let mut best: Option<(u16, f32)> = None;
        for (&topic, &relevance) in &self.topics {
            if best.map_or(true, |(_, r)| relevance > r) {
                best = Some((topic, relevance));
            }
        }
        best.map(|(topic, _)| topic)
    }

    /// Valuation.
    #[must_use]
    pub const fn valuation(&self) -> f32 {
        self.valuation
    }

    /// Sets the valuation.
    pub fn set_valuation(&mut self, valuation: f32) {
        self.valuation = valuation;
    }

    /// Raw completion ratio.
    #[must_use]
    pub const fn completion(&self) -> f32 {
        self.completion
    }

    /// Sets the raw completion ratio.
    pub fn set_completion(&mut self, completion: f32) {
        self.completion = completion;
    }

    /// Interpreted completion state.
    #[must_use]
    pub fn completion_state(&self) -> CompletionState {
        CompletionState::from_ratio(self.completion)
    }

    /// Required effort in seconds.
    #[must_use]
    pub const fn required(&self) -> i64 {
        self.required
    }

    /// Sets the required effort in seconds.
    pub fn set_required(&mut self, seconds: i64) {
        self.required = seconds;
    }

    /// Text body.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text body.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Replaces the text body from raw bytes, substituting invalid UTF-8.
    ///
    /// Returns the number of replacement characters inserted.
    pub fn set_text_from_bytes(&mut self, bytes: &[u8]) -> usize {
        let (text, replaced) = utf8_lossy_count(bytes);
        if replaced > 0 {
            tracing::warn!(node = %self.id, replaced, "replaced invalid UTF-8 in node text");
        }
        self.text = text;
        replaced
    }

    /// Target date in UNIX seconds, `-1` when unspecified.
    #[must_use]
    pub const fn targetdate(&self) -> i64 {
        self.targetdate
    }

    /// Sets the target date.
    pub fn set_targetdate(&mut self, t: i64) {
        self.targetdate = t;
    }

    /// Target date property.
    #[must_use]
    pub const fn tdproperty(&self) -> TdProperty {
        self.tdproperty
    }

    /// Sets the target date property. Properties that cannot repeat clear
    /// the repeat flag.
    pub fn set_tdproperty(&mut self, property: TdProperty) {
        self.tdproperty = property;
        if !property.allows_repeats() {
            self.repeats = false;
        }
    }

    /// Corrects a property that requires a date while none is set:
    /// `fixed` becomes `inherit`, anything else becomes `unspecified`.
    ///
    /// Returns true if the property was changed.
    pub fn correct_tdproperty(&mut self) -> bool {
        if matches!(self.tdproperty, TdProperty::Unspecified | TdProperty::Inherit)
            || self.targetdate >= 0
        {
            return false;
        }
        let corrected = if self.tdproperty == TdProperty::Fixed {
            TdProperty::Inherit
        } else {
            TdProperty::Unspecified
        };
        self.set_tdproperty(corrected);
        true
    }

    /// Whether the target date repeats.
    #[must_use]
    pub const fn repeats(&self) -> bool {
        self.repeats
    }

    /// Sets the repeat flag.
    ///
    /// # Errors
    ///
    /// Refuses `true` while the property is unspecified or variable.
    pub fn set_repeats(&mut self, repeats: bool) -> CoreResult<()> {
        if repeats && !self.tdproperty.allows_repeats() {
            return Err(CoreError::invalid_operation(format!(
                "node {} cannot repeat with a {:?} target date",
                self.id, self.tdproperty
            )));
        }
        self.repeats = repeats;
        Ok(())
    }

    /// Repeat pattern.
    #[must_use]
    pub const fn tdpattern(&self) -> TdPattern {
        self.tdpattern
    }

    /// Sets the repeat pattern.
    pub fn set_tdpattern(&mut self, pattern: TdPattern) {
        self.tdpattern = pattern;
    }

    /// Repeat multiplier.
    #[must_use]
    pub const fn tdevery(&self) -> u32 {
        self.tdevery
    }

    /// Sets the repeat multiplier.
    pub fn set_tdevery(&mut self, every: u32) {
        self.tdevery = every;
    }

    /// Number of repetitions (0 = unlimited).
    #[must_use]
    pub const fn tdspan(&self) -> u32 {
        self.tdspan
    }

    /// Sets the number of repetitions.
    pub fn set_tdspan(&mut self, span: u32) {
        self.tdspan = span;
    }

    /// Edges leading to superiors of this Node.
    #[must_use]
    pub fn sup_edges(&self) -> &BTreeSet<EdgeId> {
        &self.sup_edges
    }

    /// Edges leading to dependencies of this Node.
    #[must_use]
    pub fn dep_edges(&self) -> &BTreeSet<EdgeId> {
        &self.dep_edges
    }

    /// Approximate byte footprint.
    pub(crate) fn footprint(&self) -> u64 {
        (std::mem::size_of::<Self>()
            + self.text.len()
            + self.topics.len() * std::mem::size_of::<(u16, f32)>()) as u64
    }
}

/// Decodes UTF-8 lossily and counts the substitutions.
fn utf8_lossy_count(bytes: &[u8]) -> (String, usize) {
    let mut out = String::with_capacity(bytes.len());
    let mut replaced = 0;
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        if !chunk.invalid().is_empty() {
            out.push(char::REPLACEMENT_CHARACTER);
            replaced += 1;
        }
    }
    (out, replaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Node {
        Node::new("202401010900".parse().unwrap())
    }

    #[test]
    fn defaults() {
        let n = node();
        assert_eq!(n.targetdate(), TARGETDATE_UNSPECIFIED);
        assert_eq!(n.tdproperty(), TdProperty::Unspecified);
        assert_eq!(n.tdpattern(), TdPattern::NonPeriodic);
        assert_eq!(n.tdevery(), 1);
        assert_eq!(n.tdspan(), 0);
        assert!(!n.repeats());
        assert_eq!(n.completion_state(), CompletionState::NotStarted);
    }

    #[test]
    fn repeats_require_a_firm_property() {
        let mut n = node();
        assert!(n.set_repeats(true).is_err());

        n.set_tdproperty(TdProperty::Fixed);
        n.set_repeats(true).unwrap();
        assert!(n.repeats());

        n.set_tdproperty(TdProperty::Variable);
        assert!(!n.repeats());
    }

    #[test]
    fn dateless_firm_property_is_corrected() {
        let mut n = node();
        n.set_tdproperty(TdProperty::Fixed);
        assert!(n.correct_tdproperty());
        assert_eq!(n.tdproperty(), TdProperty::Inherit);
        assert!(!n.correct_tdproperty());

        n.set_tdproperty(TdProperty::Exact);
        assert!(n.correct_tdproperty());
        assert_eq!(n.tdproperty(), TdProperty::Unspecified);

        n.set_tdproperty(TdProperty::Variable);
        n.set_targetdate(10);
        assert!(!n.correct_tdproperty());
    }

    #[test]
    fn last_topic_cannot_be_removed() {
        let mut n = node();
        assert!(n.add_topic(3, 1.0));
        assert!(!n.add_topic(3, 0.5));
        assert!(n.remove_topic(3).is_err());

        n.add_topic(7, 2.0);
        assert!(n.remove_topic(3).unwrap());
        assert!(!n.remove_topic(3).unwrap());
        assert_eq!(n.topics().len(), 1);
    }

    #[test]
    fn main_topic_has_highest_relevance() {
        let mut n = node();
        assert_eq!(n.main_topic(), None);
        n.add_topic(1, 0.5);
        n.add_topic(4, 2.0);
        n.add_topic(9, 2.0);
        assert_eq!(n.main_topic(), Some(4));
    }

    #[test]
    fn completion_sentinels() {
        assert_eq!(CompletionState::from_ratio(1.0), CompletionState::Done);
        assert_eq!(CompletionState::from_ratio(-1.0), CompletionState::Obsolete);
        assert_eq!(CompletionState::from_ratio(-2.0), CompletionState::Replaced);
        assert_eq!(
            CompletionState::from_ratio(-3.0),
            CompletionState::DoneDifferently
        );
        assert_eq!(
            CompletionState::from_ratio(-4.0),
            CompletionState::NoLongerPossible
        );
        assert_eq!(
            CompletionState::from_ratio(0.25),
            CompletionState::InProgress(0.25)
        );
        assert!(CompletionState::Replaced.is_closed());
        assert!(!CompletionState::InProgress(0.5).is_closed());
        assert_eq!(CompletionState::DoneDifferently.ratio(), -3.0);
    }

    #[test]
    fn invalid_utf8_is_replaced_and_counted() {
        let mut n = node();
        let replaced = n.set_text_from_bytes(b"ok \xff\xfe then \xc3");
        assert_eq!(replaced, 3);
        assert!(n.text().starts_with("ok "));
        assert_eq!(n.set_text_from_bytes("plain é".as_bytes()), 0);
        assert_eq!(n.text(), "plain é");
    }
}

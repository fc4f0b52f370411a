//! Topic tags.

use crate::error::{CoreError, CoreResult, RecordKind};
use std::collections::BTreeMap;

/// A keyword of a Topic with its relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// Keyword text.
    pub text: String,
    /// Relevance of the keyword to the topic.
    pub relevance: f32,
}

/// A Topic tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    id: u16,
    supid: Option<u16>,
    tag: String,
    title: String,
    keywords: Vec<Keyword>,
}

impl Topic {
    /// Creates a Topic. Use [`Topics::find_or_add`] to register one.
    #[must_use]
    pub fn new(id: u16, tag: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            supid: None,
            tag: tag.into(),
            title: title.into(),
            keywords: Vec::new(),
        }
    }

    /// Index in the topic registry.
    #[must_use]
    pub const fn id(&self) -> u16 {
        self.id
    }

    /// Superior topic used for grouping.
    #[must_use]
    pub const fn supid(&self) -> Option<u16> {
        self.supid
    }

    /// Sets the superior topic.
    pub fn set_supid(&mut self, supid: Option<u16>) {
        self.supid = supid;
    }

    /// Tag string.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sets the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Keywords in insertion order.
    #[must_use]
    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Adds a keyword, or updates its relevance if already present.
    pub fn add_keyword(&mut self, text: impl Into<String>, relevance: f32) {
        let text = text.into();
        if let Some(existing) = self.keywords.iter_mut().find(|k| k.text == text) {
            existing.relevance = relevance;
            return;
        }
        self.keywords.push(Keyword { text, relevance });
    }

    pub(crate) fn footprint(&self) -> u64 {
        (std::mem::size_of::<Self>()
            + self.tag.len()
            + self.title.len()
            + self
                .keywords
                .iter()
                .map(|k| std::mem::size_of::<Keyword>() + k.text.len())
                .sum::<usize>()) as u64
    }
}

/// Append-only Topic registry with a tag index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topics {
    topics: Vec<Topic>,
    by_tag: BTreeMap<String, u16>,
}

impl Topics {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of the Topic with `tag`, adding it if missing.
    ///
    /// The second value is true when the Topic was added.
    ///
    /// # Errors
    ///
    /// Fails when the registry already holds `u16::MAX + 1` topics.
    pub fn find_or_add(&mut self, tag: &str, title: &str) -> CoreResult<(u16, bool)> {
        if let Some(&id) = self.by_tag.get(tag) {
            return Ok((id, false));
        }
        let id = u16::try_from(self.topics.len()).map_err(|_| {
            CoreError::invalid_operation(format!("topic index overflow adding {tag}"))
        })?;
        self.topics.push(Topic::new(id, tag, title));
        self.by_tag.insert(tag.to_string(), id);
        Ok((id, true))
    }

    /// Registers a Topic loaded with its index.
    ///
    /// # Errors
    ///
    /// [`CoreError::Duplicate`] for an index or tag that is already in use,
    /// and [`CoreError::InvalidOperation`] for an index that would leave a
    /// gap.
    pub fn insert(&mut self, topic: Topic) -> CoreResult<()> {
        let next = self.topics.len();
        if usize::from(topic.id) < next || self.by_tag.contains_key(&topic.tag) {
            return Err(CoreError::duplicate(RecordKind::Topic, &topic.tag));
        }
        if usize::from(topic.id) > next {
            return Err(CoreError::invalid_operation(format!(
                "topic {} has index {} but the next free index is {next}",
                topic.tag, topic.id
            )));
        }
        self.by_tag.insert(topic.tag.clone(), topic.id);
        self.topics.push(topic);
        Ok(())
    }

    /// Looks up a Topic by index.
    #[must_use]
    pub fn find_by_id(&self, id: u16) -> Option<&Topic> {
        self.topics.get(usize::from(id))
    }

    /// Looks up a Topic by index for editing.
    pub fn find_by_id_mut(&mut self, id: u16) -> Option<&mut Topic> {
        self.topics.get_mut(usize::from(id))
    }

    /// Looks up a Topic by tag.
    #[must_use]
    pub fn find_by_tag(&self, tag: &str) -> Option<&Topic> {
        self.by_tag.get(tag).and_then(|&id| self.find_by_id(id))
    }

    /// Number of Topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// True if no Topic is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Topics in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Topic> {
        self.topics.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_or_add_is_idempotent() {
        let mut topics = Topics::new();
        assert_eq!(topics.find_or_add("work", "Work").unwrap(), (0, true));
        assert_eq!(topics.find_or_add("home", "Home").unwrap(), (1, true));
        assert_eq!(topics.find_or_add("work", "ignored").unwrap(), (0, false));
        assert_eq!(topics.len(), 2);
        assert_eq!(topics.find_by_tag("home").unwrap().id(), 1);
        assert_eq!(topics.find_by_id(0).unwrap().title(), "Work");
        assert!(topics.find_by_id(2).is_none());
    }

    #[test]
    fn loaded_topics_must_be_dense() {
        let mut topics = Topics::new();
        topics.insert(Topic::new(0, "a", "A")).unwrap();
        assert!(matches!(
            topics.insert(Topic::new(0, "b", "B")),
            Err(CoreError::Duplicate { .. })
        ));
        assert!(matches!(
            topics.insert(Topic::new(5, "c", "C")),
            Err(CoreError::InvalidOperation { .. })
        ));
        topics.insert(Topic::new(1, "b", "B")).unwrap();
        assert_eq!(topics.len(), 2);
    }

    #[test]
    fn keywords_update_in_place() {
        let mut t = Topic::new(0, "rust", "Rust");
        t.add_keyword("borrow", 0.5);
        t.add_keyword("trait", 1.0);
        t.add_keyword("borrow", 2.0);
        assert_eq!(t.keywords().len(), 2);
        assert_eq!(t.keywords()[0].relevance, 2.0);
        t.set_supid(Some(3));
        assert_eq!(t.supid(), Some(3));
    }
}

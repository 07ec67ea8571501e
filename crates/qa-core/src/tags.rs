//! Tag index
//!
//! Tags are identified by their normalized name. The index keeps the
//! tag -> questions side of the link; the question -> tags side lives on
//! [`Question`](crate::models::Question). Both sides are only ever changed
//! together, through [`TagIndex::retag`].

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Tag;
use crate::table::{EntityTable, QuestionId, TagId};

/// Longest allowed tag name, in characters
pub const MAX_TAG_LENGTH: usize = 32;

static TAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9+#._-]{1,32}$").expect("tag pattern is valid"));

static TAG_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,]+").expect("separator pattern is valid"));

/// Whether `name` is an acceptable, already normalized tag name
pub fn is_valid_tag_name(name: &str) -> bool {
    TAG_NAME.is_match(name)
}

/// Lowercase and truncate a raw token to tag length
pub fn normalize_tag(token: &str) -> String {
    token.to_lowercase().chars().take(MAX_TAG_LENGTH).collect()
}

/// Split a user-entered tag string into valid, distinct tag names
///
/// Tokens are separated by runs of whitespace and commas. Tokens that are
/// still invalid after normalization are dropped without complaint. The
/// result keeps first-seen order.
pub fn parse_tag_string(raw: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    TAG_SEPARATORS
        .split(raw)
        .filter(|token| !token.is_empty())
        .map(normalize_tag)
        .filter(|name| is_valid_tag_name(name))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// All known tags, addressable by id and by name
#[derive(Debug, Default)]
pub struct TagIndex {
    tags: EntityTable<Tag>,
    by_name: HashMap<String, TagId>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(id)
    }

    /// Look up a tag by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&Tag> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.tags.get(*id))
    }

    /// Resolve a valid name to its tag, creating the tag on first use
    pub fn resolve(&mut self, name: &str) -> Option<TagId> {
        let name = normalize_tag(name);
        if !is_valid_tag_name(&name) {
            return None;
        }
        if let Some(id) = self.by_name.get(&name) {
            return Some(*id);
        }
        let id = self.tags.add_new(|id| Tag::new(id, name.clone()));
        tracing::debug!(tag = %name, id = %id, "Created tag");
        self.by_name.insert(name, id);
        Some(id)
    }

    /// Replace the tags of `question`
    ///
    /// Detaches the question from every tag in `previous`, attaches it to
    /// every tag named in `raw`, and returns the new tag ids sorted by name.
    /// The caller stores the returned list on the question while still
    /// holding the same write access, so no reader sees one side without the
    /// other.
    pub fn retag(&mut self, question: QuestionId, previous: &[TagId], raw: Option<&str>) -> Vec<TagId> {
        let names = raw.map(parse_tag_string).unwrap_or_default();
        let mut next: Vec<TagId> = names.iter().filter_map(|name| self.resolve(name)).collect();

        self.detach(question, previous);
        for id in &next {
            if let Some(tag) = self.tags.get_mut(*id) {
                tag.questions.insert(question);
            }
        }

        next.sort_by(|a, b| self.name_of(*a).cmp(self.name_of(*b)));
        next
    }

    /// Remove `question` from each of `tags`
    pub fn detach(&mut self, question: QuestionId, tags: &[TagId]) {
        for id in tags {
            if let Some(tag) = self.tags.get_mut(*id) {
                tag.questions.remove(&question);
            }
        }
    }

    fn name_of(&self, id: TagId) -> &str {
        self.tags.get(id).map(Tag::name).unwrap_or_default()
    }

    pub fn names(&self, ids: &[TagId]) -> Vec<String> {
        ids.iter().map(|id| self.name_of(*id).to_string()).collect()
    }

    /// Every tag, sorted by name
    pub fn all(&self) -> Vec<&Tag> {
        let mut tags: Vec<&Tag> = self.tags.values().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    /// Tags whose name starts with `prefix`, sorted by name
    pub fn with_prefix(&self, prefix: &str) -> Vec<&Tag> {
        let prefix = prefix.to_lowercase();
        self.all()
            .into_iter()
            .filter(|tag| tag.name.starts_with(&prefix))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.tags.size()
    }
}

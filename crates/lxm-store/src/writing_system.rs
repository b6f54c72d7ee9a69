//! Writing-system registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Externally supplied description of a language, applied on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsDescription {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
    pub font: Option<String>,
    pub right_to_left: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingSystem {
    pub tag: String,
    pub name: String,
    pub abbreviation: String,
    pub font: Option<String>,
    pub right_to_left: bool,
}

impl WritingSystem {
    fn from_description(tag: &str, description: Option<&WsDescription>) -> Self {
        let description = description.cloned().unwrap_or_default();
        Self {
            tag: tag.to_string(),
            name: description.name.unwrap_or_else(|| tag.to_string()),
            abbreviation: description.abbreviation.unwrap_or_else(|| tag.to_string()),
            font: description.font,
            right_to_left: description.right_to_left,
        }
    }
}

/// Language tags known to the repository.
///
/// Tags are matched case-insensitively; the first spelling seen is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingSystemRegistry {
    systems: BTreeMap<String, WritingSystem>,
}

impl WritingSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tag: &str) -> String {
        tag.trim().to_ascii_lowercase()
    }

    pub fn get(&self, tag: &str) -> Option<&WritingSystem> {
        self.systems.get(&Self::key(tag))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.systems.contains_key(&Self::key(tag))
    }

    /// Find a writing system by tag, creating it when missing.
    ///
    /// Returns the canonical tag and whether it was created.
    pub fn find_or_create(
        &mut self,
        tag: &str,
        description: Option<&WsDescription>,
    ) -> (String, bool) {
        let key = Self::key(tag);
        if let Some(existing) = self.systems.get(&key) {
            return (existing.tag.clone(), false);
        }
        let ws = WritingSystem::from_description(tag.trim(), description);
        let canonical = ws.tag.clone();
        tracing::debug!(tag = %canonical, "created writing system");
        self.systems.insert(key, ws);
        (canonical, true)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WritingSystem> {
        self.systems.values()
    }
}

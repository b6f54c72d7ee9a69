//! Multilingual text keyed by writing system.
//!
//! Every text field of a lexical record carries one alternative per writing
//! system. Alternatives are compared after canonical decomposition so that
//! precomposed and decomposed spellings of the same text agree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Canonical decomposition (NFD) of `s`.
pub fn normalize(s: &str) -> String {
    s.nfd().collect()
}

/// Returns `true` when an existing value disagrees with an incoming one.
///
/// An empty existing value never conflicts. Otherwise both sides are
/// normalized and compared byte for byte.
pub fn texts_conflict(existing: &str, incoming: &str) -> bool {
    if existing.is_empty() {
        return false;
    }
    normalize(existing) != normalize(incoming)
}

/// Text with one alternative per writing-system tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiText {
    alternatives: BTreeMap<String, String>,
}

impl MultiText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(writing system, text)` pairs. Later pairs win.
    pub fn from_pairs<I, W, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (W, T)>,
        W: Into<String>,
        T: Into<String>,
    {
        let mut text = Self::new();
        for (ws, value) in pairs {
            text.set(ws, value);
        }
        text
    }

    /// A single-alternative text.
    pub fn single(ws: impl Into<String>, value: impl Into<String>) -> Self {
        Self::from_pairs([(ws, value)])
    }

    pub fn get(&self, ws: &str) -> Option<&str> {
        self.alternatives.get(ws).map(String::as_str)
    }

    /// Set one alternative. Setting an empty string removes it.
    pub fn set(&mut self, ws: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let ws = ws.into();
        if value.is_empty() {
            self.alternatives.remove(&ws);
        } else {
            self.alternatives.insert(ws, value);
        }
    }

    pub fn remove(&mut self, ws: &str) -> Option<String> {
        self.alternatives.remove(ws)
    }

    pub fn clear(&mut self) {
        self.alternatives.clear();
    }

    /// `true` when no alternative carries text.
    pub fn is_empty(&self) -> bool {
        self.alternatives.values().all(String::is_empty)
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    /// Iterate `(writing system, text)` pairs in writing-system order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.alternatives
            .iter()
            .map(|(ws, text)| (ws.as_str(), text.as_str()))
    }

    pub fn writing_systems(&self) -> impl Iterator<Item = &str> {
        self.alternatives.keys().map(String::as_str)
    }

    /// The first non-empty alternative, used for display and lookup keys.
    pub fn best(&self) -> Option<&str> {
        self.alternatives
            .values()
            .find(|text| !text.is_empty())
            .map(String::as_str)
    }

    /// First writing system whose existing alternative disagrees with
    /// `incoming`, if any.
    pub fn first_conflict<'a>(&self, incoming: &'a MultiText) -> Option<&'a str> {
        incoming.iter().find_map(|(ws, text)| {
            let existing = self.get(ws).unwrap_or("");
            texts_conflict(existing, text).then_some(ws)
        })
    }

    /// `true` when both texts hold the same alternatives after normalization.
    pub fn equivalent(&self, other: &MultiText) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(ws, text)| other.get(ws).is_some_and(|o| normalize(o) == normalize(text)))
    }
}

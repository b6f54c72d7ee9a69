use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

static GUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .expect("guid pattern is valid")
});

/// Stable unique identity of a lexical record.
///
/// Guids survive export and re-import, so they are the primary key used to
/// match incoming document records against existing repository records.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Guid(Uuid);

impl Guid {
    /// Synthesize a fresh random identity.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a guid in hyphenated form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| TypeError::InvalidGuid(s.to_string()))
    }

    /// Find a UUID-shaped substring inside a document identifier.
    ///
    /// Many exporters build identifiers like `dog_5f0a…`; the embedded guid is
    /// the first match. Returns `None` when no such substring exists.
    pub fn extract_from(identifier: &str) -> Option<Self> {
        GUID_PATTERN
            .find(identifier)
            .and_then(|m| Uuid::parse_str(m.as_str()).ok())
            .map(Self)
    }

    /// Resolve the identity of a document construct.
    ///
    /// An explicit guid wins, then a guid embedded in the identifier, then a
    /// fresh random one. The boolean is `true` when the identity was
    /// synthesized.
    pub fn resolve(explicit: Option<&str>, identifier: Option<&str>) -> (Self, bool) {
        if let Some(guid) = explicit.and_then(|g| Self::parse(g).ok()) {
            return (guid, false);
        }
        if let Some(guid) = identifier.and_then(Self::extract_from) {
            return (guid, false);
        }
        (Self::new_random(), true)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl From<Uuid> for Guid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for Guid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.short_id())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Repository handle of a record.
///
/// Handles are assigned by the repository and are only meaningful within it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "5f0a3c1e-9b7d-4e2a-8c61-0d3f2b9a7e44";

    #[test]
    fn explicit_guid_wins() {
        let other = "dog_11111111-2222-3333-4444-555555555555";
        let (guid, synthesized) = Guid::resolve(Some(SAMPLE), Some(other));
        assert_eq!(guid, Guid::parse(SAMPLE).unwrap());
        assert!(!synthesized);
    }

    #[test]
    fn embedded_guid_used_when_explicit_missing() {
        let id = format!("dog_{SAMPLE}");
        let (guid, synthesized) = Guid::resolve(None, Some(&id));
        assert_eq!(guid.to_string(), SAMPLE);
        assert!(!synthesized);
    }

    #[test]
    fn malformed_explicit_falls_back_to_identifier() {
        let id = format!("cat {SAMPLE} extra");
        let (guid, _) = Guid::resolve(Some("not-a-guid"), Some(&id));
        assert_eq!(guid.to_string(), SAMPLE);
    }

    #[test]
    fn synthesized_when_nothing_usable() {
        let (a, synthesized) = Guid::resolve(None, Some("plain-id"));
        let (b, _) = Guid::resolve(None, Some("plain-id"));
        assert!(synthesized);
        assert_ne!(a, b);
    }

    #[test]
    fn extract_accepts_uppercase() {
        let id = format!("x_{}", SAMPLE.to_uppercase());
        assert_eq!(Guid::extract_from(&id).unwrap().to_string(), SAMPLE);
    }

    #[test]
    fn short_id_is_eight_chars() {
        let guid = Guid::parse(SAMPLE).unwrap();
        assert_eq!(guid.short_id(), "5f0a3c1e");
    }

    #[test]
    fn serde_roundtrip() {
        let guid = Guid::parse(SAMPLE).unwrap();
        let json = serde_json::to_string(&guid).unwrap();
        let parsed: Guid = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, guid);
    }

    #[test]
    fn record_id_display() {
        assert_eq!(RecordId(42).to_string(), "#42");
    }

    proptest! {
        #[test]
        fn extraction_finds_guid_behind_any_prefix(prefix in "[a-z_ ]{0,12}") {
            let guid = Guid::new_random();
            let id = format!("{prefix}{guid}");
            prop_assert_eq!(Guid::extract_from(&id), Some(guid));
        }
    }
}

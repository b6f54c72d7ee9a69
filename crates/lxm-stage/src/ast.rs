//! Tokenized interchange document.
//!
//! Each node mirrors one document construct with its attributes already
//! split out. Text is carried as [`MultiText`]. Constructs the parser did not
//! recognize keep their verbatim markup in [`UnknownNode`], and nodes that may
//! end up in residue carry their original markup in `raw` when the parser
//! kept it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use lxm_index::Range;
use lxm_types::MultiText;

use crate::error::{StageError, StageResult};

/// A whole interchange document with its controlled vocabularies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Document {
    pub ranges: Vec<Range>,
    /// Header declarations of custom fields.
    pub field_definitions: Vec<FieldDefinition>,
    pub entries: Vec<EntryNode>,
}

impl Document {
    pub fn from_json(json: &str) -> StageResult<Self> {
        serde_json::from_str(json).map_err(|e| StageError::Document(e.to_string()))
    }

    pub fn load(path: &Path) -> StageResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Declaration of a custom field tag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDefinition {
    pub tag: String,
    /// `Class=...; Type=...; WsSelector=...; range=...`
    pub descriptor: Option<String>,
    pub label: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EntryNode {
    pub id: Option<String>,
    pub guid: Option<String>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub date_deleted: Option<String>,
    /// Homograph number.
    pub order: Option<u32>,
    pub lexical_unit: MultiText,
    pub citation: MultiText,
    pub pronunciations: Vec<PronunciationNode>,
    pub variants: Vec<VariantNode>,
    pub senses: Vec<SenseNode>,
    pub notes: Vec<NoteNode>,
    pub relations: Vec<RelationNode>,
    pub etymologies: Vec<EtymologyNode>,
    pub fields: Vec<FieldNode>,
    pub traits: Vec<TraitNode>,
    pub unknown: Vec<UnknownNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SenseNode {
    pub id: Option<String>,
    pub guid: Option<String>,
    pub order: Option<u32>,
    pub grammatical_info: Option<GrammaticalInfoNode>,
    pub gloss: MultiText,
    pub definition: MultiText,
    pub examples: Vec<ExampleNode>,
    pub relations: Vec<RelationNode>,
    pub notes: Vec<NoteNode>,
    pub reversals: Vec<ReversalNode>,
    pub illustrations: Vec<PictureNode>,
    pub subsenses: Vec<SenseNode>,
    pub fields: Vec<FieldNode>,
    pub traits: Vec<TraitNode>,
    pub unknown: Vec<UnknownNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammaticalInfoNode {
    pub value: String,
    pub traits: Vec<TraitNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleNode {
    pub guid: Option<String>,
    /// Source reference of the example.
    pub source: Option<String>,
    pub sentence: MultiText,
    pub translations: Vec<TranslationNode>,
    pub notes: Vec<NoteNode>,
    pub unknown: Vec<UnknownNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationNode {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PronunciationNode {
    pub form: MultiText,
    pub media: Vec<MediaNode>,
    pub unknown: Vec<UnknownNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaNode {
    pub href: String,
    pub label: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PictureNode {
    pub href: String,
    pub label: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantNode {
    /// Identifier of the entry this variant points at.
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub form: MultiText,
    pub traits: Vec<TraitNode>,
    pub raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtymologyNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub form: MultiText,
    pub gloss: MultiText,
    pub unknown: Vec<UnknownNode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RelationNode {
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(rename = "ref")]
    pub target: String,
    pub order: Option<i32>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub traits: Vec<TraitNode>,
    pub raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNode {
    #[serde(rename = "type")]
    pub tag: String,
    pub text: MultiText,
    pub raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteNode {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: MultiText,
    pub raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitNode {
    pub name: String,
    pub value: String,
    pub raw: Option<String>,
}

impl TraitNode {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            raw: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReversalNode {
    /// Writing system of the reversal index.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub form: MultiText,
    pub main: Option<Box<ReversalNode>>,
    pub grammatical_info: Option<GrammaticalInfoNode>,
}

/// A construct the parser could not tokenize, kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnknownNode {
    pub name: String,
    pub xml: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_document_json() {
        let json = r#"{
            "field-definitions": [
                {"tag": "Source", "descriptor": "Class=LexEntry; Type=String"}
            ],
            "entries": [{
                "id": "nyumba_1",
                "guid": "5f0a7a9e-6a39-4b8e-9d21-0c2b1f3a4d5e",
                "date-modified": "2024-03-01T10:00:00Z",
                "lexical-unit": {"seh": "nyumba"},
                "senses": [{
                    "gloss": {"en": "house"},
                    "grammatical-info": {"value": "Noun"}
                }],
                "relations": [{"type": "Synonyms", "ref": "kaya_1"}],
                "unknown": [{"name": "x-note", "xml": "<x-note>old</x-note>"}]
            }]
        }"#;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.field_definitions.len(), 1);
        let entry = &doc.entries[0];
        assert_eq!(entry.lexical_unit.get("seh"), Some("nyumba"));
        assert_eq!(entry.relations[0].target, "kaya_1");
        assert_eq!(
            entry.senses[0].grammatical_info.as_ref().unwrap().value,
            "Noun"
        );
        assert_eq!(entry.unknown[0].xml, "<x-note>old</x-note>");
    }

    #[test]
    fn malformed_document_reported() {
        assert!(matches!(
            Document::from_json("{\"entries\": 3}"),
            Err(StageError::Document(_))
        ));
    }
}

//! The staged entry graph.
//!
//! Staged nodes hold parsed values (identities, timestamps, resolved file
//! references) but no repository handles, except the handle of the existing
//! entry an incoming entry corresponds to.

use lxm_types::{Guid, InvalidData, MultiText, RecordId, Timestamp};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedTrait {
    pub name: String,
    pub value: String,
    pub raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedField {
    pub tag: String,
    pub text: MultiText,
    pub raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedNote {
    /// Note type; untyped notes are `general`.
    pub kind: String,
    pub text: MultiText,
    pub raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedRelation {
    pub relation_type: String,
    pub target: String,
    pub order: Option<i32>,
    pub created: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    pub traits: Vec<StagedTrait>,
    pub raw: Option<String>,
}

impl StagedRelation {
    pub fn trait_value(&self, name: &str) -> Option<&str> {
        self.traits
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedMedia {
    pub file: String,
    pub label: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedPronunciation {
    pub form: MultiText,
    pub media: Vec<StagedMedia>,
    pub residue: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedVariant {
    pub target: Option<String>,
    pub form: MultiText,
    pub traits: Vec<StagedTrait>,
    pub raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedEtymology {
    pub kind: String,
    pub source: String,
    pub form: MultiText,
    pub gloss: MultiText,
    pub residue: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedGrammaticalInfo {
    pub part_of_speech: String,
    pub traits: Vec<StagedTrait>,
}

impl StagedGrammaticalInfo {
    pub fn trait_value(&self, name: &str) -> Option<&str> {
        self.traits
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedTranslation {
    pub kind: Option<String>,
    pub text: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedExample {
    pub guid: Option<Guid>,
    pub reference: Option<String>,
    pub sentence: MultiText,
    pub translations: Vec<StagedTranslation>,
    pub notes: Vec<StagedNote>,
    pub residue: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedPicture {
    /// File reference resolved against the document directory.
    pub file: String,
    pub caption: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedReversal {
    pub writing_system: String,
    pub form: MultiText,
    pub parent: Option<Box<StagedReversal>>,
    pub part_of_speech: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedSense {
    pub identifier: Option<String>,
    pub guid: Guid,
    pub guid_synthesized: bool,
    pub order: Option<u32>,
    pub gloss: MultiText,
    pub definition: MultiText,
    pub grammatical_info: Option<StagedGrammaticalInfo>,
    pub examples: Vec<StagedExample>,
    pub pictures: Vec<StagedPicture>,
    pub reversals: Vec<StagedReversal>,
    pub notes: Vec<StagedNote>,
    pub relations: Vec<StagedRelation>,
    pub fields: Vec<StagedField>,
    pub traits: Vec<StagedTrait>,
    pub subsenses: Vec<StagedSense>,
    pub residue: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StagedEntry {
    /// Document identifier; the guid string when the document had none.
    pub identifier: String,
    pub guid: Guid,
    pub guid_synthesized: bool,
    /// Existing entry with the same guid.
    pub existing: Option<RecordId>,
    pub created: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    pub order: Option<u32>,
    pub lexical_unit: MultiText,
    pub citation: MultiText,
    /// Explicit morph-type name.
    pub morph_type: Option<String>,
    pub pronunciations: Vec<StagedPronunciation>,
    pub variants: Vec<StagedVariant>,
    pub senses: Vec<StagedSense>,
    pub notes: Vec<StagedNote>,
    pub relations: Vec<StagedRelation>,
    pub etymologies: Vec<StagedEtymology>,
    pub fields: Vec<StagedField>,
    pub traits: Vec<StagedTrait>,
    pub residue: Vec<String>,
}

impl StagedEntry {
    /// Every sense in document order, subsenses after their parent.
    pub fn all_senses(&self) -> Vec<&StagedSense> {
        fn walk<'a>(senses: &'a [StagedSense], out: &mut Vec<&'a StagedSense>) {
            for sense in senses {
                out.push(sense);
                walk(&sense.subsenses, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.senses, &mut out);
        out
    }
}

/// An existing entry skipped because its modification time is unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct UnchangedEntry {
    pub record: RecordId,
    /// Document identifiers met inside the entry, with their guids.
    pub identifiers: Vec<(String, Guid)>,
}

/// The staged form of one document.
#[derive(Clone, Debug, Default)]
pub struct StagedDocument {
    pub entries: Vec<StagedEntry>,
    pub unchanged: Vec<UnchangedEntry>,
    /// Existing entries the document marks as deleted.
    pub deletions: Vec<(Guid, RecordId)>,
    pub invalid_data: Vec<InvalidData>,
}

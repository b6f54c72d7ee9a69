//! Record model of the lexical repository.
//!
//! Every record carries a stable [`Guid`] and an optional residue property
//! holding document data the schema cannot represent. Owned children (an
//! entry's senses, a sense's examples, a relation type's references) are
//! listed by handle on the owner and carry their owner handle back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use lxm_types::{Guid, MultiText, RecordId, Timestamp};

/// Discriminant of [`Record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    Entry,
    Sense,
    Example,
    Pronunciation,
    Etymology,
    EntryRef,
    Msa,
    ReversalIndex,
    ReversalEntry,
    Vocabulary,
    FeatureDefn,
    RefType,
    Reference,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Entry => "entry",
            RecordKind::Sense => "sense",
            RecordKind::Example => "example",
            RecordKind::Pronunciation => "pronunciation",
            RecordKind::Etymology => "etymology",
            RecordKind::EntryRef => "entry-ref",
            RecordKind::Msa => "msa",
            RecordKind::ReversalIndex => "reversal-index",
            RecordKind::ReversalEntry => "reversal-entry",
            RecordKind::Vocabulary => "vocabulary",
            RecordKind::FeatureDefn => "feature-definition",
            RecordKind::RefType => "ref-type",
            RecordKind::Reference => "reference",
        }
    }

    /// Parse the owner class named in a custom field descriptor.
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name.trim() {
            "LexEntry" | "entry" => Some(RecordKind::Entry),
            "LexSense" | "sense" => Some(RecordKind::Sense),
            "LexExampleSentence" | "example" => Some(RecordKind::Example),
            "LexPronunciation" | "pronunciation" => Some(RecordKind::Pronunciation),
            "LexEtymology" | "etymology" => Some(RecordKind::Etymology),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entry level
// ---------------------------------------------------------------------------

/// A headword and everything it owns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LexEntry {
    pub guid: Guid,
    pub created: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    pub homograph: u32,
    pub lexeme_form: MultiText,
    pub morph_type: Option<RecordId>,
    pub citation_form: MultiText,
    /// Notes keyed by note type; the general note uses the empty key.
    pub notes: BTreeMap<String, MultiText>,
    /// Built-in text fields keyed by field tag (`literal-meaning`, ...).
    pub fields: BTreeMap<String, MultiText>,
    /// Vocabulary-valued traits keyed by vocabulary name.
    pub traits: BTreeMap<String, Vec<RecordId>>,
    pub senses: Vec<RecordId>,
    pub msas: Vec<RecordId>,
    pub pronunciations: Vec<RecordId>,
    pub etymologies: Vec<RecordId>,
    pub entry_refs: Vec<RecordId>,
    pub residue: Option<String>,
}

/// One meaning of an entry. Subsenses are owned by their parent sense.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LexSense {
    pub guid: Guid,
    pub owner: Option<RecordId>,
    pub gloss: MultiText,
    pub definition: MultiText,
    pub msa: Option<RecordId>,
    pub notes: BTreeMap<String, MultiText>,
    pub fields: BTreeMap<String, MultiText>,
    pub traits: BTreeMap<String, Vec<RecordId>>,
    pub examples: Vec<RecordId>,
    pub pictures: Vec<Picture>,
    pub reversals: Vec<RecordId>,
    pub subsenses: Vec<RecordId>,
    pub residue: Option<String>,
}

/// An illustration attached to a sense.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    pub file: String,
    pub caption: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub guid: Guid,
    pub owner: Option<RecordId>,
    pub sentence: MultiText,
    pub reference: String,
    pub translations: Vec<Translation>,
    pub notes: BTreeMap<String, MultiText>,
    pub residue: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub kind: Option<RecordId>,
    pub text: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pronunciation {
    pub guid: Guid,
    pub owner: Option<RecordId>,
    pub form: MultiText,
    pub media: Vec<Media>,
    pub residue: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub file: String,
    pub label: MultiText,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Etymology {
    pub guid: Guid,
    pub owner: Option<RecordId>,
    pub kind: String,
    pub source: String,
    pub form: MultiText,
    pub gloss: MultiText,
    pub residue: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryRefKind {
    #[default]
    Variant,
    ComplexForm,
}

/// Variant or complex-form link from an entry to its component entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryRef {
    pub guid: Guid,
    pub owner: Option<RecordId>,
    pub kind: EntryRefKind,
    pub components: Vec<RecordId>,
    pub primary: Vec<RecordId>,
    /// Variant types or complex-form types.
    pub types: Vec<RecordId>,
    pub summary: MultiText,
    pub hide_minor_entry: bool,
    pub residue: Option<String>,
}

// ---------------------------------------------------------------------------
// Morphosyntactic analysis
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AffixKind {
    Inflectional,
    Derivational,
    #[default]
    Unclassified,
}

/// The closed family of analyses an entry can carry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Analysis {
    Stem {
        pos: Option<RecordId>,
        /// `(feature definition, value)` pairs.
        features: Vec<(RecordId, String)>,
    },
    Affix {
        kind: AffixKind,
        from_pos: Option<RecordId>,
        to_pos: Option<RecordId>,
    },
}

impl Default for Analysis {
    fn default() -> Self {
        Analysis::Stem {
            pos: None,
            features: Vec::new(),
        }
    }
}

impl Analysis {
    /// The part of speech the analysis assigns, if any.
    pub fn part_of_speech(&self) -> Option<RecordId> {
        match self {
            Analysis::Stem { pos, .. } => *pos,
            Analysis::Affix { to_pos, from_pos, .. } => to_pos.or(*from_pos),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Msa {
    pub guid: Guid,
    pub owner: Option<RecordId>,
    pub analysis: Analysis,
}

// ---------------------------------------------------------------------------
// Reversals and vocabularies
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReversalIndex {
    pub guid: Guid,
    pub writing_system: String,
    pub entries: Vec<RecordId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReversalEntry {
    pub guid: Guid,
    pub index: Option<RecordId>,
    pub parent: Option<RecordId>,
    pub form: MultiText,
    pub pos: Option<RecordId>,
    pub residue: Option<String>,
}

/// One item of a controlled vocabulary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub guid: Guid,
    /// Name of the vocabulary (`grammatical-info`, `morph-type`, ...).
    pub vocabulary: String,
    pub name: MultiText,
    pub abbreviation: MultiText,
    pub description: MultiText,
    pub parent: Option<RecordId>,
    pub residue: Option<String>,
}

/// A feature usable in inflection feature structures.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefn {
    pub guid: Guid,
    pub name: MultiText,
    pub abbreviation: MultiText,
    pub values: Vec<String>,
}

// ---------------------------------------------------------------------------
// Lexical relations
// ---------------------------------------------------------------------------

/// Shape contract of a lexical relation type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingKind {
    /// Two members, order irrelevant.
    Pair,
    /// Two members, first is the forward side.
    AsymmetricPair,
    /// Any number of members, order irrelevant.
    #[default]
    Collection,
    /// Any number of members, order significant.
    Sequence,
    /// First member is the head, the rest are its children.
    Tree,
}

impl MappingKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pair" => Some(MappingKind::Pair),
            "asymmetric-pair" | "asymmetric" => Some(MappingKind::AsymmetricPair),
            "collection" => Some(MappingKind::Collection),
            "sequence" => Some(MappingKind::Sequence),
            "tree" => Some(MappingKind::Tree),
            _ => None,
        }
    }

    /// Fewest members a reference of this kind may have.
    pub fn min_members(&self) -> usize {
        2
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MappingKind::Pair => "pair",
            MappingKind::AsymmetricPair => "asymmetric-pair",
            MappingKind::Collection => "collection",
            MappingKind::Sequence => "sequence",
            MappingKind::Tree => "tree",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefType {
    pub guid: Guid,
    pub name: MultiText,
    pub reverse_name: MultiText,
    pub abbreviation: MultiText,
    pub kind: MappingKind,
    pub references: Vec<RecordId>,
    pub residue: Option<String>,
}

/// One instance of a lexical relation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LexReference {
    pub guid: Guid,
    pub owner: Option<RecordId>,
    pub targets: Vec<RecordId>,
    pub comment: MultiText,
    pub residue: Option<String>,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Any repository record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "kebab-case")]
pub enum Record {
    Entry(LexEntry),
    Sense(LexSense),
    Example(Example),
    Pronunciation(Pronunciation),
    Etymology(Etymology),
    EntryRef(EntryRef),
    Msa(Msa),
    ReversalIndex(ReversalIndex),
    ReversalEntry(ReversalEntry),
    Vocabulary(VocabularyItem),
    FeatureDefn(FeatureDefn),
    RefType(RefType),
    Reference(LexReference),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Entry(_) => RecordKind::Entry,
            Record::Sense(_) => RecordKind::Sense,
            Record::Example(_) => RecordKind::Example,
            Record::Pronunciation(_) => RecordKind::Pronunciation,
            Record::Etymology(_) => RecordKind::Etymology,
            Record::EntryRef(_) => RecordKind::EntryRef,
            Record::Msa(_) => RecordKind::Msa,
            Record::ReversalIndex(_) => RecordKind::ReversalIndex,
            Record::ReversalEntry(_) => RecordKind::ReversalEntry,
            Record::Vocabulary(_) => RecordKind::Vocabulary,
            Record::FeatureDefn(_) => RecordKind::FeatureDefn,
            Record::RefType(_) => RecordKind::RefType,
            Record::Reference(_) => RecordKind::Reference,
        }
    }

    pub fn guid(&self) -> Guid {
        match self {
            Record::Entry(r) => r.guid,
            Record::Sense(r) => r.guid,
            Record::Example(r) => r.guid,
            Record::Pronunciation(r) => r.guid,
            Record::Etymology(r) => r.guid,
            Record::EntryRef(r) => r.guid,
            Record::Msa(r) => r.guid,
            Record::ReversalIndex(r) => r.guid,
            Record::ReversalEntry(r) => r.guid,
            Record::Vocabulary(r) => r.guid,
            Record::FeatureDefn(r) => r.guid,
            Record::RefType(r) => r.guid,
            Record::Reference(r) => r.guid,
        }
    }

    /// The reserved residue property, for kinds that have one.
    pub fn residue(&self) -> Option<&str> {
        self.residue_slot().and_then(|slot| slot.as_deref())
    }

    fn residue_slot(&self) -> Option<&Option<String>> {
        match self {
            Record::Entry(r) => Some(&r.residue),
            Record::Sense(r) => Some(&r.residue),
            Record::Example(r) => Some(&r.residue),
            Record::Pronunciation(r) => Some(&r.residue),
            Record::Etymology(r) => Some(&r.residue),
            Record::EntryRef(r) => Some(&r.residue),
            Record::ReversalEntry(r) => Some(&r.residue),
            Record::Vocabulary(r) => Some(&r.residue),
            Record::RefType(r) => Some(&r.residue),
            Record::Reference(r) => Some(&r.residue),
            Record::Msa(_) | Record::ReversalIndex(_) | Record::FeatureDefn(_) => None,
        }
    }

    pub fn residue_mut(&mut self) -> Option<&mut Option<String>> {
        match self {
            Record::Entry(r) => Some(&mut r.residue),
            Record::Sense(r) => Some(&mut r.residue),
            Record::Example(r) => Some(&mut r.residue),
            Record::Pronunciation(r) => Some(&mut r.residue),
            Record::Etymology(r) => Some(&mut r.residue),
            Record::EntryRef(r) => Some(&mut r.residue),
            Record::ReversalEntry(r) => Some(&mut r.residue),
            Record::Vocabulary(r) => Some(&mut r.residue),
            Record::RefType(r) => Some(&mut r.residue),
            Record::Reference(r) => Some(&mut r.residue),
            Record::Msa(_) | Record::ReversalIndex(_) | Record::FeatureDefn(_) => None,
        }
    }

    /// The owning record, for owned kinds.
    pub fn owner(&self) -> Option<RecordId> {
        match self {
            Record::Sense(r) => r.owner,
            Record::Example(r) => r.owner,
            Record::Pronunciation(r) => r.owner,
            Record::Etymology(r) => r.owner,
            Record::EntryRef(r) => r.owner,
            Record::Msa(r) => r.owner,
            Record::ReversalEntry(r) => r.index,
            Record::Reference(r) => r.owner,
            _ => None,
        }
    }

    /// Records deleted together with this one.
    pub fn owned_children(&self) -> Vec<RecordId> {
        match self {
            Record::Entry(e) => e
                .senses
                .iter()
                .chain(&e.msas)
                .chain(&e.pronunciations)
                .chain(&e.etymologies)
                .chain(&e.entry_refs)
                .copied()
                .collect(),
            Record::Sense(s) => s.examples.iter().chain(&s.subsenses).copied().collect(),
            Record::ReversalIndex(r) => r.entries.clone(),
            Record::RefType(t) => t.references.clone(),
            _ => Vec::new(),
        }
    }

    /// Drop every mention of `id` from this record's child and target lists.
    ///
    /// Returns `true` when anything was removed.
    pub fn forget(&mut self, id: RecordId) -> bool {
        fn drop_from(list: &mut Vec<RecordId>, id: RecordId) -> bool {
            let before = list.len();
            list.retain(|x| *x != id);
            before != list.len()
        }
        fn clear_if(slot: &mut Option<RecordId>, id: RecordId) -> bool {
            if *slot == Some(id) {
                *slot = None;
                true
            } else {
                false
            }
        }
        match self {
            Record::Entry(e) => {
                let mut changed = false;
                for list in [
                    &mut e.senses,
                    &mut e.msas,
                    &mut e.pronunciations,
                    &mut e.etymologies,
                    &mut e.entry_refs,
                ] {
                    changed |= drop_from(list, id);
                }
                for values in e.traits.values_mut() {
                    changed |= drop_from(values, id);
                }
                changed | clear_if(&mut e.morph_type, id)
            }
            Record::Sense(s) => {
                let mut changed = drop_from(&mut s.examples, id)
                    | drop_from(&mut s.subsenses, id)
                    | drop_from(&mut s.reversals, id)
                    | clear_if(&mut s.msa, id);
                for values in s.traits.values_mut() {
                    changed |= drop_from(values, id);
                }
                changed
            }
            Record::EntryRef(r) => {
                drop_from(&mut r.components, id)
                    | drop_from(&mut r.primary, id)
                    | drop_from(&mut r.types, id)
            }
            Record::ReversalIndex(r) => drop_from(&mut r.entries, id),
            Record::ReversalEntry(r) => clear_if(&mut r.parent, id),
            Record::RefType(t) => drop_from(&mut t.references, id),
            Record::Reference(r) => drop_from(&mut r.targets, id),
            _ => false,
        }
    }
}

/// Typed access to one [`Record`] variant.
pub trait RecordVariant: Sized {
    const KIND: RecordKind;

    fn from_record(record: &Record) -> Option<&Self>;

    fn from_record_mut(record: &mut Record) -> Option<&mut Self>;

    fn into_record(self) -> Record;
}

macro_rules! record_variant {
    ($ty:ty, $variant:ident) => {
        impl RecordVariant for $ty {
            const KIND: RecordKind = RecordKind::$variant;

            fn from_record(record: &Record) -> Option<&Self> {
                match record {
                    Record::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_record_mut(record: &mut Record) -> Option<&mut Self> {
                match record {
                    Record::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_record(self) -> Record {
                Record::$variant(self)
            }
        }
    };
}

record_variant!(LexEntry, Entry);
record_variant!(LexSense, Sense);
record_variant!(Example, Example);
record_variant!(Pronunciation, Pronunciation);
record_variant!(Etymology, Etymology);
record_variant!(EntryRef, EntryRef);
record_variant!(Msa, Msa);
record_variant!(ReversalIndex, ReversalIndex);
record_variant!(ReversalEntry, ReversalEntry);
record_variant!(VocabularyItem, Vocabulary);
record_variant!(FeatureDefn, FeatureDefn);
record_variant!(RefType, RefType);
record_variant!(LexReference, Reference);

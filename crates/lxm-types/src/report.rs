//! Run summary: everything a reporting collaborator needs to describe a run.
//!
//! The merge engine never aborts on non-fatal problems. Each one lands in a
//! per-category list here and the run carries on.

use serde::{Deserialize, Serialize};

use crate::identity::RecordId;

/// Which level of the entry tree a conflict was found at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    Entry,
    Sense,
}

/// A `KeepBoth` disagreement between an existing record and incoming data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    /// Field group that disagreed first.
    pub field: String,
    pub existing: RecordId,
    /// The duplicate created in place of merging.
    pub duplicate: Option<RecordId>,
}

/// A relation whose target never resolved to a known record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRelation {
    pub source: RecordId,
    pub relation_type: String,
    pub target: String,
    pub reason: String,
}

/// A field value that could not be used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidData {
    pub record: Option<RecordId>,
    pub field: String,
    pub value: String,
    pub message: String,
}

/// A vocabulary item the run had to invent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVocabularyItem {
    pub vocabulary: String,
    pub label: String,
    pub record: RecordId,
}

/// Members dropped when overlapping collections were combined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedCollection {
    pub relation_type: String,
    pub reference: RecordId,
    pub dropped: Vec<RecordId>,
}

/// A custom field declaration that disagrees with the existing field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompatibleField {
    pub name: String,
    pub owner: String,
    pub existing_type: String,
    pub declared_type: String,
}

/// Aggregate counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub entries_added: usize,
    pub entries_merged: usize,
    pub entries_unchanged: usize,
    pub entries_deleted: usize,
    pub senses_added: usize,
    pub duplicates_created: usize,
    pub references_created: usize,
    pub references_deleted: usize,
    pub orphans_deleted: usize,
}

/// Everything a run found worth reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub counts: RunCounts,
    pub new_vocabulary: Vec<NewVocabularyItem>,
    pub conflicts: Vec<ConflictRecord>,
    pub invalid_relations: Vec<InvalidRelation>,
    pub invalid_data: Vec<InvalidData>,
    pub combined_collections: Vec<CombinedCollection>,
    pub incompatible_fields: Vec<IncompatibleField>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalid_data(
        &mut self,
        record: Option<RecordId>,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) {
        let entry = InvalidData {
            record,
            field: field.into(),
            value: value.into(),
            message: message.into(),
        };
        tracing::warn!(field = %entry.field, value = %entry.value, "{}", entry.message);
        self.invalid_data.push(entry);
    }

    pub fn new_vocabulary(
        &mut self,
        vocabulary: impl Into<String>,
        label: impl Into<String>,
        record: RecordId,
    ) {
        self.new_vocabulary.push(NewVocabularyItem {
            vocabulary: vocabulary.into(),
            label: label.into(),
            record,
        });
    }

    /// Total number of reported problems, excluding new vocabulary.
    pub fn problem_count(&self) -> usize {
        self.conflicts.len()
            + self.invalid_relations.len()
            + self.invalid_data.len()
            + self.combined_collections.len()
            + self.incompatible_fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_count_sums_categories() {
        let mut summary = RunSummary::new();
        summary.invalid_data(Some(RecordId(1)), "morph-type", "blob", "unknown morph type");
        summary.new_vocabulary("grammatical-info", "Noun", RecordId(2));
        summary.invalid_relations.push(InvalidRelation {
            source: RecordId(1),
            relation_type: "synonym".into(),
            target: "missing".into(),
            reason: "target not found".into(),
        });
        assert_eq!(summary.problem_count(), 2);
        assert_eq!(summary.new_vocabulary.len(), 1);
    }

    #[test]
    fn summary_serde_roundtrip() {
        let mut summary = RunSummary::new();
        summary.counts.entries_added = 3;
        summary.conflicts.push(ConflictRecord {
            kind: ConflictKind::Sense,
            field: "gloss".into(),
            existing: RecordId(7),
            duplicate: Some(RecordId(9)),
        });
        let json = serde_json::to_string(&summary).unwrap();
        let parsed: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}

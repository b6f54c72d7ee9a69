use lxm_store::EntryRefKind;
use lxm_types::{MultiText, RecordId, Timestamp};

/// A lexical relation waiting for the resolution pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRelation {
    pub source: RecordId,
    pub relation_type: String,
    /// Target identifier as written in the document.
    pub target: String,
    pub target_id: Option<RecordId>,
    pub order: Option<i32>,
    pub created: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    /// Original markup, preserved if the relation cannot be resolved.
    pub residue: Option<String>,
    /// Trait markup carried by the relation, kept on the reference it lands in.
    pub metadata: Vec<String>,
    pub resolved: bool,
}

impl PendingRelation {
    pub fn new(
        source: RecordId,
        relation_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source,
            relation_type: relation_type.into(),
            target: target.into(),
            target_id: None,
            order: None,
            created: None,
            modified: None,
            residue: None,
            metadata: Vec::new(),
            resolved: false,
        }
    }
}

/// A variant or complex-form link waiting for the resolution pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingEntryReference {
    /// The variant or complex-form entry.
    pub source: RecordId,
    pub kind: EntryRefKind,
    /// Identifier of the main entry or component.
    pub target: String,
    pub target_id: Option<RecordId>,
    /// Variant-type or complex-form-type labels.
    pub types: Vec<String>,
    pub primary: bool,
    pub order: Option<i32>,
    pub summary: MultiText,
    pub hide_minor_entry: bool,
    pub created: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    pub residue: Option<String>,
    pub resolved: bool,
}

impl PendingEntryReference {
    pub fn new(source: RecordId, kind: EntryRefKind, target: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            target: target.into(),
            target_id: None,
            types: Vec::new(),
            primary: false,
            order: None,
            summary: MultiText::new(),
            hide_minor_entry: false,
            created: None,
            modified: None,
            residue: None,
            resolved: false,
        }
    }
}

/// Relations queued during a run, in document order.
#[derive(Debug, Default)]
pub struct PendingQueues {
    pub relations: Vec<PendingRelation>,
    pub entry_refs: Vec<PendingEntryReference>,
}

impl PendingQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a relation. An identical relation already queued is not repeated.
    pub fn push_relation(&mut self, relation: PendingRelation) {
        let duplicate = self.relations.iter().any(|r| {
            r.source == relation.source
                && r.relation_type == relation.relation_type
                && r.target == relation.target
        });
        if !duplicate {
            self.relations.push(relation);
        }
    }

    pub fn push_entry_ref(&mut self, reference: PendingEntryReference) {
        let duplicate = self.entry_refs.iter().any(|r| {
            r.source == reference.source && r.kind == reference.kind && r.target == reference.target
        });
        if !duplicate {
            self.entry_refs.push(reference);
        }
    }

    pub fn len(&self) -> usize {
        self.relations.len() + self.entry_refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn unresolved(&self) -> usize {
        self.relations.iter().filter(|r| !r.resolved).count()
            + self.entry_refs.iter().filter(|r| !r.resolved).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_relations_queued_once() {
        let mut queues = PendingQueues::new();
        queues.push_relation(PendingRelation::new(RecordId(1), "Synonyms", "b"));
        queues.push_relation(PendingRelation::new(RecordId(1), "Synonyms", "b"));
        queues.push_relation(PendingRelation::new(RecordId(1), "Antonym", "b"));
        queues.push_entry_ref(PendingEntryReference::new(
            RecordId(1),
            EntryRefKind::Variant,
            "c",
        ));
        assert_eq!(queues.relations.len(), 2);
        assert_eq!(queues.len(), 3);
        assert_eq!(queues.unresolved(), 3);
    }
}

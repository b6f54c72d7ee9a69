use std::ops::Range;

use crate::pending::{PendingEntryReference, PendingRelation};

fn same_relation_group(a: &PendingRelation, b: &PendingRelation) -> bool {
    a.source == b.source
        && a.relation_type == b.relation_type
        && a.created == b.created
        && a.modified == b.modified
        && a.order.is_some() == b.order.is_some()
}

/// Split `relations` into maximal contiguous runs sharing source, relation
/// type, and timestamps.
///
/// A change between ordered and unordered relations also ends a run, so two
/// adjacent sequences are not fused.
pub fn contiguous_groups(relations: &[PendingRelation]) -> Vec<Range<usize>> {
    split(relations, same_relation_group)
}

fn same_entry_ref_group(a: &PendingEntryReference, b: &PendingEntryReference) -> bool {
    a.source == b.source && a.kind == b.kind && a.created == b.created && a.modified == b.modified
}

/// Split entry references into contiguous runs sharing source and kind.
pub fn contiguous_entry_ref_groups(refs: &[PendingEntryReference]) -> Vec<Range<usize>> {
    split(refs, same_entry_ref_group)
}

fn split<T>(items: &[T], same: impl Fn(&T, &T) -> bool) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=items.len() {
        if i == items.len() || !same(&items[i - 1], &items[i]) {
            if start < i {
                groups.push(start..i);
            }
            start = i;
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use lxm_types::RecordId;

    fn rel(source: u64, kind: &str, target: &str) -> PendingRelation {
        PendingRelation::new(RecordId(source), kind, target)
    }

    #[test]
    fn groups_contiguous_runs() {
        let relations = vec![
            rel(1, "Synonyms", "b"),
            rel(1, "Synonyms", "c"),
            rel(1, "Antonym", "d"),
            rel(2, "Synonyms", "c"),
            rel(1, "Synonyms", "e"),
        ];
        assert_eq!(contiguous_groups(&relations), vec![0..2, 2..3, 3..4, 4..5]);
    }

    #[test]
    fn ordering_hint_breaks_runs() {
        let mut ordered = rel(1, "Calendar", "b");
        ordered.order = Some(0);
        let relations = vec![rel(1, "Calendar", "a"), ordered];
        assert_eq!(contiguous_groups(&relations).len(), 2);
    }

    #[test]
    fn empty_queue_has_no_groups() {
        assert!(contiguous_groups(&[]).is_empty());
    }
}

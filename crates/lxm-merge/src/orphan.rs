//! Deferred deletion and orphan cleanup.
//!
//! Nothing is deleted before the resolution pass has finished. Deletion is
//! best-effort: a record already removed by an earlier cascade is skipped.

use std::collections::HashSet;

use lxm_store::{
    EntryRef, LexEntry, LexReference, LexSense, Msa, RecordKind, RefType, RepositoryExt,
    ReversalEntry,
};
use lxm_types::RecordId;

use crate::context::{RunContext, TRACKED_KINDS};
use crate::error::MergeResult;

/// Delete one record, counting it by kind. Returns whether it still existed.
fn delete(ctx: &mut RunContext<'_>, id: RecordId) -> MergeResult<bool> {
    let Some(kind) = ctx.repo.get(id).map(|r| r.kind()) else {
        return Ok(false);
    };
    if !ctx.repo.delete(id)? {
        return Ok(false);
    }
    ctx.lookup.forget(id);
    let counts = &mut ctx.summary.counts;
    match kind {
        RecordKind::Entry => counts.entries_deleted += 1,
        RecordKind::Reference | RecordKind::EntryRef => counts.references_deleted += 1,
        _ => counts.orphans_deleted += 1,
    }
    tracing::debug!(record = %id, kind = %kind, "deleted");
    Ok(true)
}

/// Mark an entry and everything it owns as seen but unchanged.
pub(crate) fn mark_subtree_unchanged(ctx: &mut RunContext<'_>, entry_id: RecordId) {
    let Ok(entry) = ctx.repo.typed::<LexEntry>(entry_id) else {
        return;
    };
    let mut seen = vec![entry_id];
    seen.extend(&entry.msas);
    seen.extend(&entry.pronunciations);
    seen.extend(&entry.etymologies);
    seen.extend(&entry.entry_refs);

    let mut senses = entry.senses.clone();
    while let Some(id) = senses.pop() {
        seen.push(id);
        let Ok(sense) = ctx.repo.typed::<LexSense>(id) else {
            continue;
        };
        seen.extend(&sense.examples);
        senses.extend(&sense.subsenses);
        for reversal in &sense.reversals {
            let mut next = Some(*reversal);
            while let Some(id) = next.filter(|id| !seen.contains(id)) {
                seen.push(id);
                next = ctx.repo.typed::<ReversalEntry>(id).ok().and_then(|r| r.parent);
            }
        }
    }
    for id in seen {
        ctx.identities.mark_unchanged(id);
    }
}

/// The analyses some sense of `entry` (at any depth) points at.
fn referenced_msas(ctx: &RunContext<'_>, entry: &LexEntry) -> HashSet<RecordId> {
    let mut used = HashSet::new();
    let mut senses = entry.senses.clone();
    while let Some(id) = senses.pop() {
        if let Ok(sense) = ctx.repo.typed::<LexSense>(id) {
            used.extend(sense.msa);
            senses.extend(&sense.subsenses);
        }
    }
    used
}

/// Whether `reference` links a record the run saw but left unchanged.
fn links_unchanged(ctx: &RunContext<'_>, reference: &LexReference) -> bool {
    reference
        .targets
        .iter()
        .any(|t| ctx.identities.is_touched(*t) && !ctx.identities.is_changed(*t))
}

/// Run every deletion the merge deferred, then sweep for orphans.
///
/// Returns the number of records deleted (cascades not included).
pub(crate) fn cleanup(ctx: &mut RunContext<'_>) -> MergeResult<usize> {
    let mut deleted = 0;
    for id in std::mem::take(&mut ctx.scheduled) {
        deleted += usize::from(delete(ctx, id)?);
    }

    if ctx.style().clears_absent() {
        deleted += delete_untouched(ctx)?;
    }
    deleted += sweep_msas(ctx)?;
    if ctx.style().clears_absent() {
        deleted += sweep_references(ctx)?;
    }

    tracing::info!(deleted, style = %ctx.style(), "orphan cleanup complete");
    Ok(deleted)
}

/// Delete pre-existing records this run never saw.
fn delete_untouched(ctx: &mut RunContext<'_>) -> MergeResult<usize> {
    let mut deleted = 0;
    for kind in TRACKED_KINDS {
        let mut candidates: Vec<RecordId> = ctx
            .repo
            .ids_of_kind(kind)
            .into_iter()
            .filter(|id| ctx.preexisting.contains(id) && !ctx.identities.is_touched(*id))
            .collect();
        candidates.sort();
        for id in candidates {
            if kind == RecordKind::Reference {
                let keep = ctx
                    .repo
                    .typed::<LexReference>(id)
                    .is_ok_and(|r| links_unchanged(ctx, r));
                if keep {
                    continue;
                }
            }
            deleted += usize::from(delete(ctx, id)?);
        }
    }
    Ok(deleted)
}

/// Delete analyses of changed entries that no sense points at any more.
fn sweep_msas(ctx: &mut RunContext<'_>) -> MergeResult<usize> {
    let clears = ctx.style().clears_absent();
    let mut doomed: Vec<RecordId> = Vec::new();
    for (entry_id, entry) in ctx.repo.all::<LexEntry>() {
        if !ctx.identities.is_changed(entry_id) {
            continue;
        }
        let used = referenced_msas(ctx, &entry);
        doomed.extend(
            entry
                .msas
                .iter()
                .filter(|id| !used.contains(*id))
                .filter(|id| clears || !ctx.preexisting.contains(*id))
                .filter(|id| ctx.repo.typed::<Msa>(**id).is_ok())
                .copied(),
        );
    }
    let mut deleted = 0;
    for id in doomed {
        deleted += usize::from(delete(ctx, id)?);
    }
    Ok(deleted)
}

/// Delete references left too small to mean anything.
fn sweep_references(ctx: &mut RunContext<'_>) -> MergeResult<usize> {
    let mut doomed = Vec::new();
    for (id, reference) in ctx.repo.all::<LexReference>() {
        let minimum = reference
            .owner
            .and_then(|t| ctx.repo.typed::<RefType>(t).ok())
            .map_or(2, |t| t.kind.min_members());
        if reference.targets.len() < minimum {
            doomed.push(id);
        }
    }
    for (id, entry_ref) in ctx.repo.all::<EntryRef>() {
        if entry_ref.components.is_empty() {
            doomed.push(id);
        }
    }
    let mut deleted = 0;
    for id in doomed {
        deleted += usize::from(delete(ctx, id)?);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use lxm_store::{InMemoryRepository, MappingKind};
    use lxm_types::{Guid, MergeStyle};

    fn entry(repo: &mut InMemoryRepository) -> RecordId {
        repo.insert(LexEntry {
            guid: Guid::new_random(),
            ..Default::default()
        })
        .unwrap()
    }

    fn collection(repo: &mut InMemoryRepository, targets: Vec<RecordId>) -> RecordId {
        let ref_type = repo
            .insert(RefType {
                guid: Guid::new_random(),
                kind: MappingKind::Collection,
                ..Default::default()
            })
            .unwrap();
        let reference = repo
            .insert(LexReference {
                guid: Guid::new_random(),
                owner: Some(ref_type),
                targets,
                ..Default::default()
            })
            .unwrap();
        repo.typed_mut::<RefType>(ref_type).unwrap().references.push(reference);
        reference
    }

    // -----------------------------------------------------------------------
    // Scheduled deletions
    // -----------------------------------------------------------------------

    #[test]
    fn scheduled_deletions_are_best_effort() {
        let mut repo = InMemoryRepository::new();
        let a = entry(&mut repo);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        ctx.scheduled = vec![a, a, RecordId(999)];
        assert_eq!(cleanup(&mut ctx).unwrap(), 1);
        assert_eq!(ctx.summary.counts.entries_deleted, 1);
        assert!(!ctx.repo.exists(a));
    }

    #[test]
    fn keep_old_never_deletes_untouched_records() {
        let mut repo = InMemoryRepository::new();
        let a = entry(&mut repo);
        let b = entry(&mut repo);
        collection(&mut repo, vec![a, b]);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        assert_eq!(cleanup(&mut ctx).unwrap(), 0);
        assert_eq!(ctx.repo.count(RecordKind::Entry), 2);
    }

    // -----------------------------------------------------------------------
    // KeepOnlyNew
    // -----------------------------------------------------------------------

    #[test]
    fn untouched_entry_and_shrunken_reference_deleted() {
        let mut repo = InMemoryRepository::new();
        let a = entry(&mut repo);
        let b = entry(&mut repo);
        let reference = collection(&mut repo, vec![a, b]);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepOnlyNew));
        ctx.touch(a);
        ctx.touch(reference);
        cleanup(&mut ctx).unwrap();
        assert!(ctx.repo.exists(a));
        assert!(!ctx.repo.exists(b));
        assert!(!ctx.repo.exists(reference));
        assert_eq!(ctx.summary.counts.entries_deleted, 1);
        assert_eq!(ctx.summary.counts.references_deleted, 1);
    }

    #[test]
    fn reference_to_unchanged_entries_survives() {
        let mut repo = InMemoryRepository::new();
        let a = entry(&mut repo);
        let b = entry(&mut repo);
        let reference = collection(&mut repo, vec![a, b]);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepOnlyNew));
        mark_subtree_unchanged(&mut ctx, a);
        mark_subtree_unchanged(&mut ctx, b);
        cleanup(&mut ctx).unwrap();
        assert!(ctx.repo.exists(reference));
        assert_eq!(ctx.repo.count(RecordKind::Entry), 2);
    }

    #[test]
    fn unchanged_subtree_covers_senses_and_reversals() {
        let mut repo = InMemoryRepository::new();
        let a = entry(&mut repo);
        let parent = repo
            .insert(ReversalEntry {
                guid: Guid::new_random(),
                ..Default::default()
            })
            .unwrap();
        let child = repo
            .insert(ReversalEntry {
                guid: Guid::new_random(),
                parent: Some(parent),
                ..Default::default()
            })
            .unwrap();
        let sense = repo
            .insert(LexSense {
                guid: Guid::new_random(),
                owner: Some(a),
                reversals: vec![child],
                ..Default::default()
            })
            .unwrap();
        repo.typed_mut::<LexEntry>(a).unwrap().senses.push(sense);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepOnlyNew));
        mark_subtree_unchanged(&mut ctx, a);
        for id in [a, sense, child, parent] {
            assert!(ctx.identities.is_touched(id));
            assert!(!ctx.identities.is_changed(id));
        }
        assert_eq!(cleanup(&mut ctx).unwrap(), 0);
    }

    // -----------------------------------------------------------------------
    // Secondary orphans
    // -----------------------------------------------------------------------

    #[test]
    fn unreferenced_new_analysis_swept() {
        let mut repo = InMemoryRepository::new();
        let a = entry(&mut repo);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let used = ctx
            .repo
            .insert(Msa {
                guid: Guid::new_random(),
                owner: Some(a),
                ..Default::default()
            })
            .unwrap();
        let unused = ctx
            .repo
            .insert(Msa {
                guid: Guid::new_random(),
                owner: Some(a),
                ..Default::default()
            })
            .unwrap();
        let sense = ctx
            .repo
            .insert(LexSense {
                guid: Guid::new_random(),
                owner: Some(a),
                msa: Some(used),
                ..Default::default()
            })
            .unwrap();
        {
            let record = ctx.repo.typed_mut::<LexEntry>(a).unwrap();
            record.msas = vec![used, unused];
            record.senses = vec![sense];
        }
        ctx.touch(a);
        assert_eq!(cleanup(&mut ctx).unwrap(), 1);
        assert!(ctx.repo.exists(used));
        assert!(!ctx.repo.exists(unused));
        assert_eq!(ctx.summary.counts.orphans_deleted, 1);
    }

    #[test]
    fn empty_entry_reference_swept_under_keep_only_new() {
        let mut repo = InMemoryRepository::new();
        let a = entry(&mut repo);
        let entry_ref = repo
            .insert(EntryRef {
                guid: Guid::new_random(),
                owner: Some(a),
                ..Default::default()
            })
            .unwrap();
        repo.typed_mut::<LexEntry>(a).unwrap().entry_refs.push(entry_ref);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepOnlyNew));
        ctx.touch(a);
        ctx.touch(entry_ref);
        cleanup(&mut ctx).unwrap();
        assert!(!ctx.repo.exists(entry_ref));
        assert!(ctx.repo.exists(a));
    }
}

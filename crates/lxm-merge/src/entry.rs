//! Entry-level merge.

use lxm_refs::PendingEntryReference;
use lxm_residue::{trait_fragment, variant_fragment};
use lxm_stage::{StagedEntry, StagedEtymology, StagedPronunciation, StagedVariant};
use lxm_store::{
    EntryRefKind, Etymology, LexEntry, Media, Pronunciation, RecordKind, RepositoryExt,
};
use lxm_types::{ConflictKind, ConflictRecord, Guid, MergeStyle, RecordId, Timestamp};

use crate::annotate::{
    self, ENTRY_FIELDS, ENTRY_NOTE_KINDS, HIDE_MINOR_ENTRY_TRAIT, VARIANT_TYPE_TRAIT,
};
use crate::conflict;
use crate::context::RunContext;
use crate::error::MergeResult;
use crate::morph::{self, MorphOutcome};
use crate::policy;
use crate::sense;

/// Merge one staged entry into the repository and return its record.
///
/// The entry record is read once, updated in memory, and written back after
/// every child has been merged.
pub(crate) fn merge_entry(ctx: &mut RunContext<'_>, staged: &StagedEntry) -> MergeResult<RecordId> {
    let style = ctx.style();
    let mut existing = staged.existing;
    let mut guid = staged.guid;
    if ctx.identities.was_deleted(&guid) {
        tracing::warn!(guid = %guid, "entry deleted earlier in this run; using a fresh guid");
        existing = None;
        guid = Guid::new_random();
    } else if existing.is_none() && ctx.repo.find_by_guid(&guid).is_some() {
        tracing::warn!(guid = %guid, "guid belongs to a record of another kind");
        guid = Guid::new_random();
    }

    let morph = morph::resolve_morph_type(
        ctx,
        existing,
        staged.morph_type.as_deref(),
        &staged.lexical_unit,
    )?;

    let mut conflict = None;
    if let (Some(id), MergeStyle::KeepBoth) = (existing, style) {
        let current = ctx.repo.typed::<LexEntry>(id)?;
        let incoming_type = staged.morph_type.is_some().then_some(morph.morph_type);
        let field =
            conflict::entry_conflict(ctx, id, current, staged, &morph.form, incoming_type);
        if let Some(field) = field {
            tracing::info!(entry = %staged.identifier, field, "conflicting entry duplicated");
            conflict = Some(ConflictRecord {
                kind: ConflictKind::Entry,
                field: field.to_string(),
                existing: id,
                duplicate: None,
            });
            existing = None;
            guid = Guid::new_random();
        }
    }

    let creating = existing.is_none();
    let id = match existing {
        Some(id) => {
            ctx.summary.counts.entries_merged += 1;
            id
        }
        None => {
            let id = ctx.repo.insert(LexEntry {
                guid,
                created: Some(staged.created.unwrap_or_else(Timestamp::now)),
                ..Default::default()
            })?;
            ctx.summary.counts.entries_added += 1;
            id
        }
    };
    if let Some(mut record) = conflict {
        record.duplicate = Some(id);
        ctx.summary.counts.duplicates_created += 1;
        ctx.summary.conflicts.push(record);
    }
    ctx.identities.bind(&staged.identifier, id);
    ctx.touch(id);

    let mut entry = ctx.repo.typed::<LexEntry>(id)?.clone();
    merge_scalars(ctx, &mut entry, staged, &morph, creating);
    annotate::merge_notes(ctx, id, &mut entry.notes, &staged.notes, ENTRY_NOTE_KINDS, creating);
    annotate::merge_fields(
        ctx,
        RecordKind::Entry,
        id,
        &mut entry.fields,
        &staged.fields,
        ENTRY_FIELDS,
        creating,
    )?;
    let traits = &staged.traits;
    annotate::merge_traits(ctx, RecordKind::Entry, id, &mut entry.traits, traits, creating)?;
    annotate::clear_absent_custom(ctx, RecordKind::Entry, id, &staged.fields, traits, creating)?;
    for fragment in &staged.residue {
        ctx.capture(id, fragment);
    }

    merge_pronunciations(ctx, id, &mut entry, &staged.pronunciations)?;
    merge_etymologies(ctx, id, &mut entry, &staged.etymologies)?;
    queue_variants(ctx, id, &staged.variants);
    for relation in &staged.relations {
        annotate::queue_relation(ctx, id, relation);
    }

    for staged_sense in &staged.senses {
        let sense_id = sense::merge_sense(ctx, &mut entry, id, id, staged_sense, morph.is_affix)?;
        if !entry.senses.contains(&sense_id) {
            entry.senses.push(sense_id);
        }
    }

    *ctx.repo.typed_mut::<LexEntry>(id)? = entry;
    tracing::debug!(entry = %staged.identifier, record = %id, creating, "entry merged");
    Ok(id)
}

fn merge_scalars(
    ctx: &mut RunContext<'_>,
    entry: &mut LexEntry,
    staged: &StagedEntry,
    morph: &MorphOutcome,
    creating: bool,
) {
    let style = ctx.style();
    let mut homograph = (entry.homograph != 0).then_some(entry.homograph);
    policy::merge_option(style, &mut homograph, staged.order.as_ref(), creating);
    entry.homograph = homograph.unwrap_or(0);

    ctx.merge_text(&mut entry.lexeme_form, &morph.form, creating);
    ctx.merge_text(&mut entry.citation_form, &staged.citation, creating);

    // A bare stem inference carries no information about an existing type.
    if staged.morph_type.is_some() || morph.name != "stem" || entry.morph_type.is_none() {
        policy::merge_option(style, &mut entry.morph_type, Some(&morph.morph_type), creating);
    }

    if creating && entry.created.is_none() {
        entry.created = staged.created;
    }
    entry.modified = match staged.modified {
        Some(modified) => Some(modified),
        None if creating => Some(Timestamp::now()),
        None => entry.modified,
    };
}

fn merge_pronunciations(
    ctx: &mut RunContext<'_>,
    owner: RecordId,
    entry: &mut LexEntry,
    staged: &[StagedPronunciation],
) -> MergeResult<()> {
    let style = ctx.style();
    for item in staged {
        ctx.register_writing_systems(&item.form);
        let found = entry.pronunciations.iter().copied().find(|id| {
            ctx.repo
                .typed::<Pronunciation>(*id)
                .is_ok_and(|p| p.form.equivalent(&item.form))
        });
        let (id, creating) = match found {
            Some(id) => (id, false),
            None => {
                let id = ctx.repo.insert(Pronunciation {
                    guid: Guid::new_random(),
                    owner: Some(owner),
                    form: item.form.clone(),
                    ..Default::default()
                })?;
                entry.pronunciations.push(id);
                (id, true)
            }
        };

        let mut record = ctx.repo.typed::<Pronunciation>(id)?.clone();
        for media in &item.media {
            ctx.register_writing_systems(&media.label);
            match record.media.iter_mut().find(|m| m.file == media.file) {
                Some(current) => {
                    policy::merge_text(style, &mut current.label, &media.label, creating);
                }
                None => record.media.push(Media {
                    file: media.file.clone(),
                    label: media.label.clone(),
                }),
            }
        }
        *ctx.repo.typed_mut::<Pronunciation>(id)? = record;
        for fragment in &item.residue {
            ctx.capture(id, fragment);
        }
        ctx.touch(id);
    }
    Ok(())
}

fn merge_etymologies(
    ctx: &mut RunContext<'_>,
    owner: RecordId,
    entry: &mut LexEntry,
    staged: &[StagedEtymology],
) -> MergeResult<()> {
    for item in staged {
        let found = entry.etymologies.iter().copied().find(|id| {
            ctx.repo.typed::<Etymology>(*id).is_ok_and(|e| {
                e.kind == item.kind
                    && e.source == item.source
                    && (e.form.is_empty() || item.form.is_empty() || e.form.equivalent(&item.form))
            })
        });
        let (id, creating) = match found {
            Some(id) => (id, false),
            None => {
                let id = ctx.repo.insert(Etymology {
                    guid: Guid::new_random(),
                    owner: Some(owner),
                    kind: item.kind.clone(),
                    source: item.source.clone(),
                    ..Default::default()
                })?;
                entry.etymologies.push(id);
                (id, true)
            }
        };

        let mut record = ctx.repo.typed::<Etymology>(id)?.clone();
        ctx.merge_text(&mut record.form, &item.form, creating);
        ctx.merge_text(&mut record.gloss, &item.gloss, creating);
        *ctx.repo.typed_mut::<Etymology>(id)? = record;
        for fragment in &item.residue {
            ctx.capture(id, fragment);
        }
        ctx.touch(id);
    }
    Ok(())
}

/// Queue variant links. A variant without a target keeps only its form,
/// which survives as residue.
fn queue_variants(ctx: &mut RunContext<'_>, source: RecordId, variants: &[StagedVariant]) {
    for variant in variants {
        let Some(target) = variant.target.as_deref() else {
            let fragment = variant
                .raw
                .clone()
                .unwrap_or_else(|| variant_fragment(None, &variant.form));
            ctx.capture(source, fragment);
            continue;
        };

        let mut pending = PendingEntryReference::new(source, EntryRefKind::Variant, target);
        pending.target_id = ctx.identities.resolve_in(&*ctx.repo, target);
        for item in &variant.traits {
            match item.name.as_str() {
                VARIANT_TYPE_TRAIT if !item.value.is_empty() => {
                    pending.types.push(item.value.clone());
                }
                HIDE_MINOR_ENTRY_TRAIT => {
                    pending.hide_minor_entry = annotate::is_true(Some(&item.value));
                }
                _ => {
                    let fragment = item
                        .raw
                        .clone()
                        .unwrap_or_else(|| trait_fragment(&item.name, &item.value));
                    ctx.capture(source, fragment);
                }
            }
        }
        pending.residue = Some(
            variant
                .raw
                .clone()
                .unwrap_or_else(|| variant_fragment(Some(target), &variant.form)),
        );
        ctx.pending.push_entry_ref(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use lxm_stage::{StagedMedia, StagedSense};
    use lxm_store::{InMemoryRepository, Repository};
    use lxm_types::MultiText;

    fn staged(identifier: &str, form: &str) -> StagedEntry {
        StagedEntry {
            identifier: identifier.into(),
            guid: Guid::new_random(),
            guid_synthesized: true,
            lexical_unit: MultiText::single("seh", form),
            senses: vec![StagedSense {
                guid: Guid::new_random(),
                gloss: MultiText::single("en", "house"),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn existing(repo: &mut InMemoryRepository, form: &str) -> (RecordId, Guid) {
        let guid = Guid::new_random();
        let id = repo
            .insert(LexEntry {
                guid,
                lexeme_form: MultiText::single("seh", form),
                citation_form: MultiText::single("seh", form),
                ..Default::default()
            })
            .unwrap();
        (id, guid)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    #[test]
    fn new_entry_created_with_senses() {
        let mut repo = InMemoryRepository::new();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let id = merge_entry(&mut ctx, &staged("nyumba_1", "nyumba")).unwrap();

        assert_eq!(ctx.summary.counts.entries_added, 1);
        assert_eq!(ctx.summary.counts.senses_added, 1);
        assert_eq!(ctx.identities.resolve("nyumba_1"), Some(id));
        let entry = ctx.repo.typed::<LexEntry>(id).unwrap();
        assert_eq!(entry.lexeme_form.get("seh"), Some("nyumba"));
        assert_eq!(entry.senses.len(), 1);
        assert!(entry.morph_type.is_some());
        assert!(entry.created.is_some() && entry.modified.is_some());
        assert!(ctx.repo.writing_systems().get("seh").is_some());
    }

    #[test]
    fn affix_markers_stripped_from_stored_form() {
        let mut repo = InMemoryRepository::new();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let id = merge_entry(&mut ctx, &staged("ko_1", "-ko")).unwrap();
        let entry = ctx.repo.typed::<LexEntry>(id).unwrap();
        assert_eq!(entry.lexeme_form.get("seh"), Some("ko"));
    }

    #[test]
    fn pronunciations_deduplicated_by_form_and_media_by_file() {
        let mut repo = InMemoryRepository::new();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut entry = staged("nyumba_1", "nyumba");
        let pronunciation = StagedPronunciation {
            form: MultiText::single("seh-fonipa", "ɲumba"),
            media: vec![StagedMedia {
                file: "audio/nyumba.wav".into(),
                label: MultiText::new(),
            }],
            residue: Vec::new(),
        };
        entry.pronunciations = vec![pronunciation.clone()];
        let id = merge_entry(&mut ctx, &entry).unwrap();

        entry.existing = Some(id);
        entry.pronunciations[0].media.push(StagedMedia {
            file: "audio/nyumba-slow.wav".into(),
            label: MultiText::new(),
        });
        entry.pronunciations[0].media.push(pronunciation.media[0].clone());
        merge_entry(&mut ctx, &entry).unwrap();

        let record = ctx.repo.typed::<LexEntry>(id).unwrap();
        assert_eq!(record.pronunciations.len(), 1);
        let stored = ctx.repo.typed::<Pronunciation>(record.pronunciations[0]).unwrap();
        assert_eq!(stored.media.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Policies
    // -----------------------------------------------------------------------

    #[test]
    fn keep_old_keeps_existing_citation() {
        let mut repo = InMemoryRepository::new();
        let (id, guid) = existing(&mut repo, "nyumba");
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepOld));
        let mut incoming = staged("nyumba_1", "nyumba");
        incoming.guid = guid;
        incoming.existing = Some(id);
        incoming.citation = MultiText::from_pairs([("seh", "nyumba!"), ("en", "house")]);
        merge_entry(&mut ctx, &incoming).unwrap();

        let entry = ctx.repo.typed::<LexEntry>(id).unwrap();
        assert_eq!(entry.citation_form.get("seh"), Some("nyumba"));
        assert_eq!(entry.citation_form.get("en"), Some("house"));
        assert_eq!(ctx.summary.counts.entries_merged, 1);
    }

    #[test]
    fn keep_both_duplicates_conflicting_entry() {
        let mut repo = InMemoryRepository::new();
        let (id, guid) = existing(&mut repo, "nyumba");
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepBoth));
        let mut incoming = staged("nyumba_1", "nyumba");
        incoming.guid = guid;
        incoming.existing = Some(id);
        incoming.citation = MultiText::single("seh", "inyumba");
        let duplicate = merge_entry(&mut ctx, &incoming).unwrap();

        assert_ne!(duplicate, id);
        assert_eq!(ctx.summary.counts.duplicates_created, 1);
        let record = &ctx.summary.conflicts[0];
        assert_eq!(record.field, "citation");
        assert_eq!(record.existing, id);
        assert_eq!(record.duplicate, Some(duplicate));
        let original = ctx.repo.typed::<LexEntry>(id).unwrap();
        assert_eq!(original.citation_form.get("seh"), Some("nyumba"));
    }

    #[test]
    fn keep_both_merges_agreeing_entry() {
        let mut repo = InMemoryRepository::new();
        let (id, guid) = existing(&mut repo, "nyumba");
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepBoth));
        let mut incoming = staged("nyumba_1", "nyumba");
        incoming.guid = guid;
        incoming.existing = Some(id);
        assert_eq!(merge_entry(&mut ctx, &incoming).unwrap(), id);
        assert!(ctx.summary.conflicts.is_empty());
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    #[test]
    fn deleted_guid_not_reused() {
        let mut repo = InMemoryRepository::new();
        let (id, guid) = existing(&mut repo, "nyumba");
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        ctx.identities.mark_deleted(guid);
        let mut incoming = staged("nyumba_1", "nyumba");
        incoming.guid = guid;
        incoming.existing = Some(id);
        let created = merge_entry(&mut ctx, &incoming).unwrap();
        assert_ne!(created, id);
        assert_ne!(ctx.repo.typed::<LexEntry>(created).unwrap().guid, guid);
    }

    #[test]
    fn variant_without_target_kept_as_residue() {
        let mut repo = InMemoryRepository::new();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut incoming = staged("nyumba_1", "nyumba");
        incoming.variants.push(StagedVariant {
            target: None,
            form: MultiText::single("seh", "nyumb"),
            traits: Vec::new(),
            raw: None,
        });
        let id = merge_entry(&mut ctx, &incoming).unwrap();
        let residue = ctx.residue.document(id).unwrap();
        assert!(residue.fragments()[0].starts_with("<variant>"));
        assert!(ctx.pending.entry_refs.is_empty());
    }
}

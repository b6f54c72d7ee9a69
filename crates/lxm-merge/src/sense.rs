//! Sense-level merge: senses, subsenses, examples, illustrations and
//! reversals.

use lxm_index::VocabularyKind;
use lxm_stage::{StagedExample, StagedReversal, StagedSense};
use lxm_store::{
    Example, LexEntry, LexSense, Picture, RecordKind, RepositoryExt, ReversalEntry, ReversalIndex,
    Translation,
};
use lxm_types::{ConflictKind, ConflictRecord, Guid, MergeStyle, RecordId};

use crate::annotate::{self, SENSE_FIELDS, SENSE_NOTE_KINDS};
use crate::conflict;
use crate::context::RunContext;
use crate::error::MergeResult;
use crate::morph;
use crate::policy;

/// Merge one staged sense owned by `owner` (the entry or a parent sense).
///
/// Analyses are shared through `entry`, the in-memory copy of the owning
/// entry.
pub(crate) fn merge_sense(
    ctx: &mut RunContext<'_>,
    entry: &mut LexEntry,
    entry_id: RecordId,
    owner: RecordId,
    staged: &StagedSense,
    entry_is_affix: bool,
) -> MergeResult<RecordId> {
    let style = ctx.style();
    let mut guid = staged.guid;
    let mut existing = None;
    if ctx.identities.was_deleted(&guid) {
        guid = Guid::new_random();
    } else if let Some(found) = ctx.repo.find_by_guid(&guid) {
        let owned_here = ctx
            .repo
            .typed::<LexSense>(found)
            .is_ok_and(|s| s.owner == Some(owner));
        if owned_here {
            existing = Some(found);
        } else {
            guid = Guid::new_random();
        }
    }

    let mut conflict = None;
    if let (Some(id), MergeStyle::KeepBoth) = (existing, style) {
        let current = ctx.repo.typed::<LexSense>(id)?;
        if let Some(field) = conflict::sense_conflict(ctx, id, current, staged) {
            tracing::info!(sense = %id, field, "conflicting sense duplicated");
            conflict = Some(ConflictRecord {
                kind: ConflictKind::Sense,
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
        Some(id) => id,
        None => {
            let id = ctx.repo.insert(LexSense {
                guid,
                owner: Some(owner),
                ..Default::default()
            })?;
            ctx.summary.counts.senses_added += 1;
            id
        }
    };
    if let Some(mut record) = conflict {
        record.duplicate = Some(id);
        ctx.summary.counts.duplicates_created += 1;
        ctx.summary.conflicts.push(record);
    }
    if let Some(identifier) = staged.identifier.as_deref() {
        ctx.identities.bind(identifier, id);
    }
    ctx.touch(id);

    let mut sense = ctx.repo.typed::<LexSense>(id)?.clone();
    ctx.merge_text(&mut sense.gloss, &staged.gloss, creating);
    ctx.merge_text(&mut sense.definition, &staged.definition, creating);

    match &staged.grammatical_info {
        Some(info) if policy::allows_overwrite(style, sense.msa.is_none(), creating) => {
            let analysis = morph::analysis_of(ctx, id, info, entry_is_affix)?;
            let msa = morph::shared_msa(ctx, entry, entry_id, analysis)?;
            policy::merge_option(style, &mut sense.msa, Some(&msa), creating);
        }
        Some(_) => {}
        None => {
            policy::merge_option(style, &mut sense.msa, None, creating);
        }
    }
    if let Some(msa) = sense.msa {
        ctx.touch(msa);
    }

    annotate::merge_notes(ctx, id, &mut sense.notes, &staged.notes, SENSE_NOTE_KINDS, creating);
    annotate::merge_fields(
        ctx,
        RecordKind::Sense,
        id,
        &mut sense.fields,
        &staged.fields,
        SENSE_FIELDS,
        creating,
    )?;
    let traits = &staged.traits;
    annotate::merge_traits(ctx, RecordKind::Sense, id, &mut sense.traits, traits, creating)?;
    annotate::clear_absent_custom(ctx, RecordKind::Sense, id, &staged.fields, traits, creating)?;

    for example in &staged.examples {
        let example_id = merge_example(ctx, id, &sense.examples, example)?;
        if !sense.examples.contains(&example_id) {
            sense.examples.push(example_id);
        }
    }
    merge_pictures(ctx, &mut sense, staged, creating);

    let mut reversals = Vec::with_capacity(staged.reversals.len());
    for reversal in &staged.reversals {
        let reversal_id = reversal_entry(ctx, reversal)?;
        if !reversals.contains(&reversal_id) {
            reversals.push(reversal_id);
        }
    }
    if style.clears_absent() && !creating {
        sense.reversals.retain(|r| reversals.contains(r));
    }
    for reversal_id in reversals {
        if !sense.reversals.contains(&reversal_id) {
            sense.reversals.push(reversal_id);
        }
    }

    for relation in &staged.relations {
        annotate::queue_relation(ctx, id, relation);
    }
    for fragment in &staged.residue {
        ctx.capture(id, fragment);
    }

    for sub in &staged.subsenses {
        let sub_id = merge_sense(ctx, entry, entry_id, id, sub, entry_is_affix)?;
        if !sense.subsenses.contains(&sub_id) {
            sense.subsenses.push(sub_id);
        }
    }

    *ctx.repo.typed_mut::<LexSense>(id)? = sense;
    Ok(id)
}

fn merge_pictures(
    ctx: &mut RunContext<'_>,
    sense: &mut LexSense,
    staged: &StagedSense,
    creating: bool,
) {
    let style = ctx.style();
    if style.clears_absent() && !creating {
        sense
            .pictures
            .retain(|p| staged.pictures.iter().any(|s| s.file == p.file));
    }
    for picture in &staged.pictures {
        ctx.register_writing_systems(&picture.caption);
        match sense.pictures.iter_mut().find(|p| p.file == picture.file) {
            Some(current) => {
                policy::merge_text(style, &mut current.caption, &picture.caption, creating);
            }
            None => sense.pictures.push(Picture {
                file: picture.file.clone(),
                caption: picture.caption.clone(),
            }),
        }
    }
}

/// Merge one example of the sense `owner`.
///
/// Examples match by guid first, then by equivalent sentence.
fn merge_example(
    ctx: &mut RunContext<'_>,
    owner: RecordId,
    current: &[RecordId],
    staged: &StagedExample,
) -> MergeResult<RecordId> {
    let style = ctx.style();
    let by_guid = staged
        .guid
        .and_then(|guid| ctx.repo.find_by_guid(&guid))
        .filter(|id| {
            ctx.repo
                .typed::<Example>(*id)
                .is_ok_and(|e| e.owner == Some(owner))
        });
    let found = by_guid.or_else(|| {
        current.iter().copied().find(|id| {
            ctx.repo.typed::<Example>(*id).is_ok_and(|e| {
                !e.sentence.is_empty() && e.sentence.equivalent(&staged.sentence)
            })
        })
    });

    let (id, creating) = match found {
        Some(id) => (id, false),
        None => {
            let guid = staged
                .guid
                .filter(|g| ctx.repo.find_by_guid(g).is_none() && !ctx.identities.was_deleted(g))
                .unwrap_or_else(Guid::new_random);
            let id = ctx.repo.insert(Example {
                guid,
                owner: Some(owner),
                ..Default::default()
            })?;
            (id, true)
        }
    };

    let mut example = ctx.repo.typed::<Example>(id)?.clone();
    ctx.merge_text(&mut example.sentence, &staged.sentence, creating);
    policy::merge_string(
        style,
        &mut example.reference,
        staged.reference.as_deref().unwrap_or(""),
        creating,
    );

    let mut kinds = Vec::with_capacity(staged.translations.len());
    for translation in &staged.translations {
        let label = translation.kind.as_deref().map(str::trim).filter(|k| !k.is_empty());
        let kind = match label {
            Some(label) => Some(ctx.vocabulary_item(&VocabularyKind::TranslationType, label)?),
            None => None,
        };
        kinds.push(kind);
        ctx.register_writing_systems(&translation.text);
        match example.translations.iter_mut().find(|t| t.kind == kind) {
            Some(current) => {
                policy::merge_text(style, &mut current.text, &translation.text, creating);
            }
            None => example.translations.push(Translation {
                kind,
                text: translation.text.clone(),
            }),
        }
    }
    if style.clears_absent() && !creating {
        example.translations.retain(|t| kinds.contains(&t.kind));
    }

    annotate::merge_notes(ctx, id, &mut example.notes, &staged.notes, SENSE_NOTE_KINDS, creating);
    for fragment in &staged.residue {
        ctx.capture(id, fragment);
    }
    *ctx.repo.typed_mut::<Example>(id)? = example;
    ctx.touch(id);
    Ok(id)
}

/// The reversal entry for `staged` in its writing system's index, created
/// when missing. Parents are resolved first.
fn reversal_entry(ctx: &mut RunContext<'_>, staged: &StagedReversal) -> MergeResult<RecordId> {
    let parent = match &staged.parent {
        Some(parent) => Some(reversal_entry(ctx, parent)?),
        None => None,
    };
    let index = ctx
        .lookup
        .reversal_index(&mut *ctx.repo, &staged.writing_system, &mut ctx.summary)?;
    ctx.register_writing_systems(&staged.form);
    let pos = match staged.part_of_speech.as_deref() {
        Some(label) => Some(ctx.vocabulary_item(&VocabularyKind::PartOfSpeech, label)?),
        None => None,
    };

    let candidates = ctx.repo.typed::<ReversalIndex>(index)?.entries.clone();
    let found = candidates.into_iter().find(|id| {
        ctx.repo
            .typed::<ReversalEntry>(*id)
            .is_ok_and(|e| e.parent == parent && e.form.equivalent(&staged.form))
    });

    let style = ctx.style();
    let id = match found {
        Some(id) => {
            let record = ctx.repo.typed_mut::<ReversalEntry>(id)?;
            policy::merge_option(style, &mut record.pos, pos.as_ref(), false);
            id
        }
        None => {
            let id = ctx.repo.insert(ReversalEntry {
                guid: Guid::new_random(),
                index: Some(index),
                parent,
                form: staged.form.clone(),
                pos,
                residue: None,
            })?;
            ctx.repo.typed_mut::<ReversalIndex>(index)?.entries.push(id);
            id
        }
    };
    ctx.touch(id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use lxm_stage::{StagedGrammaticalInfo, StagedPicture, StagedTranslation};
    use lxm_store::{InMemoryRepository, Msa};
    use lxm_types::MultiText;

    fn setup(repo: &mut InMemoryRepository) -> RecordId {
        repo.insert(LexEntry {
            guid: Guid::new_random(),
            lexeme_form: MultiText::single("seh", "nyumba"),
            ..Default::default()
        })
        .unwrap()
    }

    fn sense(gloss: &str) -> StagedSense {
        StagedSense {
            guid: Guid::new_random(),
            gloss: MultiText::single("en", gloss),
            ..Default::default()
        }
    }

    fn noun() -> Option<StagedGrammaticalInfo> {
        Some(StagedGrammaticalInfo {
            part_of_speech: "Noun".into(),
            traits: Vec::new(),
        })
    }

    #[test]
    fn senses_share_equal_analyses() {
        let mut repo = InMemoryRepository::new();
        let entry_id = setup(&mut repo);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut entry = ctx.repo.typed::<LexEntry>(entry_id).unwrap().clone();

        let mut first = sense("house");
        first.grammatical_info = noun();
        let mut second = sense("home");
        second.grammatical_info = noun();
        let a = merge_sense(&mut ctx, &mut entry, entry_id, entry_id, &first, false).unwrap();
        let b = merge_sense(&mut ctx, &mut entry, entry_id, entry_id, &second, false).unwrap();

        let msa_a = ctx.repo.typed::<LexSense>(a).unwrap().msa;
        let msa_b = ctx.repo.typed::<LexSense>(b).unwrap().msa;
        assert!(msa_a.is_some());
        assert_eq!(msa_a, msa_b);
        assert_eq!(entry.msas.len(), 1);
        assert!(ctx.repo.typed::<Msa>(msa_a.unwrap()).is_ok());
    }

    #[test]
    fn subsenses_owned_by_parent_sense() {
        let mut repo = InMemoryRepository::new();
        let entry_id = setup(&mut repo);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut entry = ctx.repo.typed::<LexEntry>(entry_id).unwrap().clone();

        let mut parent = sense("building");
        parent.subsenses.push(sense("hut"));
        let id = merge_sense(&mut ctx, &mut entry, entry_id, entry_id, &parent, false).unwrap();
        let record = ctx.repo.typed::<LexSense>(id).unwrap();
        assert_eq!(record.subsenses.len(), 1);
        let sub = ctx.repo.typed::<LexSense>(record.subsenses[0]).unwrap();
        assert_eq!(sub.owner, Some(id));
        assert_eq!(ctx.summary.counts.senses_added, 2);
    }

    #[test]
    fn examples_match_by_sentence_and_translations_are_typed() {
        let mut repo = InMemoryRepository::new();
        let entry_id = setup(&mut repo);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut entry = ctx.repo.typed::<LexEntry>(entry_id).unwrap().clone();

        let mut staged = sense("house");
        staged.examples.push(StagedExample {
            sentence: MultiText::single("seh", "Nyumba yanga."),
            translations: vec![StagedTranslation {
                kind: Some("Free translation".into()),
                text: MultiText::single("en", "My house."),
            }],
            ..Default::default()
        });
        let id = merge_sense(&mut ctx, &mut entry, entry_id, entry_id, &staged, false).unwrap();
        merge_sense(&mut ctx, &mut entry, entry_id, entry_id, &staged, false).unwrap();

        let record = ctx.repo.typed::<LexSense>(id).unwrap();
        assert_eq!(record.examples.len(), 1);
        let example = ctx.repo.typed::<Example>(record.examples[0]).unwrap();
        assert!(example.translations[0].kind.is_some());
    }

    #[test]
    fn reversal_hierarchy_followed() {
        let mut repo = InMemoryRepository::new();
        let entry_id = setup(&mut repo);
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut entry = ctx.repo.typed::<LexEntry>(entry_id).unwrap().clone();

        let mut staged = sense("house");
        staged.reversals.push(StagedReversal {
            writing_system: "en".into(),
            form: MultiText::single("en", "house"),
            parent: Some(Box::new(StagedReversal {
                writing_system: "en".into(),
                form: MultiText::single("en", "building"),
                parent: None,
                part_of_speech: None,
            })),
            part_of_speech: Some("Noun".into()),
        });
        let id = merge_sense(&mut ctx, &mut entry, entry_id, entry_id, &staged, false).unwrap();

        let record = ctx.repo.typed::<LexSense>(id).unwrap();
        assert_eq!(record.reversals.len(), 1);
        let reversal = ctx.repo.typed::<ReversalEntry>(record.reversals[0]).unwrap();
        assert!(reversal.parent.is_some());
        assert!(reversal.pos.is_some());
        let index = ctx.repo.typed::<ReversalIndex>(reversal.index.unwrap()).unwrap();
        assert_eq!(index.entries.len(), 2);
        assert!(ctx
            .summary
            .new_vocabulary
            .iter()
            .any(|v| v.vocabulary == "reversal-index"));
    }

    #[test]
    fn keep_only_new_drops_absent_pictures() {
        let mut repo = InMemoryRepository::new();
        let entry_id = setup(&mut repo);
        let sense_guid = Guid::new_random();
        repo.insert(LexSense {
            guid: sense_guid,
            owner: Some(entry_id),
            pictures: vec![Picture {
                file: "old.png".into(),
                caption: MultiText::new(),
            }],
            ..Default::default()
        })
        .unwrap();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepOnlyNew));
        let mut entry = ctx.repo.typed::<LexEntry>(entry_id).unwrap().clone();

        let mut staged = sense("house");
        staged.guid = sense_guid;
        staged.pictures.push(StagedPicture {
            file: "new.png".into(),
            caption: MultiText::single("en", "a house"),
        });
        let id = merge_sense(&mut ctx, &mut entry, entry_id, entry_id, &staged, false).unwrap();
        let record = ctx.repo.typed::<LexSense>(id).unwrap();
        assert_eq!(record.pictures.len(), 1);
        assert_eq!(record.pictures[0].file, "new.png");
        assert_eq!(ctx.summary.counts.senses_added, 0);
    }
}

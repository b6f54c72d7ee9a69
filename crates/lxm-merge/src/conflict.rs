//! Conflict detection for the `KeepBoth` policy.
//!
//! Field groups are checked in a fixed order and the first disagreeing group
//! is returned. Text is compared after canonical decomposition, and an empty
//! existing value never conflicts.

use std::collections::BTreeMap;

use lxm_index::VocabularyKind;
use lxm_refs::COMPONENT_RELATION;
use lxm_stage::{
    StagedEntry, StagedEtymology, StagedField, StagedNote, StagedRelation, StagedReversal,
    StagedSense, StagedTrait, StagedVariant,
};
use lxm_store::{
    EntryRef, EntryRefKind, Etymology, Example, LexEntry, LexReference, LexSense, Msa, RefType,
    RepositoryExt, ReversalEntry,
};
use lxm_types::{MultiText, RecordId};

use crate::annotate::{self, ENTRY_FIELDS, ENTRY_NOTE_KINDS, SENSE_FIELDS, SENSE_NOTE_KINDS};
use crate::context::RunContext;

/// Vocabularies a record holds at most one item of.
const SINGLE_VALUED: [VocabularyKind; 2] = [VocabularyKind::Status, VocabularyKind::SenseType];

fn text_conflicts(existing: &MultiText, incoming: &MultiText) -> bool {
    existing.first_conflict(incoming).is_some()
}

fn notes_conflict(
    existing: &BTreeMap<String, MultiText>,
    incoming: &[StagedNote],
    known: &[&'static str],
) -> bool {
    incoming.iter().any(|note| {
        annotate::note_key(&note.kind, known)
            .and_then(|key| existing.get(key))
            .is_some_and(|current| text_conflicts(current, &note.text))
    })
}

fn fields_conflict(
    existing: &BTreeMap<String, MultiText>,
    incoming: &[StagedField],
    builtin: &[&str],
) -> bool {
    incoming.iter().any(|field| {
        builtin.contains(&field.tag.as_str())
            && existing
                .get(&field.tag)
                .is_some_and(|current| text_conflicts(current, &field.text))
    })
}

fn traits_conflict(
    ctx: &RunContext<'_>,
    existing: &BTreeMap<String, Vec<RecordId>>,
    incoming: &[StagedTrait],
) -> bool {
    incoming.iter().any(|item| {
        let Some(kind) = VocabularyKind::from_trait_name(&item.name) else {
            return false;
        };
        if !SINGLE_VALUED.contains(&kind) {
            return false;
        }
        let current = existing.get(kind.name()).map(Vec::as_slice).unwrap_or(&[]);
        match ctx.lookup.find(&kind, &item.value) {
            Some(id) => !current.is_empty() && !current.contains(&id),
            // An unknown label differs from any existing value.
            None => !current.is_empty(),
        }
    })
}

/// Whether a resolvable relation of `record` disagrees with the references
/// of its type that already contain `record`.
fn relations_conflict(ctx: &RunContext<'_>, record: RecordId, incoming: &[StagedRelation]) -> bool {
    incoming
        .iter()
        .filter(|r| r.relation_type != COMPONENT_RELATION)
        .any(|relation| {
            let Some(target) = ctx.identities.resolve_in(&*ctx.repo, &relation.target) else {
                return false;
            };
            let Some(type_id) = ctx.lookup.ref_type(&relation.relation_type) else {
                return false;
            };
            let Ok(ref_type) = ctx.repo.typed::<RefType>(type_id) else {
                return false;
            };
            let containing: Vec<&LexReference> = ref_type
                .references
                .iter()
                .filter_map(|id| ctx.repo.typed::<LexReference>(*id).ok())
                .filter(|r| r.targets.contains(&record))
                .collect();
            !containing.is_empty() && !containing.iter().any(|r| r.targets.contains(&target))
        })
}

fn variants_conflict(ctx: &RunContext<'_>, entry: &LexEntry, incoming: &[StagedVariant]) -> bool {
    let components: Vec<RecordId> = entry
        .entry_refs
        .iter()
        .filter_map(|id| ctx.repo.typed::<EntryRef>(*id).ok())
        .filter(|r| r.kind == EntryRefKind::Variant)
        .flat_map(|r| r.components.iter().copied())
        .collect();
    if components.is_empty() {
        return false;
    }
    incoming.iter().any(|variant| {
        variant
            .target
            .as_deref()
            .and_then(|t| ctx.identities.resolve_in(&*ctx.repo, t))
            .is_some_and(|target| !components.contains(&target))
    })
}

fn etymologies_conflict(
    ctx: &RunContext<'_>,
    entry: &LexEntry,
    incoming: &[StagedEtymology],
) -> bool {
    incoming.iter().any(|staged| {
        entry
            .etymologies
            .iter()
            .filter_map(|id| ctx.repo.typed::<Etymology>(*id).ok())
            .filter(|e| e.kind == staged.kind && e.source == staged.source)
            .any(|e| {
                text_conflicts(&e.form, &staged.form) || text_conflicts(&e.gloss, &staged.gloss)
            })
    })
}

/// The first field group of `staged` that disagrees with `entry`.
///
/// `lexical_form` is the staged lexical unit with affix markers stripped.
pub(crate) fn entry_conflict(
    ctx: &RunContext<'_>,
    id: RecordId,
    entry: &LexEntry,
    staged: &StagedEntry,
    lexical_form: &MultiText,
    morph_type: Option<RecordId>,
) -> Option<&'static str> {
    if text_conflicts(&entry.lexeme_form, lexical_form) {
        return Some("lexical-unit");
    }
    if text_conflicts(&entry.citation_form, &staged.citation) {
        return Some("citation");
    }
    if notes_conflict(&entry.notes, &staged.notes, ENTRY_NOTE_KINDS) {
        return Some("note");
    }
    if relations_conflict(ctx, id, &staged.relations) {
        return Some("relation");
    }
    let morph_differs = matches!(
        (entry.morph_type, morph_type),
        (Some(current), Some(incoming)) if current != incoming
    );
    if morph_differs || traits_conflict(ctx, &entry.traits, &staged.traits) {
        return Some("trait");
    }
    if variants_conflict(ctx, entry, &staged.variants) {
        return Some("variant");
    }
    if etymologies_conflict(ctx, entry, &staged.etymologies) {
        return Some("etymology");
    }
    if fields_conflict(&entry.fields, &staged.fields, ENTRY_FIELDS) {
        return Some("field");
    }
    None
}

fn examples_conflict(ctx: &RunContext<'_>, sense: RecordId, staged: &StagedSense) -> bool {
    staged.examples.iter().any(|example| {
        example
            .guid
            .and_then(|guid| ctx.repo.find_by_guid(&guid))
            .and_then(|id| ctx.repo.typed::<Example>(id).ok())
            .filter(|existing| existing.owner == Some(sense))
            .is_some_and(|existing| text_conflicts(&existing.sentence, &example.sentence))
    })
}

fn grammatical_info_conflicts(
    ctx: &RunContext<'_>,
    sense: &LexSense,
    staged: &StagedSense,
) -> bool {
    let Some(info) = &staged.grammatical_info else {
        return false;
    };
    let current = sense
        .msa
        .and_then(|id| ctx.repo.typed::<Msa>(id).ok())
        .and_then(|msa| msa.analysis.part_of_speech());
    let Some(current) = current else {
        return false;
    };
    let label = info.part_of_speech.trim();
    if label.is_empty() {
        return false;
    }
    ctx.lookup.find(&VocabularyKind::PartOfSpeech, label) != Some(current)
}

fn illustrations_conflict(sense: &LexSense, staged: &StagedSense) -> bool {
    staged.pictures.iter().any(|picture| {
        sense
            .pictures
            .iter()
            .filter(|p| p.file == picture.file)
            .any(|p| text_conflicts(&p.caption, &picture.caption))
    })
}

fn reversal_conflicts(ctx: &RunContext<'_>, sense: &LexSense, staged: &StagedReversal) -> bool {
    let ws = staged.writing_system.to_lowercase();
    let existing: Vec<&ReversalEntry> = sense
        .reversals
        .iter()
        .filter_map(|id| ctx.repo.typed::<ReversalEntry>(*id).ok())
        .filter(|r| r.form.writing_systems().any(|w| w.to_lowercase() == ws))
        .collect();
    !existing.is_empty() && !existing.iter().any(|r| r.form.equivalent(&staged.form))
}

/// The first field group of `staged` that disagrees with `sense`.
pub(crate) fn sense_conflict(
    ctx: &RunContext<'_>,
    id: RecordId,
    sense: &LexSense,
    staged: &StagedSense,
) -> Option<&'static str> {
    if text_conflicts(&sense.gloss, &staged.gloss) {
        return Some("gloss");
    }
    if text_conflicts(&sense.definition, &staged.definition) {
        return Some("definition");
    }
    if examples_conflict(ctx, id, staged) {
        return Some("example");
    }
    if grammatical_info_conflicts(ctx, sense, staged) {
        return Some("grammatical-info");
    }
    if illustrations_conflict(sense, staged) {
        return Some("illustration");
    }
    if relations_conflict(ctx, id, &staged.relations) {
        return Some("relation");
    }
    if staged.reversals.iter().any(|r| reversal_conflicts(ctx, sense, r)) {
        return Some("reversal");
    }
    if notes_conflict(&sense.notes, &staged.notes, SENSE_NOTE_KINDS) {
        return Some("note");
    }
    if fields_conflict(&sense.fields, &staged.fields, SENSE_FIELDS) {
        return Some("field");
    }
    if traits_conflict(ctx, &sense.traits, &staged.traits) {
        return Some("trait");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use lxm_store::{InMemoryRepository, Picture};
    use lxm_types::{Guid, MergeStyle};

    fn entry_with_form(form: &str) -> LexEntry {
        LexEntry {
            guid: Guid::new_random(),
            lexeme_form: MultiText::single("fr", form),
            ..Default::default()
        }
    }

    fn staged_with_form(form: &str) -> StagedEntry {
        StagedEntry {
            lexical_unit: MultiText::single("fr", form),
            ..Default::default()
        }
    }

    // -----------------------------------------------------------------------
    // Entry level
    // -----------------------------------------------------------------------

    #[test]
    fn composed_and_decomposed_forms_do_not_conflict() {
        let mut repo = InMemoryRepository::new();
        let entry = entry_with_form("caf\u{e9}");
        let id = repo.insert(entry.clone()).unwrap();
        let ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepBoth));
        let staged = staged_with_form("cafe\u{301}");
        let found = entry_conflict(&ctx, id, &entry, &staged, &staged.lexical_unit, None);
        assert_eq!(found, None);
    }

    #[test]
    fn different_form_conflicts_first() {
        let mut repo = InMemoryRepository::new();
        let mut entry = entry_with_form("maison");
        entry.citation_form = MultiText::single("fr", "maison");
        let id = repo.insert(entry.clone()).unwrap();
        let ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepBoth));
        let mut staged = staged_with_form("logis");
        staged.citation = MultiText::single("fr", "logis");
        let found = entry_conflict(&ctx, id, &entry, &staged, &staged.lexical_unit, None);
        assert_eq!(found, Some("lexical-unit"));
    }

    #[test]
    fn empty_existing_value_never_conflicts() {
        let mut repo = InMemoryRepository::new();
        let entry = entry_with_form("maison");
        let id = repo.insert(entry.clone()).unwrap();
        let ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepBoth));
        let mut staged = staged_with_form("maison");
        staged.citation = MultiText::single("fr", "maisons");
        staged.notes.push(StagedNote {
            kind: "general".into(),
            text: MultiText::single("en", "new note"),
            raw: None,
        });
        let found = entry_conflict(&ctx, id, &entry, &staged, &staged.lexical_unit, None);
        assert_eq!(found, None);
    }

    #[test]
    fn different_morph_type_is_a_trait_conflict() {
        let mut repo = InMemoryRepository::new();
        let mut entry = entry_with_form("ko");
        entry.morph_type = Some(RecordId(90));
        let id = repo.insert(entry.clone()).unwrap();
        let ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepBoth));
        let staged = staged_with_form("ko");
        let found =
            entry_conflict(&ctx, id, &entry, &staged, &staged.lexical_unit, Some(RecordId(91)));
        assert_eq!(found, Some("trait"));
    }

    // -----------------------------------------------------------------------
    // Sense level
    // -----------------------------------------------------------------------

    #[test]
    fn gloss_checked_before_illustrations() {
        let mut repo = InMemoryRepository::new();
        let sense = LexSense {
            guid: Guid::new_random(),
            gloss: MultiText::single("en", "house"),
            pictures: vec![Picture {
                file: "house.png".into(),
                caption: MultiText::single("en", "a house"),
            }],
            ..Default::default()
        };
        let id = repo.insert(sense.clone()).unwrap();
        let ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepBoth));

        let mut staged = StagedSense {
            gloss: MultiText::single("en", "house"),
            ..Default::default()
        };
        staged.pictures.push(lxm_stage::StagedPicture {
            file: "house.png".into(),
            caption: MultiText::single("en", "a hut"),
        });
        assert_eq!(sense_conflict(&ctx, id, &sense, &staged), Some("illustration"));

        staged.gloss = MultiText::single("en", "home");
        assert_eq!(sense_conflict(&ctx, id, &sense, &staged), Some("gloss"));
    }

    #[test]
    fn matching_sense_has_no_conflict() {
        let mut repo = InMemoryRepository::new();
        let sense = LexSense {
            guid: Guid::new_random(),
            gloss: MultiText::single("en", "house"),
            definition: MultiText::single("en", "a building to live in"),
            ..Default::default()
        };
        let id = repo.insert(sense.clone()).unwrap();
        let ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepBoth));
        let staged = StagedSense {
            gloss: MultiText::single("en", "house"),
            definition: MultiText::single("en", "a building to live in"),
            ..Default::default()
        };
        assert_eq!(sense_conflict(&ctx, id, &sense, &staged), None);
    }
}

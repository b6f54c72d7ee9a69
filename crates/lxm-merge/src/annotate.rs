//! Notes, fields, traits and relations shared by entries, senses and
//! examples.
//!
//! Built-in kinds land in the record's own maps. Everything else goes to a
//! custom field when one is usable and to residue otherwise.

use std::collections::{BTreeMap, HashSet};

use lxm_index::VocabularyKind;
use lxm_refs::{PendingEntryReference, PendingRelation, COMPONENT_RELATION};
use lxm_residue::{field_fragment, note_fragment, relation_with_traits, trait_fragment};
use lxm_stage::{StagedField, StagedNote, StagedRelation, StagedTrait};
use lxm_store::{EntryRefKind, RecordKind};
use lxm_types::{MultiText, RecordId};

use crate::context::RunContext;
use crate::error::MergeResult;
use crate::policy;
use crate::provision;

/// Note types an entry stores itself, besides the general note.
pub const ENTRY_NOTE_KINDS: &[&str] = &["bibliography", "comment", "restrictions"];

/// Note types a sense or example stores itself, besides the general note.
pub const SENSE_NOTE_KINDS: &[&str] = &[
    "anthropology",
    "bibliography",
    "discourse",
    "encyclopedic",
    "grammar",
    "phonology",
    "restrictions",
    "semantics",
    "sociolinguistics",
    "source",
];

pub const ENTRY_FIELDS: &[&str] = &["literal-meaning", "summary-definition", "bibliography"];

pub const SENSE_FIELDS: &[&str] = &["scientific-name", "source", "bibliography"];

pub const VARIANT_TYPE_TRAIT: &str = "variant-type";
pub const COMPLEX_FORM_TYPE_TRAIT: &str = "complex-form-type";
pub const HIDE_MINOR_ENTRY_TRAIT: &str = "hide-minor-entry";

/// Map key of a note kind, or `None` when the record has no slot for it.
///
/// The general note uses the empty key.
pub fn note_key(kind: &str, known: &[&'static str]) -> Option<&'static str> {
    let kind = kind.trim();
    if kind.is_empty() || kind.eq_ignore_ascii_case("general") {
        return Some("");
    }
    known.iter().copied().find(|k| k.eq_ignore_ascii_case(kind))
}

/// Incoming notes as a keyed map, with notes of unknown kinds captured as
/// residue on `record`.
pub(crate) fn collect_notes(
    ctx: &mut RunContext<'_>,
    record: RecordId,
    notes: &[StagedNote],
    known: &[&'static str],
) -> BTreeMap<String, MultiText> {
    let mut keyed: BTreeMap<String, MultiText> = BTreeMap::new();
    for note in notes {
        match note_key(&note.kind, known) {
            Some(key) => {
                ctx.register_writing_systems(&note.text);
                let slot = keyed.entry(key.to_string()).or_default();
                for (ws, text) in note.text.iter() {
                    slot.set(ws, text);
                }
            }
            None => {
                let fragment = note
                    .raw
                    .clone()
                    .unwrap_or_else(|| note_fragment(&note.kind, &note.text));
                ctx.capture(record, fragment);
            }
        }
    }
    keyed
}

/// Merge incoming notes into `existing`.
pub(crate) fn merge_notes(
    ctx: &mut RunContext<'_>,
    record: RecordId,
    existing: &mut BTreeMap<String, MultiText>,
    notes: &[StagedNote],
    known: &[&'static str],
    creating_new: bool,
) -> bool {
    let incoming = collect_notes(ctx, record, notes, known);
    policy::merge_keyed(ctx.style(), existing, &incoming, creating_new)
}

/// Merge incoming fields: built-in tags into `existing`, the rest into
/// custom fields or residue.
///
/// Two different fields sharing a non-repeatable tag abort the record.
pub(crate) fn merge_fields(
    ctx: &mut RunContext<'_>,
    owner: RecordKind,
    record: RecordId,
    existing: &mut BTreeMap<String, MultiText>,
    fields: &[StagedField],
    builtin: &[&str],
    creating_new: bool,
) -> MergeResult<bool> {
    provision::check_sibling_fields(ctx, owner, record, fields.iter().map(|f| f.tag.as_str()))?;

    let mut incoming: BTreeMap<String, MultiText> = BTreeMap::new();
    for field in fields {
        if builtin.contains(&field.tag.as_str()) {
            ctx.register_writing_systems(&field.text);
            incoming.insert(field.tag.clone(), field.text.clone());
            continue;
        }
        let stored =
            provision::store_field(ctx, owner, record, &field.tag, &field.text, creating_new)?;
        if !stored {
            let fragment = field
                .raw
                .clone()
                .unwrap_or_else(|| field_fragment(&field.tag, &field.text));
            ctx.capture(record, fragment);
        }
    }
    Ok(policy::merge_keyed(ctx.style(), existing, &incoming, creating_new))
}

/// Merge incoming traits: built-in vocabularies into `existing`, the rest
/// into custom fields or residue.
pub(crate) fn merge_traits(
    ctx: &mut RunContext<'_>,
    owner: RecordKind,
    record: RecordId,
    existing: &mut BTreeMap<String, Vec<RecordId>>,
    traits: &[StagedTrait],
    creating_new: bool,
) -> MergeResult<bool> {
    let mut incoming: BTreeMap<String, Vec<RecordId>> = BTreeMap::new();
    let mut custom: BTreeMap<&str, Vec<&StagedTrait>> = BTreeMap::new();
    for item in traits {
        if item.value.is_empty() {
            continue;
        }
        match VocabularyKind::from_trait_name(&item.name) {
            Some(kind) => {
                let id = ctx.vocabulary_item(&kind, &item.value)?;
                let slot = incoming.entry(kind.name().to_string()).or_default();
                if !slot.contains(&id) {
                    slot.push(id);
                }
            }
            None => custom.entry(item.name.as_str()).or_default().push(item),
        }
    }

    for (name, items) in custom {
        let values: Vec<String> = items.iter().map(|t| t.value.clone()).collect();
        if !provision::store_trait(ctx, owner, record, name, &values, creating_new)? {
            for item in items {
                let fragment = item
                    .raw
                    .clone()
                    .unwrap_or_else(|| trait_fragment(&item.name, &item.value));
                ctx.capture(record, fragment);
            }
        }
    }
    Ok(policy::merge_traits(ctx.style(), existing, &incoming, creating_new))
}

/// Under a clearing policy, drop the custom values of an existing record
/// that no incoming field or trait names.
pub(crate) fn clear_absent_custom(
    ctx: &mut RunContext<'_>,
    owner: RecordKind,
    record: RecordId,
    fields: &[StagedField],
    traits: &[StagedTrait],
    creating_new: bool,
) -> MergeResult<()> {
    if creating_new || !ctx.style().clears_absent() {
        return Ok(());
    }
    let present: HashSet<&str> = fields
        .iter()
        .map(|f| f.tag.as_str())
        .chain(traits.iter().filter(|t| !t.value.is_empty()).map(|t| t.name.as_str()))
        .collect();
    let cleared = provision::clear_absent(ctx, owner, record, &present)?;
    if cleared > 0 {
        tracing::debug!(record = %record, cleared, "cleared absent custom values");
    }
    Ok(())
}

fn trait_values<'t>(traits: &'t [StagedTrait], name: &'t str) -> impl Iterator<Item = &'t str> {
    traits
        .iter()
        .filter(move |t| t.name == name && !t.value.is_empty())
        .map(|t| t.value.as_str())
}

pub(crate) fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true" | "1" | "yes"))
}

/// Queue a relation of `source` for the resolution pass.
///
/// Component relations become entry references; everything else becomes a
/// lexical relation. The target is looked up right away when it is already
/// known.
pub(crate) fn queue_relation(
    ctx: &mut RunContext<'_>,
    source: RecordId,
    relation: &StagedRelation,
) {
    let target_id = ctx.identities.resolve_in(&*ctx.repo, &relation.target);
    let metadata: Vec<String> = relation
        .traits
        .iter()
        .map(|t| t.raw.clone().unwrap_or_else(|| trait_fragment(&t.name, &t.value)))
        .collect();
    let residue = relation.raw.clone().unwrap_or_else(|| {
        relation_with_traits(&relation.relation_type, &relation.target, relation.order, &metadata)
    });

    if relation.relation_type == COMPONENT_RELATION {
        let variant_types: Vec<String> = trait_values(&relation.traits, VARIANT_TYPE_TRAIT)
            .map(str::to_string)
            .collect();
        let (kind, types) = if variant_types.is_empty() {
            let types = trait_values(&relation.traits, COMPLEX_FORM_TYPE_TRAIT)
                .map(str::to_string)
                .collect();
            (EntryRefKind::ComplexForm, types)
        } else {
            (EntryRefKind::Variant, variant_types)
        };
        let mut pending = PendingEntryReference::new(source, kind, &relation.target);
        pending.target_id = target_id;
        pending.types = types;
        pending.primary = is_true(relation.trait_value("is-primary"));
        pending.hide_minor_entry = is_true(relation.trait_value(HIDE_MINOR_ENTRY_TRAIT));
        pending.order = relation.order;
        pending.created = relation.created;
        pending.modified = relation.modified;
        pending.residue = Some(residue);
        ctx.pending.push_entry_ref(pending);
        return;
    }

    let mut pending = PendingRelation::new(source, &relation.relation_type, &relation.target);
    pending.target_id = target_id;
    pending.order = relation.order;
    pending.created = relation.created;
    pending.modified = relation.modified;
    pending.residue = Some(residue);
    pending.metadata = metadata;
    ctx.pending.push_relation(pending);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use lxm_store::{
        CustomFieldDef, FieldId, FieldType, InMemoryRepository, LexSense, Repository, RepositoryExt,
    };
    use lxm_types::{Guid, MergeStyle};

    fn note(kind: &str, text: &str) -> StagedNote {
        StagedNote {
            kind: kind.into(),
            text: MultiText::single("en", text),
            raw: None,
        }
    }

    fn habitat(value: &str) -> StagedField {
        StagedField {
            tag: "Habitat".into(),
            text: MultiText::single("en", value),
            raw: None,
        }
    }

    fn staged_trait(name: &str, value: &str) -> StagedTrait {
        StagedTrait {
            name: name.into(),
            value: value.into(),
            raw: None,
        }
    }

    #[test]
    fn general_note_uses_empty_key() {
        assert_eq!(note_key("general", ENTRY_NOTE_KINDS), Some(""));
        assert_eq!(note_key("", ENTRY_NOTE_KINDS), Some(""));
        assert_eq!(note_key("Comment", ENTRY_NOTE_KINDS), Some("comment"));
        assert_eq!(note_key("grammar", ENTRY_NOTE_KINDS), None);
        assert_eq!(note_key("grammar", SENSE_NOTE_KINDS), Some("grammar"));
    }

    #[test]
    fn unknown_note_kind_goes_to_residue() {
        let mut repo = InMemoryRepository::new();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut notes = BTreeMap::new();
        let incoming = vec![note("general", "a note"), note("x-private", "hidden")];
        merge_notes(&mut ctx, RecordId(1), &mut notes, &incoming, ENTRY_NOTE_KINDS, true);
        assert_eq!(notes[""].get("en"), Some("a note"));
        let residue = ctx.residue.document(RecordId(1)).unwrap();
        assert_eq!(residue.fragments().len(), 1);
        assert!(residue.fragments()[0].contains("x-private"));
    }

    #[test]
    fn builtin_traits_match_vocabularies() {
        let mut repo = InMemoryRepository::new();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut traits = BTreeMap::new();
        let incoming = vec![
            staged_trait("semantic-domain-ddp4", "1.1 Sky"),
            staged_trait("semantic-domain-ddp4", "1.2 World"),
            staged_trait("usage-type", "archaic"),
        ];
        merge_traits(&mut ctx, RecordKind::Sense, RecordId(1), &mut traits, &incoming, true)
            .unwrap();
        assert_eq!(traits["semantic-domain-ddp4"].len(), 2);
        assert_eq!(traits["usage-type"].len(), 1);
        assert_eq!(ctx.summary.new_vocabulary.len(), 3);
    }

    #[test]
    fn undeclared_trait_goes_to_residue() {
        let mut repo = InMemoryRepository::new();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let mut traits = BTreeMap::new();
        let incoming = vec![staged_trait("x-color", "red")];
        merge_traits(&mut ctx, RecordKind::Entry, RecordId(1), &mut traits, &incoming, true)
            .unwrap();
        assert!(traits.is_empty());
        let residue = ctx.residue.document(RecordId(1)).unwrap();
        assert_eq!(residue.fragments(), &[trait_fragment("x-color", "red")]);
    }

    #[test]
    fn custom_field_receives_unknown_field_tag() {
        let mut repo = InMemoryRepository::new();
        let field = repo.add_custom_field(CustomFieldDef {
            id: FieldId(0),
            name: "Habitat".into(),
            owner: RecordKind::Sense,
            field_type: FieldType::String,
            ws_selector: None,
            vocabulary: None,
        });
        let sense = repo
            .insert(LexSense {
                guid: Guid::new_random(),
                ..Default::default()
            })
            .unwrap();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepNew));
        let mut fields = BTreeMap::new();
        let incoming = vec![habitat("forest")];
        merge_fields(
            &mut ctx,
            RecordKind::Sense,
            sense,
            &mut fields,
            &incoming,
            SENSE_FIELDS,
            true,
        )
        .unwrap();
        assert!(fields.is_empty());
        assert!(ctx.repo.custom_value(sense, field).is_some());
    }

    #[test]
    fn keep_only_new_clears_custom_value_missing_from_import() {
        let mut repo = InMemoryRepository::new();
        let sense = repo
            .insert(LexSense {
                guid: Guid::new_random(),
                ..Default::default()
            })
            .unwrap();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepNew));
        let mut fields = BTreeMap::new();
        let incoming = vec![habitat("forest")];
        merge_fields(&mut ctx, RecordKind::Sense, sense, &mut fields, &incoming, &[], true)
            .unwrap();
        clear_absent_custom(&mut ctx, RecordKind::Sense, sense, &incoming, &[], false).unwrap();
        let field = ctx.repo.custom_field(RecordKind::Sense, "Habitat").unwrap().id;
        assert!(ctx.repo.custom_value(sense, field).is_some());

        let mut ctx = RunContext::new(&mut repo, MergeConfig::new(MergeStyle::KeepOnlyNew));
        clear_absent_custom(&mut ctx, RecordKind::Sense, sense, &[], &[], false).unwrap();
        assert!(ctx.repo.custom_value(sense, field).is_none());
    }

    #[test]
    fn component_relation_becomes_entry_reference() {
        let mut repo = InMemoryRepository::new();
        let mut ctx = RunContext::new(&mut repo, MergeConfig::default());
        let relation = StagedRelation {
            relation_type: COMPONENT_RELATION.into(),
            target: "kaya_1".into(),
            order: Some(0),
            created: None,
            modified: None,
            traits: vec![
                staged_trait(COMPLEX_FORM_TYPE_TRAIT, "Compound"),
                staged_trait("is-primary", "true"),
            ],
            raw: None,
        };
        queue_relation(&mut ctx, RecordId(3), &relation);
        assert!(ctx.pending.relations.is_empty());
        let pending = &ctx.pending.entry_refs[0];
        assert_eq!(pending.kind, EntryRefKind::ComplexForm);
        assert_eq!(pending.types, vec!["Compound".to_string()]);
        assert!(pending.primary);
        assert!(pending.residue.is_some());
    }
}

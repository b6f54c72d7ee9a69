//! Custom field provisioning.
//!
//! A field or trait tag with no built-in slot is stored in a custom field of
//! the owning record kind. The field is created from the header declaration
//! of the tag when none exists; an existing field with an incompatible type
//! sends the data to residue instead.

use std::collections::{HashMap, HashSet};

use lxm_index::VocabularyKind;
use lxm_stage::FieldDefinition;
use lxm_store::{CustomFieldDef, CustomValue, FieldId, FieldType, RecordKind, RepositoryExt};
use lxm_types::{IncompatibleField, MultiText, RecordId};

use crate::context::RunContext;
use crate::error::{MergeError, MergeResult};
use crate::policy;

/// A parsed `Class=...; Type=...; WsSelector=...; range=...` descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub class: Option<RecordKind>,
    pub field_type: Option<FieldType>,
    pub ws_selector: Option<String>,
    pub range: Option<String>,
}

impl FieldDescriptor {
    /// Parse a descriptor. Unknown keys and values are ignored.
    pub fn parse(text: &str) -> Self {
        let mut descriptor = Self::default();
        for part in text.split(';') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_ascii_lowercase().as_str() {
                "class" => descriptor.class = RecordKind::from_class_name(value),
                "type" => descriptor.field_type = FieldType::parse(value),
                "wsselector" => descriptor.ws_selector = Some(value.to_string()),
                "range" => descriptor.range = Some(value.to_string()),
                _ => {}
            }
        }
        descriptor
    }
}

/// Whether a declared type may be stored in an existing field.
pub fn types_compatible(existing: FieldType, declared: FieldType) -> bool {
    use FieldType::*;
    existing == declared
        || matches!(
            (existing, declared),
            (Binary, Image)
                | (Image, Binary)
                | (ReferenceCollection, ReferenceSequence)
                | (ReferenceSequence, ReferenceCollection)
        )
}

/// Custom field resolution for one run.
#[derive(Debug, Default)]
pub struct FieldProvisioner {
    declared: HashMap<String, FieldDescriptor>,
    resolved: HashMap<(RecordKind, String), Option<FieldId>>,
    reported: HashSet<(RecordKind, String)>,
}

impl FieldProvisioner {
    pub fn new(definitions: &[FieldDefinition]) -> Self {
        let declared = definitions
            .iter()
            .filter(|d| !d.tag.trim().is_empty())
            .map(|d| {
                let descriptor = d
                    .descriptor
                    .as_deref()
                    .map(FieldDescriptor::parse)
                    .unwrap_or_default();
                (d.tag.trim().to_string(), descriptor)
            })
            .collect();
        Self {
            declared,
            ..Default::default()
        }
    }

    pub fn descriptor(&self, tag: &str) -> Option<&FieldDescriptor> {
        self.declared.get(tag)
    }

    /// The declared value type of `tag`, if the header gives one.
    pub fn declared_type(&self, tag: &str) -> Option<FieldType> {
        self.declared.get(tag).and_then(|d| d.field_type)
    }
}

/// Find or create the custom field `tag` on `owner` records.
///
/// `fallback` is the type to create the field with when the header does not
/// declare one; `None` means only existing or declared fields are used.
pub(crate) fn field_for(
    ctx: &mut RunContext<'_>,
    owner: RecordKind,
    tag: &str,
    fallback: Option<FieldType>,
) -> Option<CustomFieldDef> {
    let key = (owner, tag.to_string());
    if let Some(cached) = ctx.fields.resolved.get(&key) {
        let id = (*cached)?;
        return ctx.repo.custom_fields().iter().find(|f| f.id == id).cloned();
    }

    let descriptor = ctx.fields.declared.get(tag).cloned();
    let declared_type = descriptor.as_ref().and_then(|d| d.field_type);
    let resolved = match ctx.repo.custom_field(owner, tag).cloned() {
        Some(existing) => match declared_type {
            Some(declared) if !types_compatible(existing.field_type, declared) => {
                if ctx.fields.reported.insert(key.clone()) {
                    tracing::warn!(
                        field = tag,
                        owner = owner.as_str(),
                        existing = %existing.field_type,
                        declared = %declared,
                        "incompatible custom field declaration"
                    );
                    ctx.summary.incompatible_fields.push(IncompatibleField {
                        name: tag.to_string(),
                        owner: owner.as_str().to_string(),
                        existing_type: existing.field_type.to_string(),
                        declared_type: declared.to_string(),
                    });
                }
                None
            }
            _ => Some(existing),
        },
        None => {
            let field_type = declared_type.or(if descriptor.is_some() {
                Some(FieldType::MultiString)
            } else {
                fallback
            });
            field_type.map(|field_type| {
                let mut def = CustomFieldDef {
                    id: FieldId(0),
                    name: tag.to_string(),
                    owner,
                    field_type,
                    ws_selector: descriptor.as_ref().and_then(|d| d.ws_selector.clone()),
                    vocabulary: descriptor.as_ref().and_then(|d| d.range.clone()),
                };
                def.id = ctx.repo.add_custom_field(def.clone());
                tracing::info!(
                    field = tag,
                    owner = owner.as_str(),
                    %field_type,
                    "created custom field"
                );
                def
            })
        }
    };
    ctx.fields
        .resolved
        .insert(key, resolved.as_ref().map(|def| def.id));
    resolved
}

fn vocabulary_of(def: &CustomFieldDef) -> VocabularyKind {
    VocabularyKind::from_range_name(def.vocabulary.as_deref().unwrap_or(&def.name))
}

/// Convert document text to a value of the field's type.
///
/// Unusable text is reported as invalid data and yields `None`.
fn value_of(
    ctx: &mut RunContext<'_>,
    def: &CustomFieldDef,
    record: RecordId,
    text: &MultiText,
) -> MergeResult<Option<CustomValue>> {
    let best = text.best().unwrap_or("").trim();
    let value = match def.field_type {
        FieldType::MultiString => {
            ctx.register_writing_systems(text);
            CustomValue::MultiText(text.clone())
        }
        FieldType::String => CustomValue::Text(best.to_string()),
        FieldType::GenDate => CustomValue::GenDate(best.to_string()),
        FieldType::Integer => match best.parse::<i64>() {
            Ok(n) => CustomValue::Integer(n),
            Err(e) => {
                ctx.invalid_data(Some(record), &def.name, best, format!("not an integer: {e}"));
                return Ok(None);
            }
        },
        FieldType::Binary | FieldType::Image => match hex::decode(best) {
            Ok(bytes) => CustomValue::Binary(bytes),
            Err(e) => {
                ctx.invalid_data(Some(record), &def.name, best, format!("not hex data: {e}"));
                return Ok(None);
            }
        },
        FieldType::ReferenceAtom => {
            if best.is_empty() {
                return Ok(None);
            }
            CustomValue::Reference(ctx.vocabulary_item(&vocabulary_of(def), best)?)
        }
        FieldType::ReferenceCollection | FieldType::ReferenceSequence => {
            let mut ids = Vec::new();
            for label in best.split(';').map(str::trim).filter(|l| !l.is_empty()) {
                let id = ctx.vocabulary_item(&vocabulary_of(def), label)?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            CustomValue::References(ids)
        }
    };
    Ok((!value.is_empty()).then_some(value))
}

fn merge_value(
    ctx: &mut RunContext<'_>,
    def: &CustomFieldDef,
    record: RecordId,
    incoming: CustomValue,
    creating_new: bool,
) -> MergeResult<()> {
    let style = ctx.style();
    let existing = ctx.repo.custom_value(record, def.id).cloned();
    let merged = match existing {
        None => incoming,
        Some(existing) if existing.is_empty() || creating_new => incoming,
        Some(CustomValue::MultiText(mut current)) => match incoming {
            CustomValue::MultiText(text) => {
                policy::merge_text(style, &mut current, &text, false);
                CustomValue::MultiText(current)
            }
            other => other,
        },
        Some(CustomValue::References(mut current)) => match incoming {
            CustomValue::References(ids) => {
                policy::merge_list(style, &mut current, &ids, false);
                CustomValue::References(current)
            }
            other => other,
        },
        Some(existing) => {
            if style.overwrites_existing() {
                incoming
            } else {
                existing
            }
        }
    };
    ctx.repo.set_custom_value(record, def.id, Some(merged))?;
    Ok(())
}

/// Store a field in a custom field of `owner` records.
///
/// Returns `false` when no usable field exists and the data belongs in
/// residue.
pub(crate) fn store_field(
    ctx: &mut RunContext<'_>,
    owner: RecordKind,
    record: RecordId,
    tag: &str,
    text: &MultiText,
    creating_new: bool,
) -> MergeResult<bool> {
    let Some(def) = field_for(ctx, owner, tag, Some(FieldType::MultiString)) else {
        return Ok(false);
    };
    if let Some(value) = value_of(ctx, &def, record, text)? {
        merge_value(ctx, &def, record, value, creating_new)?;
    }
    Ok(true)
}

/// Store the values of a non-built-in trait in a custom field.
///
/// Traits only reach fields that exist or that the header declares.
pub(crate) fn store_trait(
    ctx: &mut RunContext<'_>,
    owner: RecordKind,
    record: RecordId,
    name: &str,
    values: &[String],
    creating_new: bool,
) -> MergeResult<bool> {
    let Some(def) = field_for(ctx, owner, name, None) else {
        return Ok(false);
    };
    let text = MultiText::single("en", values.join(";"));
    if let Some(value) = value_of(ctx, &def, record, &text)? {
        merge_value(ctx, &def, record, value, creating_new)?;
    }
    Ok(true)
}

/// Clear the custom values of `record` whose field is not named in `present`.
///
/// Returns the number of values cleared.
pub(crate) fn clear_absent(
    ctx: &mut RunContext<'_>,
    owner: RecordKind,
    record: RecordId,
    present: &HashSet<&str>,
) -> MergeResult<usize> {
    let absent: Vec<FieldId> = ctx
        .repo
        .custom_fields()
        .iter()
        .filter(|f| f.owner == owner && !present.contains(f.name.as_str()))
        .map(|f| f.id)
        .filter(|id| ctx.repo.custom_value(record, *id).is_some())
        .collect();
    for field in &absent {
        ctx.repo.set_custom_value(record, *field, None)?;
    }
    Ok(absent.len())
}

/// The fatal check for sibling fields sharing a tag.
///
/// Only multi-valued reference fields may repeat on one record.
pub(crate) fn check_sibling_fields<'t>(
    ctx: &RunContext<'_>,
    owner: RecordKind,
    record: RecordId,
    tags: impl IntoIterator<Item = &'t str>,
) -> MergeResult<()> {
    let mut seen = HashSet::new();
    for tag in tags {
        if seen.insert(tag) {
            continue;
        }
        let field_type = ctx
            .repo
            .custom_field(owner, tag)
            .map(|f| f.field_type)
            .or_else(|| ctx.fields.declared_type(tag));
        let repeatable = matches!(
            field_type,
            Some(FieldType::ReferenceCollection | FieldType::ReferenceSequence)
        );
        if !repeatable {
            return Err(MergeError::structural(
                record,
                tag,
                "field appears twice on one record",
            ));
        }
    }
    Ok(())
}

//! Variant and complex-form links.

use lxm_index::VocabularyKind;
use lxm_residue::{relation_fragment, variant_fragment};
use lxm_store::{EntryRef, EntryRefKind, LexEntry, RepositoryExt};
use lxm_types::{Guid, MultiText, RecordId};

use crate::error::ResolveResult;
use crate::group::contiguous_entry_ref_groups;
use crate::pending::{PendingEntryReference, PendingQueues};
use crate::resolver::Resolver;

/// Relation type under which complex-form components are written.
pub const COMPONENT_RELATION: &str = "_component-lexeme";

/// Merged content of one entry-reference group.
#[derive(Debug, Default)]
struct Incoming {
    components: Vec<RecordId>,
    primary: Vec<RecordId>,
    types: Vec<RecordId>,
    summary: MultiText,
    hide_minor_entry: bool,
}

fn union_into(target: &mut Vec<RecordId>, items: &[RecordId]) {
    for item in items {
        if !target.contains(item) {
            target.push(*item);
        }
    }
}

impl Resolver<'_> {
    pub(crate) fn resolve_entry_refs(&mut self, queues: &mut PendingQueues) -> ResolveResult<()> {
        for pending in &mut queues.entry_refs {
            if pending.target_id.is_none() {
                pending.target_id = self.identities.resolve_in(&*self.repo, &pending.target);
            }
            if let Some(target) = pending.target_id {
                if !self.repo.exists(target) {
                    pending.target_id = None;
                }
            }
        }

        for range in contiguous_entry_ref_groups(&queues.entry_refs) {
            let mut members: Vec<PendingEntryReference> = queues.entry_refs[range.clone()].to_vec();
            members.sort_by_key(|p| p.order.unwrap_or(i32::MAX));
            self.resolve_entry_ref_group(&members)?;
            for pending in &mut queues.entry_refs[range] {
                pending.resolved = true;
            }
            self.outcome.groups += 1;
        }
        Ok(())
    }

    fn resolve_entry_ref_group(&mut self, members: &[PendingEntryReference]) -> ResolveResult<()> {
        let Some(first) = members.first() else {
            return Ok(());
        };
        let source = first.source;
        let kind = first.kind;
        if self.repo.typed::<LexEntry>(source).is_err() {
            return Ok(());
        }

        let vocabulary = match kind {
            EntryRefKind::Variant => VocabularyKind::VariantType,
            EntryRefKind::ComplexForm => VocabularyKind::ComplexFormType,
        };
        let mut incoming = Incoming::default();
        for pending in members {
            let reason = match pending.target_id {
                None => Some("target not found"),
                Some(t) if t == source => Some("relation to itself"),
                Some(_) => None,
            };
            if let Some(reason) = reason {
                let fragment = pending.residue.clone().unwrap_or_else(|| match kind {
                    EntryRefKind::Variant => {
                        variant_fragment(Some(&pending.target), &MultiText::new())
                    }
                    EntryRefKind::ComplexForm => {
                        relation_fragment(COMPONENT_RELATION, &pending.target, pending.order)
                    }
                });
                let relation_type = match kind {
                    EntryRefKind::Variant => "variant",
                    EntryRefKind::ComplexForm => COMPONENT_RELATION,
                };
                self.invalid_relation(
                    source,
                    relation_type,
                    &pending.target,
                    pending.order,
                    Some(&fragment),
                    reason,
                );
                continue;
            }
            let Some(target) = pending.target_id else {
                continue;
            };
            union_into(&mut incoming.components, &[target]);
            if pending.primary {
                union_into(&mut incoming.primary, &[target]);
            }
            for label in &pending.types {
                let id = self.lookup.find_or_create(
                    &mut *self.repo,
                    &vocabulary,
                    label,
                    &mut *self.summary,
                )?;
                union_into(&mut incoming.types, &[id]);
            }
            if incoming.summary.is_empty() {
                incoming.summary = pending.summary.clone();
            }
            incoming.hide_minor_entry |= pending.hide_minor_entry;
        }
        if incoming.components.is_empty() {
            return Ok(());
        }

        let existing = self
            .repo
            .typed::<LexEntry>(source)?
            .entry_refs
            .iter()
            .copied()
            .find(|id| {
                self.repo
                    .typed::<EntryRef>(*id)
                    .map(|r| r.kind == kind)
                    .unwrap_or(false)
            });

        match existing {
            Some(id) => {
                let overwrite = self.style.overwrites_existing();
                let entry_ref = self.repo.typed_mut::<EntryRef>(id)?;
                if overwrite || entry_ref.components.is_empty() {
                    entry_ref.components = incoming.components;
                    entry_ref.primary = incoming.primary;
                    if !incoming.types.is_empty() {
                        entry_ref.types = incoming.types;
                    }
                    if !incoming.summary.is_empty() {
                        entry_ref.summary = incoming.summary;
                    }
                    entry_ref.hide_minor_entry = incoming.hide_minor_entry;
                } else {
                    union_into(&mut entry_ref.components, &incoming.components);
                    union_into(&mut entry_ref.primary, &incoming.primary);
                    union_into(&mut entry_ref.types, &incoming.types);
                    if entry_ref.summary.is_empty() {
                        entry_ref.summary = incoming.summary;
                    }
                    entry_ref.hide_minor_entry |= incoming.hide_minor_entry;
                }
                self.outcome.touched.insert(id);
                tracing::debug!(entry = %source, entry_ref = %id, "updated entry reference");
            }
            None => {
                let id = self.repo.insert(EntryRef {
                    guid: Guid::new_random(),
                    owner: Some(source),
                    kind,
                    components: incoming.components,
                    primary: incoming.primary,
                    types: incoming.types,
                    summary: incoming.summary,
                    hide_minor_entry: incoming.hide_minor_entry,
                    residue: None,
                })?;
                self.repo.typed_mut::<LexEntry>(source)?.entry_refs.push(id);
                self.outcome.touched.insert(id);
                self.outcome.created += 1;
                self.summary.counts.references_created += 1;
                tracing::debug!(entry = %source, entry_ref = %id, ?kind, "created entry reference");
            }
        }
        Ok(())
    }
}

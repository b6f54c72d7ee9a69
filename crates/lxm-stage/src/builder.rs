use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use lxm_store::{LexEntry, Repository, RepositoryExt};
use lxm_types::{Guid, InvalidData, MergeStyle, MultiText, RecordId, Timestamp};

use crate::ast::{
    Document, EntryNode, EtymologyNode, ExampleNode, FieldNode, NoteNode, PronunciationNode,
    RelationNode, ReversalNode, SenseNode, TraitNode, VariantNode,
};
use crate::staged::{
    StagedDocument, StagedEntry, StagedEtymology, StagedExample, StagedField,
    StagedGrammaticalInfo, StagedMedia, StagedNote, StagedPicture, StagedPronunciation,
    StagedRelation, StagedReversal, StagedSense, StagedTrait, StagedTranslation, StagedVariant,
    UnchangedEntry,
};

/// Trait naming the morph type of an entry.
pub const MORPH_TYPE_TRAIT: &str = "morph-type";

/// What staging did with one entry construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryDisposition {
    /// Staged at this position of the staged entry list.
    Staged(usize),
    /// Existing entry with an unchanged modification time.
    Unchanged(RecordId),
    /// Existing entry scheduled for deletion.
    Deleted(RecordId),
    /// Deletion marker for an entry the repository does not have.
    Ignored,
}

/// Builds the staged graph from document nodes.
///
/// Staging the same construct twice yields the same staged node: entries and
/// senses are keyed by guid (or by identifier when the guid was synthesized),
/// and repeated children are not added twice.
pub struct StagingBuilder<'r> {
    repo: &'r dyn Repository,
    style: MergeStyle,
    trust_modification_times: bool,
    source_dir: Option<PathBuf>,
    entries: Vec<StagedEntry>,
    by_guid: HashMap<Guid, usize>,
    by_identifier: HashMap<String, usize>,
    unchanged: Vec<UnchangedEntry>,
    unchanged_records: HashSet<RecordId>,
    deletions: Vec<(Guid, RecordId)>,
    invalid: Vec<InvalidData>,
}

impl<'r> StagingBuilder<'r> {
    pub fn new(
        repo: &'r dyn Repository,
        style: MergeStyle,
        trust_modification_times: bool,
    ) -> Self {
        Self {
            repo,
            style,
            trust_modification_times,
            source_dir: None,
            entries: Vec::new(),
            by_guid: HashMap::new(),
            by_identifier: HashMap::new(),
            unchanged: Vec::new(),
            unchanged_records: HashSet::new(),
            deletions: Vec::new(),
            invalid: Vec::new(),
        }
    }

    /// Directory relative media and picture references are resolved against.
    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    /// Stage every entry of `doc`.
    pub fn stage_document(mut self, doc: &Document) -> StagedDocument {
        for node in &doc.entries {
            self.entry(node);
        }
        self.finish()
    }

    pub fn finish(self) -> StagedDocument {
        tracing::info!(
            staged = self.entries.len(),
            unchanged = self.unchanged.len(),
            deleted = self.deletions.len(),
            "staging complete"
        );
        StagedDocument {
            entries: self.entries,
            unchanged: self.unchanged,
            deletions: self.deletions,
            invalid_data: self.invalid,
        }
    }

    pub fn staged(&self, index: usize) -> Option<&StagedEntry> {
        self.entries.get(index)
    }

    /// Stage one entry construct.
    pub fn entry(&mut self, node: &EntryNode) -> EntryDisposition {
        let identifier = node.id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if let Some(explicit) = node.guid.as_deref() {
            if Guid::parse(explicit).is_err() {
                self.invalid.push(invalid_data(None, "guid", explicit, "not a guid"));
            }
        }
        let (guid, synthesized) = Guid::resolve(node.guid.as_deref(), identifier);
        let existing = self
            .repo
            .find_by_guid(&guid)
            .filter(|id| self.repo.typed::<LexEntry>(*id).is_ok());

        if let Some(deleted) = node.date_deleted.as_deref() {
            parse_timestamp(&mut self.invalid, "dateDeleted", Some(deleted));
            return match existing {
                Some(id) => {
                    if !self.deletions.iter().any(|(_, d)| *d == id) {
                        self.deletions.push((guid, id));
                    }
                    EntryDisposition::Deleted(id)
                }
                None => {
                    tracing::debug!(guid = %guid, "deletion marker for unknown entry ignored");
                    EntryDisposition::Ignored
                }
            };
        }

        let created =
            parse_timestamp(&mut self.invalid, "dateCreated", node.date_created.as_deref());
        let modified =
            parse_timestamp(&mut self.invalid, "dateModified", node.date_modified.as_deref());

        if let (Some(id), Some(modified)) = (existing, modified) {
            if self.is_unchanged(id, &modified) {
                if self.unchanged_records.insert(id) {
                    let mut identifiers = vec![(
                        identifier.map_or_else(|| guid.to_string(), str::to_string),
                        guid,
                    )];
                    collect_sense_identifiers(&node.senses, &mut identifiers);
                    self.unchanged.push(UnchangedEntry {
                        record: id,
                        identifiers,
                    });
                }
                tracing::debug!(entry = %guid, "entry unchanged since last import");
                return EntryDisposition::Unchanged(id);
            }
        }

        let known = if synthesized {
            identifier.and_then(|id| self.by_identifier.get(id).copied())
        } else {
            self.by_guid.get(&guid).copied()
        };
        let index = match known {
            Some(index) => index,
            None => {
                let index = self.entries.len();
                self.entries.push(StagedEntry {
                    identifier: identifier.map_or_else(|| guid.to_string(), str::to_string),
                    guid,
                    guid_synthesized: synthesized,
                    existing,
                    ..Default::default()
                });
                if !synthesized {
                    self.by_guid.insert(guid, index);
                }
                if let Some(identifier) = identifier {
                    self.by_identifier.insert(identifier.to_string(), index);
                }
                index
            }
        };

        let Self {
            entries,
            source_dir,
            invalid,
            ..
        } = self;
        let mut env = Env {
            source_dir: source_dir.as_deref(),
            invalid,
        };
        let staged = &mut entries[index];
        staged.created = staged.created.or(created);
        staged.modified = modified.or(staged.modified);
        stage_entry(staged, node, &mut env);
        tracing::debug!(entry = %staged.identifier, senses = staged.senses.len(), "staged entry");
        EntryDisposition::Staged(index)
    }

    fn is_unchanged(&self, id: RecordId, modified: &Timestamp) -> bool {
        if !(self.trust_modification_times && self.style.honours_modification_times()) {
            return false;
        }
        self.repo
            .typed::<LexEntry>(id)
            .ok()
            .and_then(|entry| entry.modified)
            .is_some_and(|existing| existing.same_second(modified))
    }
}

struct Env<'a> {
    source_dir: Option<&'a Path>,
    invalid: &'a mut Vec<InvalidData>,
}

fn invalid_data(record: Option<RecordId>, field: &str, value: &str, message: &str) -> InvalidData {
    tracing::warn!(field, value, "{message}");
    InvalidData {
        record,
        field: field.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

fn parse_timestamp(
    sink: &mut Vec<InvalidData>,
    field: &str,
    value: Option<&str>,
) -> Option<Timestamp> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match Timestamp::parse(value) {
        Ok(ts) => Some(ts),
        Err(e) => {
            sink.push(invalid_data(None, field, value, &e.to_string()));
            None
        }
    }
}

/// Resolve a media reference against the document directory.
///
/// Absolute paths and URLs are kept verbatim.
pub fn resolve_media_path(dir: Option<&Path>, href: &str) -> String {
    let href = href.trim();
    if href.contains("://") || Path::new(href).is_absolute() {
        return href.to_string();
    }
    match dir {
        Some(dir) => dir.join(href).to_string_lossy().into_owned(),
        None => href.to_string(),
    }
}

fn collect_sense_identifiers(senses: &[SenseNode], out: &mut Vec<(String, Guid)>) {
    for sense in senses {
        if let Some(id) = sense.id.as_deref().filter(|s| !s.trim().is_empty()) {
            let (guid, synthesized) = Guid::resolve(sense.guid.as_deref(), Some(id));
            if !synthesized {
                out.push((id.trim().to_string(), guid));
            }
        }
        collect_sense_identifiers(&sense.subsenses, out);
    }
}

fn merge_text(target: &mut MultiText, incoming: &MultiText) {
    for (ws, value) in incoming.iter() {
        target.set(ws, value);
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn trait_of(node: &TraitNode) -> StagedTrait {
    StagedTrait {
        name: node.name.trim().to_string(),
        value: node.value.trim().to_string(),
        raw: node.raw.clone(),
    }
}

fn field_of(node: &FieldNode) -> StagedField {
    StagedField {
        tag: node.tag.trim().to_string(),
        text: node.text.clone(),
        raw: node.raw.clone(),
    }
}

fn note_of(node: &NoteNode) -> StagedNote {
    StagedNote {
        kind: node
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or("general")
            .to_string(),
        text: node.text.clone(),
        raw: node.raw.clone(),
    }
}

fn relation_of(node: &RelationNode, env: &mut Env<'_>) -> StagedRelation {
    StagedRelation {
        relation_type: node.relation_type.trim().to_string(),
        target: node.target.trim().to_string(),
        order: node.order,
        created: parse_timestamp(env.invalid, "dateCreated", node.date_created.as_deref()),
        modified: parse_timestamp(env.invalid, "dateModified", node.date_modified.as_deref()),
        traits: node.traits.iter().map(trait_of).collect(),
        raw: node.raw.clone(),
    }
}

fn pronunciation_of(node: &PronunciationNode, env: &Env<'_>) -> StagedPronunciation {
    StagedPronunciation {
        form: node.form.clone(),
        media: node
            .media
            .iter()
            .map(|m| StagedMedia {
                file: resolve_media_path(env.source_dir, &m.href),
                label: m.label.clone(),
            })
            .collect(),
        residue: node.unknown.iter().map(|u| u.xml.clone()).collect(),
    }
}

fn variant_of(node: &VariantNode) -> StagedVariant {
    StagedVariant {
        target: node
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        form: node.form.clone(),
        traits: node.traits.iter().map(trait_of).collect(),
        raw: node.raw.clone(),
    }
}

fn etymology_of(node: &EtymologyNode) -> StagedEtymology {
    StagedEtymology {
        kind: node.kind.trim().to_string(),
        source: node.source.trim().to_string(),
        form: node.form.clone(),
        gloss: node.gloss.clone(),
        residue: node.unknown.iter().map(|u| u.xml.clone()).collect(),
    }
}

fn example_of(node: &ExampleNode, env: &mut Env<'_>) -> StagedExample {
    let guid = node.guid.as_deref().and_then(|g| match Guid::parse(g) {
        Ok(guid) => Some(guid),
        Err(_) => {
            env.invalid.push(invalid_data(None, "guid", g, "not a guid"));
            None
        }
    });
    StagedExample {
        guid,
        reference: node
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        sentence: node.sentence.clone(),
        translations: node
            .translations
            .iter()
            .map(|t| StagedTranslation {
                kind: t.kind.clone(),
                text: t.text.clone(),
            })
            .collect(),
        notes: node.notes.iter().map(note_of).collect(),
        residue: node.unknown.iter().map(|u| u.xml.clone()).collect(),
    }
}

fn reversal_of(node: &ReversalNode) -> Option<StagedReversal> {
    let writing_system = node
        .kind
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .or_else(|| node.form.writing_systems().next())?
        .to_string();
    Some(StagedReversal {
        writing_system,
        form: node.form.clone(),
        parent: node.main.as_deref().and_then(reversal_of).map(Box::new),
        part_of_speech: node
            .grammatical_info
            .as_ref()
            .map(|g| g.value.trim().to_string())
            .filter(|v| !v.is_empty()),
    })
}

fn stage_entry(entry: &mut StagedEntry, node: &EntryNode, env: &mut Env<'_>) {
    if node.order.is_some() {
        entry.order = node.order;
    }
    merge_text(&mut entry.lexical_unit, &node.lexical_unit);
    merge_text(&mut entry.citation, &node.citation);

    for t in &node.traits {
        let staged = trait_of(t);
        if staged.name == MORPH_TYPE_TRAIT {
            entry.morph_type = Some(staged.value);
        } else {
            push_unique(&mut entry.traits, staged);
        }
    }
    for f in &node.fields {
        push_unique(&mut entry.fields, field_of(f));
    }
    for n in &node.notes {
        push_unique(&mut entry.notes, note_of(n));
    }
    for r in &node.relations {
        let relation = relation_of(r, env);
        push_unique(&mut entry.relations, relation);
    }
    for p in &node.pronunciations {
        push_unique(&mut entry.pronunciations, pronunciation_of(p, env));
    }
    for v in &node.variants {
        push_unique(&mut entry.variants, variant_of(v));
    }
    for e in &node.etymologies {
        push_unique(&mut entry.etymologies, etymology_of(e));
    }
    for u in &node.unknown {
        push_unique(&mut entry.residue, u.xml.clone());
    }
    for s in &node.senses {
        stage_sense(&mut entry.senses, s, env);
    }
}

fn stage_sense<'a>(
    senses: &'a mut Vec<StagedSense>,
    node: &SenseNode,
    env: &mut Env<'_>,
) -> &'a mut StagedSense {
    let identifier = node.id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(explicit) = node.guid.as_deref() {
        if Guid::parse(explicit).is_err() {
            env.invalid.push(invalid_data(None, "guid", explicit, "not a guid"));
        }
    }
    let (guid, synthesized) = Guid::resolve(node.guid.as_deref(), identifier);
    let known = senses.iter().position(|s| {
        if synthesized {
            identifier.is_some() && s.identifier.as_deref() == identifier
        } else {
            !s.guid_synthesized && s.guid == guid
        }
    });
    let index = match known {
        Some(index) => index,
        None => {
            senses.push(StagedSense {
                identifier: identifier.map(str::to_string),
                guid,
                guid_synthesized: synthesized,
                ..Default::default()
            });
            senses.len() - 1
        }
    };
    let sense = &mut senses[index];

    if node.order.is_some() {
        sense.order = node.order;
    }
    merge_text(&mut sense.gloss, &node.gloss);
    merge_text(&mut sense.definition, &node.definition);
    if let Some(info) = &node.grammatical_info {
        sense.grammatical_info = Some(StagedGrammaticalInfo {
            part_of_speech: info.value.trim().to_string(),
            traits: info.traits.iter().map(trait_of).collect(),
        });
    }
    for e in &node.examples {
        let example = example_of(e, env);
        push_unique(&mut sense.examples, example);
    }
    for p in &node.illustrations {
        push_unique(
            &mut sense.pictures,
            StagedPicture {
                file: resolve_media_path(env.source_dir, &p.href),
                caption: p.label.clone(),
            },
        );
    }
    for r in &node.reversals {
        if let Some(reversal) = reversal_of(r) {
            push_unique(&mut sense.reversals, reversal);
        }
    }
    for n in &node.notes {
        push_unique(&mut sense.notes, note_of(n));
    }
    for r in &node.relations {
        let relation = relation_of(r, env);
        push_unique(&mut sense.relations, relation);
    }
    for f in &node.fields {
        push_unique(&mut sense.fields, field_of(f));
    }
    for t in &node.traits {
        push_unique(&mut sense.traits, trait_of(t));
    }
    for u in &node.unknown {
        push_unique(&mut sense.residue, u.xml.clone());
    }
    for sub in &node.subsenses {
        stage_sense(&mut sense.subsenses, sub, env);
    }
    sense
}

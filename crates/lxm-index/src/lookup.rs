//! Normalized label maps over existing repository data.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use lxm_store::{
    FeatureDefn, MappingKind, RefType, Repository, RepositoryExt, ReversalIndex, StoreResult,
    VocabularyItem,
};
use lxm_types::{Guid, MultiText, RecordId, RunSummary};

use crate::error::{IndexError, IndexResult};

/// A controlled vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VocabularyKind {
    PartOfSpeech,
    MorphType,
    Status,
    DomainType,
    Dialect,
    SemanticDomain,
    UsageType,
    SenseType,
    AnthroCode,
    Location,
    Publication,
    VariantType,
    ComplexFormType,
    TranslationType,
    /// A user-defined list.
    Custom(String),
}

impl VocabularyKind {
    /// Map a ranges-document range name to its vocabulary.
    pub fn from_range_name(name: &str) -> Self {
        match name.trim() {
            "grammatical-info" | "grammatical-category" => VocabularyKind::PartOfSpeech,
            "morph-type" => VocabularyKind::MorphType,
            "status" => VocabularyKind::Status,
            "domain-type" => VocabularyKind::DomainType,
            "dialect-labels" | "dialect" => VocabularyKind::Dialect,
            "semantic-domain-ddp4" | "semantic-domain" => VocabularyKind::SemanticDomain,
            "usage-type" => VocabularyKind::UsageType,
            "sense-type" => VocabularyKind::SenseType,
            "anthro-code" => VocabularyKind::AnthroCode,
            "location" => VocabularyKind::Location,
            "do-not-publish-in" | "Publications" | "publication" => VocabularyKind::Publication,
            "variant-type" => VocabularyKind::VariantType,
            "complex-form-type" => VocabularyKind::ComplexFormType,
            "translation-type" => VocabularyKind::TranslationType,
            other => VocabularyKind::Custom(other.to_string()),
        }
    }

    /// Map a built-in trait name to its vocabulary. Unknown names yield `None`.
    pub fn from_trait_name(name: &str) -> Option<Self> {
        match VocabularyKind::from_range_name(name) {
            VocabularyKind::Custom(_) => None,
            // Morph types are handled by the entry merge, not as plain traits.
            VocabularyKind::MorphType => None,
            kind => Some(kind),
        }
    }

    /// Canonical vocabulary name, also used as the trait key on records.
    pub fn name(&self) -> &str {
        match self {
            VocabularyKind::PartOfSpeech => "grammatical-info",
            VocabularyKind::MorphType => "morph-type",
            VocabularyKind::Status => "status",
            VocabularyKind::DomainType => "domain-type",
            VocabularyKind::Dialect => "dialect-labels",
            VocabularyKind::SemanticDomain => "semantic-domain-ddp4",
            VocabularyKind::UsageType => "usage-type",
            VocabularyKind::SenseType => "sense-type",
            VocabularyKind::AnthroCode => "anthro-code",
            VocabularyKind::Location => "location",
            VocabularyKind::Publication => "do-not-publish-in",
            VocabularyKind::VariantType => "variant-type",
            VocabularyKind::ComplexFormType => "complex-form-type",
            VocabularyKind::TranslationType => "translation-type",
            VocabularyKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for VocabularyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Label to record map, reachable under the exact and lower-cased label.
#[derive(Clone, Debug, Default)]
pub struct VocabularyTable {
    keys: HashMap<String, RecordId>,
}

impl VocabularyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `label`. The first record registered under a key keeps it.
    pub fn insert(&mut self, label: &str, id: RecordId) {
        let label = label.trim();
        if label.is_empty() {
            return;
        }
        self.keys.entry(label.to_string()).or_insert(id);
        self.keys.entry(label.to_lowercase()).or_insert(id);
    }

    /// Register every alternative of `text`.
    pub fn insert_text(&mut self, text: &MultiText, id: RecordId) {
        for (_, label) in text.iter() {
            self.insert(label, id);
        }
    }

    /// Exact match first, then lower-cased.
    pub fn find(&self, label: &str) -> Option<RecordId> {
        let label = label.trim();
        self.keys
            .get(label)
            .or_else(|| self.keys.get(&label.to_lowercase()))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Drop every key pointing at `id`.
    pub fn forget(&mut self, id: RecordId) {
        self.keys.retain(|_, v| *v != id);
    }
}

/// Every lookup table a run consults.
#[derive(Debug, Default)]
pub struct LookupIndex {
    vocabularies: HashMap<VocabularyKind, VocabularyTable>,
    ref_types: VocabularyTable,
    features: VocabularyTable,
    reversal_indices: HashMap<String, RecordId>,
    /// Writing system used for labels of invented items.
    label_ws: String,
}

impl LookupIndex {
    pub fn new() -> Self {
        Self {
            label_ws: "en".to_string(),
            ..Default::default()
        }
    }

    /// Build the index from existing repository data.
    pub fn build(repo: &dyn Repository) -> Self {
        let mut index = Self::new();
        for (id, item) in repo.all::<VocabularyItem>() {
            index.register_item(id, &item);
        }
        for (id, ref_type) in repo.all::<RefType>() {
            index.register_ref_type(id, &ref_type);
        }
        for (id, feature) in repo.all::<FeatureDefn>() {
            index.features.insert_text(&feature.name, id);
            index.features.insert_text(&feature.abbreviation, id);
        }
        for (id, reversal) in repo.all::<ReversalIndex>() {
            index
                .reversal_indices
                .insert(reversal.writing_system.to_lowercase(), id);
        }
        tracing::debug!(
            vocabularies = index.vocabularies.len(),
            reversal_indices = index.reversal_indices.len(),
            "lookup index built"
        );
        index
    }

    /// Writing system used when the index has to invent a label.
    pub fn set_label_writing_system(&mut self, ws: impl Into<String>) {
        self.label_ws = ws.into();
    }

    pub fn table(&self, kind: &VocabularyKind) -> Option<&VocabularyTable> {
        self.vocabularies.get(kind)
    }

    pub fn register_item(&mut self, id: RecordId, item: &VocabularyItem) {
        let table = self
            .vocabularies
            .entry(VocabularyKind::from_range_name(&item.vocabulary))
            .or_default();
        table.insert_text(&item.name, id);
        table.insert_text(&item.abbreviation, id);
    }

    pub fn register_label(&mut self, kind: &VocabularyKind, label: &str, id: RecordId) {
        self.vocabularies.entry(kind.clone()).or_default().insert(label, id);
    }

    pub fn register_ref_type(&mut self, id: RecordId, ref_type: &RefType) {
        self.ref_types.insert_text(&ref_type.name, id);
        self.ref_types.insert_text(&ref_type.reverse_name, id);
        self.ref_types.insert_text(&ref_type.abbreviation, id);
    }

    pub fn register_feature(&mut self, id: RecordId, name: &str) {
        self.features.insert(name, id);
    }

    pub fn find(&self, kind: &VocabularyKind, label: &str) -> Option<RecordId> {
        self.vocabularies.get(kind)?.find(label)
    }

    /// Find a vocabulary item by label, inventing it when missing.
    ///
    /// Invented items are reported in the run summary.
    pub fn find_or_create(
        &mut self,
        repo: &mut dyn Repository,
        kind: &VocabularyKind,
        label: &str,
        summary: &mut RunSummary,
    ) -> StoreResult<RecordId> {
        if let Some(id) = self.find(kind, label) {
            return Ok(id);
        }
        let item = VocabularyItem {
            guid: Guid::new_random(),
            vocabulary: kind.name().to_string(),
            name: MultiText::single(self.label_ws.clone(), label.trim()),
            abbreviation: MultiText::single(self.label_ws.clone(), label.trim()),
            ..Default::default()
        };
        let id = repo.insert(item)?;
        self.register_label(kind, label, id);
        summary.new_vocabulary(kind.name(), label.trim(), id);
        tracing::info!(vocabulary = %kind, label = label.trim(), "created vocabulary item");
        Ok(id)
    }

    pub fn ref_type(&self, name: &str) -> Option<RecordId> {
        self.ref_types.find(name)
    }

    /// Find a relation type by name, inventing a collection type when missing.
    pub fn find_or_create_ref_type(
        &mut self,
        repo: &mut dyn Repository,
        name: &str,
        summary: &mut RunSummary,
    ) -> StoreResult<RecordId> {
        if let Some(id) = self.ref_type(name) {
            return Ok(id);
        }
        let ref_type = RefType {
            guid: Guid::new_random(),
            name: MultiText::single(self.label_ws.clone(), name.trim()),
            kind: MappingKind::Collection,
            ..Default::default()
        };
        let id = repo.insert(ref_type.clone())?;
        self.register_ref_type(id, &ref_type);
        summary.new_vocabulary("lexical-relation", name.trim(), id);
        tracing::info!(relation = name.trim(), "created relation type");
        Ok(id)
    }

    pub fn feature(&self, name: &str) -> Option<RecordId> {
        self.features.find(name)
    }

    /// Resolve parsed `(feature, value)` pairs to feature definitions.
    pub fn resolve_features(
        &self,
        pairs: &[(String, String)],
    ) -> IndexResult<Vec<(RecordId, String)>> {
        pairs
            .iter()
            .map(|(name, value)| {
                self.feature(name)
                    .map(|id| (id, value.clone()))
                    .ok_or_else(|| IndexError::UnknownFeature(name.clone()))
            })
            .collect()
    }

    /// The reversal index of `ws`, created when missing.
    pub fn reversal_index(
        &mut self,
        repo: &mut dyn Repository,
        ws: &str,
        summary: &mut RunSummary,
    ) -> StoreResult<RecordId> {
        let key = ws.to_lowercase();
        if let Some(id) = self.reversal_indices.get(&key) {
            return Ok(*id);
        }
        let id = repo.insert(ReversalIndex {
            guid: Guid::new_random(),
            writing_system: ws.to_string(),
            entries: Vec::new(),
        })?;
        self.reversal_indices.insert(key, id);
        summary.new_vocabulary("reversal-index", ws, id);
        Ok(id)
    }

    /// Forget a deleted record in every table.
    pub fn forget(&mut self, id: RecordId) {
        self.ref_types.forget(id);
        self.features.forget(id);
        for table in self.vocabularies.values_mut() {
            table.forget(id);
        }
        self.reversal_indices.retain(|_, v| *v != id);
    }
}

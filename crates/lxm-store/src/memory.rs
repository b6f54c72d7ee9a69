use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use lxm_types::{Guid, RecordId};

use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordKind};
use crate::schema::{CustomFieldDef, CustomValue, FieldId};
use crate::traits::Repository;
use crate::writing_system::WritingSystemRegistry;

/// In-memory, `BTreeMap`-based repository.
///
/// Intended for tests, embedding, and the command-line tool, which persists it
/// as a JSON snapshot. The guid index is rebuilt on load.
#[derive(Default, Serialize, Deserialize)]
pub struct InMemoryRepository {
    records: BTreeMap<RecordId, Record>,
    #[serde(skip)]
    guids: HashMap<Guid, RecordId>,
    next_id: u64,
    writing_systems: WritingSystemRegistry,
    custom_fields: Vec<CustomFieldDef>,
    custom_values: BTreeMap<RecordId, BTreeMap<FieldId, CustomValue>>,
}

impl InMemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize a snapshot.
    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Load a snapshot and rebuild the guid index.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let mut repo: Self =
            serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))?;
        repo.reindex()?;
        Ok(repo)
    }

    fn reindex(&mut self) -> StoreResult<()> {
        self.guids.clear();
        for (id, record) in &self.records {
            if self.guids.insert(record.guid(), *id).is_some() {
                return Err(StoreError::DuplicateGuid(record.guid()));
            }
            self.next_id = self.next_id.max(id.0 + 1);
        }
        Ok(())
    }

    fn collect_cascade(&self, root: RecordId) -> Vec<RecordId> {
        let mut doomed = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(record) = self.records.get(&id) {
                doomed.push(id);
                stack.extend(record.owned_children());
            }
        }
        doomed
    }
}

impl Repository for InMemoryRepository {
    fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.get_mut(&id)
    }

    fn find_by_guid(&self, guid: &Guid) -> Option<RecordId> {
        self.guids.get(guid).copied()
    }

    fn create(&mut self, record: Record) -> StoreResult<RecordId> {
        let guid = record.guid();
        if self.guids.contains_key(&guid) {
            return Err(StoreError::DuplicateGuid(guid));
        }
        self.next_id = self.next_id.max(1);
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.guids.insert(guid, id);
        self.records.insert(id, record);
        Ok(id)
    }

    fn delete(&mut self, id: RecordId) -> StoreResult<bool> {
        if !self.records.contains_key(&id) {
            return Ok(false);
        }
        let doomed = self.collect_cascade(id);
        for gone in &doomed {
            if let Some(record) = self.records.remove(gone) {
                self.guids.remove(&record.guid());
            }
            self.custom_values.remove(gone);
        }
        for record in self.records.values_mut() {
            for gone in &doomed {
                record.forget(*gone);
            }
        }
        for values in self.custom_values.values_mut() {
            values.retain(|_, value| match value {
                CustomValue::Reference(target) => !doomed.contains(target),
                CustomValue::References(targets) => {
                    targets.retain(|t| !doomed.contains(t));
                    true
                }
                _ => true,
            });
        }
        tracing::debug!(record = %id, cascaded = doomed.len(), "deleted record");
        Ok(true)
    }

    fn ids_of_kind(&self, kind: RecordKind) -> Vec<RecordId> {
        self.records
            .iter()
            .filter(|(_, r)| r.kind() == kind)
            .map(|(id, _)| *id)
            .collect()
    }

    fn writing_systems(&self) -> &WritingSystemRegistry {
        &self.writing_systems
    }

    fn writing_systems_mut(&mut self) -> &mut WritingSystemRegistry {
        &mut self.writing_systems
    }

    fn custom_fields(&self) -> &[CustomFieldDef] {
        &self.custom_fields
    }

    fn add_custom_field(&mut self, mut def: CustomFieldDef) -> FieldId {
        let id = FieldId(self.custom_fields.len() as u32 + 1);
        def.id = id;
        self.custom_fields.push(def);
        id
    }

    fn custom_value(&self, record: RecordId, field: FieldId) -> Option<&CustomValue> {
        self.custom_values.get(&record)?.get(&field)
    }

    fn set_custom_value(
        &mut self,
        record: RecordId,
        field: FieldId,
        value: Option<CustomValue>,
    ) -> StoreResult<()> {
        if !self.records.contains_key(&record) {
            return Err(StoreError::NotFound(record));
        }
        if !self.custom_fields.iter().any(|f| f.id == field) {
            return Err(StoreError::FieldNotFound(field.0));
        }
        match value {
            Some(value) => {
                self.custom_values.entry(record).or_default().insert(field, value);
            }
            None => {
                if let Some(values) = self.custom_values.get_mut(&record) {
                    values.remove(&field);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("record_count", &self.records.len())
            .field("custom_fields", &self.custom_fields.len())
            .finish()
    }
}

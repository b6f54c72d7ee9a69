use std::collections::{HashMap, HashSet};

use lxm_store::Repository;
use lxm_types::{Guid, RecordId};

/// Document identifiers bound to repository records for one run.
///
/// Also tracks the guids deleted during the run, so a later construct cannot
/// resurrect them, and which records the run changed or left unchanged.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_identifier: HashMap<String, RecordId>,
    identifiers: HashMap<RecordId, String>,
    deleted: HashSet<Guid>,
    unchanged: HashSet<RecordId>,
    changed: HashSet<RecordId>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `identifier` to `id`.
    ///
    /// A collision keeps the first binding and returns `false`.
    pub fn bind(&mut self, identifier: &str, id: RecordId) -> bool {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return false;
        }
        match self.by_identifier.get(identifier) {
            Some(existing) if *existing == id => true,
            Some(existing) => {
                tracing::warn!(
                    identifier,
                    existing = %existing,
                    ignored = %id,
                    "duplicate document identifier"
                );
                false
            }
            None => {
                self.by_identifier.insert(identifier.to_string(), id);
                self.identifiers.entry(id).or_insert_with(|| identifier.to_string());
                true
            }
        }
    }

    /// The record bound to `identifier` in this run.
    pub fn resolve(&self, identifier: &str) -> Option<RecordId> {
        self.by_identifier.get(identifier.trim()).copied()
    }

    /// Resolve `identifier`, falling back to a guid embedded in it.
    pub fn resolve_in(&self, repo: &dyn Repository, identifier: &str) -> Option<RecordId> {
        if let Some(id) = self.resolve(identifier) {
            return Some(id);
        }
        let guid = Guid::extract_from(identifier)?;
        if self.deleted.contains(&guid) {
            return None;
        }
        repo.find_by_guid(&guid)
    }

    /// The identifier first bound to `id`.
    pub fn identifier_of(&self, id: RecordId) -> Option<&str> {
        self.identifiers.get(&id).map(String::as_str)
    }

    pub fn mark_deleted(&mut self, guid: Guid) {
        self.deleted.insert(guid);
    }

    pub fn was_deleted(&self, guid: &Guid) -> bool {
        self.deleted.contains(guid)
    }

    pub fn mark_unchanged(&mut self, id: RecordId) {
        if !self.changed.contains(&id) {
            self.unchanged.insert(id);
        }
    }

    pub fn mark_changed(&mut self, id: RecordId) {
        self.unchanged.remove(&id);
        self.changed.insert(id);
    }

    /// Whether the run has seen `id` at all, changed or not.
    pub fn is_touched(&self, id: RecordId) -> bool {
        self.changed.contains(&id) || self.unchanged.contains(&id)
    }

    pub fn is_changed(&self, id: RecordId) -> bool {
        self.changed.contains(&id)
    }

    pub fn changed_count(&self) -> usize {
        self.changed.len()
    }

    pub fn unchanged_count(&self) -> usize {
        self.unchanged.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lxm_store::{InMemoryRepository, LexEntry, RepositoryExt};

    #[test]
    fn collision_keeps_first_binding() {
        let mut index = IdentityIndex::new();
        assert!(index.bind("house_1", RecordId(1)));
        assert!(!index.bind("house_1", RecordId(2)));
        assert_eq!(index.resolve("house_1"), Some(RecordId(1)));
        assert!(index.bind("house_1", RecordId(1)));
    }

    #[test]
    fn resolve_in_falls_back_to_embedded_guid() {
        let mut repo = InMemoryRepository::new();
        let guid = Guid::new_random();
        let id = repo
            .insert(LexEntry {
                guid,
                ..Default::default()
            })
            .unwrap();
        let mut index = IdentityIndex::new();
        let identifier = format!("house_{guid}");
        assert_eq!(index.resolve_in(&repo, &identifier), Some(id));

        index.mark_deleted(guid);
        assert_eq!(index.resolve_in(&repo, &identifier), None);
    }

    #[test]
    fn changed_overrides_unchanged() {
        let mut index = IdentityIndex::new();
        index.mark_unchanged(RecordId(3));
        assert!(index.is_touched(RecordId(3)));
        index.mark_changed(RecordId(3));
        index.mark_unchanged(RecordId(3));
        assert!(index.is_changed(RecordId(3)));
        assert_eq!(index.unchanged_count(), 0);
        assert!(!index.is_touched(RecordId(4)));
    }
}

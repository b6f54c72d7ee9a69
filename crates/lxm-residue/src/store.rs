use std::collections::BTreeMap;

use lxm_store::Repository;
use lxm_types::RecordId;

use crate::document::ResidueDocument;
use crate::error::{ResidueError, ResidueResult};

/// Residue captured during a run, keyed by record.
#[derive(Debug, Default)]
pub struct ResidueStore {
    docs: BTreeMap<RecordId, ResidueDocument>,
}

impl ResidueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `fragment` verbatim to the residue of `record`.
    ///
    /// Returns `false` when the fragment was already captured.
    pub fn capture(&mut self, record: RecordId, fragment: impl AsRef<str>) -> bool {
        let captured = self.docs.entry(record).or_default().append(fragment.as_ref());
        if captured {
            tracing::debug!(record = %record, "captured residue fragment");
        }
        captured
    }

    pub fn document(&self, record: RecordId) -> Option<&ResidueDocument> {
        self.docs.get(&record)
    }

    /// Number of records with captured residue.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Write every pending document to its record's residue property.
    ///
    /// Fragments already stored on the record are kept and not repeated.
    /// Documents are marked clean, so flushing again writes nothing until new
    /// fragments are captured. Records deleted since capture are skipped.
    /// Returns the number of records written.
    pub fn flush_all(&mut self, repo: &mut dyn Repository) -> ResidueResult<usize> {
        let mut written = 0;
        for (id, doc) in self.docs.iter_mut().filter(|(_, d)| d.is_dirty()) {
            let Some(record) = repo.get_mut(*id) else {
                tracing::debug!(record = %id, "residue target no longer exists");
                doc.mark_clean();
                continue;
            };
            let slot = record.residue_mut().ok_or(ResidueError::NoResidueSlot(*id))?;

            let mut merged = slot
                .as_deref()
                .map(ResidueDocument::from_stored)
                .unwrap_or_default();
            for fragment in doc.fragments() {
                merged.append(fragment);
            }
            let rendered = merged.render();
            if slot.as_deref() != Some(rendered.as_str()) {
                *slot = Some(rendered);
                written += 1;
            }
            doc.mark_clean();
        }
        tracing::info!(records = written, "flushed residue");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fragments;
    use lxm_store::{InMemoryRepository, LexEntry, Msa, RepositoryExt};
    use lxm_types::Guid;

    fn entry(repo: &mut InMemoryRepository) -> RecordId {
        repo.insert(LexEntry {
            guid: Guid::new_random(),
            ..Default::default()
        })
        .unwrap()
    }

    fn stored(repo: &InMemoryRepository, id: RecordId) -> String {
        repo.typed::<LexEntry>(id)
            .unwrap()
            .residue
            .clone()
            .unwrap_or_default()
    }

    #[test]
    fn flush_writes_fragments_in_capture_order() {
        let mut repo = InMemoryRepository::new();
        let id = entry(&mut repo);
        let mut store = ResidueStore::new();
        store.capture(id, "<x-a>1</x-a>");
        store.capture(id, "<x-b>2</x-b>");
        assert_eq!(store.flush_all(&mut repo).unwrap(), 1);
        assert_eq!(
            stored(&repo, id),
            "<lift-residue><x-a>1</x-a><x-b>2</x-b></lift-residue>"
        );
    }

    #[test]
    fn flush_is_idempotent() {
        let mut repo = InMemoryRepository::new();
        let id = entry(&mut repo);
        let mut store = ResidueStore::new();
        store.capture(id, "<x-a>1</x-a>");
        store.flush_all(&mut repo).unwrap();
        let first = stored(&repo, id);

        assert_eq!(store.flush_all(&mut repo).unwrap(), 0);
        assert!(!store.capture(id, "<x-a>1</x-a>"));
        assert_eq!(store.flush_all(&mut repo).unwrap(), 0);
        assert_eq!(stored(&repo, id), first);
    }

    #[test]
    fn earlier_runs_not_duplicated() {
        let mut repo = InMemoryRepository::new();
        let id = entry(&mut repo);
        repo.typed_mut::<LexEntry>(id).unwrap().residue =
            Some("<lift-residue><x-a>1</x-a></lift-residue>".into());

        let mut store = ResidueStore::new();
        store.capture(id, "<x-a>1</x-a>");
        store.capture(id, "<x-c/>");
        store.flush_all(&mut repo).unwrap();
        assert_eq!(
            fragments(&stored(&repo, id)).unwrap(),
            vec!["<x-a>1</x-a>", "<x-c/>"]
        );
    }

    #[test]
    fn deleted_records_skipped() {
        let mut repo = InMemoryRepository::new();
        let id = entry(&mut repo);
        let mut store = ResidueStore::new();
        store.capture(id, "<x/>");
        repo.delete(id).unwrap();
        assert_eq!(store.flush_all(&mut repo).unwrap(), 0);
    }

    #[test]
    fn records_without_slot_rejected() {
        let mut repo = InMemoryRepository::new();
        let id = repo
            .insert(Msa {
                guid: Guid::new_random(),
                ..Default::default()
            })
            .unwrap();
        let mut store = ResidueStore::new();
        store.capture(id, "<x/>");
        assert!(matches!(
            store.flush_all(&mut repo),
            Err(ResidueError::NoResidueSlot(_))
        ));
    }
}

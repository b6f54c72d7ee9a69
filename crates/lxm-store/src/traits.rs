use lxm_types::{Guid, RecordId};

use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordKind, RecordVariant};
use crate::schema::{CustomFieldDef, CustomValue, FieldId};
use crate::writing_system::WritingSystemRegistry;

/// Lexical repository consumed by the merge engine.
///
/// Implementations must satisfy these invariants:
/// - Guids are unique across all records; `create` rejects a duplicate.
/// - `delete` cascades to owned children and removes every mention of the
///   deleted handles from other records.
/// - Deleting a record that no longer exists is not an error.
pub trait Repository {
    /// Identity-by-handle lookup.
    fn get(&self, id: RecordId) -> Option<&Record>;

    fn get_mut(&mut self, id: RecordId) -> Option<&mut Record>;

    /// Identity-by-guid lookup.
    fn find_by_guid(&self, guid: &Guid) -> Option<RecordId>;

    /// Create a record and return its handle.
    fn create(&mut self, record: Record) -> StoreResult<RecordId>;

    /// Delete a record and everything it owns.
    ///
    /// Returns `Ok(false)` if the record did not exist.
    fn delete(&mut self, id: RecordId) -> StoreResult<bool>;

    /// All handles of one kind, in handle order.
    fn ids_of_kind(&self, kind: RecordKind) -> Vec<RecordId>;

    fn writing_systems(&self) -> &WritingSystemRegistry;

    fn writing_systems_mut(&mut self) -> &mut WritingSystemRegistry;

    fn custom_fields(&self) -> &[CustomFieldDef];

    /// Register a custom field. The `id` of `def` is ignored and assigned.
    fn add_custom_field(&mut self, def: CustomFieldDef) -> FieldId;

    fn custom_value(&self, record: RecordId, field: FieldId) -> Option<&CustomValue>;

    /// Set or clear (`None`) one custom value.
    fn set_custom_value(
        &mut self,
        record: RecordId,
        field: FieldId,
        value: Option<CustomValue>,
    ) -> StoreResult<()>;

    fn exists(&self, id: RecordId) -> bool {
        self.get(id).is_some()
    }

    /// Number of records of one kind.
    fn count(&self, kind: RecordKind) -> usize {
        self.ids_of_kind(kind).len()
    }
}

/// Typed helpers over any [`Repository`], including trait objects.
pub trait RepositoryExt: Repository {
    /// Borrow a record as a specific variant.
    fn typed<T: RecordVariant>(&self, id: RecordId) -> StoreResult<&T> {
        let record = self.get(id).ok_or(StoreError::NotFound(id))?;
        T::from_record(record).ok_or(StoreError::WrongKind {
            id,
            expected: T::KIND,
            actual: record.kind(),
        })
    }

    /// Mutably borrow a record as a specific variant.
    fn typed_mut<T: RecordVariant>(&mut self, id: RecordId) -> StoreResult<&mut T> {
        let record = self.get_mut(id).ok_or(StoreError::NotFound(id))?;
        let actual = record.kind();
        T::from_record_mut(record).ok_or(StoreError::WrongKind {
            id,
            expected: T::KIND,
            actual,
        })
    }

    /// Create a typed record.
    fn insert<T: RecordVariant>(&mut self, value: T) -> StoreResult<RecordId> {
        self.create(value.into_record())
    }

    /// All records of one variant with their handles.
    fn all<T: RecordVariant + Clone>(&self) -> Vec<(RecordId, T)> {
        self.ids_of_kind(T::KIND)
            .into_iter()
            .filter_map(|id| {
                let record = self.get(id)?;
                T::from_record(record).map(|r| (id, r.clone()))
            })
            .collect()
    }

    /// Find a custom field by owner kind and name.
    fn custom_field(&self, owner: RecordKind, name: &str) -> Option<&CustomFieldDef> {
        self.custom_fields()
            .iter()
            .find(|f| f.owner == owner && f.name == name)
    }
}

impl<R: Repository + ?Sized> RepositoryExt for R {}

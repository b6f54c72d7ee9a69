use std::collections::HashSet;

use lxm_index::{IdentityIndex, LookupIndex, VocabularyKind};
use lxm_refs::PendingQueues;
use lxm_residue::ResidueStore;
use lxm_store::{RecordKind, Repository};
use lxm_types::{MergeStyle, MultiText, RecordId, RunSummary};

use crate::config::MergeConfig;
use crate::error::MergeResult;
use crate::policy;
use crate::provision::FieldProvisioner;

/// Record kinds whose pre-run population is remembered for orphan cleanup.
pub(crate) const TRACKED_KINDS: [RecordKind; 9] = [
    RecordKind::Entry,
    RecordKind::Sense,
    RecordKind::Example,
    RecordKind::Pronunciation,
    RecordKind::Etymology,
    RecordKind::EntryRef,
    RecordKind::Msa,
    RecordKind::ReversalEntry,
    RecordKind::Reference,
];

/// Everything one merge run reads and grows.
///
/// Two runs never share a context.
pub struct RunContext<'r> {
    pub repo: &'r mut dyn Repository,
    pub config: MergeConfig,
    pub lookup: LookupIndex,
    pub identities: IdentityIndex,
    pub residue: ResidueStore,
    pub pending: PendingQueues,
    pub summary: RunSummary,
    pub fields: FieldProvisioner,
    /// Records of tracked kinds that existed before the run.
    pub preexisting: HashSet<RecordId>,
    /// Records deleted at the end of the run.
    pub scheduled: Vec<RecordId>,
}

impl<'r> RunContext<'r> {
    pub fn new(repo: &'r mut dyn Repository, config: MergeConfig) -> Self {
        let lookup = LookupIndex::build(&*repo);
        let preexisting = TRACKED_KINDS
            .iter()
            .flat_map(|kind| repo.ids_of_kind(*kind))
            .collect();
        Self {
            repo,
            config,
            lookup,
            identities: IdentityIndex::new(),
            residue: ResidueStore::new(),
            pending: PendingQueues::new(),
            summary: RunSummary::new(),
            fields: FieldProvisioner::default(),
            preexisting,
            scheduled: Vec::new(),
        }
    }

    pub fn style(&self) -> MergeStyle {
        self.config.style
    }

    /// Record that this run created or merged `id`.
    pub fn touch(&mut self, id: RecordId) {
        self.identities.mark_changed(id);
    }

    pub fn register_writing_systems(&mut self, text: &MultiText) {
        for ws in text.writing_systems() {
            let description = self.config.description_for(ws);
            let (_, created) = self
                .repo
                .writing_systems_mut()
                .find_or_create(ws, description);
            if created {
                tracing::info!(ws, "created writing system");
            }
        }
    }

    /// Merge text under the run's policy, registering its writing systems.
    pub fn merge_text(
        &mut self,
        existing: &mut MultiText,
        incoming: &MultiText,
        creating_new: bool,
    ) -> bool {
        self.register_writing_systems(incoming);
        policy::merge_text(self.config.style, existing, incoming, creating_new)
    }

    /// The vocabulary item labelled `label`, created when missing.
    pub fn vocabulary_item(&mut self, kind: &VocabularyKind, label: &str) -> MergeResult<RecordId> {
        Ok(self
            .lookup
            .find_or_create(&mut *self.repo, kind, label, &mut self.summary)?)
    }

    /// Keep an unrecognized fragment on `record`.
    pub fn capture(&mut self, record: RecordId, fragment: impl AsRef<str>) {
        if self.residue.capture(record, fragment) {
            tracing::debug!(record = %record, "captured residue");
        }
    }

    pub fn invalid_data(
        &mut self,
        record: Option<RecordId>,
        field: &str,
        value: &str,
        message: impl Into<String>,
    ) {
        self.summary.invalid_data(record, field, value, message);
    }
}

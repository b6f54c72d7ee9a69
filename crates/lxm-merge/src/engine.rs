use std::time::Instant;

use lxm_index::seed_ranges;
use lxm_refs::Resolver;
use lxm_stage::{Document, StagingBuilder};
use lxm_store::Repository;
use lxm_types::{ProgressSink, RunSummary};

use crate::config::MergeConfig;
use crate::context::RunContext;
use crate::entry;
use crate::error::MergeResult;
use crate::orphan;
use crate::provision::FieldProvisioner;

// ---------------------------------------------------------------------------
// MergeEngine
// ---------------------------------------------------------------------------

/// Drives one document into one repository.
///
/// A run is a fixed pipeline: seed ranges, stage, merge entries, resolve
/// cross references, flush residue, delete orphans. Every run builds its own
/// [`RunContext`], so an engine can be reused for any number of runs.
#[derive(Clone, Debug, Default)]
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// The current configuration.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `doc` into `repo`.
    ///
    /// Non-fatal problems land in the returned summary. An `Err` means the
    /// run stopped part way and the repository may hold a partial merge.
    pub fn run(
        &self,
        repo: &mut dyn Repository,
        doc: &Document,
        progress: &mut dyn ProgressSink,
    ) -> MergeResult<RunSummary> {
        let started = Instant::now();
        let mut ctx = RunContext::new(repo, self.config.clone());
        let style = ctx.style();
        tracing::info!(style = %style, entries = doc.entries.len(), "merge run started");

        let seeded = seed_ranges(
            &mut *ctx.repo,
            &mut ctx.lookup,
            &doc.ranges,
            &ctx.config.language_descriptions,
        )?;
        tracing::info!(
            created = seeded.created,
            updated = seeded.updated,
            writing_systems = seeded.writing_systems_created,
            "ranges seeded"
        );
        ctx.fields = FieldProvisioner::new(&doc.field_definitions);

        let staged = {
            let trust = ctx.config.trust_modification_times;
            let mut builder = StagingBuilder::new(&*ctx.repo, style, trust);
            if let Some(dir) = ctx.config.source_dir() {
                builder = builder.with_source_dir(dir);
            }
            builder.stage_document(doc)
        };
        ctx.summary.invalid_data.extend(staged.invalid_data);

        for unchanged in &staged.unchanged {
            for (identifier, guid) in &unchanged.identifiers {
                if let Some(id) = ctx.repo.find_by_guid(guid) {
                    ctx.identities.bind(identifier, id);
                }
            }
            orphan::mark_subtree_unchanged(&mut ctx, unchanged.record);
            ctx.summary.counts.entries_unchanged += 1;
        }
        for (guid, id) in staged.deletions {
            ctx.identities.mark_deleted(guid);
            ctx.scheduled.push(id);
        }

        progress.phase("entries", staged.entries.len());
        for (done, staged_entry) in staged.entries.iter().enumerate() {
            entry::merge_entry(&mut ctx, staged_entry)?;
            progress.advance(done + 1);
        }

        let outcome = Resolver::new(
            &mut *ctx.repo,
            &mut ctx.lookup,
            &ctx.identities,
            &mut ctx.residue,
            &mut ctx.summary,
            style,
        )
        .resolve(&mut ctx.pending, progress)?;
        for id in outcome.touched {
            ctx.touch(id);
        }

        let flushed = ctx.residue.flush_all(&mut *ctx.repo)?;
        tracing::debug!(records = flushed, "residue flushed");

        progress.phase("cleanup", ctx.scheduled.len());
        orphan::cleanup(&mut ctx)?;

        let summary = ctx.summary;
        tracing::info!(
            added = summary.counts.entries_added,
            merged = summary.counts.entries_merged,
            unchanged = summary.counts.entries_unchanged,
            deleted = summary.counts.entries_deleted,
            senses_added = summary.counts.senses_added,
            conflicts = summary.conflicts.len(),
            problems = summary.problem_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "merge run complete"
        );
        Ok(summary)
    }
}

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;

use lxm_index::Range;
use lxm_merge::{MergeConfig, MergeEngine};
use lxm_stage::Document;
use lxm_store::{InMemoryRepository, Repository};
use lxm_types::{Guid, RunSummary, TracingProgress};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let output = match cli.command {
        Command::Merge(args) => cmd_merge(args, cli.format)?,
        Command::Residue(args) => cmd_residue(args)?,
        Command::Summary(args) => cmd_summary(args, cli.format)?,
    };
    print!("{output}");
    Ok(())
}

fn load_repo(path: &Path) -> anyhow::Result<InMemoryRepository> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no snapshot yet; starting empty");
        return Ok(InMemoryRepository::new());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    InMemoryRepository::from_json(&json)
        .with_context(|| format!("loading snapshot {}", path.display()))
}

fn merge_config(args: &MergeArgs) -> anyhow::Result<MergeConfig> {
    let mut config = match &args.config {
        Some(path) => MergeConfig::load(path)?,
        None => MergeConfig::default(),
    };
    if let Some(style) = args.style {
        config.style = style.into();
    }
    if args.trust_timestamps {
        config.trust_modification_times = true;
    }
    config.source_path = Some(args.document.clone());
    Ok(config)
}

fn cmd_merge(args: MergeArgs, format: OutputFormat) -> anyhow::Result<String> {
    let config = merge_config(&args)?;
    let mut doc = Document::load(&args.document)
        .with_context(|| format!("loading document {}", args.document.display()))?;
    if let Some(path) = &args.ranges {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading ranges {}", path.display()))?;
        let ranges: Vec<Range> = serde_json::from_str(&json)
            .with_context(|| format!("parsing ranges {}", path.display()))?;
        doc.ranges.splice(0..0, ranges);
    }

    let mut repo = load_repo(&args.repo)?;
    let engine = MergeEngine::new(config);
    let summary = engine.run(&mut repo, &doc, &mut TracingProgress::default())?;

    if args.dry_run {
        tracing::info!("dry run; snapshot not written");
    } else {
        std::fs::write(&args.repo, repo.to_json()?)
            .with_context(|| format!("writing snapshot {}", args.repo.display()))?;
    }
    if let Some(path) = &args.summary_out {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing summary {}", path.display()))?;
    }

    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(&summary)?)),
        OutputFormat::Text => {
            let mut out = format!(
                "{} Merged {} ({})\n",
                "✓".green().bold(),
                args.document.display().to_string().bold(),
                engine.config().style.to_string().cyan()
            );
            out.push_str(&render_summary(&summary));
            Ok(out)
        }
    }
}

fn cmd_residue(args: ResidueArgs) -> anyhow::Result<String> {
    let repo = load_repo(&args.repo)?;
    let guid = Guid::parse(&args.guid)?;
    let Some(id) = repo.find_by_guid(&guid) else {
        bail!("no record with guid {guid}");
    };
    let Some(record) = repo.get(id) else {
        bail!("record {id} vanished from the snapshot");
    };
    let fragments = match record.residue() {
        Some(residue) => lxm_residue::fragments(residue)?,
        None => Vec::new(),
    };

    let mut out = format!(
        "{} {} ({}): {} fragment(s)\n",
        record.kind().to_string().bold(),
        id,
        guid.to_string().yellow(),
        fragments.len()
    );
    for fragment in &fragments {
        let _ = writeln!(out, "  {fragment}");
    }
    Ok(out)
}

fn cmd_summary(args: SummaryArgs, format: OutputFormat) -> anyhow::Result<String> {
    let json = std::fs::read_to_string(&args.path)
        .with_context(|| format!("reading summary {}", args.path.display()))?;
    let summary: RunSummary = serde_json::from_str(&json)?;
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(&summary)?)),
        OutputFormat::Text => Ok(render_summary(&summary)),
    }
}

/// Human-readable run report.
pub fn render_summary(summary: &RunSummary) -> String {
    let c = &summary.counts;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  Entries: {} added, {} merged, {} unchanged, {} deleted",
        c.entries_added, c.entries_merged, c.entries_unchanged, c.entries_deleted
    );
    let _ = writeln!(
        out,
        "  Senses added: {}  Duplicates: {}  References: {} created, {} deleted",
        c.senses_added, c.duplicates_created, c.references_created, c.references_deleted
    );
    if c.orphans_deleted > 0 {
        let _ = writeln!(out, "  Orphans deleted: {}", c.orphans_deleted);
    }

    if !summary.new_vocabulary.is_empty() {
        let _ = writeln!(out, "\n{}", "New vocabulary items".bold());
        for item in &summary.new_vocabulary {
            let _ = writeln!(out, "  {} {}: {}", "+".green(), item.vocabulary, item.label);
        }
    }
    if !summary.conflicts.is_empty() {
        let _ = writeln!(out, "\n{}", "Conflicts".bold());
        for conflict in &summary.conflicts {
            let duplicate = conflict
                .duplicate
                .map_or_else(|| "-".to_string(), |d| d.to_string());
            let _ = writeln!(
                out,
                "  {} {:?} {} differs: kept {}, duplicate {}",
                "!".yellow(),
                conflict.kind,
                conflict.field.yellow(),
                conflict.existing,
                duplicate
            );
        }
    }
    if !summary.invalid_relations.is_empty() {
        let _ = writeln!(out, "\n{}", "Invalid relations".bold());
        for relation in &summary.invalid_relations {
            let _ = writeln!(
                out,
                "  {} {} {} -> {}: {}",
                "✗".red(),
                relation.source,
                relation.relation_type,
                relation.target.red(),
                relation.reason
            );
        }
    }
    if !summary.invalid_data.is_empty() {
        let _ = writeln!(out, "\n{}", "Invalid data".bold());
        for item in &summary.invalid_data {
            let record = item.record.map_or_else(|| "-".to_string(), |r| r.to_string());
            let _ = writeln!(
                out,
                "  {} {} {}={:?}: {}",
                "✗".red(),
                record,
                item.field,
                item.value,
                item.message
            );
        }
    }
    if !summary.combined_collections.is_empty() {
        let _ = writeln!(out, "\n{}", "Combined collections".bold());
        for combined in &summary.combined_collections {
            let _ = writeln!(
                out,
                "  {} {} {}: {} member(s) dropped",
                "!".yellow(),
                combined.relation_type,
                combined.reference,
                combined.dropped.len()
            );
        }
    }
    if !summary.incompatible_fields.is_empty() {
        let _ = writeln!(out, "\n{}", "Incompatible custom fields".bold());
        for field in &summary.incompatible_fields {
            let _ = writeln!(
                out,
                "  {} {}.{}: existing {}, declared {}",
                "✗".red(),
                field.owner,
                field.name,
                field.existing_type,
                field.declared_type
            );
        }
    }
    if summary.problem_count() == 0 {
        let _ = writeln!(out, "{} No problems.", "✓".green());
    }
    out
}

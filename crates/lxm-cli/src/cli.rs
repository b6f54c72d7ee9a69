use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use lxm_types::MergeStyle;

#[derive(Parser)]
#[command(
    name = "lxm",
    about = "LexiMerge: merge lexicon interchange documents into a lexical repository",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Merge style as accepted on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum StyleArg {
    KeepOld,
    KeepNew,
    KeepBoth,
    KeepOnlyNew,
}

impl From<StyleArg> for MergeStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::KeepOld => MergeStyle::KeepOld,
            StyleArg::KeepNew => MergeStyle::KeepNew,
            StyleArg::KeepBoth => MergeStyle::KeepBoth,
            StyleArg::KeepOnlyNew => MergeStyle::KeepOnlyNew,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge a document into a repository snapshot
    Merge(MergeArgs),
    /// Print the residue fragments stored on a record
    Residue(ResidueArgs),
    /// Render a saved run summary
    Summary(SummaryArgs),
}

#[derive(Args)]
pub struct MergeArgs {
    /// Tokenized interchange document (JSON)
    pub document: PathBuf,
    /// Repository snapshot; created when missing
    #[arg(short, long)]
    pub repo: PathBuf,
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long)]
    pub style: Option<StyleArg>,
    /// Skip entries whose modification time is unchanged
    #[arg(long)]
    pub trust_timestamps: bool,
    /// Separate ranges file (JSON list of ranges)
    #[arg(long)]
    pub ranges: Option<PathBuf>,
    /// Write the run summary here as JSON
    #[arg(long)]
    pub summary_out: Option<PathBuf>,
    /// Run the merge without writing the snapshot back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ResidueArgs {
    #[arg(short, long)]
    pub repo: PathBuf,
    /// Guid of the record
    pub guid: String,
}

#[derive(Args)]
pub struct SummaryArgs {
    pub path: PathBuf,
}

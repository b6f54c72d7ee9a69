//! Merge engine for LexiMerge.
//!
//! Takes a staged interchange document and merges it into a lexical
//! repository under one of four merge styles. A run:
//!
//! 1. seeds the lookup tables from the document's ranges,
//! 2. stages every entry (see `lxm-stage`),
//! 3. merges each staged entry, creating duplicates on `KeepBoth` conflicts
//!    and queueing every relation it meets,
//! 4. resolves the queued relations once the whole document is in,
//! 5. flushes residue, then deletes scheduled records and orphans.
//!
//! Everything a run mutates lives in one [`RunContext`]; nothing is shared
//! between runs.

mod annotate;
pub mod config;
mod conflict;
pub mod context;
pub mod engine;
mod entry;
pub mod error;
pub mod morph;
mod orphan;
pub mod policy;
pub mod provision;
mod sense;

pub use config::MergeConfig;
pub use context::RunContext;
pub use engine::MergeEngine;
pub use error::{MergeError, MergeResult};
pub use morph::infer_morph_type;
pub use policy::{allows_overwrite, merge_text};
pub use provision::{types_compatible, FieldDescriptor, FieldProvisioner};

//! Foundation types for LexiMerge.
//!
//! This crate provides the identity, temporal, and text types shared by every
//! other LexiMerge crate, together with the run-wide merge policy selector and
//! the run summary that collects every non-fatal problem found during an
//! import.
//!
//! # Key Types
//!
//! - [`Guid`]: stable unique identity of a lexical record
//! - [`RecordId`]: repository handle of a record
//! - [`Timestamp`]: creation/modification time with second-level comparison
//! - [`MultiText`]: text keyed by writing system
//! - [`MergeStyle`]: the four merge policies
//! - [`RunSummary`]: per-category lists of conflicts and invalid data

pub mod error;
pub mod identity;
pub mod multitext;
pub mod progress;
pub mod report;
pub mod style;
pub mod temporal;

pub use error::TypeError;
pub use identity::{Guid, RecordId};
pub use multitext::{normalize, texts_conflict, MultiText};
pub use progress::{NullProgress, ProgressSink, TracingProgress};
pub use report::{
    CombinedCollection, ConflictKind, ConflictRecord, IncompatibleField, InvalidData,
    InvalidRelation, NewVocabularyItem, RunCounts, RunSummary,
};
pub use style::MergeStyle;
pub use temporal::Timestamp;

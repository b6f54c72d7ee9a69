//! Lookup index for LexiMerge.
//!
//! Built once at the start of a run from existing repository data, then seeded
//! from the controlled-vocabulary ("ranges") document, and grown in place
//! whenever the merge engine invents a vocabulary item. Incoming text is
//! matched against it without rescanning the repository per item.
//!
//! # Key Types
//!
//! - [`LookupIndex`] -- normalized label maps per vocabulary, relation types,
//!   reversal indices, and feature definitions
//! - [`VocabularyKind`] -- which controlled vocabulary a label belongs to
//! - [`IdentityIndex`] -- document identifier to record handle map plus the
//!   per-run deleted/changed/unchanged sets
//! - [`Range`] / [`RangeElement`] -- parsed ranges document

pub mod error;
pub mod features;
pub mod identity;
pub mod lookup;
pub mod ranges;

pub use error::{IndexError, IndexResult};
pub use features::parse_feature_structure;
pub use identity::IdentityIndex;
pub use lookup::{LookupIndex, VocabularyKind, VocabularyTable};
pub use ranges::{seed_ranges, Range, RangeElement, SeedOutcome};

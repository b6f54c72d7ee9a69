//! Lexical repository interface for LexiMerge.
//!
//! The merge engine never touches storage directly. It talks to a
//! [`Repository`]: identity-by-handle lookup, identity-by-guid lookup, record
//! creation per record kind, deletion with ownership cascade, a writing-system
//! registry, and the custom field schema.
//!
//! # Record Kinds
//!
//! - [`LexEntry`] -- headword with senses, pronunciations, etymologies
//! - [`LexSense`] -- one meaning of an entry, possibly with subsenses
//! - [`Msa`] -- morphosyntactic analysis, stem or affix
//! - [`EntryRef`] -- variant or complex-form link to component entries
//! - [`RefType`] / [`LexReference`] -- lexical relations and their members
//! - [`VocabularyItem`] -- controlled vocabulary item
//!
//! # Backends
//!
//! - [`InMemoryRepository`] -- `BTreeMap`-backed repository with JSON snapshots

pub mod error;
pub mod memory;
pub mod record;
pub mod schema;
pub mod traits;
pub mod writing_system;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRepository;
pub use record::{
    AffixKind, Analysis, EntryRef, EntryRefKind, Etymology, Example, FeatureDefn, LexEntry,
    LexReference, LexSense, MappingKind, Media, Msa, Picture, Pronunciation, Record, RecordKind,
    RecordVariant, RefType, ReversalEntry, ReversalIndex, Translation, VocabularyItem,
};
pub use schema::{CustomFieldDef, CustomValue, FieldId, FieldType};
pub use traits::{Repository, RepositoryExt};
pub use writing_system::{WritingSystem, WritingSystemRegistry, WsDescription};

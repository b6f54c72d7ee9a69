//! Staging for LexiMerge.
//!
//! The interchange document arrives as an already tokenized tree
//! ([`Document`]). The [`StagingBuilder`] walks it and assembles one
//! [`StagedEntry`] graph per entry before the repository is touched. Staging
//! resolves identities, parses timestamps, resolves media paths against the
//! document directory, and short-circuits entries whose modification time is
//! unchanged when the run trusts timestamps.

pub mod ast;
pub mod builder;
pub mod error;
pub mod staged;

pub use ast::{
    Document, EntryNode, EtymologyNode, ExampleNode, FieldDefinition, FieldNode,
    GrammaticalInfoNode, MediaNode, NoteNode, PictureNode, PronunciationNode, RelationNode,
    ReversalNode, SenseNode, TraitNode, TranslationNode, UnknownNode, VariantNode,
};
pub use builder::{resolve_media_path, EntryDisposition, StagingBuilder, MORPH_TYPE_TRAIT};
pub use error::{StageError, StageResult};
pub use staged::{
    StagedDocument, StagedEntry, StagedEtymology, StagedExample, StagedField,
    StagedGrammaticalInfo, StagedMedia, StagedNote, StagedPicture, StagedPronunciation,
    StagedRelation, StagedReversal, StagedSense, StagedTrait, StagedTranslation, StagedVariant,
    UnchangedEntry,
};

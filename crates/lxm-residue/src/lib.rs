//! Residue store for LexiMerge.
//!
//! Data the repository schema cannot model is captured as verbatim markup
//! fragments, one append-only [`ResidueDocument`] per record, and written to
//! the record's residue property once at the end of a run. A later export can
//! emit the fragments unchanged.
//!
//! The stored form is
//!
//! ```text
//! <lift-residue><fragment/>...</lift-residue>
//! ```
//!
//! and [`fragments`] recovers the individual fragments from it.

pub mod document;
pub mod error;
pub mod extract;
pub mod render;
pub mod store;

pub use document::ResidueDocument;
pub use error::{ResidueError, ResidueResult};
pub use extract::{fragments, RESIDUE_CLOSE, RESIDUE_OPEN};
pub use render::{
    field_fragment, note_fragment, relation_fragment, relation_with_traits, trait_fragment,
    variant_fragment,
};
pub use store::ResidueStore;

//! Cross-reference resolution for LexiMerge.
//!
//! Relations between entries and senses often point at records the document
//! defines later. While entries are merged every relation is queued as a
//! [`PendingRelation`] or [`PendingEntryReference`]; once the whole document
//! is in, the [`Resolver`] groups the queue and resolves each group according
//! to the mapping kind of its relation type.
//!
//! # Resolution by mapping kind
//!
//! - pairs are found or created per endpoint pair
//! - collections sharing a member are unioned into one reference
//! - sequences are reused only when the member order matches exactly
//! - trees resolve heads first, then attach children, re-queueing children
//!   whose head is not known yet
//!
//! Targets that never resolve are reported and preserved as residue on the
//! source record.

pub mod entry_refs;
pub mod error;
pub mod group;
pub mod pending;
pub mod resolver;

pub use entry_refs::COMPONENT_RELATION;
pub use error::{ResolveError, ResolveResult};
pub use group::{contiguous_entry_ref_groups, contiguous_groups};
pub use pending::{PendingEntryReference, PendingQueues, PendingRelation};
pub use resolver::{ResolveOutcome, Resolver};

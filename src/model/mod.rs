//! Data model shared by every stage of an integration run.
//!
//! An [`Article`] is an ordered list of [`Section`]s produced by the
//! segmenter; references come either from the local corpus
//! ([`LocalReferences`]) or from externally discovered
//! [`ExternalCandidate`]s. Every stage produces new values; nothing here is
//! mutated in place once handed downstream.

mod article;
mod reference;

pub use article::{content_key, keyed_lines, normalize_heading, Article, Section, SectionKind};
pub use reference::{
    ExternalCandidate, LocalReference, LocalReferences, Origin, ReferenceListEntry,
    ReferenceMetadata, ReferenceType,
};

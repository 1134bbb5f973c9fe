//! # citeweave
//!
//! Citation integration for Markdown academic articles.
//!
//! Given an article whose citations point at a local reference corpus and a
//! pool of selected external candidates, citeweave asks a text-generation
//! collaborator to weave new citation markers into each section, validates
//! every response, and produces one coherent, gapless numbering together with
//! the matching reference list and a validation report.
//!
//! ## Quick Start
//!
//! ```
//! use citeweave::{
//!     integrate, EchoGenerator, ExternalCandidate, LocalReferences, ReferenceMetadata,
//!     ReferenceType,
//! };
//!
//! fn main() -> citeweave::Result<()> {
//!     let article = "## Introduction\nInpainting fills missing regions [4].\n";
//!
//!     let mut local = LocalReferences::new();
//!     local.insert(4, ReferenceMetadata::new("Image Inpainting", vec!["M. Bertalmio".into()]));
//!
//!     let candidates = vec![ExternalCandidate::new(
//!         31,
//!         ReferenceMetadata::new("Video Inpainting Survey", vec!["A. Author".into()]),
//!         ReferenceType::Background,
//!     )];
//!
//!     let outcome = integrate(article, &local, candidates, EchoGenerator::new())?;
//!     assert_eq!(outcome.article, "## Introduction\nInpainting fills missing regions [1] [2].\n");
//!     assert_eq!(outcome.references.len(), 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - **Segmentation**: lossless split into typed sections (abstract, title-only,
//!   references, ordinary)
//! - **Integration**: per-section collaborator calls with a bounded timeout,
//!   response validation and a deterministic fallback
//! - **Cleanup**: duplicate headings and citations without metadata are removed
//! - **Renumbering**: two-phase rewrite onto `1..=N` by first appearance
//! - **Reference list**: IEEE-formatted entries, one per final number
//! - **Validation**: orphan, unused-entry and duplicate-heading checks

pub mod error;
pub mod input;
pub mod integrate;
pub mod model;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use error::{Error, GenerationError, Result};
pub use input::{
    load_candidates, load_local_references, load_reference_list, parse_candidates,
    parse_local_references, parse_reference_list,
};
pub use integrate::{
    CancelFlag, EchoGenerator, FnObserver, Generation, GenerationRequest, IntegrationObserver,
    IntegrationOptions, Integrator, Scheduling, SectionOutcome, SectionStatus, Strictness,
    TextGenerator, TokenUsage,
};
pub use model::{
    Article, ExternalCandidate, LocalReference, LocalReferences, Origin, ReferenceListEntry,
    ReferenceMetadata, ReferenceType, Section, SectionKind,
};
pub use parser::{extract_citations, segment, CitationExtractor, SectionSegmenter, SegmentOptions};
pub use render::{
    render_reference_list, renumber_article, CitationRenumberer, IntegrationOutcome,
    IntegrationValidator, JsonFormat, Renumbering, RenumberingEntry, Severity, UsageMetrics,
    ValidationReport,
};

use std::path::Path;

/// Integrate candidates into an article with default options.
///
/// # Arguments
///
/// * `article` - Markdown article text
/// * `local` - Local references keyed by their in-text number
/// * `candidates` - External candidates with placeholder numbers
/// * `generator` - Text-generation collaborator
pub fn integrate(
    article: &str,
    local: &LocalReferences,
    candidates: Vec<ExternalCandidate>,
    generator: impl TextGenerator + 'static,
) -> Result<IntegrationOutcome> {
    Integrator::new(generator).run(article, local, candidates)
}

/// Integrate candidates with custom options.
///
/// # Example
///
/// ```
/// use citeweave::{integrate_with_options, EchoGenerator, IntegrationOptions, LocalReferences};
///
/// let options = IntegrationOptions::new().concurrent(4);
/// let outcome = integrate_with_options(
///     "## Notes\nNothing cited.\n",
///     &LocalReferences::new(),
///     Vec::new(),
///     EchoGenerator::new(),
///     options,
/// )
/// .unwrap();
/// assert!(outcome.references.is_empty());
/// ```
pub fn integrate_with_options(
    article: &str,
    local: &LocalReferences,
    candidates: Vec<ExternalCandidate>,
    generator: impl TextGenerator + 'static,
    options: IntegrationOptions,
) -> Result<IntegrationOutcome> {
    Integrator::new(generator)
        .with_options(options)
        .run(article, local, candidates)
}

/// Integrate from files: a Markdown article and two JSON inputs.
///
/// # Example
///
/// ```no_run
/// use citeweave::{integrate_files, EchoGenerator};
///
/// let outcome = integrate_files(
///     "article.md",
///     "local_refs.json",
///     "candidates.json",
///     EchoGenerator::new(),
/// )
/// .unwrap();
/// std::fs::write("enhanced.md", &outcome.article).unwrap();
/// ```
pub fn integrate_files<A, L, C>(
    article: A,
    local: L,
    candidates: C,
    generator: impl TextGenerator + 'static,
) -> Result<IntegrationOutcome>
where
    A: AsRef<Path>,
    L: AsRef<Path>,
    C: AsRef<Path>,
{
    let text = std::fs::read_to_string(article)?;
    let local = load_local_references(local)?;
    let candidates = load_candidates(candidates)?;
    integrate(&text, &local, candidates, generator)
}

/// Validate an article against a final reference list.
///
/// # Example
///
/// ```
/// use citeweave::{validate, ReferenceListEntry, ReferenceMetadata};
///
/// let references = vec![ReferenceListEntry {
///     number: 1,
///     metadata: ReferenceMetadata::new("Paper", vec![]),
/// }];
/// let report = validate("Text [1] and [2].", &references);
/// assert!(report.is_blocking());
/// ```
pub fn validate(article: &str, references: &[ReferenceListEntry]) -> ValidationReport {
    IntegrationValidator::new().validate_article(article, references)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_without_candidates_is_identity() {
        let article = "## Abstract\nShort [1].\n\n## Body\nText [1] and [2].\n";
        let local: LocalReferences = [
            (1, ReferenceMetadata::new("One", vec![])),
            (2, ReferenceMetadata::new("Two", vec![])),
        ]
        .into_iter()
        .collect();

        let outcome = integrate(article, &local, Vec::new(), EchoGenerator::new()).unwrap();
        assert_eq!(outcome.article, article);
        assert_eq!(outcome.references.len(), 2);
        assert!(!outcome.report.is_blocking());
    }

    #[test]
    fn test_validate_convenience() {
        let report = validate("No citations.", &[]);
        assert!(!report.is_blocking());
        assert_eq!(report.citations_after, 0);
    }
}

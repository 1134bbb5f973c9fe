//! Post-run validation report.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::integrate::{SectionOutcome, SectionStatus};
use crate::model::{Origin, ReferenceListEntry};
use crate::parser::{citation_set, SectionSegmenter, SegmentOptions};

use super::cleanup::CleanupReport;
use super::renumber::RenumberingEntry;

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only
    Info,
    /// Degraded result; export may proceed
    Warning,
    /// Structural violation; export must not proceed
    Blocking,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Severity
    pub severity: Severity,
    /// Machine-readable code
    pub code: String,
    /// Human-readable description
    pub message: String,
}

impl Finding {
    fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Machine-readable summary of an integration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Distinct citation numbers before integration
    pub citations_before: usize,

    /// Distinct citation numbers after renumbering
    pub citations_after: usize,

    /// Numbers in the body without a reference entry
    pub orphaned_numbers: BTreeSet<u32>,

    /// Reference entries never cited in the body
    pub unused_references: BTreeSet<u32>,

    /// Headings occurring more than once
    pub duplicate_headings: Vec<String>,

    /// Normalized text of body lines occurring more than once
    #[serde(default)]
    pub duplicate_paragraphs: Vec<String>,

    /// Selected candidates used divided by selected candidates offered
    pub success_rate: f64,

    /// Selected candidates cited in the final article
    pub selected_used: usize,

    /// Selected candidates offered
    pub selected_total: usize,

    /// Share of external references in the final list
    pub external_ratio: f64,

    /// Numbers dropped by cleanup for lack of metadata
    pub invalid_citations_dropped: Vec<u32>,

    /// Headings stripped by cleanup
    pub duplicate_headings_removed: Vec<String>,

    /// Repeated lines removed by cleanup
    #[serde(default)]
    pub duplicate_paragraphs_removed: Vec<String>,

    /// All findings, most severe first
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// Whether any finding blocks export.
    pub fn is_blocking(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.severity == Severity::Blocking)
    }

    /// Findings of a given severity.
    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    /// Number of citations added by the run.
    pub fn citations_added(&self) -> usize {
        self.citations_after.saturating_sub(self.citations_before)
    }
}

/// Inputs describing a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary<'a> {
    /// Distinct citation numbers in the original article
    pub citations_before: usize,
    /// Final article text
    pub article: &'a str,
    /// Final reference list
    pub references: &'a [ReferenceListEntry],
    /// Renumbering table
    pub renumbering: &'a [RenumberingEntry],
    /// Number of selected candidates offered
    pub selected_total: usize,
    /// Per-section outcomes
    pub sections: &'a [SectionOutcome],
    /// Repairs made by the cleanup pass
    pub cleanup: &'a CleanupReport,
}

/// Computes validation reports. Reports only; never repairs.
#[derive(Debug, Clone)]
pub struct IntegrationValidator {
    external_ratio_target: f64,
    segment: SegmentOptions,
}

impl Default for IntegrationValidator {
    fn default() -> Self {
        Self {
            external_ratio_target: 0.4,
            segment: SegmentOptions::default(),
        }
    }
}

impl IntegrationValidator {
    /// Create a validator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advisory external-reference ratio.
    pub fn with_external_ratio_target(mut self, target: f32) -> Self {
        self.external_ratio_target = f64::from(target.clamp(0.0, 1.0));
        self
    }

    /// Set the segmentation options used for heading checks.
    pub fn with_segment_options(mut self, segment: SegmentOptions) -> Self {
        self.segment = segment;
        self
    }

    /// Validate an article against its reference list, without run data.
    pub fn validate_article(
        &self,
        article: &str,
        references: &[ReferenceListEntry],
    ) -> ValidationReport {
        let (report, _) = self.structural(article, references);
        report
    }

    /// Validate a completed run.
    pub fn validate_run(&self, run: &RunSummary<'_>) -> ValidationReport {
        let (mut report, mut findings) = self.structural(run.article, run.references);
        report.citations_before = run.citations_before;

        let external = run
            .renumbering
            .iter()
            .filter(|e| e.old_origin == Origin::External)
            .count();
        report.selected_used = external;
        report.selected_total = run.selected_total;
        report.success_rate = if run.selected_total == 0 {
            1.0
        } else {
            external as f64 / run.selected_total as f64
        };
        report.external_ratio = if run.references.is_empty() {
            0.0
        } else {
            external as f64 / run.references.len() as f64
        };

        if run.selected_total > 0 && report.external_ratio < self.external_ratio_target {
            findings.push(Finding::new(
                Severity::Warning,
                "external_ratio_low",
                format!(
                    "External references make up {:.0}% of the list (target {:.0}%)",
                    report.external_ratio * 100.0,
                    self.external_ratio_target * 100.0
                ),
            ));
        }
        if external < run.selected_total {
            findings.push(Finding::new(
                Severity::Info,
                "candidates_unused",
                format!(
                    "{} of {} selected candidates were not integrated",
                    run.selected_total - external,
                    run.selected_total
                ),
            ));
        }

        for section in run.sections {
            let finding = match &section.status {
                SectionStatus::Failed { error } => Finding::new(
                    Severity::Warning,
                    "section_failed",
                    format!("Section '{}' kept unchanged: {}", section.title, error),
                ),
                SectionStatus::Reverted { reason } => Finding::new(
                    Severity::Warning,
                    "section_reverted",
                    format!("Section '{}' reverted: {}", section.title, reason),
                ),
                SectionStatus::Cancelled => Finding::new(
                    Severity::Warning,
                    "section_cancelled",
                    format!("Section '{}' not processed: run cancelled", section.title),
                ),
                _ => continue,
            };
            findings.push(finding);
        }

        report.invalid_citations_dropped = run.cleanup.invalid_citations_dropped.clone();
        report.duplicate_headings_removed = run.cleanup.duplicate_headings_removed.clone();
        report.duplicate_paragraphs_removed = run.cleanup.duplicate_paragraphs_removed.clone();
        if !report.invalid_citations_dropped.is_empty() {
            findings.push(Finding::new(
                Severity::Info,
                "invalid_citations_dropped",
                format!(
                    "Dropped citations without metadata: {:?}",
                    report.invalid_citations_dropped
                ),
            ));
        }
        if !report.duplicate_headings_removed.is_empty() {
            findings.push(Finding::new(
                Severity::Info,
                "duplicate_headings_removed",
                format!(
                    "Stripped duplicate headings: {}",
                    report.duplicate_headings_removed.join(", ")
                ),
            ));
        }

        if !report.duplicate_paragraphs_removed.is_empty() {
            findings.push(Finding::new(
                Severity::Info,
                "duplicate_content_removed",
                format!(
                    "Removed {} repeated paragraph(s)",
                    report.duplicate_paragraphs_removed.len()
                ),
            ));
        }

        findings.sort_by(|a, b| b.severity.cmp(&a.severity));
        report.findings = findings;
        report
    }

    /// Checks that need only the article and its reference list.
    fn structural(
        &self,
        article: &str,
        references: &[ReferenceListEntry],
    ) -> (ValidationReport, Vec<Finding>) {
        let cited = citation_set(article);
        let listed: BTreeSet<u32> = references.iter().map(|r| r.number).collect();

        let orphaned_numbers: BTreeSet<u32> = cited.difference(&listed).copied().collect();
        let unused_references: BTreeSet<u32> = listed.difference(&cited).copied().collect();
        let segmented = SectionSegmenter::with_options(self.segment.clone()).segment(article);
        let duplicate_headings = segmented.duplicate_headings();
        let duplicate_paragraphs = segmented.duplicate_paragraphs();

        let mut findings = Vec::new();
        if !orphaned_numbers.is_empty() {
            log::warn!("Orphaned citations after renumbering: {:?}", orphaned_numbers);
            findings.push(Finding::new(
                Severity::Blocking,
                "orphaned_citation",
                format!("Citations without reference entry: {:?}", orphaned_numbers),
            ));
        }
        if !unused_references.is_empty() {
            findings.push(Finding::new(
                Severity::Blocking,
                "unused_reference",
                format!("Reference entries never cited: {:?}", unused_references),
            ));
        }
        let expected: BTreeSet<u32> = (1..=cited.len() as u32).collect();
        if cited != expected {
            findings.push(Finding::new(
                Severity::Warning,
                "numbering_gap",
                "Citation numbers are not a gapless sequence starting at 1",
            ));
        }
        if !duplicate_headings.is_empty() {
            findings.push(Finding::new(
                Severity::Warning,
                "duplicate_heading",
                format!("Duplicate headings: {}", duplicate_headings.join(", ")),
            ));
        }
        if !duplicate_paragraphs.is_empty() {
            findings.push(Finding::new(
                Severity::Warning,
                "duplicate_content",
                format!("{} paragraph(s) occur more than once", duplicate_paragraphs.len()),
            ));
        }

        let report = ValidationReport {
            citations_before: cited.len(),
            citations_after: cited.len(),
            orphaned_numbers,
            unused_references,
            duplicate_headings,
            duplicate_paragraphs,
            success_rate: 1.0,
            selected_used: 0,
            selected_total: 0,
            external_ratio: 0.0,
            invalid_citations_dropped: Vec::new(),
            duplicate_headings_removed: Vec::new(),
            duplicate_paragraphs_removed: Vec::new(),
            findings: findings.clone(),
        };
        (report, findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReferenceMetadata;

    fn entry(number: u32) -> ReferenceListEntry {
        ReferenceListEntry {
            number,
            metadata: ReferenceMetadata::new(format!("Paper {}", number), vec![]),
        }
    }

    #[test]
    fn test_consistent_article_passes() {
        let report = IntegrationValidator::new()
            .validate_article("## A\nText [1] and [2].\n", &[entry(1), entry(2)]);
        assert!(!report.is_blocking());
        assert!(report.findings.is_empty());
        assert_eq!(report.citations_after, 2);
        assert_eq!(report.success_rate, 1.0);
    }

    #[test]
    fn test_orphan_is_blocking() {
        let report = IntegrationValidator::new().validate_article("Text [1] [2].", &[entry(1)]);
        assert!(report.is_blocking());
        assert_eq!(report.orphaned_numbers, BTreeSet::from([2]));
    }

    #[test]
    fn test_unused_reference_is_blocking() {
        let report =
            IntegrationValidator::new().validate_article("Text [1].", &[entry(1), entry(2)]);
        assert!(report.is_blocking());
        assert_eq!(report.unused_references, BTreeSet::from([2]));
    }

    #[test]
    fn test_duplicate_heading_warns() {
        let report = IntegrationValidator::new().validate_article("## A\nx\n## A\ny\n", &[]);
        assert_eq!(report.duplicate_headings, vec!["A".to_string()]);
        assert!(!report.is_blocking());
        assert_eq!(report.findings_with(Severity::Warning).count(), 1);
    }

    #[test]
    fn test_duplicate_content_warns() {
        let article = "## A\nDiffusion models fill holes well [1].\n\n## B\nDiffusion models fill holes well [1].\n";
        let report = IntegrationValidator::new().validate_article(article, &[entry(1)]);
        assert_eq!(
            report.duplicate_paragraphs,
            vec!["diffusion models fill holes well.".to_string()]
        );
        assert!(!report.is_blocking());
        assert!(report
            .findings_with(Severity::Warning)
            .any(|f| f.code == "duplicate_content"));
    }

    #[test]
    fn test_run_ratio_and_success_rate() {
        let renumbering = [
            RenumberingEntry {
                old_number: 1,
                old_origin: Origin::Local,
                new_number: 1,
            },
            RenumberingEntry {
                old_number: 31,
                old_origin: Origin::External,
                new_number: 2,
            },
        ];
        let references = [entry(1), entry(2)];
        let cleanup = CleanupReport::default();
        let report = IntegrationValidator::new().validate_run(&RunSummary {
            citations_before: 1,
            article: "A [1] [2].",
            references: &references,
            renumbering: &renumbering,
            selected_total: 2,
            sections: &[],
            cleanup: &cleanup,
        });
        assert_eq!(report.success_rate, 0.5);
        assert_eq!(report.external_ratio, 0.5);
        assert_eq!(report.citations_added(), 1);
        assert!(!report.is_blocking());
        assert_eq!(report.findings[0].code, "candidates_unused");
    }
}

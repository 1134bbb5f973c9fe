//! Integration outcome with usage statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::integrate::{SectionOutcome, TokenUsage};
use crate::model::{LocalReferences, ReferenceListEntry};

use super::references::{render_reference_list, REFERENCES_HEADING};
use super::renumber::RenumberingEntry;
use super::validate::ValidationReport;

/// Result of an integration run: the three outputs plus run details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationOutcome {
    /// Final, renumbered article text
    pub article: String,

    /// Final reference list ordered by number
    pub references: Vec<ReferenceListEntry>,

    /// Validation report
    pub report: ValidationReport,

    /// Per-section outcomes in document order
    pub sections: Vec<SectionOutcome>,

    /// Mapping from old numbers to final numbers
    pub renumbering: Vec<RenumberingEntry>,

    /// Collaborator usage totals
    pub usage: UsageMetrics,

    /// Provider used for the run
    pub provider: String,

    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl IntegrationOutcome {
    /// Reference list as a Markdown block.
    pub fn references_markdown(&self) -> String {
        render_reference_list(&self.references, REFERENCES_HEADING)
    }

    /// The reference list as a local map keyed by final number.
    ///
    /// Feeding this back together with `article` and an empty candidate pool
    /// reproduces the same outputs.
    pub fn local_references(&self) -> LocalReferences {
        self.references
            .iter()
            .map(|r| (r.number, r.metadata.clone()))
            .collect()
    }

    /// Whether downstream export may proceed.
    pub fn is_exportable(&self) -> bool {
        !self.report.is_blocking()
    }
}

/// Usage collected across collaborator calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Calls that returned a response
    pub calls: u32,

    /// Calls that failed (timeout, quota, transport, malformed)
    pub failures: u32,

    /// Prompt tokens
    pub prompt_tokens: u64,

    /// Completion tokens
    pub completion_tokens: u64,

    /// Whether any count was estimated
    pub estimated: bool,

    /// Wall-clock duration of the run (milliseconds)
    pub elapsed_ms: u64,
}

impl UsageMetrics {
    /// Create new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage.
    pub fn add_usage(&mut self, usage: &TokenUsage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.estimated |= usage.estimated;
    }

    /// Total tokens.
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Cost estimate from per-1K-token rates.
    pub fn estimated_cost(&self, prompt_rate_per_1k: f64, completion_rate_per_1k: f64) -> f64 {
        (self.prompt_tokens as f64 / 1000.0) * prompt_rate_per_1k
            + (self.completion_tokens as f64 / 1000.0) * completion_rate_per_1k
    }

    /// Collect usage from section outcomes.
    pub fn from_sections(sections: &[SectionOutcome]) -> Self {
        let mut metrics = Self::new();
        for section in sections {
            metrics.calls += section.calls;
            metrics.failures += section.failed_calls;
            if let Some(usage) = &section.usage {
                metrics.add_usage(usage);
            }
        }
        metrics
    }

    /// Merge another metrics instance into this one.
    pub fn merge(&mut self, other: &UsageMetrics) {
        self.calls += other.calls;
        self.failures += other.failures;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.estimated |= other.estimated;
        self.elapsed_ms += other.elapsed_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_metrics_add_usage() {
        let mut metrics = UsageMetrics::new();
        metrics.add_usage(&TokenUsage::reported(100, 20));
        metrics.add_usage(&TokenUsage::estimate("abcd", "ab"));

        assert_eq!(metrics.prompt_tokens, 101);
        assert_eq!(metrics.completion_tokens, 21);
        assert!(metrics.estimated);
        assert_eq!(metrics.total_tokens(), 122);
    }

    #[test]
    fn test_usage_metrics_merge() {
        let mut first = UsageMetrics {
            calls: 2,
            prompt_tokens: 500,
            ..Default::default()
        };
        let second = UsageMetrics {
            calls: 1,
            failures: 1,
            completion_tokens: 40,
            ..Default::default()
        };

        first.merge(&second);

        assert_eq!(first.calls, 3);
        assert_eq!(first.failures, 1);
        assert_eq!(first.total_tokens(), 540);
    }

    #[test]
    fn test_estimated_cost() {
        let metrics = UsageMetrics {
            prompt_tokens: 2000,
            completion_tokens: 1000,
            ..Default::default()
        };
        let cost = metrics.estimated_cost(0.01, 0.03);
        assert!((cost - 0.05).abs() < 1e-9);
    }
}

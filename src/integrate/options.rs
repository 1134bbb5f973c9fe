//! Integration options and configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::parser::SegmentOptions;

/// How sections are scheduled across collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheduling {
    /// One section at a time, in document order
    #[default]
    Sequential,
    /// Sections processed on a worker pool of the given size
    Concurrent {
        /// Number of worker threads
        threads: usize,
    },
}

/// Validation strictness presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Generous length budget, no prose comparison
    Lenient,
    /// Moderate length budget with prose comparison
    #[default]
    Standard,
    /// Tight length budget with prose comparison
    Strict,
}

/// Options for an integration run.
#[derive(Debug, Clone)]
pub struct IntegrationOptions {
    /// Section scheduling model
    pub scheduling: Scheduling,

    /// Upper bound for a single collaborator call
    pub call_timeout: Duration,

    /// Maximum new citation numbers added to one section
    pub max_new_citations: usize,

    /// Maximum catalog entries per reference type
    pub catalog_per_type: usize,

    /// Response may be at most `original * length_multiplier + length_slack` bytes
    pub length_multiplier: f32,

    /// Absolute slack added to the length budget (bytes)
    pub length_slack: usize,

    /// Reject responses whose text differs from the original once markers are removed
    pub preserve_prose: bool,

    /// Estimated tokens per request; longer bodies are sent in paragraph chunks
    pub chunk_tokens: usize,

    /// Characters of candidate abstract shown in the catalog
    pub abstract_snippet_chars: usize,

    /// Drop existing "References" sections from the enhanced article
    pub strip_reference_section: bool,

    /// Advisory share of external references in the final list (0.0-1.0)
    pub external_ratio_target: f32,

    /// Completion token budget passed to providers
    pub max_tokens: u32,

    /// Segmentation options
    pub segment: SegmentOptions,
}

impl IntegrationOptions {
    /// Create new integration options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create options from a strictness preset.
    pub fn from_strictness(strictness: Strictness) -> Self {
        Self::new().with_strictness(strictness)
    }

    /// Apply a strictness preset to the validation thresholds.
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        let (multiplier, slack, prose) = match strictness {
            Strictness::Lenient => (2.0, 200, false),
            Strictness::Standard => (1.5, 80, true),
            Strictness::Strict => (1.2, 40, true),
        };
        self.length_multiplier = multiplier;
        self.length_slack = slack;
        self.preserve_prose = prose;
        self
    }

    /// Set the scheduling model.
    pub fn with_scheduling(mut self, scheduling: Scheduling) -> Self {
        self.scheduling = scheduling;
        self
    }

    /// Process sections concurrently on `threads` workers.
    pub fn concurrent(mut self, threads: usize) -> Self {
        self.scheduling = Scheduling::Concurrent { threads };
        self
    }

    /// Process sections one at a time.
    pub fn sequential(mut self) -> Self {
        self.scheduling = Scheduling::Sequential;
        self
    }

    /// Set the collaborator call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the maximum number of new citations per section.
    pub fn with_max_new_citations(mut self, max: usize) -> Self {
        self.max_new_citations = max;
        self
    }

    /// Set the catalog cap per reference type.
    pub fn with_catalog_per_type(mut self, cap: usize) -> Self {
        self.catalog_per_type = cap;
        self
    }

    /// Set the length budget.
    pub fn with_length_budget(mut self, multiplier: f32, slack: usize) -> Self {
        self.length_multiplier = multiplier;
        self.length_slack = slack;
        self
    }

    /// Enable or disable the prose comparison.
    pub fn with_prose_check(mut self, enabled: bool) -> Self {
        self.preserve_prose = enabled;
        self
    }

    /// Set the per-request chunk budget in estimated tokens.
    pub fn with_chunk_tokens(mut self, tokens: usize) -> Self {
        self.chunk_tokens = tokens;
        self
    }

    /// Keep or drop existing reference sections.
    pub fn with_strip_reference_section(mut self, strip: bool) -> Self {
        self.strip_reference_section = strip;
        self
    }

    /// Set the advisory external-reference ratio target.
    pub fn with_external_ratio_target(mut self, target: f32) -> Self {
        self.external_ratio_target = target.clamp(0.0, 1.0);
        self
    }

    /// Set the completion token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set segmentation options.
    pub fn with_segment_options(mut self, segment: SegmentOptions) -> Self {
        self.segment = segment;
        self
    }

    /// Largest response length accepted for an original body of `original_len` bytes.
    pub fn length_budget(&self, original_len: usize) -> usize {
        (original_len as f64 * f64::from(self.length_multiplier)).ceil() as usize
            + self.length_slack
    }

    /// Check that every option is within its accepted range.
    pub fn validate(&self) -> Result<()> {
        if self.call_timeout.is_zero() {
            return Err(Error::InvalidOption(
                "call timeout must be greater than zero".to_string(),
            ));
        }
        if let Scheduling::Concurrent { threads: 0 } = self.scheduling {
            return Err(Error::InvalidOption(
                "concurrent scheduling needs at least one thread".to_string(),
            ));
        }
        if self.max_new_citations == 0 {
            return Err(Error::InvalidOption(
                "max_new_citations must be at least 1".to_string(),
            ));
        }
        if self.catalog_per_type == 0 {
            return Err(Error::InvalidOption(
                "catalog_per_type must be at least 1".to_string(),
            ));
        }
        if self.chunk_tokens == 0 {
            return Err(Error::InvalidOption(
                "chunk_tokens must be at least 1".to_string(),
            ));
        }
        if !(self.length_multiplier >= 1.0) {
            return Err(Error::InvalidOption(format!(
                "length multiplier must be >= 1.0, got {}",
                self.length_multiplier
            )));
        }
        Ok(())
    }
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            scheduling: Scheduling::Sequential,
            call_timeout: Duration::from_secs(120),
            max_new_citations: 3,
            catalog_per_type: 5,
            length_multiplier: 1.5,
            length_slack: 80,
            preserve_prose: true,
            chunk_tokens: 1500,
            abstract_snippet_chars: 500,
            strip_reference_section: true,
            external_ratio_target: 0.4,
            max_tokens: 2000,
            segment: SegmentOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integration_options_builder() {
        let options = IntegrationOptions::new()
            .concurrent(4)
            .with_timeout(Duration::from_secs(5))
            .with_max_new_citations(2);

        assert_eq!(options.scheduling, Scheduling::Concurrent { threads: 4 });
        assert_eq!(options.call_timeout, Duration::from_secs(5));
        assert_eq!(options.max_new_citations, 2);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_options() {
        let options = IntegrationOptions::default();
        assert_eq!(options.scheduling, Scheduling::Sequential);
        assert_eq!(options.max_new_citations, 3);
        assert_eq!(options.catalog_per_type, 5);
        assert_eq!(options.chunk_tokens, 1500);
        assert!(options.preserve_prose);
    }

    #[test]
    fn test_strictness_presets() {
        let lenient = IntegrationOptions::from_strictness(Strictness::Lenient);
        assert!(!lenient.preserve_prose);
        let strict = IntegrationOptions::from_strictness(Strictness::Strict);
        assert!(strict.length_budget(100) < lenient.length_budget(100));
    }

    #[test]
    fn test_length_budget() {
        let options = IntegrationOptions::new().with_length_budget(1.5, 10);
        assert_eq!(options.length_budget(100), 160);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(IntegrationOptions::new()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(IntegrationOptions::new().concurrent(0).validate().is_err());
        assert!(IntegrationOptions::new()
            .with_chunk_tokens(0)
            .validate()
            .is_err());
        assert!(IntegrationOptions::new()
            .with_length_budget(0.5, 0)
            .validate()
            .is_err());
    }
}

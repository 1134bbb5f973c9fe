//! Section content-type inference.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{ExternalCandidate, ReferenceType, Section};

const METHOD_KEYWORDS: &[&str] = &[
    "propose",
    "method",
    "algorithm",
    "approach",
    "technique",
    "implement",
    "architecture",
];
const RESULT_KEYWORDS: &[&str] = &[
    "achieve",
    "obtain",
    "result",
    "performance",
    "accuracy",
    "improvement",
    "outperform",
];
const BACKGROUND_KEYWORDS: &[&str] = &[
    "previous",
    "prior",
    "existing",
    "traditional",
    "conventional",
    "state-of-the-art",
];
const OTHER_KEYWORDS: &[&str] = &["future", "challenge", "limitation", "potential", "direction"];

fn sentence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]+[.!?]*").unwrap())
}

/// Classify one sentence by keyword; the first matching group wins.
fn classify_sentence(sentence: &str) -> Option<ReferenceType> {
    let lower = sentence.to_lowercase();
    let groups = [
        (ReferenceType::Method, METHOD_KEYWORDS),
        (ReferenceType::Result, RESULT_KEYWORDS),
        (ReferenceType::Background, BACKGROUND_KEYWORDS),
        (ReferenceType::Other, OTHER_KEYWORDS),
    ];
    groups
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
}

/// Type suggested by a section heading.
fn heading_hint(title: &str) -> Option<ReferenceType> {
    let lower = title.to_lowercase();
    if ["related work", "introduction", "background", "literature"]
        .iter()
        .any(|k| lower.contains(k))
    {
        Some(ReferenceType::Background)
    } else if ["method", "approach", "model", "architecture"]
        .iter()
        .any(|k| lower.contains(k))
    {
        Some(ReferenceType::Method)
    } else if ["result", "experiment", "evaluation"]
        .iter()
        .any(|k| lower.contains(k))
    {
        Some(ReferenceType::Result)
    } else {
        None
    }
}

/// Inferred content types of one section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentProfile {
    counts: BTreeMap<ReferenceType, usize>,
    primary: Option<ReferenceType>,
}

impl ContentProfile {
    /// Infer the profile from a section's heading and body.
    pub fn infer(section: &Section) -> Self {
        let mut counts: BTreeMap<ReferenceType, usize> = BTreeMap::new();
        for sentence in sentence_regex().find_iter(&section.body) {
            if let Some(kind) = classify_sentence(sentence.as_str()) {
                *counts.entry(kind).or_default() += 1;
            }
        }

        let hint = heading_hint(&section.title);
        if let Some(kind) = hint {
            counts.entry(kind).or_default();
        }

        // Heading hint first, otherwise the most frequent type.
        let primary = hint.or_else(|| {
            counts
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(kind, _)| *kind)
        });

        Self { counts, primary }
    }

    /// Types detected in the section.
    pub fn types(&self) -> impl Iterator<Item = ReferenceType> + '_ {
        self.counts.keys().copied()
    }

    /// The dominant type, if any.
    pub fn primary(&self) -> Option<ReferenceType> {
        self.primary
    }

    /// Whether a candidate of this type fits the section.
    ///
    /// Sections with no detected type accept everything; `Other` fits
    /// everywhere.
    pub fn accepts(&self, kind: ReferenceType) -> bool {
        self.counts.is_empty() || kind == ReferenceType::Other || self.counts.contains_key(&kind)
    }

    fn rank(&self, kind: ReferenceType) -> u8 {
        if Some(kind) == self.primary {
            0
        } else if self.counts.contains_key(&kind) {
            1
        } else {
            2
        }
    }

    /// Priority order: type match, then relevance (descending), then
    /// placeholder (ascending).
    pub fn compare(&self, a: &ExternalCandidate, b: &ExternalCandidate) -> Ordering {
        self.rank(a.type_tag)
            .cmp(&self.rank(b.type_tag))
            .then_with(|| b.relevance.total_cmp(&a.relevance))
            .then_with(|| a.placeholder.cmp(&b.placeholder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReferenceMetadata;

    fn section(title: &str, body: &str) -> Section {
        Section::new(format!("## {}\n", title), 2, title.to_string(), body.to_string())
    }

    fn candidate(placeholder: u32, kind: ReferenceType, relevance: f32) -> ExternalCandidate {
        ExternalCandidate::new(placeholder, ReferenceMetadata::new("T", vec![]), kind)
            .with_relevance(relevance)
    }

    #[test]
    fn test_heading_hint_sets_primary() {
        let profile = ContentProfile::infer(&section("Related Work", "Nothing notable here."));
        assert_eq!(profile.primary(), Some(ReferenceType::Background));
        assert!(profile.accepts(ReferenceType::Background));
        assert!(profile.accepts(ReferenceType::Other));
        assert!(!profile.accepts(ReferenceType::Result));
    }

    #[test]
    fn test_sentence_keywords() {
        let profile = ContentProfile::infer(&section(
            "Discussion",
            "We propose a new method. It achieves better accuracy. Our approach is simple.",
        ));
        assert_eq!(profile.primary(), Some(ReferenceType::Method));
        let types: Vec<_> = profile.types().collect();
        assert_eq!(types, vec![ReferenceType::Method, ReferenceType::Result]);
    }

    #[test]
    fn test_no_types_accepts_everything() {
        let profile = ContentProfile::infer(&section("Notes", "Plain text only."));
        assert!(profile.primary().is_none());
        assert!(ReferenceType::ALL.iter().all(|k| profile.accepts(*k)));
    }

    #[test]
    fn test_priority_order() {
        let profile = ContentProfile::infer(&section("Method", "Plain."));
        let mut candidates = vec![
            candidate(33, ReferenceType::Background, 0.9),
            candidate(32, ReferenceType::Method, 0.5),
            candidate(31, ReferenceType::Method, 0.5),
            candidate(34, ReferenceType::Method, 0.8),
        ];
        candidates.sort_by(|a, b| profile.compare(a, b));
        let order: Vec<u32> = candidates.iter().map(|c| c.placeholder).collect();
        assert_eq!(order, vec![34, 31, 32, 33]);
    }
}

//! Article and section types.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::parser::strip_markers;

/// Classification assigned once, during segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// The abstract; never receives citation insertions.
    Abstract,
    /// A heading with an empty or whitespace-only body.
    TitleOnly,
    /// An existing reference list ("References", "Bibliography").
    References,
    /// Everything else; eligible for integration.
    Ordinary,
}

impl SectionKind {
    /// Classify a section from its heading title and body.
    ///
    /// An untitled leading block is always `Ordinary` (or `TitleOnly` when
    /// empty), whatever its content.
    pub fn classify(title: Option<&str>, body: &str) -> Self {
        if let Some(title) = title {
            let label = normalize_heading(title).to_lowercase();
            if label == "abstract" {
                return SectionKind::Abstract;
            }
            if matches!(label.as_str(), "references" | "reference" | "bibliography") {
                return SectionKind::References;
            }
        }
        if body.trim().is_empty() {
            SectionKind::TitleOnly
        } else {
            SectionKind::Ordinary
        }
    }

    /// Whether the section may be sent to the generation collaborator.
    pub fn is_integrable(self) -> bool {
        self == SectionKind::Ordinary
    }
}

/// Normalize a heading title for comparison.
///
/// Applies NFC, drops emphasis markers and a trailing colon, and collapses
/// internal whitespace. Case is preserved.
pub fn normalize_heading(title: &str) -> String {
    let nfc: String = title.nfc().collect();
    let trimmed = nfc
        .trim()
        .trim_matches(|c| c == '*' || c == '_')
        .trim()
        .trim_end_matches(':')
        .trim();
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lines no longer than this are never treated as duplicate content.
const MIN_DUPLICATE_CHARS: usize = 20;

/// Comparison key of a body line for duplicate-content checks.
///
/// Citation markers are removed, whitespace collapsed and case folded.
/// Short lines, headings, table rows and reference entries get no key.
pub fn content_key(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.chars().count() <= MIN_DUPLICATE_CHARS || trimmed.starts_with(['#', '|', '[']) {
        return None;
    }
    let text = strip_markers(trimmed);
    Some(text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
}

/// Lines of a body, terminators included, each with its [`content_key`].
/// Fenced code lines get no key.
pub fn keyed_lines(body: &str) -> Vec<(&str, Option<String>)> {
    let mut in_fence = false;
    body.split_inclusive('\n')
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                return (line, None);
            }
            if in_fence {
                (line, None)
            } else {
                (line, content_key(line))
            }
        })
        .collect()
}

/// One heading plus the text that follows it up to the next heading.
///
/// `heading_line` keeps the raw heading line *including* its line terminator
/// so that `heading_line + body` reproduces the source exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Raw heading line with terminator (empty for the untitled leading block)
    pub heading_line: String,

    /// Heading level (number of `#`), 0 when untitled
    pub level: u8,

    /// Heading text without markup
    pub title: String,

    /// Raw body text
    pub body: String,

    /// Section classification
    pub kind: SectionKind,
}

impl Section {
    /// Create a titled section, classifying it from title and body.
    pub fn new(
        heading_line: impl Into<String>,
        level: u8,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let body = body.into();
        let kind = SectionKind::classify(Some(&title), &body);
        Self {
            heading_line: heading_line.into(),
            level,
            title,
            body,
            kind,
        }
    }

    /// Create the untitled block that precedes the first heading.
    pub fn untitled(body: impl Into<String>) -> Self {
        let body = body.into();
        let kind = SectionKind::classify(None, &body);
        Self {
            heading_line: String::new(),
            level: 0,
            title: String::new(),
            body,
            kind,
        }
    }

    /// Whether this section carries a heading line.
    pub fn has_heading(&self) -> bool {
        !self.heading_line.is_empty()
    }

    /// Heading line without its terminator.
    pub fn heading(&self) -> &str {
        self.heading_line.trim_end_matches(['\r', '\n'])
    }

    /// Normalized heading title used for duplicate detection.
    pub fn normalized_title(&self) -> String {
        normalize_heading(&self.title)
    }

    /// Reassemble the section's source text.
    pub fn text(&self) -> String {
        let mut text = String::with_capacity(self.heading_line.len() + self.body.len());
        text.push_str(&self.heading_line);
        text.push_str(&self.body);
        text
    }

    /// A copy of this section with a different body; the kind is kept.
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..self.clone()
        }
    }

    /// A copy of this section with the heading line removed.
    pub fn without_heading(&self) -> Self {
        Self {
            heading_line: String::new(),
            level: 0,
            title: String::new(),
            ..self.clone()
        }
    }
}

/// An article as an ordered sequence of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Sections in document order
    pub sections: Vec<Section>,
}

impl Article {
    /// Create an article from sections.
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Check if the article has no sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Iterate over sections.
    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    /// Get the abstract section, if any.
    pub fn abstract_section(&self) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.kind == SectionKind::Abstract)
    }

    /// Reassemble the full text.
    pub fn to_text(&self) -> String {
        self.sections.iter().map(Section::text).collect()
    }

    /// Heading titles that occur more than once, in order of their second
    /// occurrence.
    pub fn duplicate_headings(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for section in self.sections.iter().filter(|s| s.has_heading()) {
            let title = section.normalized_title();
            if !seen.insert(title.clone()) && !duplicates.contains(&title) {
                duplicates.push(title);
            }
        }
        duplicates
    }

    /// Keys of body lines that occur more than once, in order of their
    /// second occurrence. Reference sections are not checked.
    pub fn duplicate_paragraphs(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for section in self
            .sections
            .iter()
            .filter(|s| s.kind != SectionKind::References)
        {
            for (_, key) in keyed_lines(&section.body) {
                let Some(key) = key else { continue };
                if !seen.insert(key.clone()) && !duplicates.contains(&key) {
                    duplicates.push(key);
                }
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_kinds() {
        assert_eq!(
            SectionKind::classify(Some("Abstract"), "text"),
            SectionKind::Abstract
        );
        assert_eq!(
            SectionKind::classify(Some("**ABSTRACT:**"), "text"),
            SectionKind::Abstract
        );
        assert_eq!(
            SectionKind::classify(Some("Introduction"), "  \n "),
            SectionKind::TitleOnly
        );
        assert_eq!(
            SectionKind::classify(Some("References"), "[1] A."),
            SectionKind::References
        );
        assert_eq!(
            SectionKind::classify(None, "Leading text."),
            SectionKind::Ordinary
        );
    }

    #[test]
    fn test_abstract_label_is_exact() {
        // "Abstract Interpretation" is an ordinary section about a topic
        assert_eq!(
            SectionKind::classify(Some("Abstract Interpretation"), "text"),
            SectionKind::Ordinary
        );
    }

    #[test]
    fn test_section_text_roundtrip() {
        let section = Section::new("## Intro\n", 2, "Intro", "Body [1].\n");
        assert_eq!(section.text(), "## Intro\nBody [1].\n");
        assert_eq!(section.heading(), "## Intro");
    }

    #[test]
    fn test_with_body_keeps_kind() {
        let section = Section::new("## Abstract\n", 2, "Abstract", "Summary.");
        let changed = section.with_body("");
        assert_eq!(changed.kind, SectionKind::Abstract);
    }

    #[test]
    fn test_duplicate_headings() {
        let article = Article::new(vec![
            Section::new("## Intro\n", 2, "Intro", "a\n"),
            Section::new("## Method\n", 2, "Method", "b\n"),
            Section::new("## Intro\n", 2, " Intro ", "c\n"),
        ]);
        assert_eq!(article.duplicate_headings(), vec!["Intro".to_string()]);
    }

    #[test]
    fn test_content_key() {
        assert_eq!(
            content_key("  Diffusion models  fill HOLES well [3].\n").as_deref(),
            Some("diffusion models fill holes well.")
        );
        assert_eq!(content_key("Too short to matter."), None);
        assert_eq!(content_key("| a table row that is long enough |"), None);
        assert_eq!(content_key("[1] A. Author, \"A long reference title,\" 2020."), None);
    }

    #[test]
    fn test_duplicate_paragraphs() {
        let article = Article::new(vec![
            Section::new("## Intro\n", 2, "Intro", "Diffusion models fill holes well [3].\nShort line.\n"),
            Section::new(
                "## Method\n",
                2,
                "Method",
                "We train on masks.\nDiffusion  models fill holes WELL [3] [4].\nShort line.\n",
            ),
            Section::new(
                "## Code\n",
                2,
                "Code",
                "```\nprint(\"the same line of code here\")\nprint(\"the same line of code here\")\n```\n",
            ),
        ]);
        assert_eq!(
            article.duplicate_paragraphs(),
            vec!["diffusion models fill holes well.".to_string()]
        );
    }
}

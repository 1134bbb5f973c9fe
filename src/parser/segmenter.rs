//! Lossless section segmentation of Markdown-style articles.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Article, Section};

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})[ \t]+(.*?)[ \t#]*$").unwrap())
}

/// Options for section segmentation.
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    /// Deepest heading level that starts a new section (1-6)
    pub max_heading_level: u8,
}

impl SegmentOptions {
    /// Create new segment options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deepest heading level that starts a section.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            max_heading_level: 3,
        }
    }
}

/// Splits article text into sections at heading lines.
///
/// Concatenating `heading_line + body` over the result reproduces the input
/// byte for byte. Lines inside fenced code blocks are never headings.
#[derive(Debug, Clone, Default)]
pub struct SectionSegmenter {
    options: SegmentOptions,
}

impl SectionSegmenter {
    /// Create a segmenter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a segmenter with custom options.
    pub fn with_options(options: SegmentOptions) -> Self {
        Self { options }
    }

    /// Parse a heading line into `(level, title)`.
    fn parse_heading(&self, line: &str) -> Option<(u8, String)> {
        let line = line.trim_end_matches(['\r', '\n']);
        let caps = heading_regex().captures(line)?;
        let level = caps.get(1)?.as_str().len() as u8;
        if level > self.options.max_heading_level {
            return None;
        }
        let title = caps.get(2)?.as_str().trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some((level, title))
    }

    /// Segment text into an article.
    pub fn segment(&self, text: &str) -> Article {
        let mut sections = Vec::new();
        let mut heading: Option<(String, u8, String)> = None;
        let mut body = String::new();
        let mut in_fence = false;

        for line in text.split_inclusive('\n') {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
            }

            let parsed = if in_fence {
                None
            } else {
                self.parse_heading(line)
            };

            match parsed {
                Some((level, title)) => {
                    match heading.take() {
                        Some((prev_line, prev_level, prev_title)) => sections.push(Section::new(
                            prev_line,
                            prev_level,
                            prev_title,
                            std::mem::take(&mut body),
                        )),
                        None if !body.is_empty() => {
                            sections.push(Section::untitled(std::mem::take(&mut body)))
                        }
                        None => {}
                    }
                    heading = Some((line.to_string(), level, title));
                }
                None => body.push_str(line),
            }
        }

        match heading {
            Some((line, level, title)) => sections.push(Section::new(line, level, title, body)),
            None if !body.is_empty() => sections.push(Section::untitled(body)),
            None => {}
        }

        log::debug!("Segmented article into {} sections", sections.len());
        Article::new(sections)
    }
}

/// Segment text with default options.
pub fn segment(text: &str) -> Article {
    SectionSegmenter::new().segment(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SectionKind;

    const ARTICLE: &str = "# Video Inpainting\n\n## Abstract\nWe study inpainting [1].\n\n## 1. Introduction\nPrior work [2] exists.\n\n### 1.1 Scope\nDetails.\n";

    #[test]
    fn test_segment_is_lossless() {
        let article = segment(ARTICLE);
        assert_eq!(article.to_text(), ARTICLE);
    }

    #[test]
    fn test_segment_kinds() {
        let article = segment(ARTICLE);
        let kinds: Vec<_> = article.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::TitleOnly,
                SectionKind::Abstract,
                SectionKind::Ordinary,
                SectionKind::Ordinary,
            ]
        );
        assert_eq!(article.sections[2].title, "1. Introduction");
        assert_eq!(article.sections[3].level, 3);
    }

    #[test]
    fn test_leading_text_is_untitled_section() {
        let text = "Some preface.\n## Body\nText.";
        let article = segment(text);
        assert_eq!(article.len(), 2);
        assert!(!article.sections[0].has_heading());
        assert_eq!(article.sections[0].kind, SectionKind::Ordinary);
        assert_eq!(article.to_text(), text);
    }

    #[test]
    fn test_heading_without_trailing_newline() {
        let text = "## Intro\nText.\n## Outro";
        let article = segment(text);
        assert_eq!(article.len(), 2);
        assert_eq!(article.sections[1].kind, SectionKind::TitleOnly);
        assert_eq!(article.to_text(), text);
    }

    #[test]
    fn test_fenced_code_is_not_heading() {
        let text = "## Code\n```\n# not a heading\n```\n";
        let article = segment(text);
        assert_eq!(article.len(), 1);
        assert_eq!(article.to_text(), text);
    }

    #[test]
    fn test_deep_headings_stay_in_body() {
        let text = "## A\n#### Deep\ntext\n";
        let article = segment(text);
        assert_eq!(article.len(), 1);
        assert!(article.sections[0].body.contains("#### Deep"));
    }

    #[test]
    fn test_crlf_lines() {
        let text = "## A\r\nx\r\n## B\r\ny\r\n";
        let article = segment(text);
        assert_eq!(article.len(), 2);
        assert_eq!(article.sections[0].title, "A");
        assert_eq!(article.to_text(), text);
    }

    #[test]
    fn test_empty_input() {
        assert!(segment("").is_empty());
    }
}

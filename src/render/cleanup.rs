//! Deterministic cleanup of the reassembled article.
//!
//! Runs after every section has been integrated and before renumbering, so
//! the validator only ever sees repaired text.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{keyed_lines, Article, Section, SectionKind};
use crate::parser::{citation_set, remove_numbers, SectionSegmenter, SegmentOptions};

/// Cleanup preset levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPreset {
    /// Only drop citations without backing metadata
    Minimal,
    /// Also strip duplicate headings, repeated paragraphs and old reference sections
    #[default]
    Standard,
}

/// Options for the cleanup pass.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Remove the heading line of every repeated heading
    pub strip_duplicate_headings: bool,

    /// Remove repeated substantial lines, keeping the first occurrence.
    /// A repeat citing a number the first occurrence lacks is kept.
    pub strip_duplicate_paragraphs: bool,

    /// Drop citation numbers that have no reference metadata
    pub drop_invalid_citations: bool,

    /// Remove existing "References" / "Bibliography" sections
    pub strip_reference_sections: bool,
}

impl CleanupOptions {
    /// Create options from a preset.
    pub fn from_preset(preset: CleanupPreset) -> Self {
        match preset {
            CleanupPreset::Minimal => Self::minimal(),
            CleanupPreset::Standard => Self::standard(),
        }
    }

    /// Minimal cleanup options.
    pub fn minimal() -> Self {
        Self {
            strip_duplicate_headings: false,
            strip_duplicate_paragraphs: false,
            drop_invalid_citations: true,
            strip_reference_sections: false,
        }
    }

    /// Standard cleanup options.
    pub fn standard() -> Self {
        Self {
            strip_duplicate_headings: true,
            strip_duplicate_paragraphs: true,
            drop_invalid_citations: true,
            strip_reference_sections: true,
        }
    }

    /// Keep or strip reference sections.
    pub fn with_strip_reference_sections(mut self, strip: bool) -> Self {
        self.strip_reference_sections = strip;
        self
    }
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self::standard()
    }
}

/// What the cleanup pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Titles whose repeated heading line was removed
    pub duplicate_headings_removed: Vec<String>,

    /// Normalized text of repeated lines that were removed
    #[serde(default)]
    pub duplicate_paragraphs_removed: Vec<String>,

    /// Citation numbers dropped for lack of metadata
    pub invalid_citations_dropped: Vec<u32>,

    /// Number of reference sections removed
    pub reference_sections_removed: usize,
}

impl CleanupReport {
    /// Whether the pass changed anything.
    pub fn is_clean(&self) -> bool {
        self.duplicate_headings_removed.is_empty()
            && self.duplicate_paragraphs_removed.is_empty()
            && self.invalid_citations_dropped.is_empty()
            && self.reference_sections_removed == 0
    }
}

/// Cleaned article plus a record of the repairs.
#[derive(Debug, Clone)]
pub struct CleanupResult {
    /// Repaired article
    pub article: Article,
    /// Repairs performed
    pub report: CleanupReport,
}

impl CleanupResult {
    /// Reassembled text of the repaired article.
    pub fn text(&self) -> String {
        self.article.to_text()
    }
}

/// Repairs duplicate headings and invalid citations.
#[derive(Debug, Clone, Default)]
pub struct CleanupPass {
    options: CleanupOptions,
    segment: SegmentOptions,
}

impl CleanupPass {
    /// Create a cleanup pass.
    pub fn new(options: CleanupOptions) -> Self {
        Self {
            options,
            segment: SegmentOptions::default(),
        }
    }

    /// Set the segmentation options used to re-split the text.
    pub fn with_segment_options(mut self, segment: SegmentOptions) -> Self {
        self.segment = segment;
        self
    }

    /// Clean reassembled article text.
    ///
    /// The text is segmented again so that headings a collaborator slipped
    /// into a body are seen as sections. `valid` holds every citation number
    /// that has reference metadata.
    pub fn run(&self, text: &str, valid: &BTreeSet<u32>) -> CleanupResult {
        let article = SectionSegmenter::with_options(self.segment.clone()).segment(text);
        let mut report = CleanupReport::default();

        let mut sections: Vec<Section> = Vec::with_capacity(article.len());
        for section in article.sections {
            if self.options.strip_reference_sections && section.kind == SectionKind::References {
                log::info!("Removing existing reference section '{}'", section.title);
                report.reference_sections_removed += 1;
                continue;
            }
            sections.push(section);
        }

        if self.options.strip_duplicate_headings {
            let mut seen = HashSet::new();
            for section in sections.iter_mut().filter(|s| s.has_heading()) {
                let title = section.normalized_title();
                if !seen.insert(title.clone()) {
                    log::warn!("Stripping duplicate heading '{}'", section.heading());
                    *section = section.without_heading();
                    if !report.duplicate_headings_removed.contains(&title) {
                        report.duplicate_headings_removed.push(title);
                    }
                }
            }
        }

        if self.options.strip_duplicate_paragraphs {
            let mut seen = HashMap::new();
            for section in sections
                .iter_mut()
                .filter(|s| s.kind != SectionKind::References)
            {
                let body = remove_repeated_lines(
                    &section.body,
                    &mut seen,
                    &mut report.duplicate_paragraphs_removed,
                );
                if body.len() != section.body.len() {
                    log::warn!("Removed repeated content from '{}'", section.title);
                    *section = section.with_body(body);
                }
            }
        }

        if self.options.drop_invalid_citations {
            let mut dropped = BTreeSet::new();
            for section in sections.iter_mut() {
                let mut present = citation_set(&section.heading_line);
                present.extend(citation_set(&section.body));
                let invalid: HashSet<u32> = present.difference(valid).copied().collect();
                if invalid.is_empty() {
                    continue;
                }
                log::warn!(
                    "Dropping citations without metadata from '{}': {:?}",
                    section.title,
                    invalid
                );
                section.heading_line = remove_numbers(&section.heading_line, &invalid);
                section.body = remove_numbers(&section.body, &invalid);
                dropped.extend(invalid);
            }
            report.invalid_citations_dropped = dropped.into_iter().collect();
        }

        CleanupResult {
            article: Article::new(sections),
            report,
        }
    }
}

/// Drop lines whose content key was already seen with every number they
/// cite, together with one blank line so paragraph breaks stay single.
fn remove_repeated_lines(
    body: &str,
    seen: &mut HashMap<String, BTreeSet<u32>>,
    removed: &mut Vec<String>,
) -> String {
    let mut output = String::with_capacity(body.len());
    let mut drop_blank = false;

    for (line, key) in keyed_lines(body) {
        if std::mem::take(&mut drop_blank) && line.trim().is_empty() {
            continue;
        }
        if let Some(key) = key {
            let cited = citation_set(line);
            match seen.get(&key) {
                Some(first) if cited.is_subset(first) => {
                    drop_blank = output.is_empty()
                        || output.ends_with("\n\n")
                        || output.ends_with("\n\r\n");
                    if !removed.contains(&key) {
                        removed.push(key);
                    }
                    continue;
                }
                Some(_) => {}
                None => {
                    seen.insert(key, cited);
                }
            }
        }
        output.push_str(line);
    }

    // A repeat closing the body leaves the break before it dangling.
    if drop_blank {
        if output.ends_with("\n\r\n") {
            output.truncate(output.len() - 2);
        } else if output.ends_with("\n\n") {
            output.pop();
        }
    }
    output
}

//! Two-phase citation renumbering.
//!
//! Every marker number is first replaced by a tagged temporary token, then
//! each token by its final number. A single-pass replace could rewrite a
//! number that was itself produced by an earlier replacement.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::model::{LocalReferences, Origin};
use crate::parser::{extract_citations, rewrite_markers};

const TOKEN_DELIMITER: char = '\u{0}';

fn digits_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").unwrap())
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x00CITE:([LE]):(\d+)\x00").unwrap())
}

fn token(origin: Origin, number: u32) -> String {
    let tag = match origin {
        Origin::Local => 'L',
        Origin::External => 'E',
    };
    format!(
        "{}CITE:{}:{}{}",
        TOKEN_DELIMITER, tag, number, TOKEN_DELIMITER
    )
}

/// Mapping of one old number onto its final number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenumberingEntry {
    /// Number before renumbering
    pub old_number: u32,
    /// Where the old number came from
    pub old_origin: Origin,
    /// Final number
    pub new_number: u32,
}

/// Renumbered text and the mapping that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renumbering {
    /// Rewritten text
    pub text: String,
    /// One entry per distinct number, ordered by `new_number`
    pub entries: Vec<RenumberingEntry>,
}

impl Renumbering {
    /// Final number for an old number.
    pub fn new_number(&self, old_number: u32) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.old_number == old_number)
            .map(|e| e.new_number)
    }

    /// Whether every number kept its value.
    pub fn is_identity(&self) -> bool {
        self.entries.iter().all(|e| e.old_number == e.new_number)
    }

    /// Count of distinct numbers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the text had no citations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps all citation numbers onto `1..=N` in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct CitationRenumberer {
    local_numbers: BTreeSet<u32>,
}

impl CitationRenumberer {
    /// Create a renumberer; `local_numbers` are the numbers of local origin,
    /// every other number is an external placeholder.
    pub fn new(local_numbers: impl IntoIterator<Item = u32>) -> Self {
        Self {
            local_numbers: local_numbers.into_iter().collect(),
        }
    }

    /// Renumberer treating the keys of a local reference map as local.
    pub fn for_local(local: &LocalReferences) -> Self {
        Self::new(local.numbers())
    }

    /// Origin of an old number.
    pub fn origin_of(&self, number: u32) -> Origin {
        if self.local_numbers.contains(&number) {
            Origin::Local
        } else {
            Origin::External
        }
    }

    /// Rewrite every marker of `text`.
    ///
    /// Markers without ranges keep their separators; markers with ranges are
    /// rewritten as explicit lists.
    pub fn renumber(&self, text: &str) -> Renumbering {
        let order = extract_citations(text);
        let entries: Vec<RenumberingEntry> = order
            .iter()
            .enumerate()
            .map(|(i, &old_number)| RenumberingEntry {
                old_number,
                old_origin: self.origin_of(old_number),
                new_number: i as u32 + 1,
            })
            .collect();

        if text.contains(TOKEN_DELIMITER) {
            log::warn!("Article contains NUL characters; renumbering may be unreliable");
        }

        let staged = rewrite_markers(text, |marker| {
            let source = marker.as_str(text);
            if marker.has_range || source.contains(['-', '–', '—']) {
                let tokens: Vec<String> = marker
                    .numbers
                    .iter()
                    .map(|&n| token(self.origin_of(n), n))
                    .collect();
                return Some(format!("[{}]", tokens.join(", ")));
            }
            let mut numbers = marker.numbers.iter();
            Some(
                digits_regex()
                    .replace_all(source, |_: &Captures| {
                        numbers
                            .next()
                            .map(|&n| token(self.origin_of(n), n))
                            .unwrap_or_default()
                    })
                    .into_owned(),
            )
        });

        let mapping: HashMap<u32, u32> = entries
            .iter()
            .map(|e| (e.old_number, e.new_number))
            .collect();
        let text = token_regex()
            .replace_all(&staged, |caps: &Captures| {
                let old = &caps[2];
                old.parse::<u32>()
                    .ok()
                    .and_then(|n| mapping.get(&n))
                    .map(u32::to_string)
                    .unwrap_or_else(|| old.to_string())
            })
            .into_owned();

        log::debug!("Renumbered {} distinct citations", entries.len());
        Renumbering { text, entries }
    }
}

/// Renumber an article against a local reference map.
pub fn renumber_article(text: &str, local: &LocalReferences) -> Renumbering {
    CitationRenumberer::for_local(local).renumber(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::citation_set;

    #[test]
    fn test_non_contiguous_local_numbers() {
        let renumberer = CitationRenumberer::new([2, 5, 9]);
        let result = renumberer.renumber("A [2]. B [5]. C [9]. Again [2].");
        assert_eq!(result.text, "A [1]. B [2]. C [3]. Again [1].");
        assert!(result.entries.iter().all(|e| e.old_origin == Origin::Local));
    }

    #[test]
    fn test_swap_does_not_collide() {
        let renumberer = CitationRenumberer::new([1, 2]);
        let result = renumberer.renumber("First [2], then [1].");
        assert_eq!(result.text, "First [1], then [2].");
        assert_eq!(result.new_number(2), Some(1));
        assert_eq!(result.new_number(1), Some(2));
    }

    #[test]
    fn test_external_origin_and_order() {
        let renumberer = CitationRenumberer::new([1, 2]);
        let result = renumberer.renumber("X [1] [31]. Y [2,32].");
        assert_eq!(result.text, "X [1] [2]. Y [3,4].");
        let origins: Vec<Origin> = result.entries.iter().map(|e| e.old_origin).collect();
        assert_eq!(
            origins,
            vec![Origin::Local, Origin::External, Origin::Local, Origin::External]
        );
    }

    #[test]
    fn test_ranges_become_lists() {
        let renumberer = CitationRenumberer::new([3, 4, 5, 7]);
        let result = renumberer.renumber("See [3-5] and [7].");
        assert_eq!(result.text, "See [1, 2, 3] and [4].");
    }

    #[test]
    fn test_identity_keeps_text() {
        let text = "A [1]. B [2, 3]. C [1,2].";
        let result = CitationRenumberer::new([1, 2, 3]).renumber(text);
        assert_eq!(result.text, text);
        assert!(result.is_identity());
    }

    #[test]
    fn test_result_is_gapless() {
        let text = "Q [40] [7] [12, 40] [3] [99].";
        let result = CitationRenumberer::default().renumber(text);
        let expected: BTreeSet<u32> = (1..=result.len() as u32).collect();
        assert_eq!(citation_set(&result.text), expected);
    }

    #[test]
    fn test_no_citations() {
        let result = CitationRenumberer::default().renumber("Plain text, 2021.");
        assert!(result.is_empty());
        assert_eq!(result.text, "Plain text, 2021.");
    }
}

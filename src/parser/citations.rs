//! Citation marker grammar.
//!
//! A marker is a bracketed integer, or a comma/range list of integers, with
//! digits immediately inside both brackets: `[3]`, `[2, 5]`, `[4-7]`,
//! `[1,3–5]`. `[ 3]`, `[3 ]` and bare numerals are not markers.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;

/// Ranges wider than this are read as two separate numbers.
const MAX_RANGE_SPAN: u32 = 500;

const MARKER: &str = r"\[(\d+(?:[ \t]*[,\-–—][ \t]*\d+)*)\]";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MARKER).unwrap())
}

/// Adjacent markers with the horizontal whitespace around them, e.g. ` [1], [4] `.
fn marker_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let marker = MARKER.replacen('(', "(?:", 1);
        Regex::new(&format!(
            r"[ \t]*{m}(?:[ \t]*[,;]?[ \t]*{m})*[ \t]*",
            m = marker
        ))
        .unwrap()
    })
}

/// One citation marker found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationMarker {
    /// Byte offset of the opening bracket
    pub start: usize,
    /// Byte offset one past the closing bracket
    pub end: usize,
    /// Referenced numbers in written order, ranges expanded
    pub numbers: Vec<u32>,
    /// Whether the marker contained a range
    pub has_range: bool,
}

impl CitationMarker {
    /// The marker's source text.
    pub fn as_str<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }
}

/// Parse the inside of a marker group. Returns `None` when a number does not
/// fit in `u32`.
fn parse_group(inner: &str) -> Option<(Vec<u32>, bool)> {
    let mut numbers = Vec::new();
    let mut has_range = false;

    for part in inner.split(',') {
        let part = part.trim();
        let bounds: Vec<&str> = part
            .split(|c| c == '-' || c == '–' || c == '—')
            .map(str::trim)
            .collect();

        match bounds.as_slice() {
            [single] => numbers.push(single.parse().ok()?),
            [first, rest @ ..] => {
                // "1-3-5" is treated as a chain of ranges
                let mut prev: u32 = first.parse().ok()?;
                numbers.push(prev);
                for bound in rest {
                    let next: u32 = bound.parse().ok()?;
                    if prev < next && next - prev <= MAX_RANGE_SPAN {
                        numbers.extend(prev + 1..=next);
                        has_range = true;
                    } else {
                        numbers.push(next);
                    }
                    prev = next;
                }
            }
            [] => return None,
        }
    }

    Some((numbers, has_range))
}

/// Find every citation marker in text, in order.
pub fn find_markers(text: &str) -> Vec<CitationMarker> {
    marker_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (numbers, has_range) = parse_group(caps.get(1)?.as_str())?;
            Some(CitationMarker {
                start: whole.start(),
                end: whole.end(),
                numbers,
                has_range,
            })
        })
        .collect()
}

/// Distinct citation numbers in order of first appearance.
pub fn extract_citations(text: &str) -> Vec<u32> {
    let mut seen = HashSet::new();
    find_markers(text)
        .into_iter()
        .flat_map(|m| m.numbers)
        .filter(|n| seen.insert(*n))
        .collect()
}

/// Distinct citation numbers as a sorted set.
pub fn citation_set(text: &str) -> BTreeSet<u32> {
    find_markers(text)
        .into_iter()
        .flat_map(|m| m.numbers)
        .collect()
}

/// Render numbers as a comma-separated marker group.
pub fn render_group(numbers: &[u32]) -> String {
    let inner = numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", inner)
}

/// Rewrite every marker through `f`; `None` keeps the marker verbatim.
pub fn rewrite_markers<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&CitationMarker) -> Option<String>,
{
    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for marker in find_markers(text) {
        output.push_str(&text[last..marker.start]);
        match f(&marker) {
            Some(replacement) => output.push_str(&replacement),
            None => output.push_str(marker.as_str(text)),
        }
        last = marker.end;
    }
    output.push_str(&text[last..]);
    output
}

/// Length of a `,` or `;` (with leading spaces) that joins the start of
/// `rest` to a following marker.
fn separator_before_marker(rest: &str) -> Option<usize> {
    let after_space = rest.trim_start_matches([' ', '\t']);
    let after_sep = after_space.strip_prefix([',', ';'])?;
    if after_sep.trim_start_matches([' ', '\t']).starts_with('[') {
        Some(rest.len() - after_sep.len())
    } else {
        None
    }
}

/// Remove the given numbers from every marker.
///
/// A marker left empty is removed along with one space or tab before it and
/// the separator joining it to a neighbouring marker.
/// Markers that do not reference any removed number are kept verbatim.
pub fn remove_numbers(text: &str, remove: &HashSet<u32>) -> String {
    if remove.is_empty() {
        return text.to_string();
    }

    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for marker in find_markers(text) {
        output.push_str(&text[last..marker.start]);
        last = marker.end;

        if !marker.numbers.iter().any(|n| remove.contains(n)) {
            output.push_str(marker.as_str(text));
            continue;
        }

        let kept: Vec<u32> = marker
            .numbers
            .iter()
            .copied()
            .filter(|n| !remove.contains(n))
            .collect();
        if kept.is_empty() {
            if output.ends_with(' ') || output.ends_with('\t') {
                output.pop();
            }
            // Drop the list separator the removed marker leaves behind.
            if output.ends_with([',', ';']) && output[..output.len() - 1].ends_with(']') {
                output.pop();
            } else if let Some(len) = separator_before_marker(&text[last..]) {
                last += len;
            }
        } else {
            output.push_str(&render_group(&kept));
        }
    }
    output.push_str(&text[last..]);
    output
}

/// Text with every citation marker removed.
///
/// A run of markers and the spaces or tabs around it collapses to one space
/// between words, and to nothing at a line start or before punctuation.
/// Newlines are never touched, so two texts compare equal exactly when they
/// differ only by where markers sit.
pub fn strip_markers(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut last = 0;

    for run in marker_run_regex().find_iter(text) {
        output.push_str(&text[last..run.start()]);
        last = run.end();

        let at_line_start = output.is_empty() || output.ends_with('\n');
        let closes = match text[run.end()..].chars().next() {
            None => true,
            Some(c) => matches!(c, '\r' | '\n' | '.' | ',' | ';' | ':' | '!' | '?' | ')'),
        };
        if !at_line_start && !closes {
            output.push(' ');
        }
    }
    output.push_str(&text[last..]);
    output
}

/// Extracts ordered distinct citation numbers from text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationExtractor;

impl CitationExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Distinct numbers in order of first appearance.
    pub fn extract(&self, text: &str) -> Vec<u32> {
        extract_citations(text)
    }

    /// Count of distinct numbers.
    pub fn count(&self, text: &str) -> usize {
        citation_set(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_appearance_order() {
        let text = "A [3] then [1] and again [3], finally [2].";
        assert_eq!(extract_citations(text), vec![3, 1, 2]);
    }

    #[test]
    fn test_lists_and_ranges() {
        let text = "See [1, 4] and [6-8] or [2,3–4].";
        assert_eq!(extract_citations(text), vec![1, 4, 6, 7, 8, 2, 3]);
    }

    #[test]
    fn test_ignores_non_markers() {
        let text = "In 2021 we saw [ 3] and [4 ] and array[i] and 12 items.";
        assert!(extract_citations(text).is_empty());
    }

    #[test]
    fn test_reverse_range_keeps_both_ends() {
        assert_eq!(extract_citations("[9-4]"), vec![9, 4]);
    }

    #[test]
    fn test_overflowing_number_is_not_a_marker() {
        assert!(extract_citations("[99999999999]").is_empty());
    }

    #[test]
    fn test_marker_offsets() {
        let text = "x [12] y";
        let markers = find_markers(text);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].as_str(text), "[12]");
        assert!(!markers[0].has_range);
    }

    #[test]
    fn test_remove_numbers() {
        let remove: HashSet<u32> = [31, 40].into_iter().collect();
        let text = "Claim [31]. Other [2, 31] and [40] [5].";
        assert_eq!(remove_numbers(text, &remove), "Claim. Other [2] and [5].");
    }

    #[test]
    fn test_remove_numbers_drops_list_separators() {
        let remove: HashSet<u32> = [77].into_iter().collect();
        assert_eq!(remove_numbers("A [1], [77].", &remove), "A [1].");
        assert_eq!(remove_numbers("A [77], [1].", &remove), "A [1].");
        assert_eq!(remove_numbers("A [1], [77], [2].", &remove), "A [1], [2].");
        assert_eq!(remove_numbers("A [77], then B.", &remove), "A, then B.");
    }

    #[test]
    fn test_remove_numbers_keeps_untouched_markers_verbatim() {
        let remove: HashSet<u32> = [9].into_iter().collect();
        let text = "Keep [1,2] and [3-4].";
        assert_eq!(remove_numbers(text, &remove), text);
    }

    #[test]
    fn test_strip_markers_ignores_placement() {
        let original = "Inpainting fills holes [1]. It is hard.\n\nPatches [2] help.";
        let enhanced = "Inpainting fills holes [1], [31]. It is hard [32].\n\nPatches [2] [33] help.";
        assert_eq!(strip_markers(original), strip_markers(enhanced));
        assert_eq!(
            strip_markers(original),
            "Inpainting fills holes. It is hard.\n\nPatches help."
        );
    }

    #[test]
    fn test_strip_markers_keeps_structure() {
        assert_eq!(strip_markers("[4] Leading\nnext [5]\n"), "Leading\nnext\n");
        assert_ne!(
            strip_markers("One [1].\n\nTwo."),
            strip_markers("One [1].\nTwo.")
        );
        assert_ne!(strip_markers("Fast [1]."), strip_markers("**Fast** [1]."));
    }

    #[test]
    fn test_rewrite_markers() {
        let text = "a [1] b [2]";
        let out = rewrite_markers(text, |m| {
            if m.numbers == vec![2] {
                Some("[X]".to_string())
            } else {
                None
            }
        });
        assert_eq!(out, "a [1] b [X]");
    }

    #[test]
    fn test_extractor_count() {
        let extractor = CitationExtractor::new();
        assert_eq!(extractor.count("[1] [1] [2, 3]"), 3);
    }
}

//! Prompt and candidate catalog assembly.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::generator::{CatalogEntry, GenerationRequest};
use super::options::IntegrationOptions;
use super::pool::CandidatePool;
use super::profile::ContentProfile;
use crate::model::{ExternalCandidate, ReferenceType, Section};

/// System instructions sent with every section.
pub const SYSTEM_INSTRUCTIONS: &str = "You add citation markers to one section of an academic article.\n\
Rules:\n\
1. Insert markers of the form [n] using only the numbers listed in the catalog.\n\
2. Do not add, remove, reorder or rephrase any sentence or word.\n\
3. Do not remove, change or renumber any existing citation marker.\n\
4. Do not repeat the section heading or add any heading.\n\
5. Add at most {max} new markers, each where the cited work supports the sentence.\n\
6. Return only the enhanced section body, with no commentary.";

/// Render the system instructions for the given options.
pub fn system_instructions(options: &IntegrationOptions) -> String {
    SYSTEM_INSTRUCTIONS.replace("{max}", &options.max_new_citations.to_string())
}

/// Unused selected candidates eligible for a section, in priority order and
/// capped per type.
///
/// Candidates whose type fits the section come first in line; if none fits,
/// every unused selected candidate is considered.
pub fn eligible_candidates<'a>(
    profile: &ContentProfile,
    pool: &'a CandidatePool,
    per_type: usize,
) -> Vec<&'a ExternalCandidate> {
    let unused = pool.unused_selected();
    let mut eligible: Vec<&ExternalCandidate> = unused
        .iter()
        .copied()
        .filter(|c| profile.accepts(c.type_tag))
        .collect();
    if eligible.is_empty() {
        eligible = unused;
    }
    eligible.sort_by(|a, b| profile.compare(a, b));

    let mut per_kind: BTreeMap<ReferenceType, usize> = BTreeMap::new();
    eligible.retain(|c| {
        let count = per_kind.entry(c.type_tag).or_default();
        *count += 1;
        *count <= per_type
    });
    eligible
}

/// Build catalog entries from eligible candidates.
pub fn build_catalog(candidates: &[&ExternalCandidate], snippet_chars: usize) -> Vec<CatalogEntry> {
    candidates
        .iter()
        .map(|c| CatalogEntry {
            placeholder: c.placeholder,
            type_tag: c.type_tag,
            title: c.metadata.title.trim().to_string(),
            authors: c.metadata.author_line(),
            year: c.metadata.year,
            snippet: c.metadata.abstract_snippet(snippet_chars),
        })
        .collect()
}

/// Render the user prompt for one section.
pub fn render_prompt(heading: &str, body: &str, catalog: &[CatalogEntry]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Section: {}", heading);
    prompt.push('\n');
    prompt.push_str("Available references:\n");
    for entry in catalog {
        let year = entry
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n.d.".to_string());
        let _ = writeln!(
            prompt,
            "[{}] ({}) {} - {} ({})",
            entry.placeholder,
            entry.type_tag.label(),
            entry.title,
            entry.authors,
            year
        );
        if !entry.snippet.is_empty() {
            let _ = writeln!(prompt, "    {}", entry.snippet);
        }
    }
    prompt.push('\n');
    prompt.push_str("Section body:\n");
    prompt.push_str(body);
    if !body.ends_with('\n') {
        prompt.push('\n');
    }
    prompt
}

/// Assemble the full request for a section, or for one `(part, total)`
/// chunk of it.
pub fn build_request(
    section: &Section,
    body: &str,
    catalog: Vec<CatalogEntry>,
    part: Option<(usize, usize)>,
    options: &IntegrationOptions,
) -> GenerationRequest {
    let heading = if section.title.is_empty() {
        "(untitled)".to_string()
    } else {
        section.title.clone()
    };
    let mut prompt = render_prompt(&heading, body, &catalog);
    if let Some((part, total)) = part {
        let _ = writeln!(
            prompt,
            "\nThis is part {} of {} of the section. Enhance it on its own.",
            part, total
        );
    }
    GenerationRequest {
        system: system_instructions(options),
        prompt,
        heading,
        section_body: body.to_string(),
        catalog,
        max_tokens: options.max_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReferenceMetadata;

    fn candidate(placeholder: u32, kind: ReferenceType) -> ExternalCandidate {
        ExternalCandidate::new(
            placeholder,
            ReferenceMetadata::new(format!("Paper {}", placeholder), vec!["A. Author".into()])
                .with_year(2020)
                .with_abstract("An abstract."),
            kind,
        )
    }

    fn section(title: &str, body: &str) -> Section {
        Section::new(format!("## {}\n", title), 2, title.to_string(), body.to_string())
    }

    #[test]
    fn test_system_instructions_mention_limit() {
        let text = system_instructions(&IntegrationOptions::default());
        assert!(text.contains("at most 3 new markers"));
        assert!(text.contains("Do not repeat the section heading"));
    }

    #[test]
    fn test_eligible_filters_by_type() {
        let pool = CandidatePool::new(vec![
            candidate(31, ReferenceType::Result),
            candidate(32, ReferenceType::Background),
            candidate(33, ReferenceType::Other),
        ])
        .unwrap();
        let profile = ContentProfile::infer(&section("Related Work", "Text."));
        let eligible: Vec<u32> = eligible_candidates(&profile, &pool, 5)
            .iter()
            .map(|c| c.placeholder)
            .collect();
        assert_eq!(eligible, vec![32, 33]);
    }

    #[test]
    fn test_eligible_falls_back_to_all_unused() {
        let pool = CandidatePool::new(vec![candidate(31, ReferenceType::Result)]).unwrap();
        let profile = ContentProfile::infer(&section("Related Work", "Text."));
        assert_eq!(eligible_candidates(&profile, &pool, 5).len(), 1);
        pool.claim(31, 0);
        assert!(eligible_candidates(&profile, &pool, 5).is_empty());
    }

    #[test]
    fn test_per_type_cap() {
        let pool = CandidatePool::new(
            (1..=8).map(|p| candidate(p, ReferenceType::Method)).collect(),
        )
        .unwrap();
        let profile = ContentProfile::infer(&section("Method", "Text."));
        assert_eq!(eligible_candidates(&profile, &pool, 5).len(), 5);
    }

    #[test]
    fn test_render_prompt() {
        let pool = CandidatePool::new(vec![candidate(31, ReferenceType::Method)]).unwrap();
        let profile = ContentProfile::infer(&section("Method", "Text."));
        let eligible = eligible_candidates(&profile, &pool, 5);
        let catalog = build_catalog(&eligible, 500);
        let prompt = render_prompt("Method", "Body text [1].", &catalog);
        assert!(prompt.contains("[31] (METHOD) Paper 31 - A. Author (2020)"));
        assert!(prompt.contains("An abstract."));
        assert!(prompt.ends_with("Body text [1].\n"));
    }

    #[test]
    fn test_chunk_request_names_its_part() {
        let options = IntegrationOptions::default();
        let method = section("Method", "First.\n\nSecond.");
        let request = build_request(&method, "Second.", Vec::new(), Some((2, 3)), &options);
        assert_eq!(request.heading, "Method");
        assert_eq!(request.section_body, "Second.");
        assert!(request.prompt.contains("part 2 of 3"));

        let whole = build_request(&method, "First.", Vec::new(), None, &options);
        assert!(!whole.prompt.contains("part"));
    }
}

//! Per-section citation integration and response validation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::generator::{call_with_timeout, estimate_tokens, TextGenerator, TokenUsage};
use super::options::IntegrationOptions;
use super::pool::CandidatePool;
use super::profile::ContentProfile;
use super::progress::{RevertReason, SectionStatus, SkipReason};
use super::prompt::{build_catalog, build_request, eligible_candidates};
use crate::error::GenerationError;
use crate::model::{normalize_heading, Section, SectionKind};
use crate::parser::{
    citation_set, extract_citations, remove_numbers, strip_markers, SectionSegmenter,
};

/// Result of integrating one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutcome {
    /// Section index in the article
    pub index: usize,
    /// Heading title (empty for an untitled block)
    pub title: String,
    /// Section kind
    pub kind: SectionKind,
    /// What happened
    #[serde(flatten)]
    pub status: SectionStatus,
    /// Body after integration
    #[serde(skip)]
    pub body: String,
    /// Token usage summed over the section's collaborator calls
    pub usage: Option<TokenUsage>,
    /// Collaborator calls that returned a response
    #[serde(default)]
    pub calls: u32,
    /// Collaborator calls that failed
    #[serde(default)]
    pub failed_calls: u32,
}

impl SectionOutcome {
    fn unchanged(index: usize, section: &Section, status: SectionStatus) -> Self {
        Self {
            index,
            title: section.title.clone(),
            kind: section.kind,
            status,
            body: section.body.clone(),
            usage: None,
            calls: 0,
            failed_calls: 0,
        }
    }

    /// Outcome for a section that was never processed because the run was
    /// cancelled.
    pub fn cancelled(index: usize, section: &Section) -> Self {
        Self::unchanged(index, section, SectionStatus::Cancelled)
    }

    /// Placeholders consumed by this section.
    pub fn used_candidates(&self) -> Vec<u32> {
        self.status.added()
    }
}

/// Split a body into leading whitespace, core text and trailing whitespace.
fn split_whitespace_frame(body: &str) -> (&str, &str, &str) {
    let core_start = body.len() - body.trim_start().len();
    let core_end = body.trim_end().len().max(core_start);
    (
        &body[..core_start],
        &body[core_start..core_end],
        &body[core_end..],
    )
}

/// Split a body at blank lines into chunks of at most `budget` estimated
/// tokens. A paragraph over budget forms a chunk of its own. The chunks
/// concatenate back to `body`.
fn paragraph_chunks(body: &str, budget: usize) -> Vec<&str> {
    let budget = budget as u64;
    if estimate_tokens(body) <= budget {
        return vec![body];
    }

    let mut chunks = Vec::new();
    let (mut start, mut end, mut tokens) = (0, 0, 0);
    for paragraph in body.split_inclusive("\n\n") {
        let cost = estimate_tokens(paragraph);
        if end > start && tokens + cost > budget {
            chunks.push(&body[start..end]);
            start = end;
            tokens = 0;
        }
        end += paragraph.len();
        tokens += cost;
    }
    if end > start {
        chunks.push(&body[start..end]);
    }
    chunks
}

/// Remove a heading the collaborator echoed at the top of its response.
fn strip_echoed_heading<'a>(response: &'a str, section: &Section) -> &'a str {
    if !section.has_heading() {
        return response;
    }
    let first_line_end = response.find('\n').unwrap_or(response.len());
    let first_line = response[..first_line_end].trim();

    let heading = section.heading().trim();
    let title = normalize_heading(&section.title);
    let candidate = normalize_heading(first_line.trim_start_matches('#'));

    if first_line == heading || (!title.is_empty() && candidate == title) {
        log::debug!("Stripping echoed heading '{}'", first_line);
        response[first_line_end..].trim_start()
    } else {
        response
    }
}

/// Whether a trimmed line reads as running text rather than Markdown
/// structure.
fn is_prose_line(trimmed: &str) -> bool {
    !trimmed.is_empty()
        && !trimmed.starts_with(['|', '#', '>'])
        && !trimmed.starts_with("$$")
        && !is_list_item(trimmed)
}

fn is_list_item(trimmed: &str) -> bool {
    let bullet = trimmed
        .strip_prefix(['-', '*', '+'])
        .is_some_and(|rest| rest.starts_with([' ', '\t']));
    let rest = trimmed.trim_start_matches(|c: char| c.is_ascii_digit());
    let numbered =
        rest.len() < trimmed.len() && (rest.starts_with(". ") || rest.starts_with(") "));
    bullet || numbered
}

/// Byte offset for a fallback marker: before the sentence terminator of the
/// last prose line, or of the last list item when there is no prose.
/// Table rows, headings and fenced code never receive one.
pub(crate) fn fallback_offset(core: &str) -> Option<usize> {
    let mut in_fence = false;
    let mut offset = 0;
    let (mut prose, mut item) = (None, None);

    for line in core.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let content = line.trim_end();
        let stem = content.trim_end_matches(['.', '!', '?']);
        let at = if stem.len() == content.len() || stem.trim().is_empty() {
            content.len()
        } else {
            stem.len()
        };
        if is_prose_line(trimmed) {
            prose = Some(start + at);
        } else if is_list_item(trimmed) {
            item = Some(start + at);
        }
    }
    prose.or(item)
}

/// What happened to one chunk of a section body.
#[derive(Debug)]
enum ChunkResult {
    /// Response accepted; `text` is the framed chunk with the granted markers
    Enhanced { text: String, granted: Vec<u32> },
    /// Valid response without a usable new marker
    NothingNew,
    Reverted(RevertReason),
    Failed(GenerationError),
    /// Not sent: blank, nothing to offer or the section cap is reached
    Untouched,
}

/// The section being integrated, shared by its chunks.
struct SectionJob<'a> {
    index: usize,
    section: &'a Section,
    profile: ContentProfile,
    pool: &'a CandidatePool,
}

/// Integrates candidate citations into individual sections.
pub struct SectionIntegrator {
    generator: Arc<dyn TextGenerator>,
    options: IntegrationOptions,
}

impl SectionIntegrator {
    /// Create a section integrator.
    pub fn new(generator: Arc<dyn TextGenerator>, options: IntegrationOptions) -> Self {
        Self { generator, options }
    }

    /// Options in effect.
    pub fn options(&self) -> &IntegrationOptions {
        &self.options
    }

    /// Abstract sections are echoed unchanged.
    pub fn integrate_abstract(&self, index: usize, section: &Section) -> SectionOutcome {
        SectionOutcome::unchanged(
            index,
            section,
            SectionStatus::Skipped {
                reason: SkipReason::Abstract,
            },
        )
    }

    /// Enrich one section with new citation markers from the pool.
    ///
    /// Bodies over the chunk budget are sent in paragraph chunks that share
    /// the section's new-citation cap. Never fails: collaborator errors and
    /// rejected responses leave the affected text byte-identical and are
    /// reported through the outcome status.
    pub fn integrate_section(
        &self,
        index: usize,
        section: &Section,
        pool: &CandidatePool,
    ) -> SectionOutcome {
        let skip = |reason| SectionOutcome::unchanged(index, section, SectionStatus::Skipped { reason });
        match section.kind {
            SectionKind::Abstract => return self.integrate_abstract(index, section),
            SectionKind::TitleOnly => return skip(SkipReason::TitleOnly),
            SectionKind::References => return skip(SkipReason::References),
            SectionKind::Ordinary => {}
        }

        let job = SectionJob {
            index,
            section,
            profile: ContentProfile::infer(section),
            pool,
        };
        if eligible_candidates(&job.profile, pool, self.options.catalog_per_type).is_empty() {
            log::debug!("Section {} ('{}'): no eligible candidates", index, section.title);
            return skip(SkipReason::NoCandidates);
        }

        let chunks = paragraph_chunks(&section.body, self.options.chunk_tokens);
        let total = chunks.len();
        if total > 1 {
            log::info!(
                "Section {} ('{}'): split into {} chunks",
                index,
                section.title,
                total
            );
        }

        let mut outcome = skip(SkipReason::NoCandidates);
        let mut pieces: Vec<String> = chunks.iter().map(|c| c.to_string()).collect();
        let mut added: Vec<u32> = Vec::new();
        let mut fallback_target = None;
        let mut first_error = None;
        let mut first_revert = None;

        for (i, chunk) in chunks.iter().enumerate() {
            let remaining = self.options.max_new_citations.saturating_sub(added.len());
            if remaining == 0 {
                break;
            }
            let part = (total > 1).then_some((i + 1, total));
            let (result, usage) = self.integrate_chunk(&job, chunk, part, remaining);

            if let Some(usage) = usage {
                outcome.calls += 1;
                outcome.usage.get_or_insert_with(TokenUsage::default).merge(&usage);
            }
            match result {
                ChunkResult::Enhanced { text, granted } => {
                    pieces[i] = text;
                    added.extend(granted);
                }
                ChunkResult::NothingNew => fallback_target = Some(i),
                ChunkResult::Reverted(reason) => {
                    first_revert.get_or_insert(reason);
                }
                ChunkResult::Failed(error) => {
                    outcome.failed_calls += 1;
                    first_error.get_or_insert(error);
                }
                ChunkResult::Untouched => {}
            }
        }

        let mut fallback = None;
        let mut no_insertion_point = false;
        if let Some(i) = fallback_target.filter(|_| added.is_empty()) {
            let (lead, core, trail) = split_whitespace_frame(chunks[i]);
            match fallback_offset(core) {
                Some(at) => {
                    let priority: Vec<u32> =
                        eligible_candidates(&job.profile, pool, self.options.catalog_per_type)
                            .iter()
                            .map(|c| c.placeholder)
                            .collect();
                    if let Some(placeholder) = pool.claim_first(&priority, index) {
                        log::info!(
                            "Section {} ('{}'): no usable marker in response, inserting [{}]",
                            index,
                            section.title,
                            placeholder
                        );
                        pieces[i] = format!(
                            "{}{} [{}]{}{}",
                            lead,
                            &core[..at],
                            placeholder,
                            &core[at..],
                            trail
                        );
                        fallback = Some(placeholder);
                    }
                }
                None => {
                    log::debug!(
                        "Section {} ('{}'): no prose line for a fallback marker",
                        index,
                        section.title
                    );
                    no_insertion_point = true;
                }
            }
        }

        outcome.status = if !added.is_empty() {
            SectionStatus::Enhanced { added }
        } else if let Some(placeholder) = fallback {
            SectionStatus::Fallback { placeholder }
        } else if let Some(error) = first_error {
            SectionStatus::Failed { error }
        } else if let Some(reason) = first_revert {
            SectionStatus::Reverted { reason }
        } else if no_insertion_point {
            SectionStatus::Skipped {
                reason: SkipReason::NoInsertionPoint,
            }
        } else {
            SectionStatus::Skipped {
                reason: SkipReason::NoCandidates,
            }
        };
        if outcome.status.is_modified() {
            outcome.body = pieces.concat();
        }
        outcome
    }

    /// Send one chunk to the collaborator and judge the response. Returns the
    /// usage when a response came back.
    fn integrate_chunk(
        &self,
        job: &SectionJob<'_>,
        chunk: &str,
        part: Option<(usize, usize)>,
        remaining: usize,
    ) -> (ChunkResult, Option<TokenUsage>) {
        let (index, section) = (job.index, job.section);
        let (lead, core, trail) = split_whitespace_frame(chunk);
        if core.is_empty() {
            return (ChunkResult::Untouched, None);
        }
        let eligible = eligible_candidates(&job.profile, job.pool, self.options.catalog_per_type);
        if eligible.is_empty() {
            return (ChunkResult::Untouched, None);
        }
        let offered: HashSet<u32> = eligible.iter().map(|c| c.placeholder).collect();
        let catalog = build_catalog(&eligible, self.options.abstract_snippet_chars);
        let request = build_request(section, core, catalog, part, &self.options);

        let generation = match call_with_timeout(
            Arc::clone(&self.generator),
            request.clone(),
            self.options.call_timeout,
        ) {
            Ok(generation) => generation,
            Err(error) => {
                log::warn!(
                    "Section {} ('{}'): {} call failed: {}",
                    index,
                    section.title,
                    self.generator.name(),
                    error
                );
                return (ChunkResult::Failed(error), None);
            }
        };
        let usage = generation.usage_or_estimate(&request);

        let result = match self.validate_response(section, core, &generation.text) {
            Ok(response) => match self.accept_response(job, core, response, &offered, remaining) {
                ChunkResult::Enhanced { text, granted } => ChunkResult::Enhanced {
                    text: format!("{}{}{}", lead, text, trail),
                    granted,
                },
                other => other,
            },
            Err(reason) => {
                log::warn!(
                    "Section {} ('{}'): response reverted: {}",
                    index,
                    section.title,
                    reason
                );
                ChunkResult::Reverted(reason)
            }
        };
        (result, Some(usage))
    }

    /// Number of heading lines that would start a section.
    fn heading_count(&self, text: &str) -> usize {
        SectionSegmenter::with_options(self.options.segment.clone())
            .segment(text)
            .iter()
            .filter(|s| s.has_heading())
            .count()
    }

    /// Check a response against the original core text. Returns the response
    /// with any echoed heading removed.
    fn validate_response<'a>(
        &self,
        section: &Section,
        core: &str,
        response: &'a str,
    ) -> Result<&'a str, RevertReason> {
        let response = strip_echoed_heading(response.trim(), section);
        if response.is_empty() {
            return Err(RevertReason::EmptyResponse);
        }

        let budget = self.options.length_budget(core.len());
        if response.len() > budget {
            return Err(RevertReason::LengthExceeded {
                original: core.len(),
                response: response.len(),
            });
        }

        let present = citation_set(response);
        let missing: Vec<u32> = citation_set(core)
            .into_iter()
            .filter(|n| !present.contains(n))
            .collect();
        if !missing.is_empty() {
            return Err(RevertReason::MissingCitations { missing });
        }

        if self.heading_count(response) != self.heading_count(core) {
            return Err(RevertReason::StructureChanged);
        }

        if self.options.preserve_prose && strip_markers(core) != strip_markers(response) {
            return Err(RevertReason::ProseChanged);
        }

        Ok(response)
    }

    /// Keep catalog numbers the pool grants and strip every other new
    /// number.
    fn accept_response(
        &self,
        job: &SectionJob<'_>,
        core: &str,
        response: &str,
        offered: &HashSet<u32>,
        remaining: usize,
    ) -> ChunkResult {
        let (index, section) = (job.index, job.section);
        let original = citation_set(core);
        let new_numbers: Vec<u32> = extract_citations(response)
            .into_iter()
            .filter(|n| !original.contains(n))
            .collect();
        let wanted: Vec<u32> = new_numbers
            .iter()
            .copied()
            .filter(|n| offered.contains(n))
            .take(remaining)
            .collect();
        let granted = job.pool.claim_all(&wanted, index);
        if granted.is_empty() {
            return ChunkResult::NothingNew;
        }

        let strip: HashSet<u32> = new_numbers
            .iter()
            .copied()
            .filter(|n| !granted.contains(n))
            .collect();
        if !strip.is_empty() {
            log::debug!(
                "Section {} ('{}'): stripping unusable markers {:?}",
                index,
                section.title,
                strip
            );
        }
        log::info!(
            "Section {} ('{}'): added citations {:?}",
            index,
            section.title,
            granted
        );
        ChunkResult::Enhanced {
            text: remove_numbers(response, &strip),
            granted,
        }
    }
}

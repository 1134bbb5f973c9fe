//! Integration run orchestration.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;

use super::generator::TextGenerator;
use super::options::{IntegrationOptions, Scheduling};
use super::pool::CandidatePool;
use super::progress::{CancelFlag, IntegrationObserver};
use super::section::{SectionIntegrator, SectionOutcome};
use crate::error::{Error, Result};
use crate::model::{Article, ExternalCandidate, LocalReferences, SectionKind};
use crate::parser::{citation_set, SectionSegmenter};
use crate::render::{
    CitationRenumberer, CleanupOptions, CleanupPass, IntegrationOutcome, IntegrationValidator,
    ReferenceListBuilder, RunSummary, UsageMetrics,
};

/// Distinct citation numbers outside reference sections.
fn body_citations(article: &Article) -> BTreeSet<u32> {
    article
        .iter()
        .filter(|s| s.kind != SectionKind::References)
        .flat_map(|s| citation_set(&s.text()))
        .collect()
}

/// Reject candidate placeholders that clash with local numbering.
fn check_placeholders(
    pool: &CandidatePool,
    local: &LocalReferences,
    original: &BTreeSet<u32>,
) -> Result<()> {
    match pool
        .placeholders()
        .into_iter()
        .find(|p| local.contains(*p) || original.contains(p))
    {
        Some(placeholder) => Err(Error::PlaceholderCollision(placeholder)),
        None => Ok(()),
    }
}

/// Mutable state of one run, passed explicitly to every section.
struct RunContext<'a> {
    integrator: &'a SectionIntegrator,
    pool: &'a CandidatePool,
    observer: Option<&'a dyn IntegrationObserver>,
    cancel: &'a CancelFlag,
    total: usize,
    completed: AtomicUsize,
}

impl RunContext<'_> {
    fn process(&self, index: usize, section: &crate::model::Section) -> SectionOutcome {
        let outcome = if self.cancel.is_cancelled() {
            log::info!("Section {} ('{}'): run cancelled", index, section.title);
            SectionOutcome::cancelled(index, section)
        } else {
            self.integrator.integrate_section(index, section, self.pool)
        };

        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!(
            "Section {}/{} ('{}'): {}",
            done,
            self.total,
            section.title,
            outcome.status.label()
        );
        if let Some(observer) = self.observer {
            observer.on_section_progress(index, self.total, &outcome.status);
        }
        outcome
    }
}

/// Runs the full pipeline: segment, integrate, clean up, renumber, build the
/// reference list and validate.
///
/// # Example
///
/// ```
/// use citeweave::{EchoGenerator, Integrator, LocalReferences, ReferenceMetadata};
///
/// let mut local = LocalReferences::new();
/// local.insert(1, ReferenceMetadata::new("Prior Work", vec!["A. Smith".into()]));
///
/// let outcome = Integrator::new(EchoGenerator::new())
///     .run("## Introduction\nPrior work exists [1].\n", &local, Vec::new())
///     .unwrap();
/// assert_eq!(outcome.references.len(), 1);
/// ```
pub struct Integrator {
    generator: Arc<dyn TextGenerator>,
    options: IntegrationOptions,
    observer: Option<Arc<dyn IntegrationObserver>>,
    cancel: CancelFlag,
}

impl Integrator {
    /// Create an integrator with default options.
    pub fn new(generator: impl TextGenerator + 'static) -> Self {
        Self::from_arc(Arc::new(generator))
    }

    /// Create an integrator from a shared generator.
    pub fn from_arc(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            options: IntegrationOptions::default(),
            observer: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Set integration options.
    pub fn with_options(mut self, options: IntegrationOptions) -> Self {
        self.options = options;
        self
    }

    /// Set a progress observer.
    pub fn with_observer(mut self, observer: impl IntegrationObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Use an existing cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle for cancelling a run from another thread.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Options in effect.
    pub fn options(&self) -> &IntegrationOptions {
        &self.options
    }

    /// Run the pipeline over an article.
    ///
    /// Errors only for invalid options, placeholder collisions and unresolved
    /// references; collaborator failures are reported per section.
    pub fn run(
        &self,
        article: &str,
        local: &LocalReferences,
        candidates: Vec<ExternalCandidate>,
    ) -> Result<IntegrationOutcome> {
        self.options.validate()?;
        let started_at = Utc::now();
        let timer = Instant::now();

        let segmenter = SectionSegmenter::with_options(self.options.segment.clone());
        let parsed = segmenter.segment(article);
        let original = body_citations(&parsed);

        let pool = CandidatePool::new(candidates)?;
        check_placeholders(&pool, local, &original)?;

        log::info!(
            "Integrating {} sections with {} ({} selected candidates)",
            parsed.len(),
            self.generator.name(),
            pool.selected_total()
        );

        let integrator = SectionIntegrator::new(Arc::clone(&self.generator), self.options.clone());
        let context = RunContext {
            integrator: &integrator,
            pool: &pool,
            observer: self.observer.as_deref(),
            cancel: &self.cancel,
            total: parsed.len(),
            completed: AtomicUsize::new(0),
        };

        let sections: Vec<SectionOutcome> = match self.options.scheduling {
            Scheduling::Sequential => parsed
                .iter()
                .enumerate()
                .map(|(i, s)| context.process(i, s))
                .collect(),
            Scheduling::Concurrent { threads } => {
                let workers = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("citeweave-worker-{}", i))
                    .build()?;
                workers.install(|| {
                    parsed
                        .sections
                        .par_iter()
                        .enumerate()
                        .map(|(i, s)| context.process(i, s))
                        .collect()
                })
            }
        };

        // Every section is settled; numbering depends on the text alone.
        let integrated: String = parsed
            .iter()
            .zip(&sections)
            .map(|(section, outcome)| section.with_body(outcome.body.as_str()).text())
            .collect();

        let valid: BTreeSet<u32> = local.numbers().chain(pool.claimed()).collect();
        let cleanup = CleanupPass::new(
            CleanupOptions::standard()
                .with_strip_reference_sections(self.options.strip_reference_section),
        )
        .with_segment_options(self.options.segment.clone())
        .run(&integrated, &valid);

        let renumbering = CitationRenumberer::new(local.numbers().chain(original.iter().copied()))
            .renumber(&cleanup.text());
        let references =
            ReferenceListBuilder::new(local, pool.candidates()).build(&renumbering.entries)?;

        let report = IntegrationValidator::new()
            .with_external_ratio_target(self.options.external_ratio_target)
            .with_segment_options(self.options.segment.clone())
            .validate_run(&RunSummary {
                citations_before: original.len(),
                article: &renumbering.text,
                references: &references,
                renumbering: &renumbering.entries,
                selected_total: pool.selected_total(),
                sections: &sections,
                cleanup: &cleanup.report,
            });

        let mut usage = UsageMetrics::from_sections(&sections);
        usage.elapsed_ms = timer.elapsed().as_millis() as u64;

        log::info!(
            "Run finished: {} -> {} citations, {} of {} candidates used{}",
            report.citations_before,
            report.citations_after,
            report.selected_used,
            report.selected_total,
            if report.is_blocking() { " (blocking findings)" } else { "" }
        );

        Ok(IntegrationOutcome {
            article: renumbering.text,
            references,
            report,
            sections,
            renumbering: renumbering.entries,
            usage,
            provider: self.generator.name().to_string(),
            started_at,
        })
    }
}

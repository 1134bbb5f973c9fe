//! Output stage: cleanup, renumbering, reference list, validation and JSON.

mod cleanup;
mod json;
mod references;
mod renumber;
mod result;
mod validate;

pub use cleanup::{CleanupOptions, CleanupPass, CleanupPreset, CleanupReport, CleanupResult};
pub use json::{report_to_json, to_json, JsonFormat};
pub use references::{render_reference_list, ReferenceListBuilder, REFERENCES_HEADING};
pub use renumber::{renumber_article, CitationRenumberer, Renumbering, RenumberingEntry};
pub use result::{IntegrationOutcome, UsageMetrics};
pub use validate::{Finding, IntegrationValidator, RunSummary, Severity, ValidationReport};

//! JSON rendering for integration outputs.

use serde::Serialize;

use crate::error::{Error, Result};

use super::result::IntegrationOutcome;
use super::validate::ValidationReport;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

fn serialize<T: Serialize + ?Sized>(value: &T, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value),
        JsonFormat::Compact => serde_json::to_string(value),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

/// Convert a full outcome to JSON.
pub fn to_json(outcome: &IntegrationOutcome, format: JsonFormat) -> Result<String> {
    serialize(outcome, format)
}

/// Convert a validation report to JSON.
pub fn report_to_json(report: &ValidationReport, format: JsonFormat) -> Result<String> {
    serialize(report, format)
}

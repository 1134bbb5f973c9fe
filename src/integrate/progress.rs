//! Section status, progress observation and cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Why a section received no new citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Abstract sections are never modified
    Abstract,
    /// Heading with no body
    TitleOnly,
    /// Existing reference list
    References,
    /// No unused selected candidate left for this section
    NoCandidates,
    /// Nothing new in the response and no prose line to carry a fallback marker
    NoInsertionPoint,
}

/// Why a collaborator response was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum RevertReason {
    /// Response was empty after trimming
    EmptyResponse,
    /// Response exceeded the length budget
    LengthExceeded {
        /// Original body length (bytes)
        original: usize,
        /// Response length (bytes)
        response: usize,
    },
    /// Existing citation numbers were dropped
    MissingCitations {
        /// Numbers absent from the response
        missing: Vec<u32>,
    },
    /// Heading lines were added or removed
    StructureChanged,
    /// Text other than citation markers changed
    ProseChanged,
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertReason::EmptyResponse => write!(f, "empty response"),
            RevertReason::LengthExceeded { original, response } => write!(
                f,
                "response length {} exceeds budget for original length {}",
                response, original
            ),
            RevertReason::MissingCitations { missing } => {
                write!(f, "existing citations removed: {:?}", missing)
            }
            RevertReason::StructureChanged => write!(f, "heading structure was altered"),
            RevertReason::ProseChanged => write!(f, "prose was altered"),
        }
    }
}

/// Final status of one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SectionStatus {
    /// Not sent to the collaborator
    Skipped {
        /// Reason for skipping
        reason: SkipReason,
    },
    /// Collaborator response accepted with new markers
    Enhanced {
        /// Placeholders inserted
        added: Vec<u32>,
    },
    /// No new marker in the response; one was inserted deterministically
    Fallback {
        /// Placeholder inserted
        placeholder: u32,
    },
    /// Response discarded; original body kept
    Reverted {
        /// Reason for reverting
        reason: RevertReason,
    },
    /// Collaborator call failed; original body kept
    Failed {
        /// The call failure
        error: GenerationError,
    },
    /// Run cancelled before this section was processed
    Cancelled,
}

impl SectionStatus {
    /// Whether the section body changed.
    pub fn is_modified(&self) -> bool {
        matches!(
            self,
            SectionStatus::Enhanced { .. } | SectionStatus::Fallback { .. }
        )
    }

    /// Placeholders this section consumed.
    pub fn added(&self) -> Vec<u32> {
        match self {
            SectionStatus::Enhanced { added } => added.clone(),
            SectionStatus::Fallback { placeholder } => vec![*placeholder],
            _ => Vec::new(),
        }
    }

    /// Short label for logs and progress output.
    pub fn label(&self) -> &'static str {
        match self {
            SectionStatus::Skipped { .. } => "skipped",
            SectionStatus::Enhanced { .. } => "enhanced",
            SectionStatus::Fallback { .. } => "fallback",
            SectionStatus::Reverted { .. } => "reverted",
            SectionStatus::Failed { .. } => "failed",
            SectionStatus::Cancelled => "cancelled",
        }
    }
}

/// Receives one notification per section as the run progresses.
///
/// Purely observational; a run behaves the same with or without an observer.
/// Under concurrent scheduling notifications arrive in completion order.
pub trait IntegrationObserver: Send + Sync {
    /// Called once per section after it has been processed.
    fn on_section_progress(&self, _index: usize, _total: usize, _status: &SectionStatus) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl IntegrationObserver for NoopObserver {}

/// Adapter turning a closure into an observer.
pub struct FnObserver<F>(F);

impl<F> FnObserver<F>
where
    F: Fn(usize, usize, &SectionStatus) + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> IntegrationObserver for FnObserver<F>
where
    F: Fn(usize, usize, &SectionStatus) + Send + Sync,
{
    fn on_section_progress(&self, index: usize, total: usize, status: &SectionStatus) {
        (self.0)(index, total, status)
    }
}

/// Shared cancellation flag, checked before each section call.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_fn_observer() {
        let calls = AtomicUsize::new(0);
        let observer = FnObserver::new(|index, total, status: &SectionStatus| {
            assert!(index < total);
            assert_eq!(status.label(), "cancelled");
            calls.fetch_add(1, Ordering::SeqCst);
        });
        observer.on_section_progress(0, 2, &SectionStatus::Cancelled);
        observer.on_section_progress(1, 2, &SectionStatus::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_status_added() {
        assert_eq!(SectionStatus::Fallback { placeholder: 31 }.added(), vec![31]);
        assert!(SectionStatus::Enhanced { added: vec![32] }.is_modified());
        assert!(!SectionStatus::Cancelled.is_modified());
    }

    #[test]
    fn test_status_serializes_tagged() {
        let json = serde_json::to_string(&SectionStatus::Skipped {
            reason: SkipReason::NoCandidates,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"skipped","reason":"no_candidates"}"#);
    }
}

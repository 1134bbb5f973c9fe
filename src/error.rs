//! Error types for citeweave library.

use std::io;
use thiserror::Error;

use crate::model::Origin;

/// Result type alias for citeweave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can abort an integration run or one of its stages.
///
/// Failures of the text-generation collaborator are *not* represented here:
/// they are recovered per section and reported as [`GenerationError`].
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input JSON could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A candidate placeholder number is already used by the local numbering.
    #[error("Placeholder [{0}] collides with a local citation number")]
    PlaceholderCollision(u32),

    /// Two candidates share the same placeholder number.
    #[error("Duplicate candidate placeholder [{0}]")]
    DuplicatePlaceholder(u32),

    /// A renumbered citation has no metadata to back it.
    #[error("Citation [{new_number}] (was {origin} [{old_number}]) has no reference metadata")]
    UnresolvedReference {
        /// Number after renumbering
        new_number: u32,
        /// Number before renumbering
        old_number: u32,
        /// Where the old number came from
        origin: Origin,
    },

    /// An option value is out of its accepted range.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The worker pool for concurrent scheduling could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Error during rendering (Markdown, JSON).
    #[error("Rendering error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(err.to_string())
    }
}

/// Failure of a single call to the text-generation collaborator.
///
/// All variants are handled identically by the integrator: the section keeps
/// its original body and the failure is recorded in its outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GenerationError {
    /// The call did not complete within the configured timeout.
    #[error("generation timed out after {0} ms")]
    Timeout(u64),

    /// The provider rejected the call for quota or rate-limit reasons.
    #[error("provider quota exceeded: {0}")]
    Quota(String),

    /// Network or HTTP-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered but the payload was unusable.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The provider is not configured (missing key, unknown model).
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PlaceholderCollision(7);
        assert_eq!(
            err.to_string(),
            "Placeholder [7] collides with a local citation number"
        );

        let err = Error::UnresolvedReference {
            new_number: 3,
            old_number: 31,
            origin: Origin::External,
        };
        assert_eq!(
            err.to_string(),
            "Citation [3] (was external [31]) has no reference metadata"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_generation_error_display() {
        assert_eq!(
            GenerationError::Timeout(1500).to_string(),
            "generation timed out after 1500 ms"
        );
    }
}

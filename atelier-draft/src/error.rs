//! Error types for the draft engine

use atelier_api::ApiError;
use thiserror::Error;

/// Draft engine error
///
/// The benign "record not found" delete response never surfaces here; the
/// save orchestrator absorbs it as already-satisfied.
#[derive(Debug, Error)]
pub enum DraftError {
    /// Raised before any network call: unresolvable parent identifier,
    /// unknown mutation target, malformed reorder set. The batch is not
    /// started and no remote state is touched.
    #[error("validation error: {0}")]
    Validation(String),

    /// The persistence service rejected a call. `partially_applied` is true
    /// when earlier calls in the same batch had already succeeded remotely:
    /// local state is rolled back, but the remote tree may have diverged and
    /// the failure must not be presented as a clean no-op.
    #[error("persistence service error (partially applied: {partially_applied}): {source}")]
    Remote {
        #[source]
        source: ApiError,
        partially_applied: bool,
    },
}

impl DraftError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DraftError::Validation(message.into())
    }

    /// A remote failure outside any batch (e.g. a content fetch): by
    /// definition nothing was applied.
    pub(crate) fn remote(source: ApiError) -> Self {
        DraftError::Remote {
            source,
            partially_applied: false,
        }
    }
}

/// Result type for draft operations
pub type Result<T> = std::result::Result<T, DraftError>;

//! Error types for rate limiting.

use crate::storage::StorageError;

/// Errors that can occur during rate limiting.
///
/// An exhausted quota is not an error: it is reported as a [`crate::RateLimitDecision`]
/// with `allowed` set to false.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The counter store could not increment or expire the client's counter.
    ///
    /// Callers decide whether to admit or reject the request; the limiter never guesses.
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
}

//! The outcome of a single rate limit evaluation.

/// Admission decision for one request, with the informational counters a caller reports
/// back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Maximum number of requests per window.
    pub limit: u32,
    /// Requests left in the current window, never negative.
    pub remaining: u32,
}

impl RateLimitDecision {
    /// Builds the decision for the `count`-th request of the current window.
    pub(crate) fn from_count(count: u64, limit: u32) -> Self {
        let used = u32::try_from(count).unwrap_or(u32::MAX);

        Self {
            allowed: count <= u64::from(limit),
            limit,
            remaining: limit.saturating_sub(used),
        }
    }
}

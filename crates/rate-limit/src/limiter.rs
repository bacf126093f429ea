//! Fixed-window request counting.

use config::RateLimitQuota;

use crate::decision::RateLimitDecision;
use crate::error::RateLimitError;
use crate::identity::ClientIdentifier;
use crate::storage::CounterStore;

/// Namespace and algorithm name of every counter key.
const KEY_PREFIX: &str = "rate_limit:fixed:";

/// Fixed-window rate limiter.
///
/// Each client gets one counter per window. The first request of a window creates the
/// counter and arms its expiry; the counter disappears `window` seconds later and the next
/// request starts a fresh window. The limiter keeps no state of its own: every decision is
/// derived from the value the store returns, so any number of tasks and server instances
/// may share one store.
pub struct FixedWindowLimiter<S> {
    store: S,
    quota: RateLimitQuota,
}

impl<S: CounterStore> FixedWindowLimiter<S> {
    /// Create a limiter admitting `quota.limit` requests per client per `quota.window`.
    pub fn new(store: S, quota: RateLimitQuota) -> Self {
        Self { store, quota }
    }

    /// The quota this limiter enforces.
    pub fn quota(&self) -> RateLimitQuota {
        self.quota
    }

    /// The store key of the counter for `identifier`.
    pub fn key(identifier: &ClientIdentifier) -> String {
        format!("{KEY_PREFIX}{identifier}")
    }

    /// Counts one request for `identifier` and decides whether it is admitted.
    ///
    /// Every call counts, including rejected ones. Store failures are returned as
    /// [`RateLimitError::StoreUnavailable`] and never turned into a decision.
    pub async fn evaluate(&self, identifier: &ClientIdentifier) -> Result<RateLimitDecision, RateLimitError> {
        let key = Self::key(identifier);

        let count = self
            .store
            .increment_with_expiry(&key, self.quota.window_secs())
            .await?;

        let decision = RateLimitDecision::from_count(count, self.quota.limit);

        log::debug!(
            "Rate limit for '{identifier}': request {count} of {}, allowed={}, remaining={}",
            self.quota.limit,
            decision.allowed,
            decision.remaining
        );

        Ok(decision)
    }
}

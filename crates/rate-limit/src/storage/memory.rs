//! In-memory counter store for single-instance deployments.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::{CounterStore, StorageError};

/// Expired counters are swept once every this many increments.
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Default)]
struct Counter {
    value: u64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// In-memory counter store.
///
/// Counters are sharded by key; an increment holds its shard's lock for the whole
/// read-modify-write, so increments of one key are serialized while different keys rarely
/// contend. An expired counter reads as absent and is recreated by the next increment.
pub struct InMemoryStorage {
    counters: DashMap<String, Counter>,
    increments: AtomicU64,
}

impl InMemoryStorage {
    /// Create a new in-memory storage instance.
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            increments: AtomicU64::new(0),
        }
    }

    /// Increments the live counter at `key`, resetting it first if it expired. Runs `arm`
    /// with the counter still locked.
    fn increment_locked(&self, key: &str, arm: impl FnOnce(&mut Counter, Instant)) -> u64 {
        self.maybe_sweep();

        let now = Instant::now();
        let mut counter = self.counters.entry(key.to_string()).or_default();

        if counter.is_expired(now) {
            *counter = Counter::default();
        }

        counter.value += 1;
        arm(&mut *counter, now);

        counter.value
    }

    fn maybe_sweep(&self) {
        if self.increments.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL != SWEEP_INTERVAL - 1 {
            return;
        }

        let now = Instant::now();
        let before = self.counters.len();

        self.counters.retain(|_, counter| !counter.is_expired(now));

        log::debug!(
            "Swept {} expired rate limit counters",
            before.saturating_sub(self.counters.len())
        );
    }

    #[cfg(test)]
    fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let counter = self.counters.get(key)?;

        counter.expires_at.map(|expires_at| expires_at.saturating_duration_since(now))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.counters.len()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for InMemoryStorage {
    async fn increment(&self, key: &str) -> Result<u64, StorageError> {
        Ok(self.increment_locked(key, |_, _| ()))
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StorageError> {
        let now = Instant::now();

        if let Some(mut counter) = self.counters.get_mut(key)
            && !counter.is_expired(now)
        {
            counter.expires_at = Some(now + Duration::from_secs(seconds));
        }

        Ok(())
    }

    async fn increment_with_expiry(&self, key: &str, seconds: u64) -> Result<u64, StorageError> {
        let count = self.increment_locked(key, |counter, now| {
            if counter.value == 1 {
                counter.expires_at = Some(now + Duration::from_secs(seconds));
            }
        });

        Ok(count)
    }
}

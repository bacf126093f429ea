//! Rate limit manager implementation.

use config::{RateLimitConfig, RateLimitQuota, StorageConfig, StorageFailurePolicy};

use crate::decision::RateLimitDecision;
use crate::error::RateLimitError;
use crate::identity::ClientIdentifier;
use crate::limiter::FixedWindowLimiter;
use crate::storage::{CounterStore, InMemoryStorage, RedisStorage, StorageError};

/// Storage backend for rate limiting, selected by configuration.
pub enum Storage {
    /// Counters local to this process.
    Memory(InMemoryStorage),
    /// Counters shared through Redis.
    Redis(RedisStorage),
}

impl Storage {
    /// Builds the configured backend. Redis storage verifies the server is reachable.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        match config {
            StorageConfig::Memory => Ok(Storage::Memory(InMemoryStorage::new())),
            StorageConfig::Redis(redis_config) => {
                let redis_storage = RedisStorage::new(redis_config).await?;
                Ok(Storage::Redis(redis_storage))
            }
        }
    }
}

impl CounterStore for Storage {
    async fn increment(&self, key: &str) -> Result<u64, StorageError> {
        match self {
            Storage::Memory(storage) => storage.increment(key).await,
            Storage::Redis(storage) => storage.increment(key).await,
        }
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StorageError> {
        match self {
            Storage::Memory(storage) => storage.expire(key, seconds).await,
            Storage::Redis(storage) => storage.expire(key, seconds).await,
        }
    }

    async fn increment_with_expiry(&self, key: &str, seconds: u64) -> Result<u64, StorageError> {
        match self {
            Storage::Memory(storage) => storage.increment_with_expiry(key, seconds).await,
            Storage::Redis(storage) => storage.increment_with_expiry(key, seconds).await,
        }
    }
}

/// Builds the limiter from the server configuration and carries the policy callers apply
/// when the store fails.
pub struct RateLimitManager {
    limiter: FixedWindowLimiter<Storage>,
    failure_policy: StorageFailurePolicy,
}

impl RateLimitManager {
    /// Create a new rate limit manager with configured storage backend.
    pub async fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let storage = Storage::from_config(&config.storage).await?;

        log::debug!(
            "Rate limiting {} requests per {}s with {} storage",
            config.limit,
            config.quota().window_secs(),
            match storage {
                Storage::Memory(_) => "memory",
                Storage::Redis(_) => "redis",
            }
        );

        Ok(Self::with_storage(storage, config.quota(), config.on_storage_error))
    }

    /// Create a manager around an existing storage backend.
    pub fn with_storage(storage: Storage, quota: RateLimitQuota, failure_policy: StorageFailurePolicy) -> Self {
        Self {
            limiter: FixedWindowLimiter::new(storage, quota),
            failure_policy,
        }
    }

    /// Counts a request for `identifier` and decides whether it is admitted.
    pub async fn evaluate(&self, identifier: &ClientIdentifier) -> Result<RateLimitDecision, RateLimitError> {
        self.limiter.evaluate(identifier).await
    }

    /// What callers should do with a request when [`Self::evaluate`] fails.
    pub fn failure_policy(&self) -> StorageFailurePolicy {
        self.failure_policy
    }

    /// The enforced quota.
    pub fn quota(&self) -> RateLimitQuota {
        self.limiter.quota()
    }
}

//! Counter stores backing the fixed-window limiter.

use std::time::Duration;

pub mod memory;
pub mod redis;
mod redis_pool;

pub use memory::InMemoryStorage;
pub use redis::RedisStorage;

/// A shared key-value store with atomic counters that expire.
///
/// Every request-handling task increments through the same store; the store's atomic
/// increment is the only synchronization between them.
#[allow(async_fn_in_trait)]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the counter at `key`, creating it with value 1 if absent, and
    /// returns the new value.
    ///
    /// Concurrent increments of one key never return the same value and are never lost.
    async fn increment(&self, key: &str) -> Result<u64, StorageError>;

    /// Arms or resets the time-to-live of the counter at `key`. A no-op if the key does not
    /// exist anymore.
    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StorageError>;

    /// Increments the counter at `key` and arms its expiry when this call created it.
    ///
    /// The provided implementation issues two commands, so a counter can briefly exist
    /// without a time-to-live. Stores with an atomic equivalent override it.
    async fn increment_with_expiry(&self, key: &str, seconds: u64) -> Result<u64, StorageError> {
        let count = self.increment(key).await?;

        if count == 1 {
            self.expire(key, seconds).await?;
        }

        Ok(count)
    }
}

/// Errors that can occur in storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Could not connect to the store or get a connection from the pool.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The store rejected or failed a command.
    #[error("Query error: {0}")]
    Query(String),
    /// The store did not answer in time.
    #[error("Storage did not respond within {0:?}")]
    Timeout(Duration),
}

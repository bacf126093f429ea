//! Redis counter store, shared by every server instance using the same database.

use std::time::Duration;

use redis::{RedisError, Script};
use telemetry::metrics::{RATE_LIMIT_STORAGE_DURATION, Recorder};

use super::redis_pool::{self, Pool};
use super::{CounterStore, StorageError};
use config::RedisConfig;

/// Increments the counter and arms its expiry in one server-side step, so a crash between
/// the two can never leave a counter that lives forever.
const INCREMENT_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis-based counter store.
///
/// Keys are stored as `<key_prefix><key>` with a decimal integer value and a TTL in seconds.
pub struct RedisStorage {
    pool: Pool,
    key_prefix: String,
    response_timeout: Duration,
    atomic_expiry: bool,
    script: Script,
}

impl RedisStorage {
    /// Create a new Redis storage instance and verify the server is reachable.
    pub async fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        let storage = Self::lazy(config)?;

        storage
            .run("ping", async {
                let mut conn = storage.connection().await?;
                Ok(redis::cmd("PING").query_async::<String>(&mut *conn).await?)
            })
            .await?;

        log::debug!("Connected to Redis rate limit storage");

        Ok(storage)
    }

    /// Create a Redis storage instance without contacting the server. Connections are opened
    /// by the first command, so an unreachable server surfaces as a per-request error.
    pub fn lazy(config: &RedisConfig) -> Result<Self, StorageError> {
        let pool = redis_pool::create_pool(config)
            .map_err(|e| StorageError::Connection(format!("Failed to create Redis connection pool: {e}")))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone().unwrap_or_default(),
            response_timeout: config.response_timeout,
            atomic_expiry: config.atomic_expiry,
            script: Script::new(INCREMENT_WITH_EXPIRY),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    async fn connection(&self) -> Result<deadpool::managed::Object<redis_pool::Manager>, CommandError> {
        self.pool
            .get()
            .await
            .map_err(|e| CommandError::Connection(format!("Failed to get Redis connection from pool: {e}")))
    }

    /// Runs one store operation under the response timeout and records its duration.
    async fn run<T>(
        &self,
        operation: &'static str,
        command: impl Future<Output = Result<T, CommandError>>,
    ) -> Result<T, StorageError> {
        let mut recorder = Recorder::new(RATE_LIMIT_STORAGE_DURATION);
        recorder.push_attribute("rate_limit.storage.operation", operation);

        let result = match tokio::time::timeout(self.response_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(CommandError::Connection(message))) => Err(StorageError::Connection(message)),
            Ok(Err(CommandError::Redis(error))) => Err(classify(error)),
            Err(_) => Err(StorageError::Timeout(self.response_timeout)),
        };

        let status = match &result {
            Ok(_) => "success",
            Err(StorageError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };

        recorder.push_attribute("rate_limit.storage.status", status);
        recorder.record();

        if let Err(ref error) = result {
            log::error!("Redis {operation} failed: {error}");
        }

        result
    }
}

impl CounterStore for RedisStorage {
    async fn increment(&self, key: &str) -> Result<u64, StorageError> {
        let key = self.key(key);

        self.run("incr", async {
            let mut conn = self.connection().await?;
            Ok(redis::cmd("INCR").arg(&key).query_async::<u64>(&mut *conn).await?)
        })
        .await
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StorageError> {
        let key = self.key(key);

        self.run("expire", async {
            let mut conn = self.connection().await?;
            Ok(redis::cmd("EXPIRE")
                .arg(&key)
                .arg(seconds)
                .query_async::<()>(&mut *conn)
                .await?)
        })
        .await
    }

    async fn increment_with_expiry(&self, key: &str, seconds: u64) -> Result<u64, StorageError> {
        if !self.atomic_expiry {
            let count = self.increment(key).await?;

            if count == 1 {
                self.expire(key, seconds).await?;
            }

            return Ok(count);
        }

        let key = self.key(key);

        self.run("incr_expire", async {
            let mut conn = self.connection().await?;
            Ok(self
                .script
                .key(&key)
                .arg(seconds)
                .invoke_async::<u64>(&mut *conn)
                .await?)
        })
        .await
    }
}

/// Failure of a single command before it is mapped to a [`StorageError`].
enum CommandError {
    Connection(String),
    Redis(RedisError),
}

impl From<RedisError> for CommandError {
    fn from(error: RedisError) -> Self {
        Self::Redis(error)
    }
}

fn classify(error: RedisError) -> StorageError {
    if error.is_io_error() || error.is_connection_refusal() || error.is_connection_dropped() {
        StorageError::Connection(error.to_string())
    } else {
        StorageError::Query(error.to_string())
    }
}

//! Rate limiting configuration structures.

use std::time::Duration;

use duration_str::{deserialize_duration, deserialize_option_duration};
use serde::Deserialize;

/// Rate limiting configuration for the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// Maximum number of admitted requests per client within one window.
    pub limit: u32,
    /// Length of the fixed window.
    #[serde(deserialize_with = "deserialize_duration")]
    pub window: Duration,
    /// What to do with a request when the counter store cannot be reached.
    pub on_storage_error: StorageFailurePolicy,
    /// Storage backend configuration.
    pub storage: StorageConfig,
}

impl RateLimitConfig {
    /// The quota a limiter is constructed with.
    pub fn quota(&self) -> RateLimitQuota {
        RateLimitQuota {
            limit: self.limit,
            window: self.window,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let quota = RateLimitQuota::default();

        Self {
            enabled: false,
            limit: quota.limit,
            window: quota.window,
            on_storage_error: StorageFailurePolicy::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Request limit and window length of a fixed-window limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitQuota {
    /// Maximum number of requests allowed within the window.
    pub limit: u32,
    /// Time window for the rate limit.
    pub window: Duration,
}

impl RateLimitQuota {
    /// Window length in whole seconds, as the counter store expresses expiry.
    ///
    /// Never zero, so a counter always expires.
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

impl Default for RateLimitQuota {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Decides the outcome of a request when the counter store fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFailurePolicy {
    /// Reject the request (fail closed).
    #[default]
    Deny,
    /// Let the request through without a decision (fail open). The counter may still have
    /// been incremented when only arming its expiry failed.
    Allow,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (default).
    #[default]
    Memory,
    /// Redis storage with configuration.
    Redis(Box<RedisConfig>),
}

/// Redis storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Redis connection URL (redis:// or rediss:// for TLS).
    pub url: String,
    /// Connection pool configuration.
    #[serde(default)]
    pub pool: RedisPoolConfig,
    /// TLS configuration.
    pub tls: Option<RedisTlsConfig>,
    /// Prefix prepended to every rate limit key.
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// Response timeout for Redis commands.
    #[serde(default = "default_response_timeout", deserialize_with = "deserialize_duration")]
    pub response_timeout: Duration,
    /// Increment and arm the expiry in a single server-side script.
    ///
    /// Disable for Redis-compatible servers without `EVAL` support. The counter is then
    /// incremented and expired in two separate commands.
    #[serde(default = "default_atomic_expiry")]
    pub atomic_expiry: bool,
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_atomic_expiry() -> bool {
    true
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            pool: RedisPoolConfig::default(),
            tls: None,
            key_prefix: None,
            response_timeout: default_response_timeout(),
            atomic_expiry: default_atomic_expiry(),
        }
    }
}

/// Redis connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisPoolConfig {
    /// Maximum number of connections.
    pub max_size: Option<usize>,
    /// Timeout for creating connections.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_create: Option<Duration>,
    /// Timeout for waiting for a connection.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_wait: Option<Duration>,
    /// Timeout before recycling idle connections.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_recycle: Option<Duration>,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            max_size: Some(16),
            timeout_create: Some(Duration::from_secs(5)),
            timeout_wait: Some(Duration::from_secs(5)),
            timeout_recycle: Some(Duration::from_secs(300)),
        }
    }
}

/// Redis TLS configuration, used with rediss:// URLs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisTlsConfig {
    /// Path to CA certificate file.
    pub ca_cert_path: Option<String>,
    /// Path to client certificate file (for mutual TLS).
    pub client_cert_path: Option<String>,
    /// Path to client key file (for mutual TLS).
    pub client_key_path: Option<String>,
}

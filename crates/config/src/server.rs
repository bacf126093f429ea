//! HTTP server configuration settings.

use std::{borrow::Cow, net::SocketAddr, path::PathBuf};

use serde::Deserialize;

use crate::{ClientIpConfig, RateLimitConfig};

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on. The command line flag takes precedence.
    pub listen_address: Option<SocketAddr>,
    /// Serve HTTPS with this certificate instead of plain HTTP.
    pub tls: Option<TlsServerConfig>,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
    /// How the client address is determined for rate limiting.
    #[serde(default)]
    pub client_ip: ClientIpConfig,
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

/// Certificate and key, both PEM encoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Path to the certificate chain.
    pub certificate: PathBuf,
    /// Path to the private key.
    pub key: PathBuf,
}

/// Health endpoint configuration. The endpoint is never rate limited.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is served.
    pub enabled: bool,
    /// Serve the endpoint on its own listener instead of the main one.
    pub listen: Option<SocketAddr>,
    /// The path for the health endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            listen: None,
            path: Cow::Borrowed("/health"),
        }
    }
}

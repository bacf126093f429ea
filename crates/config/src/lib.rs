//! Gatekeeper configuration structures to map the gatekeeper.toml configuration.

#![deny(missing_docs)]

mod client_ip;
mod loader;
mod rate_limit;
mod server;
mod telemetry;

use std::path::Path;

pub use client_ip::ClientIpConfig;
pub use rate_limit::*;
use serde::Deserialize;
pub use server::{HealthConfig, ServerConfig, TlsServerConfig};
pub use telemetry::{ExportersConfig, OtlpExporterConfig, OtlpProtocol, TelemetryConfig};

/// Main configuration structure for the Gatekeeper application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Telemetry configuration settings.
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the settings, returning warnings for values that were adjusted.
    pub fn validate(&self) -> anyhow::Result<Vec<String>> {
        loader::validate(self)
    }
}

//! Client address resolution settings.

use serde::Deserialize;

/// Controls which request metadata may identify a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientIpConfig {
    /// Use the first `X-Forwarded-For` entry when the connection has no transport address.
    ///
    /// Only enable this when the server sits behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for ClientIpConfig {
    fn default() -> Self {
        Self {
            trust_forwarded_for: true,
        }
    }
}

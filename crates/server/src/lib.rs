//! Gatekeeper server library.
//!
//! Provides a reusable server function to serve Gatekeeper either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod health;
mod metrics;
mod rate_limit;

use std::{net::SocketAddr, sync::Arc};

use ::rate_limit::RateLimitManager;
use anyhow::anyhow;
use axum::{Router, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use self::metrics::MetricsLayer;
use self::rate_limit::RateLimitLayer;
use tokio::net::TcpListener;

pub use self::rate_limit::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};

/// Path of the rate limited welcome page.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Configuration for serving Gatekeeper.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized Gatekeeper TOML configuration.
    pub config: Config,
}

/// Starts and runs the Gatekeeper server with the provided configuration.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    config.validate()?;

    let _telemetry = config.telemetry.as_ref().map(telemetry::init).transpose()?;

    let mut app = Router::new();
    let mut protected_router = Router::new().route(DASHBOARD_PATH, get(dashboard));

    let rate_limits = &config.server.rate_limits;

    if rate_limits.enabled {
        let manager = RateLimitManager::new(rate_limits)
            .await
            .map_err(|e| anyhow!("Failed to initialize rate limiting: {e}"))?;

        log::debug!("Applying HTTP rate limiting middleware to protected routes");

        let layer = RateLimitLayer::new(Arc::new(manager), config.server.client_ip.trust_forwarded_for);
        protected_router = protected_router.layer(layer);
    } else {
        log::warn!("Rate limiting is disabled, {DASHBOARD_PATH} is served without limits");
    }

    app = app.merge(protected_router);

    // Health is added after the rate limit layer so it is never counted.
    if config.server.health.enabled {
        if let Some(listen) = config.server.health.listen {
            tokio::spawn(health::bind_health_endpoint(
                listen,
                config.server.tls.clone(),
                config.server.health.clone(),
            ));
        } else {
            app = app.route(&config.server.health.path, get(health::health));
        }
    }

    let app = app.layer(MetricsLayer);

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    // Peer addresses identify clients, so the service must carry connect info.
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    match &config.server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("Dashboard available at: https://{listen_address}{DASHBOARD_PATH}");

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(make_service)
                .await
                .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
        }
        None => {
            log::info!("Dashboard available at: http://{listen_address}{DASHBOARD_PATH}");

            axum::serve(listener, make_service)
                .await
                .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
        }
    }

    Ok(())
}

async fn dashboard() -> &'static str {
    "Welcome to the Gatekeeper dashboard!"
}

//! Metrics for Gatekeeper.
//!
//! Instruments record through the global OpenTelemetry meter. Until [`init`] installs an
//! exporting provider, the global meter is a no-op and recording costs next to nothing.

pub mod metrics;

use config::TelemetryConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;

pub use opentelemetry::KeyValue;

/// Keeps the exporting meter provider alive. Dropping it exports pending measurements and
/// shuts the provider down.
pub struct TelemetryGuard {
    meter_provider: Option<SdkMeterProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.meter_provider.take() else {
            return;
        };

        if let Err(e) = provider.shutdown() {
            log::error!("Failed to shutdown meter provider: {e}");
        }
    }
}

/// Installs the configured metrics exporter as the global meter provider.
///
/// Keep the returned guard alive for as long as metrics should be exported.
pub fn init(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let meter_provider = metrics::init_metrics(config)?;

    Ok(TelemetryGuard { meter_provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_exporter_installs_nothing() {
        let guard = init(&TelemetryConfig::default()).unwrap();

        assert!(guard.meter_provider.is_none());
    }
}

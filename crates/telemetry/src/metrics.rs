//! Metrics initialization and recording helpers

mod names;
mod recorder;

pub use names::*;
pub use recorder::Recorder;

use anyhow::Context;
use config::{OtlpExporterConfig, OtlpProtocol, TelemetryConfig};
use opentelemetry::{KeyValue, metrics::Meter};
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
};

const METER_NAME: &str = "gatekeeper";

/// Get the global meter for recording metrics
pub fn meter() -> Meter {
    opentelemetry::global::meter(METER_NAME)
}

/// Builds and installs the exporting meter provider. Returns `None` when no exporter is
/// enabled, leaving the global no-op provider in place.
pub(crate) fn init_metrics(config: &TelemetryConfig) -> anyhow::Result<Option<SdkMeterProvider>> {
    let Some(exporter_config) = config.metrics_otlp_config() else {
        log::debug!("No metrics exporter enabled, metrics will not be exported");
        return Ok(None);
    };

    let reader = PeriodicReader::builder(exporter(exporter_config)?)
        .with_interval(exporter_config.export_interval)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource(config))
        .with_reader(reader)
        .build();

    opentelemetry::global::set_meter_provider(provider.clone());

    log::info!(
        "Exporting metrics for service '{}' to {} via {:?}",
        config.service_name().unwrap_or(METER_NAME),
        exporter_config.endpoint(),
        exporter_config.protocol
    );

    Ok(Some(provider))
}

fn resource(config: &TelemetryConfig) -> Resource {
    let attributes = config
        .resource_attributes()
        .iter()
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()));

    Resource::builder()
        .with_service_name(config.service_name().unwrap_or(METER_NAME).to_string())
        .with_attributes(attributes)
        .build()
}

fn exporter(config: &OtlpExporterConfig) -> anyhow::Result<MetricExporter> {
    let endpoint = config.endpoint().into_owned();

    match config.protocol {
        OtlpProtocol::Grpc => MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .with_timeout(config.timeout)
            .build()
            .context("Failed to create gRPC OTLP metric exporter"),
        OtlpProtocol::Http => MetricExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .with_timeout(config.timeout)
            .build()
            .context("Failed to create HTTP OTLP metric exporter"),
    }
}

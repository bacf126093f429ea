//! Metrics export settings.

use std::{borrow::Cow, collections::BTreeMap, time::Duration};

use duration_str::deserialize_duration;
use serde::Deserialize;
use url::Url;

/// Telemetry configuration. Only metrics are exported; logs go to stdout.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name for telemetry identification
    service_name: Option<String>,
    /// Custom resource attributes to attach to all metrics
    resource_attributes: BTreeMap<String, String>,
    /// Where metrics are sent
    exporters: ExportersConfig,
}

impl TelemetryConfig {
    /// Get the service name
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Get the resource attributes
    pub fn resource_attributes(&self) -> &BTreeMap<String, String> {
        &self.resource_attributes
    }

    /// The OTLP exporter for metrics, if one is enabled.
    pub fn metrics_otlp_config(&self) -> Option<&OtlpExporterConfig> {
        let otlp = &self.exporters.otlp;
        otlp.enabled.then_some(otlp)
    }
}

/// Exporters configuration for telemetry
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExportersConfig {
    /// OTLP exporter configuration
    pub otlp: OtlpExporterConfig,
}

/// OTLP exporter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OtlpExporterConfig {
    /// Whether this exporter is enabled
    pub enabled: bool,
    /// Collector URL. Defaults to the standard local port of the selected protocol.
    pub endpoint: Option<Url>,
    /// Protocol to use (grpc or http)
    pub protocol: OtlpProtocol,
    /// Export request timeout
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Interval between two metric exports
    #[serde(deserialize_with = "deserialize_duration")]
    pub export_interval: Duration,
}

impl OtlpExporterConfig {
    /// The collector URL metrics are sent to.
    pub fn endpoint(&self) -> Cow<'_, str> {
        match (&self.endpoint, &self.protocol) {
            (Some(url), _) => Cow::Borrowed(url.as_str()),
            (None, OtlpProtocol::Grpc) => Cow::Borrowed("http://localhost:4317"),
            (None, OtlpProtocol::Http) => Cow::Borrowed("http://localhost:4318/v1/metrics"),
        }
    }
}

impl Default for OtlpExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            protocol: OtlpProtocol::default(),
            timeout: Duration::from_secs(10),
            export_interval: Duration::from_secs(60),
        }
    }
}

/// OTLP protocol selection
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    /// gRPC protocol (default)
    #[default]
    Grpc,
    /// HTTP/protobuf protocol
    Http,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn metrics_exporter_disabled_by_default() {
        let config = TelemetryConfig::default();

        assert!(config.metrics_otlp_config().is_none());
    }

    #[test]
    fn endpoint_defaults_follow_protocol() {
        let grpc = OtlpExporterConfig::default();
        let http = OtlpExporterConfig {
            protocol: OtlpProtocol::Http,
            ..Default::default()
        };

        assert_eq!(grpc.endpoint(), "http://localhost:4317");
        assert_eq!(http.endpoint(), "http://localhost:4318/v1/metrics");
    }

    #[test]
    fn otlp_exporter() {
        let config = indoc! {r#"
            service_name = "gatekeeper"

            [resource_attributes]
            "deployment.environment" = "staging"

            [exporters.otlp]
            enabled = true
            endpoint = "http://collector:4318/v1/metrics"
            protocol = "http"
            timeout = "5s"
            export_interval = "15s"
        "#};

        let config: TelemetryConfig = toml::from_str(config).unwrap();

        assert_eq!(config.service_name(), Some("gatekeeper"));
        assert_eq!(config.resource_attributes()["deployment.environment"], "staging");

        let otlp = config.metrics_otlp_config().unwrap();

        assert_eq!(otlp.endpoint(), "http://collector:4318/v1/metrics");
        assert_eq!(otlp.protocol, OtlpProtocol::Http);
        assert_eq!(otlp.timeout, Duration::from_secs(5));
        assert_eq!(otlp.export_interval, Duration::from_secs(15));
    }

    #[test]
    fn unknown_exporter_fields_are_rejected() {
        let config = indoc! {r#"
            [exporters.otlp]
            enabled = true
            headers = { authorization = "secret" }
        "#};

        let error = toml::from_str::<TelemetryConfig>(config).unwrap_err();

        assert!(error.to_string().contains("unknown field `headers`"), "{error}");
    }
}

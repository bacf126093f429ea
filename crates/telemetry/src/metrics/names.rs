//! Metric names. The HTTP metric follows the OpenTelemetry semantic conventions:
//! https://opentelemetry.io/docs/specs/semconv/http/http-metrics/

/// HTTP server request duration in seconds
pub const HTTP_SERVER_REQUEST_DURATION: &str = "http.server.request.duration";

/// Number of rate limit decisions, tagged with `rate_limit.outcome`
pub const RATE_LIMIT_DECISIONS: &str = "rate_limit.decisions";

/// Counter store command duration in seconds, tagged with the operation and its status
pub const RATE_LIMIT_STORAGE_DURATION: &str = "rate_limit.storage.duration";

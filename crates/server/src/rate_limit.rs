//! Rate limiting middleware for HTTP requests.
//!
//! Resolves the client of every request, asks the limiter for a decision and translates it
//! to HTTP: informational headers on admitted responses, `429` on rejection, and the
//! configured store-failure policy when the limiter cannot decide.

use std::{
    fmt::Display,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    extract::ConnectInfo,
    response::{IntoResponse, Response},
};
use config::StorageFailurePolicy;
use http::{HeaderName, HeaderValue, Request, StatusCode};
use opentelemetry::metrics::Counter;
use rate_limit::{ClientIdentifier, RateLimitDecision, RateLimitManager};
use telemetry::{KeyValue, metrics::RATE_LIMIT_DECISIONS};
use tower::Layer;

/// Maximum number of requests per window.
pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";

/// Requests left in the current window.
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct RateLimitLayer {
    manager: Arc<RateLimitManager>,
    trust_forwarded_for: bool,
    decisions: Counter<u64>,
}

impl RateLimitLayer {
    /// Builds the layer. The decision counter comes from the global meter, so telemetry must be
    /// initialized first.
    pub fn new(manager: Arc<RateLimitManager>, trust_forwarded_for: bool) -> Self {
        let meter = telemetry::metrics::meter();

        Self {
            manager,
            trust_forwarded_for,
            decisions: meter.u64_counter(RATE_LIMIT_DECISIONS).build(),
        }
    }
}

impl<Service> Layer<Service> for RateLimitLayer
where
    Service: Send + Clone,
{
    type Service = RateLimitService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        RateLimitService {
            next,
            manager: self.manager.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
            decisions: self.decisions.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<Service> {
    next: Service,
    manager: Arc<RateLimitManager>,
    trust_forwarded_for: bool,
    decisions: Counter<u64>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for RateLimitService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let manager = self.manager.clone();
        let decisions = self.decisions.clone();
        let identifier = client_identifier(&req, self.trust_forwarded_for);

        if identifier.is_unknown() {
            log::debug!("Request carries no client address, counting it against the shared '{identifier}' client");
        }

        let record_outcome = move |outcome: &'static str| {
            decisions.add(1, &[KeyValue::new("rate_limit.outcome", outcome)]);
        };

        Box::pin(async move {
            let decision = match manager.evaluate(&identifier).await {
                Ok(decision) => decision,
                Err(error) => {
                    record_outcome("error");

                    return match manager.failure_policy() {
                        StorageFailurePolicy::Deny => {
                            log::error!("Rejecting request from '{identifier}', rate limiter unavailable: {error}");
                            Ok(service_unavailable())
                        }
                        StorageFailurePolicy::Allow => {
                            log::warn!("Admitting request from '{identifier}' without rate limiting: {error}");
                            next.call(req).await
                        }
                    };
                }
            };

            if !decision.allowed {
                record_outcome("denied");
                log::debug!("Request from '{identifier}' rejected due to rate limit");

                return Ok(too_many_requests());
            }

            record_outcome("allowed");

            let mut response = next.call(req).await?;
            insert_headers(&mut response, decision);

            Ok(response)
        })
    }
}

/// Identifies the client by the connection's peer address. The first `X-Forwarded-For`
/// entry is only consulted without a peer address, and only when trusted.
fn client_identifier<B>(req: &Request<B>, trust_forwarded_for: bool) -> ClientIdentifier {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return ClientIdentifier::from_ip(addr.ip());
    }

    let forwarded_for = req
        .headers()
        .get(X_FORWARDED_FOR)
        .filter(|_| trust_forwarded_for)
        .and_then(|value| value.to_str().ok());

    ClientIdentifier::resolve(None, forwarded_for)
}

fn insert_headers(response: &mut Response<Body>, decision: RateLimitDecision) {
    let headers = response.headers_mut();

    headers.insert(HeaderName::from_static(X_RATELIMIT_LIMIT), HeaderValue::from(decision.limit));
    headers.insert(HeaderName::from_static(X_RATELIMIT_REMAINING), HeaderValue::from(decision.remaining));
}

fn too_many_requests() -> Response<Body> {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(X_RATELIMIT_REMAINING, HeaderValue::from(0u32))],
        "Too Many Requests",
    )
        .into_response()
}

fn service_unavailable() -> Response<Body> {
    (StatusCode::SERVICE_UNAVAILABLE, "Rate limiter unavailable").into_response()
}

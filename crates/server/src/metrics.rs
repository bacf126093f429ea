//! HTTP metrics middleware
//!
//! Records `http.server.request.duration` for every routed request. Rejections of the rate
//! limiter are recorded too, tagged with their status, so `429` and `503` answers show up
//! next to the handler's responses.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{body::Body, extract::MatchedPath};
use http::{Request, Response};
use telemetry::metrics::{HTTP_SERVER_REQUEST_DURATION, Recorder};
use tower::Layer;

#[derive(Clone, Default)]
pub struct MetricsLayer;

impl<Service> Layer<Service> for MetricsLayer
where
    Service: Send + Clone,
{
    type Service = MetricsService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        MetricsService { next }
    }
}

#[derive(Clone)]
pub struct MetricsService<Service> {
    next: Service,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for MetricsService<Service>
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
        let mut recorder = Recorder::new(HTTP_SERVER_REQUEST_DURATION);
        recorder.push_attribute("http.request.method", req.method().to_string());
        recorder.push_attribute("http.route", route(&req));

        let mut next = self.next.clone();

        Box::pin(async move {
            let response = next.call(req).await?;
            let status = response.status();

            recorder.push_attribute("http.response.status_code", i64::from(status.as_u16()));

            if status.is_client_error() || status.is_server_error() {
                recorder.push_attribute("error.type", status.as_str().to_owned());
            }

            recorder.record();

            Ok(response)
        })
    }
}

/// The route template of the request, never the raw path, to keep attribute cardinality low.
fn route<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str().to_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

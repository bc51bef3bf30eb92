//! Request IDs that follow a reservation across services.
//!
//! The layer reads `X-Request-ID` (or mints one), stores it in the request
//! extensions, runs the handler inside an `http_request` span carrying it and
//! echoes it on the response. Handlers that call another service take the
//! [`RequestId`] extractor and forward the header, so the orchestrator's log
//! lines and the seat/train service's log lines share one id.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api/v1/reservations", post(create_reservation))
//!     .layer(request_id_layer());
//! ```

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, request::Parts},
    response::Response,
};
use std::convert::Infallible;
use std::fmt;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Identifier of one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Mint a fresh ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a header value; anything that isn't a UUID is ignored.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extracts the ID set by the layer, or mints one when the layer is absent.
#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .copied()
            .unwrap_or_default())
    }
}

/// Create the request ID layer.
#[must_use]
pub const fn request_id_layer() -> RequestIdLayer {
    RequestIdLayer
}

/// Layer for request ID tracking.
#[derive(Clone, Debug)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

/// Middleware service for request ID tracking.
#[derive(Clone, Debug)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for RequestIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(RequestId::parse)
            .unwrap_or_default();

        req.extensions_mut().insert(request_id);

        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use axum_test::TestServer;

    fn app() -> Router {
        Router::new()
            .route("/echo", get(|id: RequestId| async move { id.to_string() }))
            .layer(request_id_layer())
    }

    #[tokio::test]
    async fn mints_id_when_missing() {
        let server = TestServer::new(app()).unwrap();
        let response = server.get("/echo").await;

        let header = response.header(REQUEST_ID_HEADER);
        let header = header.to_str().unwrap();
        assert!(RequestId::parse(header).is_some());
        assert_eq!(response.text(), header);
    }

    #[tokio::test]
    async fn keeps_caller_id() {
        let server = TestServer::new(app()).unwrap();
        let id = RequestId::new();

        let response = server
            .get("/echo")
            .add_header(
                REQUEST_ID_HEADER.parse::<axum::http::HeaderName>().unwrap(),
                id.to_string().parse::<HeaderValue>().unwrap(),
            )
            .await;

        assert_eq!(response.text(), id.to_string());
    }

    #[tokio::test]
    async fn replaces_garbage_id() {
        let server = TestServer::new(app()).unwrap();
        let response = server
            .get("/echo")
            .add_header(
                REQUEST_ID_HEADER.parse::<axum::http::HeaderName>().unwrap(),
                HeaderValue::from_static("not-a-uuid"),
            )
            .await;

        assert_ne!(response.text(), "not-a-uuid");
        assert!(RequestId::parse(&response.text()).is_some());
    }
}

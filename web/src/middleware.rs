//! Axum middleware binding a correlation ID to every request.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use correlate_web::middleware::correlation_id_layer;
//!
//! let app = Router::new()
//!     .route("/api/users", get(list_users))
//!     .layer(correlation_id_layer(&context));
//! ```
//!
//! # Flow
//!
//! 1. **Enter** a new operation scope for the request
//! 2. **Bind** the ID from the configured header, or generate one
//! 3. **Store** it in request extensions for handler access
//! 4. **Instrument** the handler with an `http_request` span carrying `correlation_id`
//! 5. **Write** the ID into the response header
//!
//! A request dispatched from inside a handler (for example through
//! `Router::oneshot`) runs in a nested scope. The edge leaves it alone: no
//! ID is bound and its response header is not written.

use crate::extractors::CorrelationId;
use axum::{extract::Request, response::Response};
use correlate_core::{CorrelationContext, HttpEdge, storage};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;

/// Create a layer running the context's HTTP edge around every request.
#[must_use]
pub fn correlation_id_layer(context: &CorrelationContext) -> CorrelationIdLayer {
    CorrelationIdLayer::new(context.http())
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer {
    edge: HttpEdge,
}

impl CorrelationIdLayer {
    /// Wrap an HTTP edge.
    #[must_use]
    pub const fn new(edge: HttpEdge) -> Self {
        Self { edge }
    }
}

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware {
            inner,
            edge: self.edge.clone(),
        }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
    edge: HttpEdge,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let edge = self.edge.clone();

        Box::pin(storage::scope(async move {
            edge.on_request(req.headers());

            let correlation_id = edge.storage().get();
            req.extensions_mut()
                .insert(CorrelationId(correlation_id.clone()));
            req.extensions_mut().insert(edge.storage().clone());

            let span = tracing::info_span!(
                "http_request",
                correlation_id = correlation_id.as_deref().unwrap_or_default(),
                method = %req.method(),
                uri = %req.uri(),
            );

            let mut response = inner.call(req).instrument(span).await?;

            edge.on_response(response.headers_mut());

            Ok(response)
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use correlate_core::{CorrelationConfig, Operation};
    use correlate_testing::{context_with, test_context};
    use tower::ServiceExt;

    const HEADER: &str = "X-Correlation-ID";

    fn app(context: &CorrelationContext) -> Router {
        let storage = context.storage().clone();
        Router::new()
            .route(
                "/test",
                get(move || async move { storage.get().unwrap_or_default() }),
            )
            .layer(correlation_id_layer(context))
    }

    fn request(header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = header {
            builder = builder.header(HEADER, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_correlation_id_generated_if_missing() {
        let context = test_context("uuid-123");

        let response = app(&context).oneshot(request(None)).await.unwrap();

        assert_eq!(response.headers()[HEADER], "uuid-123");
        assert_eq!(body_text(response).await, "uuid-123");
    }

    #[tokio::test]
    async fn test_correlation_id_preserved_from_request() {
        let context = test_context("uuid-123");

        let response = app(&context)
            .oneshot(request(Some("abc-123")))
            .await
            .unwrap();

        assert_eq!(response.headers()[HEADER], "abc-123");
        assert_eq!(body_text(response).await, "abc-123");
    }

    #[tokio::test]
    async fn test_empty_header_generates_new() {
        let context = test_context("uuid-123");

        let response = app(&context).oneshot(request(Some(""))).await.unwrap();

        assert_eq!(response.headers()[HEADER], "uuid-123");
    }

    #[tokio::test]
    async fn test_invalid_header_generates_new() {
        let context = test_context("uuid-123");

        let response = app(&context)
            .oneshot(request(Some("<script>alert(1)</script>")))
            .await
            .unwrap();

        assert_eq!(response.headers()[HEADER], "uuid-123");
    }

    #[tokio::test]
    async fn test_untrusted_header_is_ignored() {
        let config = CorrelationConfig {
            trust_header: false,
            ..CorrelationConfig::default()
        };
        let context = context_with(config, "uuid-123");

        let response = app(&context)
            .oneshot(request(Some("abc-123")))
            .await
            .unwrap();

        assert_eq!(response.headers()[HEADER], "uuid-123");
    }

    #[tokio::test]
    async fn test_custom_header_name() {
        let config = CorrelationConfig {
            header_name: "X-Request-ID".to_string(),
            ..CorrelationConfig::default()
        };
        let context = context_with(config, "uuid-123");

        let req = Request::builder()
            .uri("/test")
            .header("X-Request-ID", "req-7")
            .header(HEADER, "ignored")
            .body(Body::empty())
            .unwrap();
        let response = app(&context).oneshot(req).await.unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-7");
        assert!(response.headers().get(HEADER).is_none());
    }

    #[tokio::test]
    async fn test_handler_header_is_overwritten() {
        let context = test_context("uuid-123");
        let app = Router::new()
            .route(
                "/test",
                get(|| async { ([(HEADER, "from-handler")], "ok") }),
            )
            .layer(correlation_id_layer(&context));

        let response = app.oneshot(request(Some("abc-123"))).await.unwrap();

        let values: Vec<_> = response.headers().get_all(HEADER).iter().collect();
        assert_eq!(values, vec!["abc-123"]);
    }

    #[tokio::test]
    async fn test_nested_request_is_left_alone() {
        let context = test_context("uuid-123");
        let inner_app = app(&context);
        let storage = context.storage().clone();

        let outer = Router::new()
            .route(
                "/outer",
                get(move || {
                    let inner_app = inner_app.clone();
                    let storage = storage.clone();
                    async move {
                        let inner = inner_app
                            .oneshot(request(Some("inner-id")))
                            .await
                            .unwrap();
                        let inner_header = inner.headers().get(HEADER).is_some();
                        let inner_body = body_text(inner).await;
                        let outer_id = storage.get().unwrap_or_default();
                        format!("{inner_header}|{inner_body}|{outer_id}")
                    }
                }),
            )
            .layer(correlation_id_layer(&context));

        let req = Request::builder()
            .uri("/outer")
            .header(HEADER, "outer-id")
            .body(Body::empty())
            .unwrap();
        let response = outer.oneshot(req).await.unwrap();

        assert_eq!(response.headers()[HEADER], "outer-id");
        assert_eq!(body_text(response).await, "false||outer-id");
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let context = test_context("uuid-123");
        let app = app(&context);

        let responses = futures::future::join_all((0..8).map(|n| {
            let app = app.clone();
            async move {
                let id = format!("req-{n}");
                let response = app.oneshot(request(Some(&id))).await.unwrap();
                (id, body_text(response).await)
            }
        }))
        .await;

        for (sent, seen) in responses {
            assert_eq!(sent, seen);
        }
    }

    #[tokio::test]
    async fn test_storage_empty_after_request() {
        let context = test_context("uuid-123");

        let _ = app(&context).oneshot(request(None)).await.unwrap();

        assert!(!context.storage().has());
        assert_eq!(storage::current_operation(), Operation::Unscoped);
    }
}

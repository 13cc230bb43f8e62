//! Custom Axum extractors.
//!
//! # Example
//!
//! ```ignore
//! use correlate_web::extractors::CorrelationId;
//!
//! async fn handler(correlation_id: CorrelationId) -> String {
//!     tracing::info!(correlation_id = ?correlation_id.0, "Processing request");
//!     correlation_id.0.unwrap_or_default()
//! }
//! ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use correlate_core::CorrelationIdStorage;
use std::convert::Infallible;

/// Correlation ID bound to the current request.
///
/// Read from the request extensions set by
/// [`CorrelationIdLayer`](crate::middleware::CorrelationIdLayer). When the
/// extension holds no ID (for example a nested request) the storage installed
/// by the layer is consulted. `None` when neither has an ID, which also
/// covers routes not wrapped in the layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub Option<String>);

impl CorrelationId {
    /// The ID, if one is bound.
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_extension = parts
            .extensions
            .get::<Self>()
            .and_then(|id| id.0.clone());

        let correlation_id = from_extension.or_else(|| {
            parts
                .extensions
                .get::<CorrelationIdStorage>()
                .and_then(CorrelationIdStorage::get)
        });

        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::middleware::correlation_id_layer;
    use axum::{Router, body::Body, http::Request, routing::get};
    use correlate_core::storage;
    use correlate_testing::test_context;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_extension_wins() {
        let req = Request::builder().body(()).expect("Valid request");
        let (mut parts, ()) = req.into_parts();
        parts
            .extensions
            .insert(CorrelationId(Some("abc-123".to_string())));

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.as_deref(), Some("abc-123"));
    }

    #[tokio::test]
    async fn test_falls_back_to_storage() {
        let store = CorrelationIdStorage::new();
        let req = Request::builder().body(()).expect("Valid request");
        let (mut parts, ()) = req.into_parts();
        parts.extensions.insert(CorrelationId(None));
        parts.extensions.insert(store.clone());

        let correlation_id = storage::scope(async {
            store.set("late-bound");
            CorrelationId::from_request_parts(&mut parts, &()).await
        })
        .await
        .expect("Should extract");

        assert_eq!(correlation_id.as_deref(), Some("late-bound"));
    }

    #[tokio::test]
    async fn test_missing_layer_yields_none() {
        let req = Request::builder().body(()).expect("Valid request");
        let (mut parts, ()) = req.into_parts();

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id, CorrelationId(None));
    }

    #[tokio::test]
    async fn test_extracted_in_handler() {
        let context = test_context("uuid-123");
        let app = Router::new()
            .route(
                "/test",
                get(|id: CorrelationId| async move { id.0.unwrap_or_default() }),
            )
            .layer(correlation_id_layer(&context));

        let request = Request::builder()
            .uri("/test")
            .header("X-Correlation-ID", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"abc-123");
    }
}

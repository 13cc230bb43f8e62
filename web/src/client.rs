//! Outbound HTTP propagation.
//!
//! Requests sent while an ID is bound carry it in the configured header, so
//! the downstream service continues the same correlation chain.
//!
//! ```ignore
//! let client = CorrelatedClient::new(reqwest::Client::new(), &context);
//! let response = client.get("http://billing/invoices").send().await?;
//! ```

use correlate_core::CorrelationContext;
use correlate_core::CorrelationIdStorage;
use correlate_core::metrics::HEADER_SKIPPED;
use http::{HeaderName, HeaderValue};
use reqwest::{Client, IntoUrl, Method, RequestBuilder};

const EDGE: &str = "http_client";

/// Add the bound correlation ID to an outgoing request.
///
/// Returns the builder unchanged when no ID is bound or the ID cannot be
/// encoded as a header value.
#[must_use]
pub fn inject_correlation_id(
    builder: RequestBuilder,
    storage: &CorrelationIdStorage,
    header: &HeaderName,
) -> RequestBuilder {
    let Some(id) = storage.get() else {
        return builder;
    };

    match HeaderValue::from_str(&id) {
        Ok(value) => builder.header(header.clone(), value),
        Err(_) => {
            metrics::counter!(HEADER_SKIPPED, "edge" => EDGE).increment(1);
            tracing::warn!(
                header = %header,
                "Correlation ID is not a valid header value, outbound header skipped"
            );
            builder
        }
    }
}

/// `reqwest::Client` that stamps every request with the bound correlation ID.
#[derive(Debug, Clone)]
pub struct CorrelatedClient {
    client: Client,
    storage: CorrelationIdStorage,
    header: HeaderName,
    enabled: bool,
}

impl CorrelatedClient {
    /// Wrap `client` using the context's storage, header and
    /// `http_client.enabled` setting.
    #[must_use]
    pub fn new(client: Client, context: &CorrelationContext) -> Self {
        Self {
            client,
            storage: context.storage().clone(),
            header: context.header_name().clone(),
            enabled: context.propagate_http_client(),
        }
    }

    /// The wrapped client.
    #[must_use]
    pub const fn inner(&self) -> &Client {
        &self.client
    }

    /// Start a request with the given method.
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        let builder = self.client.request(method, url);
        if self.enabled {
            inject_correlation_id(builder, &self.storage, &self.header)
        } else {
            builder
        }
    }

    /// Start a `GET` request.
    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start a `POST` request.
    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Start a `PUT` request.
    pub fn put<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Start a `DELETE` request.
    pub fn delete<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }
}

//! HTTP edge: request start and response finish.
//!
//! Framework-agnostic: the edge works on [`http::HeaderMap`], and the
//! `correlate-web` crate calls it from a tower middleware. Both hooks only
//! act for top-level operations; a nested request (a sub-request dispatched
//! from inside a handler) is left alone.
//!
//! Hosts should run each request inside [`storage::scope`](crate::storage::scope).
//! Called outside any scope, the edge binds into the shared fallback slot and
//! [`HttpEdge::on_response`] clears it again, so consecutive unscoped
//! requests each get their own ID.

use crate::metrics::HEADER_SKIPPED;
use crate::resolve::{Binding, IdSource, Resolver};
use crate::storage::{CorrelationIdStorage, Operation, current_operation};
use http::{HeaderMap, HeaderName, HeaderValue};

const EDGE: &str = "http";

/// Reads the correlation header on requests and writes it on responses.
#[derive(Debug, Clone)]
pub struct HttpEdge {
    resolver: Resolver,
    header: HeaderName,
    trust_header: bool,
}

impl HttpEdge {
    pub(crate) fn new(resolver: Resolver, header: HeaderName, trust_header: bool) -> Self {
        Self {
            resolver,
            header,
            trust_header,
        }
    }

    /// Header carrying the correlation ID.
    #[must_use]
    pub const fn header_name(&self) -> &HeaderName {
        &self.header
    }

    /// Storage the edge binds IDs into.
    #[must_use]
    pub const fn storage(&self) -> &CorrelationIdStorage {
        &self.resolver.storage
    }

    /// Bind a correlation ID for an incoming request.
    ///
    /// Uses the header value when the header is trusted and the value passes
    /// validation, otherwise generates one. Returns `None` for nested
    /// requests, which are not touched.
    pub fn on_request(&self, headers: &HeaderMap) -> Option<Binding> {
        let operation = current_operation();
        if operation.is_nested() {
            tracing::trace!(?operation, "Skipping correlation ID for nested request");
            return None;
        }

        let candidate = if self.trust_header {
            headers
                .get(&self.header)
                .and_then(|value| value.to_str().ok())
        } else {
            None
        };

        Some(self.resolver.bind(EDGE, [(IdSource::Header, candidate)], ""))
    }

    /// Write the bound correlation ID into response headers.
    ///
    /// Overwrites any existing value of the header. Does nothing for nested
    /// requests or when no ID is bound. Returns the ID written.
    ///
    /// Outside any scope the request ends here: storage is cleared after the
    /// header is written.
    pub fn on_response(&self, headers: &mut HeaderMap) -> Option<String> {
        let operation = current_operation();
        if operation.is_nested() {
            return None;
        }

        let written = self.write_header(headers);
        if operation == Operation::Unscoped {
            self.resolver.storage.clear();
        }
        written
    }

    fn write_header(&self, headers: &mut HeaderMap) -> Option<String> {
        let id = self.resolver.storage.get()?;

        match HeaderValue::from_str(&id) {
            Ok(value) => {
                headers.insert(self.header.clone(), value);
                Some(id)
            }
            Err(_) => {
                metrics::counter!(HEADER_SKIPPED, "edge" => EDGE).increment(1);
                tracing::warn!(
                    header = %self.header,
                    "Correlation ID is not a valid header value, response header skipped"
                );
                None
            }
        }
    }
}

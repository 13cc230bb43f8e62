//! Message edge: stamping outgoing messages and restoring on consume.
//!
//! Message metadata is a JSON object, the same shape event metadata takes
//! on an event bus (`{"correlation_id": "..."}`). Producers call
//! [`MessageEdge::stamp`] while an ID is bound; consumers wrap each handled
//! message in [`MessageEdge::consume`], which treats the message as a new
//! top-level operation.

use crate::resolve::{Binding, IdSource, Resolver};
use crate::storage::{self, CorrelationIdStorage, current_operation};
use serde_json::{Map, Value};
use std::future::Future;

const EDGE: &str = "message";

/// Propagates correlation IDs through message metadata.
#[derive(Debug, Clone)]
pub struct MessageEdge {
    resolver: Resolver,
    key: String,
    trust_metadata: bool,
}

impl MessageEdge {
    pub(crate) fn new(resolver: Resolver, key: String, trust_metadata: bool) -> Self {
        Self {
            resolver,
            key,
            trust_metadata,
        }
    }

    /// Metadata key holding the ID.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Storage the edge binds IDs into.
    #[must_use]
    pub const fn storage(&self) -> &CorrelationIdStorage {
        &self.resolver.storage
    }

    /// Write the current ID into outgoing message metadata.
    ///
    /// An ID already present in the metadata is kept. Returns `true` when
    /// the metadata was changed.
    pub fn stamp(&self, metadata: &mut Map<String, Value>) -> bool {
        if metadata.contains_key(&self.key) {
            return false;
        }

        let Some(id) = self.resolver.storage.get() else {
            return false;
        };

        metadata.insert(self.key.clone(), Value::String(id));
        true
    }

    /// Bind a correlation ID when a message starts being handled.
    ///
    /// Uses a string metadata value when metadata is trusted and the value
    /// passes validation, otherwise generates one. Returns `None` when called
    /// from a nested scope.
    pub fn on_message_received(&self, metadata: &Map<String, Value>) -> Option<Binding> {
        if current_operation().is_nested() {
            tracing::trace!("Skipping correlation ID for nested message");
            return None;
        }

        let candidate = if self.trust_metadata {
            metadata.get(&self.key).and_then(Value::as_str)
        } else {
            None
        };

        Some(self.resolver.bind(EDGE, [(IdSource::Metadata, candidate)], ""))
    }

    /// Clear storage once a message has been handled (or failed).
    pub fn on_message_handled(&self) {
        self.resolver.storage.clear();
    }

    /// Handle one message inside its own operation scope.
    pub async fn consume<Fut>(&self, metadata: &Map<String, Value>, handler: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        storage::scope(async {
            self.on_message_received(metadata);
            let output = handler.await;
            self.on_message_handled();
            output
        })
        .await
    }
}

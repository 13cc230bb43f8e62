//! Axum and reqwest integration for correlation IDs.
//!
//! The core crate's [`HttpEdge`](correlate_core::HttpEdge) is
//! framework-agnostic. This crate wires it into the web stack:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ CorrelationIdLayer (tower)                   │  ← new operation scope
//! │  on_request: header → validate → storage     │
//! │ ┌──────────────────────────────────────────┐ │
//! │ │ handler  (span http_request{correlation}) │ │  ← CorrelationId extractor
//! │ │   CorrelatedClient → outbound header      │ │  ← reqwest propagation
//! │ └──────────────────────────────────────────┘ │
//! │  on_response: storage → response header      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use correlate_core::{CorrelationConfig, CorrelationContext};
//! use correlate_web::{CorrelationId, correlation_id_layer};
//!
//! async fn show(correlation_id: CorrelationId) -> String {
//!     correlation_id.0.unwrap_or_default()
//! }
//!
//! let context = CorrelationContext::from_config(CorrelationConfig::from_env())?;
//! let app = Router::new()
//!     .route("/", get(show))
//!     .layer(correlation_id_layer(&context));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod extractors;
pub mod middleware;

// Re-export key types for convenience
pub use client::{CorrelatedClient, inject_correlation_id};
pub use extractors::CorrelationId;
pub use middleware::{CorrelationIdLayer, CorrelationIdMiddleware, correlation_id_layer};

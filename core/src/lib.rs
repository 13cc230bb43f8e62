//! # Correlate Core
//!
//! Correlation ID lifecycle for a single logical operation: an inbound HTTP
//! request, a CLI command, or a consumed message. Every log line, outbound
//! call and response belonging to the operation carries the same ID.
//!
//! ## Components
//!
//! - **Validator**: decides whether an untrusted candidate is acceptable
//!   ([`validator`])
//! - **Generator**: produces fresh IDs ([`generator`])
//! - **Storage**: holds the ID for the current operation scope ([`storage`])
//! - **Edges**: lifecycle hooks that read or write storage
//!   ([`request`], [`console`], [`message`], [`log`])
//!
//! ## Lifecycle
//!
//! ```text
//! IDLE ──on_request / on_command / on_message_received──▶ ID_BOUND
//!                                                           │  log enrichment,
//!                                                           │  outbound headers,
//!                                                           │  message stamps
//! IDLE ◀──scope exit / on_terminate / on_error / handled────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use correlate_core::{CorrelationConfig, CorrelationContext, storage};
//! use http::{HeaderMap, HeaderValue};
//!
//! let context = CorrelationContext::from_config(CorrelationConfig::default())?;
//! let http = context.http();
//!
//! storage::sync_scope(|| {
//!     let mut request = HeaderMap::new();
//!     request.insert("X-Correlation-ID", HeaderValue::from_static("abc-123"));
//!     http.on_request(&request);
//!
//!     let mut response = HeaderMap::new();
//!     http.on_response(&mut response);
//!     assert_eq!(response["x-correlation-id"], "abc-123");
//! });
//! # Ok::<(), correlate_core::ConfigError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod generator;
pub mod log;
pub mod message;
pub mod metrics;
pub mod request;
pub mod resolve;
pub mod storage;
pub mod validator;

// Re-export key types for convenience
pub use config::CorrelationConfig;
pub use console::{CommandInput, ConsoleEdge};
pub use context::CorrelationContext;
pub use error::ConfigError;
pub use generator::{CorrelationIdGenerator, GeneratorKind, UuidV4Generator, UuidV7Generator};
pub use log::{CorrelationIdProcessor, CorrelationLogLayer, LogRecord};
pub use message::MessageEdge;
pub use request::HttpEdge;
pub use resolve::{Binding, IdSource};
pub use storage::{CorrelationIdStorage, Operation};
pub use validator::CorrelationIdValidator;

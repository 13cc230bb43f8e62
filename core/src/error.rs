//! Error types for correlation ID configuration.
//!
//! Only startup problems are errors. A bad correlation ID arriving from a
//! client is never an error: it is discarded and a fresh ID is generated.

use thiserror::Error;

/// Errors raised while building a [`CorrelationContext`](crate::CorrelationContext)
/// from configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configured header name is empty or not a legal HTTP header name.
    #[error("Invalid correlation header name: {0:?}")]
    InvalidHeaderName(String),

    /// The configured maximum length is below 1.
    #[error("Invalid max length {0}: must be at least 1")]
    InvalidMaxLength(usize),

    /// The configured validation pattern does not compile.
    #[error("Invalid validation pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Pattern as configured.
        pattern: String,
        /// Compilation failure reported by the regex engine.
        #[source]
        source: regex::Error,
    },

    /// The configured generator name is not one of the built-in generators.
    #[error("Unknown generator: {0} (expected uuid_v4 or uuid_v7)")]
    UnknownGenerator(String),

    /// A metadata key (log field, message metadata) is empty.
    #[error("Empty {0} key")]
    EmptyKey(&'static str),
}

//! # Correlate Testing
//!
//! Testing utilities and helpers for correlation ID integrations.
//!
//! This crate provides:
//! - Deterministic generators ([`FixedGenerator`], [`SequenceGenerator`])
//! - An in-memory log sink for [`CorrelationLogLayer`](correlate_core::CorrelationLogLayer)
//! - Context and header builders
//! - proptest strategies for valid and invalid IDs
//!
//! ## Example
//!
//! ```
//! use correlate_core::storage;
//! use correlate_testing::{capture_logs, test_context};
//!
//! let context = test_context("fixed-id");
//!
//! let ((), records) = capture_logs(&context, || {
//!     storage::sync_scope(|| {
//!         context.storage().set("xyz");
//!         tracing::info!("hello");
//!     });
//! });
//!
//! assert_eq!(records[0]["message"], "hello");
//! assert_eq!(records[0]["extra"]["correlation_id"], "xyz");
//! ```

/// Mock generators.
pub mod mocks {
    use correlate_core::CorrelationIdGenerator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Generator that always returns the same ID.
    ///
    /// # Example
    ///
    /// ```
    /// use correlate_testing::mocks::FixedGenerator;
    /// use correlate_core::CorrelationIdGenerator;
    ///
    /// let generator = FixedGenerator::new("uuid-123");
    /// assert_eq!(generator.generate(), "uuid-123");
    /// assert_eq!(generator.generate(), "uuid-123");
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedGenerator {
        id: String,
    }

    impl FixedGenerator {
        /// Create a generator returning `id`.
        #[must_use]
        pub fn new(id: impl Into<String>) -> Self {
            Self { id: id.into() }
        }
    }

    impl CorrelationIdGenerator for FixedGenerator {
        fn generate(&self) -> String {
            self.id.clone()
        }
    }

    /// Generator producing `prefix-1`, `prefix-2`, ...
    ///
    /// Useful when a test needs to tell two generated IDs apart.
    #[derive(Debug)]
    pub struct SequenceGenerator {
        prefix: String,
        next: AtomicUsize,
    }

    impl SequenceGenerator {
        /// Create a generator numbering from 1.
        #[must_use]
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicUsize::new(1),
            }
        }

        /// Number of IDs generated so far.
        #[must_use]
        pub fn generated(&self) -> usize {
            self.next.load(Ordering::SeqCst) - 1
        }
    }

    impl CorrelationIdGenerator for SequenceGenerator {
        fn generate(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n}", self.prefix)
        }
    }
}

/// In-memory log capture.
pub mod logs {
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    /// `MakeWriter` collecting everything written into a shared buffer.
    #[derive(Debug, Clone, Default)]
    pub struct CapturedLogs {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl CapturedLogs {
        /// Create an empty capture.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything written so far, lossily decoded.
        #[must_use]
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.buffer.lock()).into_owned()
        }

        /// Parse each written line as JSON, skipping lines that are not JSON.
        #[must_use]
        pub fn records(&self) -> Vec<Value> {
            self.contents()
                .lines()
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect()
        }

        /// Discard captured output.
        pub fn clear(&self) {
            self.buffer.lock().clear();
        }
    }

    /// Writer handed out by [`CapturedLogs`].
    #[derive(Debug)]
    pub struct CapturedWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl io::Write for CapturedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedWriter;

        fn make_writer(&'a self) -> Self::Writer {
            CapturedWriter {
                buffer: Arc::clone(&self.buffer),
            }
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use crate::logs::CapturedLogs;
    use crate::mocks::FixedGenerator;
    use correlate_core::{CorrelationConfig, CorrelationContext};
    use http::{HeaderMap, HeaderName, HeaderValue};
    use serde_json::Value;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    /// Context with default configuration whose generator always returns `id`.
    ///
    /// # Panics
    ///
    /// Panics if the default configuration is rejected.
    #[must_use]
    pub fn test_context(id: &str) -> CorrelationContext {
        context_with(CorrelationConfig::default(), id)
    }

    /// Context built from `config` whose generator always returns `id`.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn context_with(config: CorrelationConfig, id: &str) -> CorrelationContext {
        CorrelationContext::from_config(config)
            .expect("test configuration should be valid")
            .with_generator(Arc::new(FixedGenerator::new(id)))
    }

    /// Build a header map from `(name, value)` pairs.
    ///
    /// # Panics
    ///
    /// Panics on a name or value `http` rejects.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        pairs
            .iter()
            .map(|(name, value)| {
                (
                    HeaderName::try_from(*name).expect("valid header name"),
                    HeaderValue::from_str(value).expect("valid header value"),
                )
            })
            .collect()
    }

    /// Run `f` with the context's log layer installed as the default
    /// subscriber and return the records it wrote.
    ///
    /// Log enrichment must be enabled in the context's configuration.
    pub fn capture_logs<R>(context: &CorrelationContext, f: impl FnOnce() -> R) -> (R, Vec<Value>) {
        let logs = CapturedLogs::new();
        let subscriber = tracing_subscriber::registry().with(context.log_layer(logs.clone()));
        let output = tracing::subscriber::with_default(subscriber, f);
        (output, logs.records())
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// IDs accepted by the default validation rules.
    pub fn valid_id() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-]{1,64}"
    }

    /// IDs containing at least one character the default pattern rejects.
    pub fn invalid_id() -> impl Strategy<Value = String> {
        ("[A-Za-z0-9]{0,16}", "[ <>;'\"/\\\\\n]", "[A-Za-z0-9]{0,16}")
            .prop_map(|(head, bad, tail)| format!("{head}{bad}{tail}"))
    }
}

// Re-export commonly used items
pub use helpers::{capture_logs, context_with, headers, test_context};
pub use logs::CapturedLogs;
pub use mocks::{FixedGenerator, SequenceGenerator};

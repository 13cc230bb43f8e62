//! Log enrichment.
//!
//! [`CorrelationIdProcessor`] adds the current correlation ID to a
//! [`LogRecord`]'s `extra` metadata. [`CorrelationLogLayer`] plugs the
//! processor into `tracing`: every event becomes a `LogRecord`, is enriched,
//! and is written as one JSON line.
//!
//! ```text
//! info!(order_id = 7, "hello")
//!   → {"timestamp":"…","level":"INFO","target":"app","message":"hello",
//!      "context":{"order_id":7},"extra":{"correlation_id":"abc-123"}}
//! ```
//!
//! Enrichment is best-effort: the message is never modified and a record is
//! never dropped because of the correlation ID.

use crate::storage::CorrelationIdStorage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};

/// A structured log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Time the record was created.
    pub timestamp: DateTime<Utc>,
    /// Level name (`INFO`, `WARN`, ...).
    pub level: String,
    /// Module path or explicit target of the event.
    pub target: String,
    /// Free-text message.
    pub message: String,
    /// Fields recorded on the event.
    pub context: Map<String, Value>,
    /// Metadata added by processors.
    pub extra: Map<String, Value>,
}

impl LogRecord {
    /// Create a record with empty context and extra metadata.
    #[must_use]
    pub fn new(level: &Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.to_string(),
            target: target.into(),
            message: message.into(),
            context: Map::new(),
            extra: Map::new(),
        }
    }
}

/// Adds the current correlation ID to log records.
#[derive(Debug, Clone)]
pub struct CorrelationIdProcessor {
    storage: CorrelationIdStorage,
    key: String,
}

impl CorrelationIdProcessor {
    /// Create a processor writing under `key`.
    #[must_use]
    pub fn new(storage: CorrelationIdStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Field key used in `extra`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Attach the correlation ID, if one is bound. Leaves the record alone otherwise.
    pub fn process(&self, record: &mut LogRecord) {
        if let Some(id) = self.storage.get() {
            record.extra.insert(self.key.clone(), Value::String(id));
        }
    }
}

/// `tracing` layer writing enriched records as JSON lines.
///
/// # Example
///
/// ```ignore
/// use tracing_subscriber::prelude::*;
///
/// let layer = CorrelationLogLayer::new(context.log_processor(), std::io::stdout);
/// tracing_subscriber::registry().with(layer).init();
/// ```
pub struct CorrelationLogLayer<W> {
    processor: CorrelationIdProcessor,
    make_writer: W,
}

impl<W> fmt::Debug for CorrelationLogLayer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationLogLayer")
            .field("processor", &self.processor)
            .finish_non_exhaustive()
    }
}

impl<W> CorrelationLogLayer<W>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    /// Create a layer that writes to `make_writer`.
    #[must_use]
    pub fn new(processor: CorrelationIdProcessor, make_writer: W) -> Self {
        Self {
            processor,
            make_writer,
        }
    }

    fn encode(&self, mut record: LogRecord) -> Option<Vec<u8>> {
        self.processor.process(&mut record);

        serde_json::to_vec(&record).ok().map(|mut line| {
            line.push(b'\n');
            line
        })
    }
}

impl<S, W> Layer<S> for CorrelationLogLayer<W>
where
    S: Subscriber,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(
            metadata.level(),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        );
        record.context = visitor.fields;

        if let Some(line) = self.encode(record) {
            let mut writer = self.make_writer.make_writer_for(metadata);
            let _ = writer.write_all(&line);
        }
    }
}

/// Collects event fields into JSON values, splitting out `message`.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.insert(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }
}

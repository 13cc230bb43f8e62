//! Metric names emitted by the edges.
//!
//! Recording goes through the `metrics` facade; installing an exporter is
//! the host's business. Call [`describe_metrics`] once after the exporter is
//! installed to attach descriptions.

use metrics::{Unit, describe_counter};

/// Counter: IDs bound to an operation, labelled by `edge` and `source`.
pub const BOUND: &str = "correlation_id.bound";

/// Counter: untrusted candidates that failed validation, labelled by `edge` and `source`.
pub const REJECTED: &str = "correlation_id.rejected";

/// Counter: response headers skipped because the ID was not a legal header value.
pub const HEADER_SKIPPED: &str = "correlation_id.header_skipped";

/// Register descriptions for all correlation metrics.
pub fn describe_metrics() {
    describe_counter!(BOUND, Unit::Count, "Correlation IDs bound to an operation");
    describe_counter!(
        REJECTED,
        Unit::Count,
        "Untrusted correlation IDs rejected by validation"
    );
    describe_counter!(
        HEADER_SKIPPED,
        Unit::Count,
        "Correlation IDs that could not be encoded as a header value"
    );
}

//! ID resolution shared by every inbound edge.
//!
//! At the start of a top-level operation an edge hands its trusted
//! candidates to [`Resolver::bind`], in priority order:
//!
//! 1. an ID already bound to the current scope wins (re-entry is a no-op)
//! 2. the first candidate that survives [`CorrelationIdValidator::sanitize`]
//! 3. otherwise a freshly generated ID, with the edge's prefix
//!
//! The result is written to [`CorrelationIdStorage`].

use crate::generator::CorrelationIdGenerator;
use crate::metrics::{BOUND, REJECTED};
use crate::storage::CorrelationIdStorage;
use crate::validator::CorrelationIdValidator;
use std::fmt;
use std::sync::Arc;

/// Where a bound correlation ID came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// Already bound before the edge ran.
    Existing,
    /// Inbound HTTP header.
    Header,
    /// `--correlation-id` command-line option.
    Option,
    /// Environment variable.
    EnvVar,
    /// Message metadata.
    Metadata,
    /// Produced by the generator.
    Generated,
}

impl IdSource {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Existing => "existing",
            Self::Header => "header",
            Self::Option => "option",
            Self::EnvVar => "env_var",
            Self::Metadata => "metadata",
            Self::Generated => "generated",
        }
    }
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving an ID for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The ID now bound to the operation.
    pub id: String,
    /// Where it came from.
    pub source: IdSource,
}

/// Storage, generator and validator shared by the edges.
#[derive(Clone)]
pub(crate) struct Resolver {
    pub(crate) storage: CorrelationIdStorage,
    generator: Arc<dyn CorrelationIdGenerator>,
    validator: Arc<CorrelationIdValidator>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("storage", &self.storage)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub(crate) fn new(
        storage: CorrelationIdStorage,
        generator: Arc<dyn CorrelationIdGenerator>,
        validator: Arc<CorrelationIdValidator>,
    ) -> Self {
        Self {
            storage,
            generator,
            validator,
        }
    }

    /// Resolve and bind an ID for the current operation.
    pub(crate) fn bind<'a, I>(&self, edge: &'static str, candidates: I, prefix: &str) -> Binding
    where
        I: IntoIterator<Item = (IdSource, Option<&'a str>)>,
    {
        if let Some(id) = self.storage.get() {
            tracing::trace!(edge, correlation_id = %id, "Correlation ID already bound");
            return Binding {
                id,
                source: IdSource::Existing,
            };
        }

        for (source, candidate) in candidates {
            let Some(raw) = candidate else {
                continue;
            };

            if let Some(id) = self.validator.sanitize(Some(raw)) {
                return self.store(edge, id, source);
            }

            metrics::counter!(REJECTED, "edge" => edge, "source" => source.as_str()).increment(1);
            tracing::debug!(
                edge,
                source = %source,
                length = raw.chars().count(),
                "Rejected untrusted correlation ID"
            );
        }

        let id = format!("{prefix}{}", self.generator.generate());
        self.store(edge, id, IdSource::Generated)
    }

    fn store(&self, edge: &'static str, id: String, source: IdSource) -> Binding {
        self.storage.set(id.clone());

        metrics::counter!(BOUND, "edge" => edge, "source" => source.as_str()).increment(1);
        tracing::debug!(edge, source = %source, correlation_id = %id, "Correlation ID bound");

        Binding { id, source }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::config::DEFAULT_PATTERN;
    use crate::storage::sync_scope;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resolver(generator: Arc<dyn CorrelationIdGenerator>) -> Resolver {
        Resolver::new(
            CorrelationIdStorage::new(),
            generator,
            Arc::new(CorrelationIdValidator::new(true, 255, Some(DEFAULT_PATTERN)).unwrap()),
        )
    }

    #[test]
    fn test_first_valid_candidate_wins() {
        let resolver = resolver(Arc::new(|| "generated".to_string()));

        sync_scope(|| {
            let binding = resolver.bind(
                "test",
                [
                    (IdSource::Option, Some("not valid!")),
                    (IdSource::EnvVar, Some(" env-id ")),
                    (IdSource::Header, Some("later-id")),
                ],
                "",
            );

            assert_eq!(binding.id, "env-id");
            assert_eq!(binding.source, IdSource::EnvVar);
            assert_eq!(resolver.storage.get().as_deref(), Some("env-id"));
        });
    }

    #[test]
    fn test_generates_with_prefix_when_no_candidate() {
        let resolver = resolver(Arc::new(|| "uuid-123".to_string()));

        sync_scope(|| {
            let binding = resolver.bind("test", [(IdSource::Header, None)], "CLI-");
            assert_eq!(binding.id, "CLI-uuid-123");
            assert_eq!(binding.source, IdSource::Generated);
        });
    }

    #[test]
    fn test_existing_id_is_kept() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let resolver = resolver(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "generated".to_string()
        }));

        sync_scope(|| {
            let first = resolver.bind("test", Vec::<(IdSource, Option<&str>)>::new(), "");
            let second = resolver.bind("test", [(IdSource::Header, Some("other"))], "");

            assert_eq!(first.id, "generated");
            assert_eq!(second.id, "generated");
            assert_eq!(second.source, IdSource::Existing);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(IdSource::EnvVar.to_string(), "env_var");
        assert_eq!(IdSource::Generated.as_str(), "generated");
    }
}

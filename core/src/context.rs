//! Startup wiring.
//!
//! [`CorrelationContext`] turns a [`CorrelationConfig`] into ready-to-use
//! edges once, at startup. Hosts keep the context (it is cheap to clone) and
//! call the edge hooks at the right lifecycle points:
//!
//! | Lifecycle point | Hook |
//! |-----------------|------|
//! | request start / response finish | [`HttpEdge::on_request`] / [`HttpEdge::on_response`] |
//! | command start / terminate / error | [`ConsoleEdge::on_command`] / [`ConsoleEdge::on_terminate`] / [`ConsoleEdge::on_error`] |
//! | message consumed / handled | [`MessageEdge::on_message_received`] / [`MessageEdge::on_message_handled`] |
//! | log emit | [`CorrelationIdProcessor::process`] |

use crate::config::CorrelationConfig;
use crate::console::ConsoleEdge;
use crate::error::ConfigError;
use crate::generator::CorrelationIdGenerator;
use crate::log::{CorrelationIdProcessor, CorrelationLogLayer};
use crate::message::MessageEdge;
use crate::request::HttpEdge;
use crate::resolve::Resolver;
use crate::storage::CorrelationIdStorage;
use crate::validator::CorrelationIdValidator;
use http::HeaderName;
use std::fmt;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Resolved correlation ID configuration and shared storage.
///
/// # Example
///
/// ```
/// use correlate_core::{CorrelationConfig, CorrelationContext, storage};
/// use http::HeaderMap;
///
/// let context = CorrelationContext::from_config(CorrelationConfig::default())?;
/// let http = context.http();
///
/// storage::sync_scope(|| {
///     let binding = http.on_request(&HeaderMap::new());
///     assert!(binding.is_some());
///     assert!(context.storage().has());
/// });
/// # Ok::<(), correlate_core::ConfigError>(())
/// ```
#[derive(Clone)]
pub struct CorrelationContext {
    config: Arc<CorrelationConfig>,
    storage: CorrelationIdStorage,
    generator: Arc<dyn CorrelationIdGenerator>,
    validator: Arc<CorrelationIdValidator>,
    header: HeaderName,
}

impl fmt::Debug for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationContext")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl CorrelationContext {
    /// Validate the configuration and build the context.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is unusable; see
    /// [`CorrelationConfig::validate`].
    pub fn from_config(config: CorrelationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let header = config.header()?;
        let validator = CorrelationIdValidator::from_config(&config.validation)?;
        let generator = config.generator.build();

        tracing::debug!(
            header = %header,
            generator = %config.generator,
            trust_header = config.trust_header,
            validation = config.validation.enabled,
            "Correlation context configured"
        );

        Ok(Self {
            config: Arc::new(config),
            storage: CorrelationIdStorage::new(),
            generator,
            validator: Arc::new(validator),
            header,
        })
    }

    /// Replace the configured generator with a custom one.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn CorrelationIdGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Configuration the context was built from.
    #[must_use]
    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Shared storage.
    #[must_use]
    pub const fn storage(&self) -> &CorrelationIdStorage {
        &self.storage
    }

    /// Shared validator.
    #[must_use]
    pub fn validator(&self) -> &CorrelationIdValidator {
        &self.validator
    }

    /// Configured correlation header.
    #[must_use]
    pub const fn header_name(&self) -> &HeaderName {
        &self.header
    }

    /// Generate a fresh ID with the configured generator.
    #[must_use]
    pub fn generate(&self) -> String {
        self.generator.generate()
    }

    /// Whether outbound HTTP requests should carry the correlation header.
    #[must_use]
    pub fn propagate_http_client(&self) -> bool {
        self.config.http_client.enabled
    }

    /// HTTP request/response edge.
    #[must_use]
    pub fn http(&self) -> HttpEdge {
        HttpEdge::new(self.resolver(), self.header.clone(), self.config.trust_header)
    }

    /// CLI edge, or `None` when CLI integration is disabled.
    #[must_use]
    pub fn console(&self) -> Option<ConsoleEdge> {
        let cli = &self.config.cli;
        cli.enabled.then(|| {
            ConsoleEdge::new(
                self.resolver(),
                cli.prefix.clone(),
                cli.allow_option,
                cli.allow_env_var,
                cli.env_var.clone(),
            )
        })
    }

    /// Message edge, or `None` when messaging integration is disabled.
    #[must_use]
    pub fn messaging(&self) -> Option<MessageEdge> {
        let messaging = &self.config.messaging;
        messaging.enabled.then(|| {
            MessageEdge::new(
                self.resolver(),
                messaging.key.clone(),
                messaging.trust_metadata,
            )
        })
    }

    /// Log processor, or `None` when log enrichment is disabled.
    #[must_use]
    pub fn log_processor(&self) -> Option<CorrelationIdProcessor> {
        self.config
            .log
            .enabled
            .then(|| CorrelationIdProcessor::new(self.storage.clone(), self.config.log.key.clone()))
    }

    /// JSON log layer writing to `make_writer`, or `None` when log enrichment is disabled.
    ///
    /// `Option<Layer>` is itself a layer, so the result can be passed to
    /// `registry().with(..)` directly.
    #[must_use]
    pub fn log_layer<W>(&self, make_writer: W) -> Option<CorrelationLogLayer<W>>
    where
        W: for<'w> MakeWriter<'w> + 'static,
    {
        self.log_processor()
            .map(|processor| CorrelationLogLayer::new(processor, make_writer))
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(
            self.storage.clone(),
            Arc::clone(&self.generator),
            Arc::clone(&self.validator),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::console::CommandInput;
    use crate::generator::GeneratorKind;
    use crate::storage::sync_scope;

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = CorrelationConfig::default();
        config.validation.max_length = 0;
        assert!(CorrelationContext::from_config(config).is_err());
    }

    #[test]
    fn test_edges_share_storage() {
        let context = CorrelationContext::from_config(CorrelationConfig::default())
            .unwrap()
            .with_generator(Arc::new(|| "fixed".to_string()));

        sync_scope(|| {
            let binding = context.http().on_request(&http::HeaderMap::new()).unwrap();
            assert_eq!(binding.id, "fixed");
            assert_eq!(context.storage().get().as_deref(), Some("fixed"));

            let again = context
                .console()
                .unwrap()
                .on_command(&CommandInput::default())
                .unwrap();
            assert_eq!(again.id, "fixed");
        });
    }

    #[test]
    fn test_disabled_integrations() {
        let mut config = CorrelationConfig::default();
        config.cli.enabled = false;
        config.log.enabled = false;
        config.messaging.enabled = false;
        config.http_client.enabled = false;

        let context = CorrelationContext::from_config(config).unwrap();

        assert!(context.console().is_none());
        assert!(context.log_processor().is_none());
        assert!(context.messaging().is_none());
        assert!(!context.propagate_http_client());
    }

    #[test]
    fn test_configured_generator_is_used() {
        let config = CorrelationConfig {
            generator: GeneratorKind::UuidV7,
            ..CorrelationConfig::default()
        };
        let context = CorrelationContext::from_config(config).unwrap();

        assert_eq!(context.generate().as_bytes()[14], b'7');
    }

    #[test]
    fn test_custom_header_name() {
        let config = CorrelationConfig {
            header_name: "X-Request-ID".to_string(),
            ..CorrelationConfig::default()
        };
        let context = CorrelationContext::from_config(config).unwrap();

        assert_eq!(context.header_name().as_str(), "x-request-id");
        assert_eq!(context.http().header_name().as_str(), "x-request-id");
    }
}

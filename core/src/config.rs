//! Configuration for correlation ID propagation.
//!
//! Configuration is loaded once at startup, either deserialized by the host
//! (every section is `#[serde(default)]`) or read from environment variables
//! with [`CorrelationConfig::from_env`]. It is never mutated afterwards.
//!
//! # Environment variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `CORRELATION_HEADER_NAME` | `X-Correlation-ID` |
//! | `CORRELATION_GENERATOR` | `uuid_v4` |
//! | `CORRELATION_TRUST_HEADER` | `true` |
//! | `CORRELATION_VALIDATION_ENABLED` | `true` |
//! | `CORRELATION_VALIDATION_MAX_LENGTH` | `255` |
//! | `CORRELATION_VALIDATION_PATTERN` | `^[A-Za-z0-9_-]+$` |
//! | `CORRELATION_LOG_ENABLED` | `true` |
//! | `CORRELATION_LOG_KEY` | `correlation_id` |
//! | `CORRELATION_HTTP_CLIENT_ENABLED` | `true` |
//! | `CORRELATION_MESSAGING_ENABLED` | `true` |
//! | `CORRELATION_MESSAGING_KEY` | `correlation_id` |
//! | `CORRELATION_CLI_ENABLED` | `true` |
//! | `CORRELATION_CLI_PREFIX` | `CLI-` |
//! | `CORRELATION_CLI_ALLOW_OPTION` | `true` |
//! | `CORRELATION_CLI_ALLOW_ENV_VAR` | `true` |

use crate::error::ConfigError;
use crate::generator::GeneratorKind;
use http::HeaderName;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Default HTTP header carrying the correlation ID.
pub const DEFAULT_HEADER_NAME: &str = "X-Correlation-ID";

/// Default maximum correlation ID length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 255;

/// Default validation pattern: alphanumerics, dashes and underscores.
pub const DEFAULT_PATTERN: &str = "^[A-Za-z0-9_-]+$";

/// Default structured field key for logs and message metadata.
pub const DEFAULT_KEY: &str = "correlation_id";

/// Default prefix for IDs generated by CLI commands.
pub const DEFAULT_CLI_PREFIX: &str = "CLI-";

/// Default environment variable holding a CLI correlation ID.
pub const DEFAULT_CLI_ENV_VAR: &str = "CORRELATION_ID";

/// Top-level correlation ID configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Header read on inbound requests and written on responses.
    pub header_name: String,
    /// Built-in generator used when no trusted ID is available.
    pub generator: GeneratorKind,
    /// Accept an inbound header value (after validation).
    pub trust_header: bool,
    /// Validation of externally supplied IDs.
    pub validation: ValidationConfig,
    /// Log enrichment.
    pub log: LogConfig,
    /// Outbound HTTP client propagation.
    pub http_client: HttpClientConfig,
    /// Message metadata propagation.
    pub messaging: MessagingConfig,
    /// CLI command integration.
    pub cli: CliConfig,
}

/// Validation settings for externally supplied IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// When false every non-null candidate is accepted.
    pub enabled: bool,
    /// Maximum length in Unicode code points (minimum 1).
    pub max_length: usize,
    /// Pattern the whole candidate must match. Empty disables the check.
    pub pattern: String,
}

/// Log enrichment settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Attach the correlation ID to log records.
    pub enabled: bool,
    /// Field key under the record's `extra` metadata.
    pub key: String,
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Add the correlation header to outbound requests.
    pub enabled: bool,
}

/// Message metadata settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Stamp and restore correlation IDs on messages.
    pub enabled: bool,
    /// Metadata key holding the ID.
    pub key: String,
    /// Accept the ID found on consumed messages (after validation).
    pub trust_metadata: bool,
}

/// CLI command settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Bind correlation IDs to CLI commands.
    pub enabled: bool,
    /// Prefix prepended to generated IDs.
    pub prefix: String,
    /// Accept `--correlation-id`.
    pub allow_option: bool,
    /// Accept the ID from [`env_var`](Self::env_var).
    pub allow_env_var: bool,
    /// Environment variable read when `allow_env_var` is set.
    pub env_var: String,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_HEADER_NAME.to_string(),
            generator: GeneratorKind::default(),
            trust_header: true,
            validation: ValidationConfig::default(),
            log: LogConfig::default(),
            http_client: HttpClientConfig::default(),
            messaging: MessagingConfig::default(),
            cli: CliConfig::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: DEFAULT_MAX_LENGTH,
            pattern: DEFAULT_PATTERN.to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: DEFAULT_KEY.to_string(),
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: DEFAULT_KEY.to_string(),
            trust_metadata: true,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: DEFAULT_CLI_PREFIX.to_string(),
            allow_option: true,
            allow_env_var: true,
            env_var: DEFAULT_CLI_ENV_VAR.to_string(),
        }
    }
}

impl CorrelationConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparseable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Used by [`from_env`](Self::from_env); tests pass a map lookup instead
    /// of touching the process environment.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse().ok());
        let flag = |key: &str, default: bool| {
            lookup(key).and_then(|s| parse_flag(&s)).unwrap_or(default)
        };

        Self {
            header_name: string("CORRELATION_HEADER_NAME", defaults.header_name),
            generator: lookup("CORRELATION_GENERATOR")
                .and_then(|s| GeneratorKind::from_str(&s).ok())
                .unwrap_or(defaults.generator),
            trust_header: flag("CORRELATION_TRUST_HEADER", defaults.trust_header),
            validation: ValidationConfig {
                enabled: flag(
                    "CORRELATION_VALIDATION_ENABLED",
                    defaults.validation.enabled,
                ),
                max_length: parsed("CORRELATION_VALIDATION_MAX_LENGTH")
                    .unwrap_or(defaults.validation.max_length),
                pattern: string("CORRELATION_VALIDATION_PATTERN", defaults.validation.pattern),
            },
            log: LogConfig {
                enabled: flag("CORRELATION_LOG_ENABLED", defaults.log.enabled),
                key: string("CORRELATION_LOG_KEY", defaults.log.key),
            },
            http_client: HttpClientConfig {
                enabled: flag(
                    "CORRELATION_HTTP_CLIENT_ENABLED",
                    defaults.http_client.enabled,
                ),
            },
            messaging: MessagingConfig {
                enabled: flag("CORRELATION_MESSAGING_ENABLED", defaults.messaging.enabled),
                key: string("CORRELATION_MESSAGING_KEY", defaults.messaging.key),
                trust_metadata: defaults.messaging.trust_metadata,
            },
            cli: CliConfig {
                enabled: flag("CORRELATION_CLI_ENABLED", defaults.cli.enabled),
                prefix: string("CORRELATION_CLI_PREFIX", defaults.cli.prefix),
                allow_option: flag("CORRELATION_CLI_ALLOW_OPTION", defaults.cli.allow_option),
                allow_env_var: flag(
                    "CORRELATION_CLI_ALLOW_ENV_VAR",
                    defaults.cli.allow_env_var,
                ),
                env_var: defaults.cli.env_var,
            },
        }
    }

    /// Check the configuration for values that cannot work at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an illegal header name, a zero max length,
    /// an uncompilable pattern, or an empty field key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.header()?;

        if self.validation.max_length < 1 {
            return Err(ConfigError::InvalidMaxLength(self.validation.max_length));
        }

        if !self.validation.pattern.is_empty() {
            crate::validator::compile_pattern(&self.validation.pattern)?;
        }

        if self.log.key.trim().is_empty() {
            return Err(ConfigError::EmptyKey("log"));
        }

        if self.messaging.key.trim().is_empty() {
            return Err(ConfigError::EmptyKey("messaging"));
        }

        Ok(())
    }

    /// Parse the configured header name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHeaderName`] when the name is empty or
    /// contains characters not allowed in an HTTP header name.
    pub fn header(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::from_str(&self.header_name)
            .map_err(|_| ConfigError::InvalidHeaderName(self.header_name.clone()))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

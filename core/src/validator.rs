//! Validation of externally supplied correlation IDs.
//!
//! Every ID that crosses a trust boundary (HTTP header, CLI option,
//! environment variable, message metadata) goes through
//! [`CorrelationIdValidator::sanitize`]. Accepted IDs are safe to embed in
//! headers and log fields under the default pattern.

use crate::config::ValidationConfig;
use crate::error::ConfigError;
use regex::Regex;

/// Decides whether a candidate string is an acceptable correlation ID.
///
/// # Example
///
/// ```
/// use correlate_core::validator::CorrelationIdValidator;
///
/// let validator = CorrelationIdValidator::new(true, 255, Some("^[A-Za-z0-9_-]+$"))?;
/// assert_eq!(validator.sanitize(Some("  abc-123 ")), Some("abc-123".to_string()));
/// assert_eq!(validator.sanitize(Some("abc 123")), None);
/// # Ok::<(), correlate_core::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CorrelationIdValidator {
    enabled: bool,
    max_length: usize,
    pattern: Option<Regex>,
}

impl CorrelationIdValidator {
    /// Create a validator.
    ///
    /// The pattern must match the whole candidate; it is anchored on both
    /// ends regardless of how it is written.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxLength`] for a zero max length and
    /// [`ConfigError::InvalidPattern`] when the pattern does not compile.
    pub fn new(
        enabled: bool,
        max_length: usize,
        pattern: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if max_length < 1 {
            return Err(ConfigError::InvalidMaxLength(max_length));
        }

        let pattern = pattern
            .filter(|p| !p.is_empty())
            .map(compile_pattern)
            .transpose()?;

        Ok(Self {
            enabled,
            max_length,
            pattern,
        })
    }

    /// Create a validator from its configuration section.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn from_config(config: &ValidationConfig) -> Result<Self, ConfigError> {
        Self::new(config.enabled, config.max_length, Some(&config.pattern))
    }

    /// Validator that accepts any non-null candidate.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            max_length: usize::MAX,
            pattern: None,
        }
    }

    /// Whether validation is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check a candidate without trimming it.
    ///
    /// With validation disabled this is always `true`. Otherwise `None` and
    /// the empty string are rejected, as are candidates longer than the max
    /// length (in code points) or not matching the pattern.
    #[must_use]
    pub fn is_valid(&self, candidate: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }

        let Some(candidate) = candidate else {
            return false;
        };

        if candidate.is_empty() {
            return false;
        }

        if candidate.chars().count() > self.max_length {
            return false;
        }

        self.pattern
            .as_ref()
            .is_none_or(|pattern| pattern.is_match(candidate))
    }

    /// Trim a candidate and return it only if it is valid.
    ///
    /// Never returns an invalid value and never fails.
    #[must_use]
    pub fn sanitize(&self, candidate: Option<&str>) -> Option<String> {
        let trimmed = candidate.map(str::trim);

        if !self.is_valid(trimmed) {
            return None;
        }

        trimmed.map(ToOwned::to_owned)
    }
}

/// Compile a validation pattern, anchoring it to the whole input.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

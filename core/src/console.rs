//! CLI edge: command start, terminate and error.
//!
//! A command may receive its correlation ID from the `--correlation-id`
//! option or from an environment variable (by default `CORRELATION_ID`),
//! each independently allowed by configuration. Without a usable value a
//! fresh ID is generated with the configured prefix (default `CLI-`), so
//! command logs are easy to tell apart from request logs.
//!
//! [`ConsoleEdge::run`] and [`ConsoleEdge::run_async`] wrap a whole command:
//! they enter a scope, bind the ID, and clear storage however the command
//! ends (success, error, panic or cancellation).

use crate::resolve::{Binding, IdSource, Resolver};
use crate::storage::{self, CorrelationIdStorage, current_operation};
use std::env;
use std::future::Future;

const EDGE: &str = "cli";

/// Trusted inputs available to a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInput {
    /// Value of `--correlation-id`, if given.
    pub option: Option<String>,
    /// Value of the correlation environment variable, if set.
    pub env: Option<String>,
}

impl CommandInput {
    /// Build an input from explicit values.
    #[must_use]
    pub const fn new(option: Option<String>, env: Option<String>) -> Self {
        Self { option, env }
    }

    /// Build an input from an option value and the process environment.
    #[must_use]
    pub fn capture(option: Option<String>, env_var: &str) -> Self {
        Self {
            option,
            env: env::var(env_var).ok(),
        }
    }
}

/// Binds correlation IDs to CLI commands.
#[derive(Debug, Clone)]
pub struct ConsoleEdge {
    resolver: Resolver,
    prefix: String,
    allow_option: bool,
    allow_env_var: bool,
    env_var: String,
}

impl ConsoleEdge {
    pub(crate) fn new(
        resolver: Resolver,
        prefix: String,
        allow_option: bool,
        allow_env_var: bool,
        env_var: String,
    ) -> Self {
        Self {
            resolver,
            prefix,
            allow_option,
            allow_env_var,
            env_var,
        }
    }

    /// Storage the edge binds IDs into.
    #[must_use]
    pub const fn storage(&self) -> &CorrelationIdStorage {
        &self.resolver.storage
    }

    /// Environment variable consulted for a correlation ID.
    #[must_use]
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Capture the command's inputs, reading the configured environment variable.
    #[must_use]
    pub fn capture_input(&self, option: Option<String>) -> CommandInput {
        CommandInput::capture(option, &self.env_var)
    }

    /// Bind a correlation ID when a command starts.
    ///
    /// Priority: option (if allowed), environment variable (if allowed),
    /// then `prefix + generated`. Returns `None` for a command started from
    /// inside another operation scope, which is not touched.
    pub fn on_command(&self, input: &CommandInput) -> Option<Binding> {
        if current_operation().is_nested() {
            tracing::trace!("Skipping correlation ID for nested command");
            return None;
        }

        let option = input.option.as_deref().filter(|_| self.allow_option);
        let env = input.env.as_deref().filter(|_| self.allow_env_var);

        Some(self.resolver.bind(
            EDGE,
            [(IdSource::Option, option), (IdSource::EnvVar, env)],
            &self.prefix,
        ))
    }

    /// Clear storage after a command finished successfully.
    pub fn on_terminate(&self) {
        tracing::trace!("Command terminated, clearing correlation ID");
        self.resolver.storage.clear();
    }

    /// Clear storage after a command failed.
    pub fn on_error(&self) {
        tracing::trace!("Command failed, clearing correlation ID");
        self.resolver.storage.clear();
    }

    /// Run a synchronous command inside its own operation scope.
    ///
    /// # Errors
    ///
    /// Returns whatever error the command returns.
    pub fn run<T, E, F>(&self, input: &CommandInput, command: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        storage::sync_scope(|| {
            let _guard = ClearOnDrop(&self.resolver.storage);
            self.on_command(input);
            let result = command();
            self.finish(&result);
            result
        })
    }

    /// Run an asynchronous command inside its own operation scope.
    ///
    /// Storage is also cleared when the returned future is dropped before
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns whatever error the command returns.
    pub async fn run_async<T, E, Fut>(&self, input: &CommandInput, command: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        storage::scope(async {
            let _guard = ClearOnDrop(&self.resolver.storage);
            self.on_command(input);
            let result = command.await;
            self.finish(&result);
            result
        })
        .await
    }

    fn finish<T, E>(&self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.on_terminate(),
            Err(_) => self.on_error(),
        }
    }
}

/// Clears storage when dropped, covering panics and cancellation.
struct ClearOnDrop<'a>(&'a CorrelationIdStorage);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::config::DEFAULT_PATTERN;
    use crate::generator::CorrelationIdGenerator;
    use crate::validator::CorrelationIdValidator;
    use std::sync::Arc;

    fn console(allow_option: bool, allow_env_var: bool) -> ConsoleEdge {
        let generator: Arc<dyn CorrelationIdGenerator> = Arc::new(|| "uuid-123".to_string());
        ConsoleEdge::new(
            Resolver::new(
                CorrelationIdStorage::new(),
                generator,
                Arc::new(CorrelationIdValidator::new(true, 255, Some(DEFAULT_PATTERN)).unwrap()),
            ),
            "CLI-".to_string(),
            allow_option,
            allow_env_var,
            "CORRELATION_ID".to_string(),
        )
    }

    fn input(option: Option<&str>, env: Option<&str>) -> CommandInput {
        CommandInput::new(option.map(String::from), env.map(String::from))
    }

    #[test]
    fn test_generates_prefixed_id_without_input() {
        let console = console(true, true);

        let binding = console.on_command(&CommandInput::default()).unwrap();

        assert_eq!(binding.id, "CLI-uuid-123");
        assert_eq!(binding.source, IdSource::Generated);
        assert_eq!(console.storage().get().as_deref(), Some("CLI-uuid-123"));
        console.on_terminate();
    }

    #[test]
    fn test_option_is_used_when_valid() {
        let console = console(true, true);

        storage::sync_scope(|| {
            let binding = console.on_command(&input(Some("custom-id"), None)).unwrap();
            assert_eq!(binding.id, "custom-id");
            assert_eq!(binding.source, IdSource::Option);
        });
    }

    #[test]
    fn test_blank_option_generates() {
        let console = console(true, true);

        storage::sync_scope(|| {
            let binding = console.on_command(&input(Some("   "), None)).unwrap();
            assert_eq!(binding.id, "CLI-uuid-123");
            assert_eq!(binding.source, IdSource::Generated);
        });
    }

    #[test]
    fn test_option_ignored_when_not_allowed() {
        let console = console(false, true);

        storage::sync_scope(|| {
            let binding = console.on_command(&input(Some("custom-id"), None)).unwrap();
            assert_eq!(binding.id, "CLI-uuid-123");
        });
    }

    #[test]
    fn test_env_var_used_after_option() {
        let console = console(true, true);

        storage::sync_scope(|| {
            let binding = console
                .on_command(&input(Some("bad id!"), Some("env-id")))
                .unwrap();
            assert_eq!(binding.id, "env-id");
            assert_eq!(binding.source, IdSource::EnvVar);
        });
    }

    #[test]
    fn test_env_var_ignored_when_not_allowed() {
        let console = console(true, false);

        storage::sync_scope(|| {
            let binding = console.on_command(&input(None, Some("env-id"))).unwrap();
            assert_eq!(binding.source, IdSource::Generated);
        });
    }

    #[test]
    fn test_terminate_and_error_clear() {
        let console = console(true, true);

        storage::sync_scope(|| {
            console.storage().set("some-id");
            console.on_terminate();
            assert!(!console.storage().has());

            console.storage().set("some-id");
            console.on_error();
            assert!(!console.storage().has());
        });
    }

    #[test]
    fn test_run_binds_and_clears() {
        let console = console(true, true);
        let storage = console.storage().clone();

        let seen: Result<Option<String>, ()> =
            console.run(&input(Some("job-42"), None), || Ok(storage.get()));

        assert_eq!(seen.unwrap().as_deref(), Some("job-42"));
        assert!(!console.storage().has());
    }

    #[test]
    fn test_run_clears_on_error() {
        let console = console(true, true);
        console.storage().set("stale-fallback");

        let result: Result<(), &str> = console.run(&CommandInput::default(), || Err("boom"));

        assert_eq!(result, Err("boom"));
        assert!(!console.storage().has());
    }

    #[test]
    fn test_run_clears_on_panic() {
        let console = console(true, true);
        console.storage().set("stale-fallback");

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), ()> = console.run(&CommandInput::default(), || {
                assert!(console.storage().has());
                std::panic::panic_any("command panicked");
            });
        }));

        assert!(outcome.is_err());
        assert!(!console.storage().has());
    }

    #[tokio::test]
    async fn test_run_async_binds_and_clears() {
        let console = console(true, true);
        let storage = console.storage().clone();

        let seen: Result<Option<String>, ()> = console
            .run_async(&CommandInput::default(), async {
                tokio::task::yield_now().await;
                Ok(storage.get())
            })
            .await;

        assert_eq!(seen.unwrap().as_deref(), Some("CLI-uuid-123"));
        assert!(!console.storage().has());
    }

    #[test]
    fn test_nested_command_is_skipped() {
        let console = console(true, true);

        let _: Result<(), ()> = console.run(&input(Some("outer"), None), || {
            let inner: Result<Option<String>, ()> =
                console.run(&input(Some("inner"), None), || Ok(console.storage().get()));
            assert_eq!(inner.unwrap(), None);
            assert_eq!(console.storage().get().as_deref(), Some("outer"));
            Ok(())
        });
    }
}

//! Scoped storage for the current correlation ID.
//!
//! An *operation scope* is one logical unit of work: an HTTP request, a CLI
//! command, a consumed message. Scopes are entered explicitly with
//! [`scope`] (async) or [`sync_scope`] (sync) and are backed by a tokio
//! task-local, so concurrent requests on a multi-threaded runtime never see
//! each other's IDs.
//!
//! Scopes nest. Each nesting level owns its own empty slot: a nested
//! operation does not inherit its parent's ID, and the parent's ID is back in
//! place once the nested scope returns.
//!
//! ```text
//! scope ──────────────────────────────────────────────┐  depth 0 (main)
//! │ set("main-id")                                    │
//! │   scope ───────────────────────┐  depth 1 (nested)│
//! │   │ get() == None              │                  │
//! │   └────────────────────────────┘                  │
//! │ get() == Some("main-id")                          │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! Outside any scope, [`CorrelationIdStorage`] falls back to a single slot
//! shared by all clones of the storage. That slot assumes a single writer
//! (one CLI command per process, bootstrap code); concurrent unscoped work
//! sharing one storage will overwrite each other's IDs. Enter a scope for
//! every unit of work that runs concurrently.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static OPERATION_SCOPE: ScopeSlot;
}

/// Per-scope state held in the task-local.
#[derive(Debug)]
struct ScopeSlot {
    depth: usize,
    id: RefCell<Option<String>>,
}

impl ScopeSlot {
    fn enter() -> Self {
        let depth = OPERATION_SCOPE
            .try_with(|parent| parent.depth + 1)
            .unwrap_or(0);

        Self {
            depth,
            id: RefCell::new(None),
        }
    }
}

/// Where the caller currently sits relative to operation scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Inside a top-level scope.
    Main,
    /// Inside a scope entered from within another scope.
    Nested {
        /// Nesting depth, starting at 1 for the first nested level.
        depth: usize,
    },
    /// No scope is active; storage uses the fallback slot.
    Unscoped,
}

impl Operation {
    /// `true` for [`Operation::Nested`].
    #[must_use]
    pub const fn is_nested(self) -> bool {
        matches!(self, Self::Nested { .. })
    }
}

/// The operation the caller is currently running in.
#[must_use]
pub fn current_operation() -> Operation {
    match OPERATION_SCOPE.try_with(|slot| slot.depth) {
        Ok(0) => Operation::Main,
        Ok(depth) => Operation::Nested { depth },
        Err(_) => Operation::Unscoped,
    }
}

/// Run a future inside a new operation scope.
///
/// The scope starts empty. If a scope is already active the new one is
/// nested inside it.
pub async fn scope<F>(future: F) -> F::Output
where
    F: Future,
{
    OPERATION_SCOPE.scope(ScopeSlot::enter(), future).await
}

/// Run a closure inside a new operation scope.
///
/// Synchronous counterpart of [`scope`].
pub fn sync_scope<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    OPERATION_SCOPE.sync_scope(ScopeSlot::enter(), f)
}

/// Holds at most one correlation ID for the current operation.
///
/// Cloning is cheap; clones share the fallback slot.
///
/// # Example
///
/// ```
/// use correlate_core::storage::{self, CorrelationIdStorage};
///
/// let storage = CorrelationIdStorage::new();
///
/// storage::sync_scope(|| {
///     storage.set("abc-123");
///     assert_eq!(storage.get().as_deref(), Some("abc-123"));
/// });
///
/// assert!(!storage.has());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CorrelationIdStorage {
    fallback: Arc<Mutex<Option<String>>>,
}

impl CorrelationIdStorage {
    /// Create a storage with an empty fallback slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// ID bound to the current scope, or the fallback ID when unscoped.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        OPERATION_SCOPE
            .try_with(|slot| slot.id.borrow().clone())
            .unwrap_or_else(|_| self.fallback.lock().clone())
    }

    /// Bind an ID to the current scope, or to the fallback slot when unscoped.
    pub fn set(&self, id: impl Into<String>) {
        let id = id.into();

        if let Err(_unscoped) = OPERATION_SCOPE.try_with(|slot| {
            slot.id.replace(Some(id.clone()));
        }) {
            *self.fallback.lock() = Some(id);
        }
    }

    /// Whether an ID is available to the current operation.
    #[must_use]
    pub fn has(&self) -> bool {
        self.get().is_some()
    }

    /// Remove the current scope's ID and always empty the fallback slot.
    pub fn clear(&self) {
        let _ = OPERATION_SCOPE.try_with(|slot| slot.id.replace(None));
        self.fallback.lock().take();
    }
}

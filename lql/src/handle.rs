//! One-time, asynchronously initialized engine for client embeddings.
//!
//! A client loads the engine once, in the background, at start-up. Until the
//! load finishes, or if it failed, client-side validation is skipped: the
//! caller lets the query through and the server, which always re-validates,
//! has the final word. A skipped check must never be shown as a failure.

use crate::engine::Engine;
use crate::query::ValidationResult;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// Observable lifecycle of an `EngineHandle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// `initialize` has not been called.
    Uninitialized,
    /// The loader is running.
    Loading,
    /// The engine is available.
    Ready,
    /// The loader failed; the reason is kept for diagnostics.
    Failed(String),
}

/// Outcome of a client-side validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientValidation {
    /// The engine checked the query.
    Checked(ValidationResult),
    /// The engine is not ready; treat the query as optimistically valid.
    Skipped,
}

impl ClientValidation {
    /// True only when the engine ran and rejected the query.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Checked(result) if !result.valid)
    }

    /// The validation result, if the engine ran.
    #[must_use]
    pub fn result(&self) -> Option<&ValidationResult> {
        match self {
            Self::Checked(result) => Some(result),
            Self::Skipped => None,
        }
    }
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Uninitialized,
    Loading,
    Ready(Engine),
    Failed(String),
}

impl Slot {
    fn state(&self) -> EngineState {
        match self {
            Self::Uninitialized => EngineState::Uninitialized,
            Self::Loading => EngineState::Loading,
            Self::Ready(_) => EngineState::Ready,
            Self::Failed(reason) => EngineState::Failed(reason.clone()),
        }
    }
}

/// Returns a slot left in `Loading` to `Uninitialized` if the load future is
/// dropped before it stores its outcome, so a later `initialize` can retry.
struct LoadGuard<'a> {
    slot: &'a RwLock<Slot>,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, Slot::Loading) {
            tracing::warn!("Query engine load was cancelled; handle reset");
            *slot = Slot::Uninitialized;
        }
    }
}

/// Thread-safe, cloneable handle to a lazily loaded `Engine`.
///
/// # Example
///
/// ```
/// use lql::engine::Engine;
/// use lql::handle::{ClientValidation, EngineHandle, EngineState};
///
/// let handle = EngineHandle::new();
/// assert_eq!(handle.validate(":errors"), ClientValidation::Skipped);
///
/// tokio_test::block_on(handle.initialize(|| async { Engine::builtin() }));
/// assert_eq!(handle.state(), EngineState::Ready);
/// assert!(handle.validate(":nope").is_rejected());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineHandle {
    slot: Arc<RwLock<Slot>>,
}

impl EngineHandle {
    /// Creates an uninitialized handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle that is already ready.
    #[must_use]
    pub fn ready(engine: Engine) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot::Ready(engine))),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    /// Runs `loader` if no load has been started yet, and returns the
    /// resulting state.
    ///
    /// Only the first call on a handle (or any of its clones) runs its
    /// loader; later calls return the current state without calling theirs.
    /// If the returned future is dropped mid-load, the handle goes back to
    /// `Uninitialized` and the next call runs its loader.
    pub async fn initialize<F, Fut, E>(&self, loader: F) -> EngineState
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Engine, E>>,
        E: Display,
    {
        {
            let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
            if !matches!(*slot, Slot::Uninitialized) {
                return slot.state();
            }
            *slot = Slot::Loading;
        }
        let mut guard = LoadGuard {
            slot: &self.slot,
            armed: true,
        };

        tracing::debug!("Loading query engine");
        let loaded = loader().await;

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        guard.armed = false;
        *slot = match loaded {
            Ok(engine) => {
                tracing::info!(
                    version = %engine.catalogue().version(),
                    "Query engine ready"
                );
                Slot::Ready(engine)
            }
            Err(error) => {
                let reason = error.to_string();
                tracing::warn!(
                    error = %reason,
                    "Query engine failed to load; client validation disabled"
                );
                Slot::Failed(reason)
            }
        };
        slot.state()
    }

    /// Validates `text` if the engine is ready, and skips otherwise.
    #[must_use]
    pub fn validate(&self, text: &str) -> ClientValidation {
        match self.engine() {
            Some(engine) => ClientValidation::Checked(engine.validate(text)),
            None => ClientValidation::Skipped,
        }
    }

    /// The engine, if ready.
    #[must_use]
    pub fn engine(&self) -> Option<Engine> {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Ready(engine) => Some(engine.clone()),
            Slot::Uninitialized | Slot::Loading | Slot::Failed(_) => None,
        }
    }
}

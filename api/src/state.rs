//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::config::Config;
use crate::store::{InMemoryLogStore, LogStore};
use lql::catalogue::CatalogueError;
use lql::engine::Engine;
use lql::query::{LabelPolicy, ValidationOptions};
use std::sync::Arc;

/// How many entries a query response may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Used when the request gives no limit.
    pub default_limit: usize,
    /// Requests asking for more are capped to this.
    pub max_limit: usize,
}

impl QueryLimits {
    /// The number of entries to return for a requested limit.
    #[must_use]
    pub fn cap(self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        let config = Config::default();
        Self {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        }
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative query engine.
    engine: Arc<Engine>,
    /// The log storage backend.
    log_store: Arc<dyn LogStore>,
    limits: QueryLimits,
}

impl AppState {
    /// Creates a new application state from its parts.
    pub fn new(engine: Engine, log_store: Arc<dyn LogStore>, limits: QueryLimits) -> Self {
        Self {
            engine: Arc::new(engine),
            log_store,
            limits,
        }
    }

    /// Creates a new application state with an in-memory store and default limits.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_in_memory_store(engine: Engine) -> Self {
        Self::new(
            engine,
            Arc::new(InMemoryLogStore::new()),
            QueryLimits::default(),
        )
    }

    /// Builds the state the server runs with: the built-in catalogue, an
    /// in-memory store, and the limits and label policy from `config`.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogueError` if the built-in catalogue is inconsistent.
    pub fn from_config(config: &Config) -> Result<Self, CatalogueError> {
        let policy = if config.strict_labels {
            LabelPolicy::Reject
        } else {
            LabelPolicy::Ignore
        };
        let engine =
            Engine::builtin()?.with_options(ValidationOptions::default().with_label_policy(policy));

        Ok(Self::new(
            engine,
            Arc::new(InMemoryLogStore::new()),
            QueryLimits {
                default_limit: config.default_limit,
                max_limit: config.max_limit,
            },
        ))
    }

    /// Returns the query engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns a reference to the log store.
    #[must_use]
    pub fn log_store(&self) -> &dyn LogStore {
        self.log_store.as_ref()
    }

    /// Returns the response size limits.
    #[must_use]
    pub fn limits(&self) -> QueryLimits {
        self.limits
    }
}

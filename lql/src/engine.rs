//! The query facade.
//!
//! `Engine` bundles a `Catalogue` with `ValidationOptions` and exposes the
//! three calls clients need: validate text, fetch autocomplete metadata, and
//! evaluate a query over a set of entries.

use crate::catalogue::{Catalogue, CatalogueError, Metadata};
use crate::models::LogEntry;
use crate::query::{
    self, parse_query, CompiledQuery, QueryError, ValidationOptions, ValidationResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Entries a query produced, cut to the caller's limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutput {
    /// The first `limit` entries, in pipeline order.
    pub entries: Vec<LogEntry>,
    /// How many entries the query produced before the cut.
    pub total: usize,
}

/// Entry point for validating and running LQL.
///
/// Cheap to clone; the catalogue is shared.
///
/// # Example
///
/// ```
/// use lql::engine::Engine;
/// use lql::models::{LogEntry, Severity};
///
/// let engine = Engine::builtin().unwrap();
///
/// let result = engine.validate(":errrors");
/// assert!(!result.valid);
/// assert_eq!(result.suggestions, vec![":errors"]);
///
/// let entries = vec![
///     LogEntry::new(1, Severity::Error, "rabbit@a", "boom"),
///     LogEntry::new(2, Severity::Info, "rabbit@a", "fine"),
/// ];
/// let matched = engine.evaluate(":errors", entries).unwrap();
/// assert_eq!(matched.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    catalogue: Arc<Catalogue>,
    options: ValidationOptions,
}

impl Engine {
    /// Creates an engine over `catalogue` with default options.
    #[must_use]
    pub fn new(catalogue: Catalogue) -> Self {
        Self::from_shared(Arc::new(catalogue))
    }

    /// Creates an engine over an already shared catalogue.
    #[must_use]
    pub fn from_shared(catalogue: Arc<Catalogue>) -> Self {
        Self {
            catalogue,
            options: ValidationOptions::default(),
        }
    }

    /// Creates an engine over the built-in catalogue.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogueError` if a built-in preset is malformed.
    pub fn builtin() -> Result<Self, CatalogueError> {
        Ok(Self::new(Catalogue::builtin()?))
    }

    /// Replaces the validation options.
    #[must_use]
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// The catalogue in use.
    #[must_use]
    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// The options in use.
    #[must_use]
    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    /// Validates query text with the engine's options.
    #[must_use]
    pub fn validate(&self, text: &str) -> ValidationResult {
        self.validate_with(text, self.options)
    }

    /// Validates query text with explicit options.
    #[must_use]
    pub fn validate_with(&self, text: &str, options: ValidationOptions) -> ValidationResult {
        let result = match parse_query(text) {
            Ok(parsed) => query::validate(&parsed, &self.catalogue, options),
            Err(error) => ValidationResult::from(&error),
        };

        if !result.valid {
            tracing::debug!(
                query = %text,
                position = ?result.error_position,
                error = result.error_message.as_deref().unwrap_or_default(),
                "Query failed validation"
            );
        }

        result
    }

    /// The autocomplete payload.
    #[must_use]
    pub fn autocomplete_data(&self) -> Metadata {
        self.catalogue.metadata()
    }

    /// Parses, validates and compiles query text.
    ///
    /// # Errors
    ///
    /// Returns a `QueryError` if the text does not parse or validate.
    pub fn compile(&self, text: &str) -> Result<CompiledQuery, QueryError> {
        let parsed = parse_query(text)?;
        let compiled = query::compile(&parsed, &self.catalogue, self.options)?;
        Ok(compiled)
    }

    /// Runs query text over `entries`.
    ///
    /// # Errors
    ///
    /// Returns a `QueryError` if the text does not parse or validate; the
    /// entries are not touched in that case.
    pub fn evaluate(&self, text: &str, entries: Vec<LogEntry>) -> Result<Vec<LogEntry>, QueryError> {
        let compiled = self.compile(text).inspect_err(|error| {
            tracing::debug!(query = %text, error = %error, "Query rejected");
        })?;

        let candidates = entries.len();
        let matched = compiled.run(entries);
        tracing::trace!(
            query = %text,
            candidates,
            matched = matched.len(),
            "Query evaluated"
        );

        Ok(matched)
    }

    /// Runs query text over `entries` and keeps at most `limit` of the
    /// results, reporting how many there were in total.
    ///
    /// `limit` is the transport cap of the caller and applies after the
    /// query's own pipeline.
    ///
    /// # Errors
    ///
    /// Returns a `QueryError` if the text does not parse or validate.
    pub fn query(
        &self,
        text: &str,
        entries: Vec<LogEntry>,
        limit: usize,
    ) -> Result<QueryOutput, QueryError> {
        let mut entries = self.evaluate(text, entries)?;
        let total = entries.len();
        entries.truncate(limit);
        Ok(QueryOutput { entries, total })
    }
}

//! The metadata catalogue: the vocabulary LQL validates against and
//! advertises for autocomplete.
//!
//! A `Catalogue` is built once, is immutable afterwards, and is passed by
//! reference into every validation and compilation call. `Catalogue::builtin()`
//! returns the RabbitMQ vocabulary; `Catalogue::builder()` assembles synthetic
//! catalogues for tests.

mod builtin;

use crate::models::{LogField, Severity};
use crate::query::{check_preset, parse_query, ComparisonOp, Expr, ParseError, SemanticError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use builtin::CATALOGUE_VERSION;

/// Declared type of a field, which decides the operators and literals it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text.
    String,
    /// One of a fixed, ordered set of names (severity).
    Enum,
    /// An instant.
    Timestamp,
    /// A set of tags.
    Set,
    /// A whole number.
    Integer,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Enum => "enum",
            Self::Timestamp => "timestamp",
            Self::Set => "set",
            Self::Integer => "integer",
        };
        f.write_str(name)
    }
}

/// A queryable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name as written in queries.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether `sort` accepts the field.
    pub sortable: bool,
    /// Human-readable description.
    pub description: String,
}

/// A comparison operator and the field types it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorInfo {
    /// The operator as written.
    pub symbol: String,
    /// Field types the operator is legal for.
    pub applies_to: Vec<FieldType>,
    /// Human-readable description.
    pub description: String,
}

/// A pipeline stage and its argument shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStageInfo {
    /// Stage name.
    pub name: String,
    /// Argument shape, e.g. `limit <n>`.
    pub syntax: String,
    /// Human-readable description.
    pub description: String,
}

/// A time-window unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationUnit {
    /// Suffix written after the amount, e.g. `h`.
    pub suffix: String,
    /// Length of one unit in seconds.
    pub seconds: u64,
    /// Human-readable description.
    pub description: String,
}

/// Syntax hint for a sigil-prefixed filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialFilter {
    /// The sigil, e.g. `#`.
    pub sigil: String,
    /// Example syntax, e.g. `#<label>`.
    pub syntax: String,
    /// Human-readable description.
    pub description: String,
}

/// A named, pre-authored filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    /// Name used after the `:` sigil.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// The expansion as LQL text.
    pub source: String,
    /// The parsed expansion.
    pub expansion: Expr,
}

/// Preset entry in the autocomplete payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetInfo {
    /// Preset name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// The expansion as LQL text.
    pub expansion: String,
}

/// Autocomplete payload shared by the HTTP API and client embeddings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Catalogue version; matches the engine version.
    pub version: String,
    /// Queryable fields.
    pub fields: Vec<FieldInfo>,
    /// Severities, least urgent first.
    pub severities: Vec<Severity>,
    /// Comparison operators.
    pub operators: Vec<OperatorInfo>,
    /// Pipeline stages.
    pub pipeline_stages: Vec<PipelineStageInfo>,
    /// Time-window units.
    pub duration_units: Vec<DurationUnit>,
    /// Sigil syntax hints.
    pub special_filters: Vec<SpecialFilter>,
    /// Presets.
    pub presets: Vec<PresetInfo>,
    /// Known label vocabulary.
    pub labels: Vec<String>,
    /// Largest accepted `limit`.
    pub max_limit: u64,
}

/// Errors raised while building a catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogueError {
    /// A field name does not correspond to a log entry attribute.
    #[error("Field '{0}' is not an attribute of log entries")]
    UnsupportedField(String),

    /// An operator symbol the evaluator cannot apply.
    #[error("Operator '{0}' is not supported by the evaluator")]
    UnsupportedOperator(String),

    /// Two presets share a name.
    #[error("Preset ':{0}' is defined more than once")]
    DuplicatePreset(String),

    /// A preset source does not parse.
    #[error("Preset ':{name}' does not parse: {source}")]
    PresetSyntax {
        /// Preset name.
        name: String,
        /// The parse failure.
        source: ParseError,
    },

    /// A preset source carries a pipeline, which presets cannot express.
    #[error("Preset ':{0}' must be a filter expression without pipeline stages")]
    PresetPipeline(String),

    /// A preset parses but does not validate.
    #[error("Preset ':{name}' is invalid: {source}")]
    InvalidPreset {
        /// Preset name.
        name: String,
        /// The validation failure.
        source: SemanticError,
    },

    /// `max_limit` must allow at least one entry.
    #[error("max_limit must be at least 1")]
    ZeroMaxLimit,
}

/// The immutable vocabulary used by validation, compilation and autocomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalogue {
    version: String,
    fields: Vec<FieldInfo>,
    severities: Vec<Severity>,
    operators: Vec<OperatorInfo>,
    pipeline_stages: Vec<PipelineStageInfo>,
    duration_units: Vec<DurationUnit>,
    special_filters: Vec<SpecialFilter>,
    presets: Vec<Preset>,
    labels: Vec<String>,
    max_limit: u64,
}

impl Catalogue {
    /// Returns the built-in RabbitMQ catalogue.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogueError` if a built-in preset is malformed.
    pub fn builtin() -> Result<Self, CatalogueError> {
        builtin::builder().build()
    }

    /// Starts an empty catalogue.
    #[must_use]
    pub fn builder() -> CatalogueBuilder {
        CatalogueBuilder::default()
    }

    /// Catalogue version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All fields, in catalogue order.
    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Severities, least urgent first.
    #[must_use]
    pub fn severities(&self) -> &[Severity] {
        &self.severities
    }

    /// Looks up an operator by symbol. Word operators match case-insensitively.
    #[must_use]
    pub fn operator(&self, symbol: &str) -> Option<&OperatorInfo> {
        self.operators
            .iter()
            .find(|op| op.symbol.eq_ignore_ascii_case(symbol))
    }

    /// All operators, in catalogue order.
    #[must_use]
    pub fn operators(&self) -> &[OperatorInfo] {
        &self.operators
    }

    /// Pipeline stages.
    #[must_use]
    pub fn pipeline_stages(&self) -> &[PipelineStageInfo] {
        &self.pipeline_stages
    }

    /// Looks up a duration unit by its suffix.
    #[must_use]
    pub fn duration_unit(&self, suffix: &str) -> Option<&DurationUnit> {
        self.duration_units.iter().find(|u| u.suffix == suffix)
    }

    /// Duration units.
    #[must_use]
    pub fn duration_units(&self) -> &[DurationUnit] {
        &self.duration_units
    }

    /// Looks up a preset by name.
    #[must_use]
    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// All presets, in catalogue order.
    #[must_use]
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Returns true if `name` is in the known label vocabulary.
    #[must_use]
    pub fn is_known_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }

    /// Known label vocabulary.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Largest accepted `limit`.
    #[must_use]
    pub fn max_limit(&self) -> u64 {
        self.max_limit
    }

    /// Adds a preset without parsing or validating it.
    #[cfg(test)]
    pub(crate) fn with_preset_unchecked(mut self, preset: Preset) -> Self {
        self.presets.push(preset);
        self
    }

    /// Builds the autocomplete payload.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        Metadata {
            version: self.version.clone(),
            fields: self.fields.clone(),
            severities: self.severities.clone(),
            operators: self.operators.clone(),
            pipeline_stages: self.pipeline_stages.clone(),
            duration_units: self.duration_units.clone(),
            special_filters: self.special_filters.clone(),
            presets: self
                .presets
                .iter()
                .map(|p| PresetInfo {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    expansion: p.source.clone(),
                })
                .collect(),
            labels: self.labels.clone(),
            max_limit: self.max_limit,
        }
    }
}

/// Assembles a `Catalogue`, checking it against the evaluator on `build`.
///
/// # Example
///
/// ```
/// use lql::catalogue::{Catalogue, FieldType};
///
/// let catalogue = Catalogue::builder()
///     .field("severity", FieldType::Enum, true, "Log severity")
///     .operator("==", &[FieldType::Enum], "Equals")
///     .preset("errors", "Errors only", r#"severity == "error""#)
///     .build()
///     .unwrap();
///
/// assert!(catalogue.preset("errors").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct CatalogueBuilder {
    version: String,
    fields: Vec<FieldInfo>,
    severities: Vec<Severity>,
    operators: Vec<OperatorInfo>,
    pipeline_stages: Vec<PipelineStageInfo>,
    duration_units: Vec<DurationUnit>,
    special_filters: Vec<SpecialFilter>,
    presets: Vec<(String, String, String)>,
    labels: Vec<String>,
    max_limit: u64,
}

impl Default for CatalogueBuilder {
    fn default() -> Self {
        Self {
            version: CATALOGUE_VERSION.to_string(),
            fields: Vec::new(),
            severities: Severity::ALL.to_vec(),
            operators: Vec::new(),
            pipeline_stages: Vec::new(),
            duration_units: Vec::new(),
            special_filters: Vec::new(),
            presets: Vec::new(),
            labels: Vec::new(),
            max_limit: builtin::MAX_LIMIT,
        }
    }
}

impl CatalogueBuilder {
    /// Sets the version string.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        sortable: bool,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldInfo {
            name: name.into(),
            field_type,
            sortable,
            description: description.into(),
        });
        self
    }

    /// Adds an operator.
    #[must_use]
    pub fn operator(
        mut self,
        symbol: impl Into<String>,
        applies_to: &[FieldType],
        description: impl Into<String>,
    ) -> Self {
        self.operators.push(OperatorInfo {
            symbol: symbol.into(),
            applies_to: applies_to.to_vec(),
            description: description.into(),
        });
        self
    }

    /// Adds a pipeline stage description.
    #[must_use]
    pub fn pipeline_stage(
        mut self,
        name: impl Into<String>,
        syntax: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.pipeline_stages.push(PipelineStageInfo {
            name: name.into(),
            syntax: syntax.into(),
            description: description.into(),
        });
        self
    }

    /// Adds a duration unit.
    #[must_use]
    pub fn duration_unit(
        mut self,
        suffix: impl Into<String>,
        seconds: u64,
        description: impl Into<String>,
    ) -> Self {
        self.duration_units.push(DurationUnit {
            suffix: suffix.into(),
            seconds,
            description: description.into(),
        });
        self
    }

    /// Adds a sigil syntax hint.
    #[must_use]
    pub fn special_filter(
        mut self,
        sigil: impl Into<String>,
        syntax: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.special_filters.push(SpecialFilter {
            sigil: sigil.into(),
            syntax: syntax.into(),
            description: description.into(),
        });
        self
    }

    /// Adds a preset; `source` is parsed and validated by `build`.
    #[must_use]
    pub fn preset(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        self.presets
            .push((name.into(), description.into(), source.into()));
        self
    }

    /// Adds a known label.
    #[must_use]
    pub fn label(mut self, name: impl Into<String>) -> Self {
        self.labels.push(name.into());
        self
    }

    /// Sets the largest accepted `limit`.
    #[must_use]
    pub fn max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Checks the vocabulary and parses and validates every preset.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogueError` if a field or operator is unknown to the
    /// evaluator, or if a preset is duplicated, malformed, carries a
    /// pipeline, references another preset, or fails validation.
    pub fn build(self) -> Result<Catalogue, CatalogueError> {
        if self.max_limit == 0 {
            return Err(CatalogueError::ZeroMaxLimit);
        }
        if let Some(field) = self
            .fields
            .iter()
            .find(|f| LogField::from_name(&f.name).is_none())
        {
            return Err(CatalogueError::UnsupportedField(field.name.clone()));
        }
        if let Some(op) = self
            .operators
            .iter()
            .find(|op| ComparisonOp::from_symbol(&op.symbol).is_none())
        {
            return Err(CatalogueError::UnsupportedOperator(op.symbol.clone()));
        }

        let mut presets: Vec<Preset> = Vec::with_capacity(self.presets.len());
        for (name, description, source) in self.presets {
            if presets.iter().any(|p| p.name == name) {
                return Err(CatalogueError::DuplicatePreset(name));
            }
            let query = match parse_query(&source) {
                Ok(query) => query,
                Err(error) => {
                    return Err(CatalogueError::PresetSyntax {
                        name,
                        source: error,
                    })
                }
            };
            if !query.pipeline.is_empty() {
                return Err(CatalogueError::PresetPipeline(name));
            }
            presets.push(Preset {
                name,
                description,
                source,
                expansion: query.filter,
            });
        }

        let catalogue = Catalogue {
            version: self.version,
            fields: self.fields,
            severities: self.severities,
            operators: self.operators,
            pipeline_stages: self.pipeline_stages,
            duration_units: self.duration_units,
            special_filters: self.special_filters,
            presets,
            labels: self.labels,
            max_limit: self.max_limit,
        };

        for preset in &catalogue.presets {
            check_preset(preset, &catalogue).map_err(|source| CatalogueError::InvalidPreset {
                name: preset.name.clone(),
                source,
            })?;
        }

        tracing::debug!(
            version = %catalogue.version,
            presets = catalogue.presets.len(),
            fields = catalogue.fields.len(),
            "Catalogue built"
        );

        Ok(catalogue)
    }
}

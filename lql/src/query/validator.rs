//! Semantic validation.
//!
//! Resolves the names in a parsed query against a `Catalogue`: fields and the
//! operators legal for their types, literal types, presets, labels, duration
//! units and pipeline stages. Validation stops at the first error, walking the
//! filter left to right and then the pipeline. Every error carries the byte
//! offset of the offending token and "did you mean" suggestions rendered as
//! replacement text.
//!
//! The same walk lowers the query into the typed predicate the evaluator runs,
//! so a query that validates always compiles.

use super::ast::{Comparison, Expr, Literal, PipelineStage, Query};
use super::executor::{ComparisonOp, CompiledQuery, Predicate, Stage, Value};
use super::parser::ParseError;
use super::suggest::{suggest, MAX_SUGGESTIONS};
use crate::catalogue::{Catalogue, FieldInfo, FieldType, Preset};
use crate::models::{LogField, Severity};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How unknown label names are treated.
///
/// Labels are open vocabulary, so an unknown name is not an error unless the
/// caller asks for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelPolicy {
    /// Accept silently.
    #[default]
    Ignore,
    /// Accept, and report a `Warning`.
    Warn,
    /// Reject with `SemanticError::UnknownLabel`.
    Reject,
}

/// Knobs for validation and compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Treatment of unknown label names.
    #[serde(default)]
    pub label_policy: LabelPolicy,
}

impl ValidationOptions {
    /// Options that reject unknown labels.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            label_policy: LabelPolicy::Reject,
        }
    }

    /// Sets the label policy.
    #[must_use]
    pub fn with_label_policy(mut self, label_policy: LabelPolicy) -> Self {
        self.label_policy = label_policy;
        self
    }
}

/// A non-fatal diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Human-readable description.
    pub message: String,
    /// Byte offset in the query text.
    pub position: usize,
    /// Replacement candidates, best first.
    pub suggestions: Vec<String>,
}

/// Errors found while resolving a parsed query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    /// A comparison or sort names a field the catalogue does not know.
    #[error("Unknown field '{name}'")]
    UnknownField {
        /// The field name as written.
        name: String,
        /// Offset of the field name.
        offset: usize,
        /// Closest field names.
        suggestions: Vec<String>,
    },

    /// An operator the catalogue does not know.
    #[error("Unknown operator '{symbol}'")]
    UnknownOperator {
        /// The operator as written.
        symbol: String,
        /// Offset of the operator.
        offset: usize,
        /// Closest operators.
        suggestions: Vec<String>,
    },

    /// A known operator used on a field type it does not apply to.
    #[error("Operator '{symbol}' cannot be used with {field_type} field '{field}'")]
    OperatorNotApplicable {
        /// The operator as written.
        symbol: String,
        /// The field name.
        field: String,
        /// The field's declared type.
        field_type: FieldType,
        /// Offset of the operator.
        offset: usize,
        /// Operators that do apply.
        suggestions: Vec<String>,
    },

    /// A literal of the wrong kind or format for the field.
    #[error("Invalid value {found} for field '{field}': expected {expected}")]
    InvalidLiteral {
        /// The field name.
        field: String,
        /// What the field accepts.
        expected: String,
        /// The literal as printed.
        found: String,
        /// Offset of the literal.
        offset: usize,
        /// Valid literals close to the one written.
        suggestions: Vec<String>,
    },

    /// `:name` does not name a preset.
    #[error("Unknown preset ':{name}'")]
    UnknownPreset {
        /// The preset name without the sigil.
        name: String,
        /// Offset of the `:`.
        offset: usize,
        /// Closest presets, with the sigil.
        suggestions: Vec<String>,
    },

    /// A preset whose expansion references another preset.
    #[error("Preset ':{preset}' references preset ':{nested}'; presets cannot be nested")]
    NestedPreset {
        /// The preset being expanded.
        preset: String,
        /// The preset it references.
        nested: String,
        /// Offset of the reference being expanded.
        offset: usize,
    },

    /// A preset whose expansion fails validation.
    #[error("Preset ':{name}' is invalid: {source}")]
    InPreset {
        /// The preset name.
        name: String,
        /// Offset of the `:name` reference.
        offset: usize,
        /// The error inside the expansion.
        source: Box<SemanticError>,
    },

    /// A label outside the known vocabulary, under `LabelPolicy::Reject`.
    #[error("Unknown label '#{name}'")]
    UnknownLabel {
        /// The label name without the sigil.
        name: String,
        /// Offset of the sigil.
        offset: usize,
        /// Closest known labels, with the sigil.
        suggestions: Vec<String>,
    },

    /// `@<amount><unit>` with an unknown unit.
    #[error("Unknown duration unit '{unit}' in time window")]
    UnknownDurationUnit {
        /// The unit as written.
        unit: String,
        /// Offset of the `@`.
        offset: usize,
        /// The window rewritten with the closest units.
        suggestions: Vec<String>,
    },

    /// A time window too large to represent.
    #[error("Time window '@{amount}{unit}' is too large")]
    DurationOutOfRange {
        /// The amount.
        amount: u64,
        /// The unit.
        unit: String,
        /// Offset of the `@`.
        offset: usize,
    },

    /// A pipeline stage name the catalogue does not know.
    #[error("Unknown pipeline stage '{name}'")]
    UnknownPipelineStage {
        /// The stage name as written.
        name: String,
        /// Offset of the stage name.
        offset: usize,
        /// Closest stage names.
        suggestions: Vec<String>,
    },

    /// `limit` outside `[1, max]`.
    #[error("Limit must be between 1 and {max}, got {value}")]
    LimitOutOfRange {
        /// The requested limit.
        value: i64,
        /// The catalogue's `max_limit`.
        max: u64,
        /// Offset of the number.
        offset: usize,
    },

    /// `sort` on a field that is not sortable.
    #[error("Field '{field}' cannot be sorted on")]
    UnsortableField {
        /// The field name.
        field: String,
        /// Offset of the field name.
        offset: usize,
        /// Sortable fields.
        suggestions: Vec<String>,
    },
}

impl SemanticError {
    /// Byte offset of the error in the query text.
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            Self::UnknownField { offset, .. }
            | Self::UnknownOperator { offset, .. }
            | Self::OperatorNotApplicable { offset, .. }
            | Self::InvalidLiteral { offset, .. }
            | Self::UnknownPreset { offset, .. }
            | Self::NestedPreset { offset, .. }
            | Self::InPreset { offset, .. }
            | Self::UnknownLabel { offset, .. }
            | Self::UnknownDurationUnit { offset, .. }
            | Self::DurationOutOfRange { offset, .. }
            | Self::UnknownPipelineStage { offset, .. }
            | Self::LimitOutOfRange { offset, .. }
            | Self::UnsortableField { offset, .. } => *offset,
        }
    }

    /// Replacement candidates for the offending token, best first.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::UnknownField { suggestions, .. }
            | Self::UnknownOperator { suggestions, .. }
            | Self::OperatorNotApplicable { suggestions, .. }
            | Self::InvalidLiteral { suggestions, .. }
            | Self::UnknownPreset { suggestions, .. }
            | Self::UnknownLabel { suggestions, .. }
            | Self::UnknownDurationUnit { suggestions, .. }
            | Self::UnknownPipelineStage { suggestions, .. }
            | Self::UnsortableField { suggestions, .. } => suggestions,
            Self::NestedPreset { .. }
            | Self::InPreset { .. }
            | Self::DurationOutOfRange { .. }
            | Self::LimitOutOfRange { .. } => &[],
        }
    }
}

/// Outcome of validating query text, in the shape clients consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the query can be run.
    pub valid: bool,
    /// Description of the first error.
    pub error_message: Option<String>,
    /// Byte offset of the first error.
    pub error_position: Option<usize>,
    /// Replacement candidates for the offending token, best first.
    pub suggestions: Vec<String>,
    /// Non-fatal diagnostics, populated under `LabelPolicy::Warn`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl ValidationResult {
    /// A passing result.
    #[must_use]
    pub fn ok(warnings: Vec<Warning>) -> Self {
        Self {
            valid: true,
            error_message: None,
            error_position: None,
            suggestions: Vec::new(),
            warnings,
        }
    }

    fn failure(message: String, position: usize, suggestions: Vec<String>) -> Self {
        Self {
            valid: false,
            error_message: Some(message),
            error_position: Some(position),
            suggestions,
            warnings: Vec::new(),
        }
    }
}

impl From<&ParseError> for ValidationResult {
    fn from(error: &ParseError) -> Self {
        Self::failure(error.to_string(), error.position(), Vec::new())
    }
}

impl From<&SemanticError> for ValidationResult {
    fn from(error: &SemanticError) -> Self {
        Self::failure(error.to_string(), error.offset(), error.suggestions().to_vec())
    }
}

/// Validates a parsed query against `catalogue`.
///
/// # Example
///
/// ```
/// use lql::catalogue::Catalogue;
/// use lql::query::{parse_query, validate, ValidationOptions};
///
/// let catalogue = Catalogue::builtin().unwrap();
/// let query = parse_query(r#"severity ===  "error""#).unwrap();
/// let result = validate(&query, &catalogue, ValidationOptions::default());
///
/// assert!(!result.valid);
/// assert_eq!(result.error_position, Some(9));
/// assert_eq!(result.suggestions[0], "==");
/// ```
#[must_use]
pub fn validate(
    query: &Query,
    catalogue: &Catalogue,
    options: ValidationOptions,
) -> ValidationResult {
    match check(query, catalogue, options) {
        Ok(warnings) => ValidationResult::ok(warnings),
        Err(error) => ValidationResult::from(&error),
    }
}

/// Validates a parsed query, returning the first error as a `SemanticError`.
///
/// # Errors
///
/// Returns the first `SemanticError` in filter-then-pipeline order.
pub fn check(
    query: &Query,
    catalogue: &Catalogue,
    options: ValidationOptions,
) -> Result<Vec<Warning>, SemanticError> {
    lower_query(query, catalogue, options).map(|compiled| compiled.warnings().to_vec())
}

/// Resolves `query` into its runnable form.
pub(crate) fn lower_query(
    query: &Query,
    catalogue: &Catalogue,
    options: ValidationOptions,
) -> Result<CompiledQuery, SemanticError> {
    let mut checker = Checker::new(catalogue, options);
    let predicate = checker.filter(&query.filter, Scope::Query)?;
    let stages = query
        .pipeline
        .iter()
        .map(|stage| checker.stage(stage))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompiledQuery::new(predicate, stages, checker.warnings))
}

/// Validates a preset's expansion as it would be used from a query.
pub(crate) fn check_preset(preset: &Preset, catalogue: &Catalogue) -> Result<(), SemanticError> {
    let mut checker = Checker::new(catalogue, ValidationOptions::default());
    checker
        .filter(&preset.expansion, Scope::Preset(&preset.name))
        .map(|_| ())
}

pub(crate) fn unknown_preset(name: &str, offset: usize, catalogue: &Catalogue) -> SemanticError {
    SemanticError::UnknownPreset {
        name: name.to_string(),
        offset,
        suggestions: suggest(name, catalogue.presets().iter().map(|p| p.name.as_str()))
            .into_iter()
            .map(|s| format!(":{s}"))
            .collect(),
    }
}

/// Parses a timestamp literal.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (UTC) and `YYYY-MM-DD`
/// (midnight UTC).
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Where an expression being checked came from.
#[derive(Debug, Clone, Copy)]
enum Scope<'p> {
    Query,
    Preset(&'p str),
}

struct Checker<'c> {
    catalogue: &'c Catalogue,
    options: ValidationOptions,
    warnings: Vec<Warning>,
}

impl<'c> Checker<'c> {
    fn new(catalogue: &'c Catalogue, options: ValidationOptions) -> Self {
        Self {
            catalogue,
            options,
            warnings: Vec::new(),
        }
    }

    fn filter(&mut self, expr: &Expr, scope: Scope<'_>) -> Result<Predicate, SemanticError> {
        Ok(match expr {
            Expr::And { left, right } => Predicate::And(
                Box::new(self.filter(left, scope)?),
                Box::new(self.filter(right, scope)?),
            ),
            Expr::Or { left, right } => Predicate::Or(
                Box::new(self.filter(left, scope)?),
                Box::new(self.filter(right, scope)?),
            ),
            Expr::Not { expr } => Predicate::Not(Box::new(self.filter(expr, scope)?)),
            Expr::Sequence { terms } => Predicate::All(
                terms
                    .iter()
                    .map(|term| self.filter(term, scope))
                    .collect::<Result<_, _>>()?,
            ),
            Expr::Comparison(comparison) => self.comparison(comparison)?,
            Expr::LabelTest {
                name,
                negated,
                offset,
            } => self.label(name, *negated, *offset)?,
            Expr::PresetRef { name, offset } => self.preset(name, *offset, scope)?,
            Expr::TimeWindow {
                amount,
                unit,
                offset,
            } => self.time_window(*amount, unit, *offset)?,
        })
    }

    fn comparison(&mut self, comparison: &Comparison) -> Result<Predicate, SemanticError> {
        let Comparison { field, op, value } = comparison;

        let (info, log_field) = self.field(&field.node, field.offset)?;

        let symbol = op.node.as_str();
        let operator = self.catalogue.operator(symbol).ok_or_else(|| {
            SemanticError::UnknownOperator {
                symbol: symbol.to_string(),
                offset: op.offset,
                suggestions: suggest(
                    symbol,
                    self.catalogue.operators().iter().map(|o| o.symbol.as_str()),
                ),
            }
        })?;
        if !operator.applies_to.contains(&info.field_type) {
            return Err(SemanticError::OperatorNotApplicable {
                symbol: symbol.to_string(),
                field: info.name.clone(),
                field_type: info.field_type,
                offset: op.offset,
                suggestions: self
                    .catalogue
                    .operators()
                    .iter()
                    .filter(|o| o.applies_to.contains(&info.field_type))
                    .take(MAX_SUGGESTIONS)
                    .map(|o| o.symbol.clone())
                    .collect(),
            });
        }
        let Some(op_kind) = ComparisonOp::from_symbol(&operator.symbol) else {
            return Err(SemanticError::UnknownOperator {
                symbol: symbol.to_string(),
                offset: op.offset,
                suggestions: Vec::new(),
            });
        };

        let value = self.literal(info, &value.node, value.offset)?;

        Ok(Predicate::Compare {
            field: log_field,
            op: op_kind,
            value,
        })
    }

    fn field(&self, name: &str, offset: usize) -> Result<(&'c FieldInfo, LogField), SemanticError> {
        let unknown = || SemanticError::UnknownField {
            name: name.to_string(),
            offset,
            suggestions: suggest(
                name,
                self.catalogue.fields().iter().map(|f| f.name.as_str()),
            ),
        };
        let info = self.catalogue.field(name).ok_or_else(unknown)?;
        let log_field = LogField::from_name(&info.name).ok_or_else(unknown)?;
        Ok((info, log_field))
    }

    fn literal(
        &self,
        info: &FieldInfo,
        literal: &Literal,
        offset: usize,
    ) -> Result<Value, SemanticError> {
        let invalid = |expected: &str, suggestions: Vec<String>| SemanticError::InvalidLiteral {
            field: info.name.clone(),
            expected: expected.to_string(),
            found: literal.to_string(),
            offset,
            suggestions,
        };

        match (info.field_type, literal) {
            (FieldType::String | FieldType::Set, Literal::String(text)) => {
                Ok(Value::Text(text.clone()))
            }
            (FieldType::String | FieldType::Set, Literal::Number(n)) => Err(invalid(
                "a quoted string",
                vec![format!("\"{n}\"")],
            )),
            (FieldType::Integer, Literal::Number(n)) => Ok(Value::Integer(*n)),
            (FieldType::Integer, Literal::String(text)) => Err(invalid(
                "a number",
                text.trim()
                    .parse::<i64>()
                    .map(|n| vec![n.to_string()])
                    .unwrap_or_default(),
            )),
            (FieldType::Enum, Literal::String(text)) => self
                .catalogue
                .severities()
                .iter()
                .copied()
                .find(|s| s.as_str() == text.as_str())
                .map(Value::Severity)
                .ok_or_else(|| invalid("one of the severities", self.severity_suggestions(text))),
            (FieldType::Enum, Literal::Number(_)) => Err(invalid(
                "a quoted severity name",
                Vec::new(),
            )),
            (FieldType::Timestamp, Literal::String(text)) => parse_timestamp(text)
                .map(Value::Timestamp)
                .ok_or_else(|| {
                    invalid(
                        "a timestamp such as \"2025-01-31T12:00:00Z\" or \"2025-01-31\"",
                        Vec::new(),
                    )
                }),
            (FieldType::Timestamp, Literal::Number(seconds)) => {
                DateTime::from_timestamp(*seconds, 0)
                    .map(Value::Timestamp)
                    .ok_or_else(|| invalid("seconds since the Unix epoch", Vec::new()))
            }
        }
    }

    fn severity_suggestions(&self, text: &str) -> Vec<String> {
        let names = self.catalogue.severities().iter().map(|s| s.as_str());
        let lowered = text.to_ascii_lowercase();
        let mut candidates = suggest(&lowered, names);
        // Common aliases that are too far from the canonical names by edit distance.
        let alias = match lowered.as_str() {
            "warn" => Some(Severity::Warning),
            "err" => Some(Severity::Error),
            "crit" | "fatal" => Some(Severity::Critical),
            _ => None,
        };
        if let Some(alias) = alias {
            candidates.retain(|c| c != alias.as_str());
            candidates.insert(0, alias.as_str().to_string());
            candidates.truncate(MAX_SUGGESTIONS);
        }
        candidates.into_iter().map(|s| format!("\"{s}\"")).collect()
    }

    fn label(&mut self, name: &str, negated: bool, offset: usize) -> Result<Predicate, SemanticError> {
        if !self.catalogue.is_known_label(name) {
            let sigil = if negated { "-#" } else { "#" };
            let suggestions = || {
                suggest(name, self.catalogue.labels().iter().map(String::as_str))
                    .into_iter()
                    .map(|s| format!("{sigil}{s}"))
                    .collect::<Vec<_>>()
            };

            match self.options.label_policy {
                LabelPolicy::Ignore => {}
                LabelPolicy::Warn => self.warnings.push(Warning {
                    message: format!("Unknown label '#{name}'"),
                    position: offset,
                    suggestions: suggestions(),
                }),
                LabelPolicy::Reject => {
                    return Err(SemanticError::UnknownLabel {
                        name: name.to_string(),
                        offset,
                        suggestions: suggestions(),
                    })
                }
            }
        }

        Ok(Predicate::Label {
            name: name.to_string(),
            negated,
        })
    }

    fn preset(
        &mut self,
        name: &str,
        offset: usize,
        scope: Scope<'_>,
    ) -> Result<Predicate, SemanticError> {
        if let Scope::Preset(outer) = scope {
            return Err(SemanticError::NestedPreset {
                preset: outer.to_string(),
                nested: name.to_string(),
                offset,
            });
        }

        let catalogue = self.catalogue;
        let preset = catalogue
            .preset(name)
            .ok_or_else(|| unknown_preset(name, offset, catalogue))?;

        let first_warning = self.warnings.len();
        let predicate = self
            .filter(&preset.expansion, Scope::Preset(&preset.name))
            .map_err(|error| match error {
                SemanticError::NestedPreset {
                    preset: outer,
                    nested,
                    ..
                } => SemanticError::NestedPreset {
                    preset: outer,
                    nested,
                    offset,
                },
                other => SemanticError::InPreset {
                    name: name.to_string(),
                    offset,
                    source: Box::new(other),
                },
            })?;

        for warning in &mut self.warnings[first_warning..] {
            warning.position = offset;
        }

        Ok(predicate)
    }

    fn time_window(&self, amount: u64, unit: &str, offset: usize) -> Result<Predicate, SemanticError> {
        let Some(duration_unit) = self.catalogue.duration_unit(unit) else {
            return Err(SemanticError::UnknownDurationUnit {
                unit: unit.to_string(),
                offset,
                suggestions: suggest(
                    unit,
                    self.catalogue
                        .duration_units()
                        .iter()
                        .map(|u| u.suffix.as_str()),
                )
                .into_iter()
                .map(|suffix| format!("@{amount}{suffix}"))
                .collect(),
            });
        };

        amount
            .checked_mul(duration_unit.seconds)
            .and_then(|seconds| i64::try_from(seconds).ok())
            .and_then(TimeDelta::try_seconds)
            .map(Predicate::Within)
            .ok_or_else(|| SemanticError::DurationOutOfRange {
                amount,
                unit: unit.to_string(),
                offset,
            })
    }

    fn stage(&self, stage: &PipelineStage) -> Result<Stage, SemanticError> {
        match stage {
            PipelineStage::Limit { count, .. } => {
                let max = self.catalogue.max_limit();
                match u64::try_from(count.node) {
                    Ok(n) if (1..=max).contains(&n) => {
                        Ok(Stage::Limit(usize::try_from(n).unwrap_or(usize::MAX)))
                    }
                    _ => Err(SemanticError::LimitOutOfRange {
                        value: count.node,
                        max,
                        offset: count.offset,
                    }),
                }
            }
            PipelineStage::Sort {
                field, direction, ..
            } => {
                let (info, log_field) = self.field(&field.node, field.offset)?;
                if !info.sortable {
                    let sortable = || {
                        self.catalogue
                            .fields()
                            .iter()
                            .filter(|f| f.sortable)
                            .map(|f| f.name.as_str())
                    };
                    let mut suggestions = suggest(&info.name, sortable());
                    if suggestions.is_empty() {
                        suggestions = sortable()
                            .take(MAX_SUGGESTIONS)
                            .map(str::to_string)
                            .collect();
                    }
                    return Err(SemanticError::UnsortableField {
                        field: info.name.clone(),
                        offset: field.offset,
                        suggestions,
                    });
                }
                Ok(Stage::Sort {
                    field: log_field,
                    direction: *direction,
                })
            }
            PipelineStage::Unknown { name, offset } => Err(SemanticError::UnknownPipelineStage {
                name: name.clone(),
                offset: *offset,
                suggestions: suggest(
                    &name.to_ascii_lowercase(),
                    self.catalogue
                        .pipeline_stages()
                        .iter()
                        .map(|s| s.name.as_str()),
                ),
            }),
        }
    }
}

//! Query evaluation.
//!
//! `compile` expands presets, validates the result and lowers it into a typed
//! predicate tree plus a list of pipeline stages. A `CompiledQuery` cannot
//! fail: every name, operator and literal was resolved during compilation.

use super::ast::{Expr, Query, SortDirection};
use super::validator::{lower_query, unknown_preset, SemanticError, ValidationOptions, Warning};
use crate::catalogue::Catalogue;
use crate::models::{LogEntry, LogField, Severity};
use chrono::{DateTime, TimeDelta, Utc};
use std::cmp::Ordering;

/// Comparison operators understood by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `contains` (substring, or membership for sets)
    Contains,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl ComparisonOp {
    /// Looks up an operator by symbol. `contains` matches case-insensitively.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::NotEq),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::LtEq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::GtEq),
            s if s.eq_ignore_ascii_case("contains") => Some(Self::Contains),
            _ => None,
        }
    }

    /// Canonical symbol.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Contains => "contains",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }

    /// Applies an ordering-based operator to the result of `actual.cmp(expected)`.
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::NotEq => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::LtEq => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::GtEq => ordering != Ordering::Less,
            Self::Contains => false,
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A literal resolved against its field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Value {
    Text(String),
    Integer(i64),
    Severity(Severity),
    Timestamp(DateTime<Utc>),
}

/// A fully resolved filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Predicate {
    All(Vec<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    Compare {
        field: LogField,
        op: ComparisonOp,
        value: Value,
    },
    Label {
        name: String,
        negated: bool,
    },
    Within(TimeDelta),
}

/// A resolved pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Limit(usize),
    Sort {
        field: LogField,
        direction: SortDirection,
    },
}

/// A validated, preset-free query ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    predicate: Predicate,
    stages: Vec<Stage>,
    warnings: Vec<Warning>,
}

impl CompiledQuery {
    pub(crate) fn new(predicate: Predicate, stages: Vec<Stage>, warnings: Vec<Warning>) -> Self {
        Self {
            predicate,
            stages,
            warnings,
        }
    }

    /// Filters and transforms `entries`, evaluating time windows against the
    /// current instant.
    #[must_use]
    pub fn run(&self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        self.run_at(entries, Utc::now())
    }

    /// Filters and transforms `entries`, evaluating time windows against `now`.
    #[must_use]
    pub fn run_at(&self, entries: Vec<LogEntry>, now: DateTime<Utc>) -> Vec<LogEntry> {
        let mut results: Vec<LogEntry> = entries
            .into_iter()
            .filter(|entry| self.predicate.eval(entry, now))
            .collect();

        for stage in &self.stages {
            match *stage {
                Stage::Limit(n) => results.truncate(n),
                Stage::Sort { field, direction } => sort_entries(&mut results, field, direction),
            }
        }

        results
    }

    /// Tests a single entry against the filter, ignoring the pipeline.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.matches_at(entry, Utc::now())
    }

    /// Tests a single entry against the filter, evaluating time windows against `now`.
    #[must_use]
    pub fn matches_at(&self, entry: &LogEntry, now: DateTime<Utc>) -> bool {
        self.predicate.eval(entry, now)
    }

    /// Unknown-label warnings collected while compiling.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

/// Compiles a parsed query against `catalogue`.
///
/// Presets are expanded first and the expanded tree is validated, so an error
/// inside a preset is reported at the `:name` that introduced it.
///
/// # Errors
///
/// Returns the first `SemanticError` found.
///
/// # Example
///
/// ```
/// use lql::catalogue::Catalogue;
/// use lql::models::{LogEntry, Severity};
/// use lql::query::{compile, parse_query, ValidationOptions};
///
/// let catalogue = Catalogue::builtin().unwrap();
/// let query = parse_query(":errors | limit 1").unwrap();
/// let compiled = compile(&query, &catalogue, ValidationOptions::default()).unwrap();
///
/// let entries = vec![
///     LogEntry::new(1, Severity::Info, "rabbit@a", "started"),
///     LogEntry::new(2, Severity::Error, "rabbit@a", "failed"),
/// ];
/// let matched = compiled.run(entries);
/// assert_eq!(matched.len(), 1);
/// assert_eq!(matched[0].id, 2);
/// ```
pub fn compile(
    query: &Query,
    catalogue: &Catalogue,
    options: ValidationOptions,
) -> Result<CompiledQuery, SemanticError> {
    let expanded = Query {
        filter: expand_presets(&query.filter, catalogue)?,
        pipeline: query.pipeline.clone(),
    };
    lower_query(&expanded, catalogue, options)
}

/// Replaces every `:name` with the named preset's expansion.
///
/// Spliced expansions take the offset of the reference they replace.
///
/// # Errors
///
/// Returns `UnknownPreset` for an unregistered name and `NestedPreset` when an
/// expansion itself references a preset.
pub fn expand_presets(expr: &Expr, catalogue: &Catalogue) -> Result<Expr, SemanticError> {
    Ok(match expr {
        Expr::PresetRef { name, offset } => {
            let preset = catalogue
                .preset(name)
                .ok_or_else(|| unknown_preset(name, *offset, catalogue))?;
            if let Some(nested) = first_preset_ref(&preset.expansion) {
                return Err(SemanticError::NestedPreset {
                    preset: name.clone(),
                    nested: nested.to_string(),
                    offset: *offset,
                });
            }
            let mut expansion = preset.expansion.clone();
            expansion.relocate(*offset);
            expansion
        }
        Expr::And { left, right } => Expr::and(
            expand_presets(left, catalogue)?,
            expand_presets(right, catalogue)?,
        ),
        Expr::Or { left, right } => Expr::or(
            expand_presets(left, catalogue)?,
            expand_presets(right, catalogue)?,
        ),
        Expr::Not { expr } => Expr::not(expand_presets(expr, catalogue)?),
        Expr::Sequence { terms } => Expr::Sequence {
            terms: terms
                .iter()
                .map(|t| expand_presets(t, catalogue))
                .collect::<Result<_, _>>()?,
        },
        Expr::Comparison(_) | Expr::LabelTest { .. } | Expr::TimeWindow { .. } => expr.clone(),
    })
}

/// Name of the first `:name` reference in `expr`, in written order.
pub(crate) fn first_preset_ref(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::PresetRef { name, .. } => Some(name),
        Expr::And { left, right } | Expr::Or { left, right } => {
            first_preset_ref(left).or_else(|| first_preset_ref(right))
        }
        Expr::Not { expr } => first_preset_ref(expr),
        Expr::Sequence { terms } => terms.iter().find_map(first_preset_ref),
        Expr::Comparison(_) | Expr::LabelTest { .. } | Expr::TimeWindow { .. } => None,
    }
}

impl Predicate {
    fn eval(&self, entry: &LogEntry, now: DateTime<Utc>) -> bool {
        match self {
            Self::All(terms) => terms.iter().all(|t| t.eval(entry, now)),
            Self::And(left, right) => left.eval(entry, now) && right.eval(entry, now),
            Self::Or(left, right) => left.eval(entry, now) || right.eval(entry, now),
            Self::Not(inner) => !inner.eval(entry, now),
            Self::Compare { field, op, value } => compare(entry, *field, *op, value),
            Self::Label { name, negated } => entry.has_label(name) != *negated,
            // A window reaching past the earliest representable instant covers everything.
            Self::Within(window) => match now.checked_sub_signed(*window) {
                Some(start) => entry.timestamp >= start,
                None => true,
            },
        }
    }
}

/// Borrowed view of one field of an entry.
enum FieldValue<'e> {
    Text(Option<&'e str>),
    Id(u64),
    Severity(Severity),
    Timestamp(DateTime<Utc>),
    Labels(&'e std::collections::BTreeSet<String>),
}

fn field_value(entry: &LogEntry, field: LogField) -> FieldValue<'_> {
    match field {
        LogField::Id => FieldValue::Id(entry.id),
        LogField::Timestamp => FieldValue::Timestamp(entry.timestamp),
        LogField::Severity => FieldValue::Severity(entry.severity),
        LogField::Node => FieldValue::Text(Some(&entry.node)),
        LogField::ErlangPid => FieldValue::Text(Some(&entry.erlang_pid)),
        LogField::Subsystem => FieldValue::Text(entry.subsystem.as_deref()),
        LogField::Message => FieldValue::Text(Some(&entry.message)),
        LogField::Labels => FieldValue::Labels(&entry.labels),
        LogField::DocUrl => FieldValue::Text(entry.doc_url.as_deref()),
        LogField::ResolutionOrDiscussionUrl => {
            FieldValue::Text(entry.resolution_or_discussion_url.as_deref())
        }
    }
}

fn compare(entry: &LogEntry, field: LogField, op: ComparisonOp, value: &Value) -> bool {
    match (field_value(entry, field), value) {
        // A missing value compares like the empty string, but never contains anything.
        (FieldValue::Text(actual), Value::Text(expected)) => match op {
            ComparisonOp::Contains => actual.is_some_and(|a| a.contains(expected.as_str())),
            _ => op.holds(actual.unwrap_or_default().cmp(expected.as_str())),
        },
        (FieldValue::Labels(labels), Value::Text(expected)) => {
            op == ComparisonOp::Contains && labels.contains(expected)
        }
        (FieldValue::Id(actual), Value::Integer(expected)) => {
            let ordering = u64::try_from(*expected).map_or(Ordering::Greater, |e| actual.cmp(&e));
            op.holds(ordering)
        }
        (FieldValue::Severity(actual), Value::Severity(expected)) => {
            op.holds(actual.cmp(expected))
        }
        (FieldValue::Timestamp(actual), Value::Timestamp(expected)) => {
            op.holds(actual.cmp(expected))
        }
        _ => false,
    }
}

/// Stable sort; equal keys keep their relative order in either direction.
fn sort_entries(entries: &mut [LogEntry], field: LogField, direction: SortDirection) {
    entries.sort_by(|a, b| match direction {
        SortDirection::Asc => compare_by(a, b, field),
        SortDirection::Desc => compare_by(b, a, field),
    });
}

fn compare_by(a: &LogEntry, b: &LogEntry, field: LogField) -> Ordering {
    match field {
        LogField::Id => a.id.cmp(&b.id),
        LogField::Timestamp => a.timestamp.cmp(&b.timestamp),
        LogField::Severity => a.severity.cmp(&b.severity),
        LogField::Node => a.node.cmp(&b.node),
        LogField::ErlangPid => a.erlang_pid.cmp(&b.erlang_pid),
        LogField::Subsystem => a.subsystem.cmp(&b.subsystem),
        LogField::Message => a.message.cmp(&b.message),
        LogField::Labels => a.labels.cmp(&b.labels),
        LogField::DocUrl => a.doc_url.cmp(&b.doc_url),
        LogField::ResolutionOrDiscussionUrl => a
            .resolution_or_discussion_url
            .cmp(&b.resolution_or_discussion_url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn entry(id: u64, severity: Severity, message: &str) -> LogEntry {
        LogEntry::new(id, severity, "rabbit@node-1", message).with_timestamp(now())
    }

    fn run(query: &str, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        let catalogue = Catalogue::builtin().unwrap();
        let query = parse_query(query).unwrap();
        compile(&query, &catalogue, ValidationOptions::default())
            .unwrap()
            .run_at(entries, now())
    }

    fn ids(entries: &[LogEntry]) -> Vec<u64> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_errors_preset_preserves_order() {
        let entries = vec![
            entry(1, Severity::Error, "a"),
            entry(2, Severity::Warning, "b"),
            entry(3, Severity::Error, "c"),
        ];

        let result = run(":errors", entries);

        assert_eq!(ids(&result), vec![1, 3]);
    }

    #[test]
    fn test_time_window_and_subsystem() {
        let entries = vec![
            entry(1, Severity::Info, "fresh").with_subsystem("connections"),
            entry(2, Severity::Info, "stale")
                .with_subsystem("connections")
                .with_timestamp(now() - TimeDelta::hours(25)),
            entry(3, Severity::Info, "other").with_subsystem("queues"),
            entry(4, Severity::Info, "none"),
        ];

        let result = run(r#"@24h subsystem == "connections""#, entries);

        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn test_label_and_negated_label() {
        let entries = vec![
            entry(1, Severity::Info, "a").with_label("tls").with_label("timeouts"),
            entry(2, Severity::Info, "b").with_label("tls"),
            entry(3, Severity::Info, "c"),
        ];

        let result = run("#tls and -#timeouts", entries);

        assert_eq!(ids(&result), vec![2]);
    }

    #[test]
    fn test_limit_keeps_arrival_order() {
        let entries = (1..=5)
            .map(|i| entry(i, Severity::Info, "request timeout"))
            .collect();

        let result = run(r#"message contains "timeout" | limit 2"#, entries);

        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn test_time_window_boundary() {
        let boundary = now() - TimeDelta::hours(24);
        let entries = vec![
            entry(1, Severity::Info, "at boundary").with_timestamp(boundary),
            entry(2, Severity::Info, "just outside")
                .with_timestamp(boundary - TimeDelta::microseconds(1)),
        ];

        let result = run("@24h", entries);

        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn test_huge_time_window_matches_everything() {
        let entries = vec![entry(1, Severity::Info, "a")
            .with_timestamp(DateTime::<Utc>::MIN_UTC)];

        let result = run("@15000000w", entries);

        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn test_severity_relational_uses_rank() {
        let entries = Severity::ALL
            .iter()
            .zip(1..)
            .map(|(s, id)| entry(id, *s, "m"))
            .collect::<Vec<_>>();

        assert_eq!(ids(&run(r#"severity >= "warning""#, entries.clone())), vec![4, 5, 6]);
        assert_eq!(ids(&run(r#"severity < "info""#, entries.clone())), vec![1]);
        assert_eq!(ids(&run(r#"severity != "info""#, entries)), vec![1, 3, 4, 5, 6]);
    }

    #[test]
    fn test_timestamp_comparison() {
        let entries = vec![
            entry(1, Severity::Info, "a").with_timestamp(now() - TimeDelta::days(2)),
            entry(2, Severity::Info, "b"),
        ];

        assert_eq!(ids(&run(r#"timestamp < "2025-06-01""#, entries.clone())), vec![1]);
        assert_eq!(
            ids(&run(r#"timestamp >= "2025-06-01T12:00:00Z""#, entries)),
            vec![2]
        );
    }

    #[test]
    fn test_string_comparisons_are_case_sensitive() {
        let entries = vec![
            entry(1, Severity::Info, "Connection closed"),
            entry(2, Severity::Info, "connection closed"),
        ];

        assert_eq!(ids(&run(r#"message contains "Connection""#, entries.clone())), vec![1]);
        assert_eq!(ids(&run(r#"message == "connection closed""#, entries)), vec![2]);
    }

    #[test]
    fn test_missing_optional_field_semantics() {
        let entries = vec![
            entry(1, Severity::Info, "a"),
            entry(2, Severity::Info, "b").with_subsystem("queues"),
        ];

        assert_eq!(ids(&run(r#"subsystem == """#, entries.clone())), vec![1]);
        assert_eq!(ids(&run(r#"subsystem != "queues""#, entries.clone())), vec![1]);
        assert_eq!(ids(&run(r#"subsystem contains """#, entries)), vec![2]);
    }

    #[test]
    fn test_labels_contains_is_membership() {
        let entries = vec![
            entry(1, Severity::Info, "a").with_label("tls"),
            entry(2, Severity::Info, "b").with_label("tls_alerts"),
        ];

        assert_eq!(ids(&run(r#"labels contains "tls""#, entries)), vec![1]);
    }

    #[test]
    fn test_id_equality() {
        let entries = vec![entry(1, Severity::Info, "a"), entry(2, Severity::Info, "b")];

        assert_eq!(ids(&run("id == 2", entries.clone())), vec![2]);
        assert_eq!(ids(&run("id != -1", entries)), vec![1, 2]);
    }

    #[test]
    fn test_sort_then_limit_runs_in_written_order() {
        let entries = vec![
            entry(1, Severity::Warning, "a"),
            entry(2, Severity::Critical, "b"),
            entry(3, Severity::Error, "c"),
        ];

        assert_eq!(ids(&run("| sort severity desc | limit 2", entries.clone())), vec![2, 3]);
        assert_eq!(ids(&run("| limit 2 | sort severity desc", entries)), vec![2, 1]);
    }

    #[test]
    fn test_sort_missing_values_first_ascending() {
        let entries = vec![
            entry(1, Severity::Info, "a").with_subsystem("queues"),
            entry(2, Severity::Info, "b"),
        ];

        assert_eq!(ids(&run("| sort subsystem", entries)), vec![2, 1]);
    }

    #[test]
    fn test_expand_presets_relocates_and_removes_refs() {
        let catalogue = Catalogue::builtin().unwrap();
        let query = parse_query("@1h :crashes").unwrap();

        let expanded = expand_presets(&query.filter, &catalogue).unwrap();

        assert!(!expanded.contains_preset_ref());
        assert_eq!(expanded.to_string(), "@1h #erl_process_crash or #exceptions");
        let Expr::Sequence { terms } = &expanded else {
            panic!("expected a sequence");
        };
        let Expr::Or { left, .. } = &terms[1] else {
            panic!("expected an or");
        };
        assert!(matches!(**left, Expr::LabelTest { offset: 4, .. }));
    }

    #[test]
    fn test_expand_every_registered_preset() {
        let catalogue = Catalogue::builtin().unwrap();
        for preset in catalogue.presets() {
            let reference = Expr::PresetRef {
                name: preset.name.clone(),
                offset: 0,
            };
            let expanded = expand_presets(&reference, &catalogue).unwrap();
            assert!(!expanded.contains_preset_ref());
            assert!(compile(&Query::new(expanded), &catalogue, ValidationOptions::default()).is_ok());
        }
    }

    #[test]
    fn test_compile_rejects_unknown_preset() {
        let catalogue = Catalogue::builtin().unwrap();
        let query = parse_query(":bogus_preset").unwrap();

        let err = compile(&query, &catalogue, ValidationOptions::default()).unwrap_err();

        assert!(matches!(err, SemanticError::UnknownPreset { offset: 0, .. }));
    }

    #[test]
    fn test_matches_single_entry() {
        let catalogue = Catalogue::builtin().unwrap();
        let compiled = compile(
            &parse_query("#tls | limit 1").unwrap(),
            &catalogue,
            ValidationOptions::default(),
        )
        .unwrap();

        assert!(compiled.matches(&entry(1, Severity::Info, "a").with_label("tls")));
        assert!(!compiled.matches(&entry(2, Severity::Info, "b")));
    }

    fn arb_entry() -> impl Strategy<Value = LogEntry> {
        (
            0..6usize,
            prop::sample::subsequence(vec!["tls", "timeouts", "connections"], 0..=3),
            prop::sample::select(vec!["queues", "connections"]),
            0..48i64,
        )
            .prop_map(|(severity, labels, subsystem, hours)| {
                let mut e = LogEntry::new(0, Severity::ALL[severity], "rabbit@a", "msg")
                    .with_subsystem(subsystem)
                    .with_timestamp(now() - TimeDelta::hours(hours));
                for label in labels {
                    e = e.with_label(label);
                }
                e
            })
    }

    fn arb_entries() -> impl Strategy<Value = Vec<LogEntry>> {
        prop::collection::vec(arb_entry(), 0..40).prop_map(|mut entries| {
            for (i, e) in entries.iter_mut().enumerate() {
                e.id = i as u64;
            }
            entries
        })
    }

    fn arb_filter() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "#tls",
            "-#timeouts",
            r#"severity >= "warning""#,
            r#"subsystem == "connections""#,
            "@12h",
            ":errors",
            r#"message contains "sg""#,
        ])
    }

    proptest! {
        #[test]
        fn prop_de_morgan(a in arb_filter(), b in arb_filter(), entries in arb_entries()) {
            let lhs = run(&format!("not ({a} and {b})"), entries.clone());
            let rhs = run(&format!("(not {a}) or (not {b})"), entries);
            prop_assert_eq!(ids(&lhs), ids(&rhs));
        }

        #[test]
        fn prop_sort_is_stable(entries in arb_entries()) {
            let sorted = run("| sort severity", entries.clone());
            prop_assert_eq!(sorted.len(), entries.len());
            for pair in sorted.windows(2) {
                prop_assert!(pair[0].severity <= pair[1].severity);
                if pair[0].severity == pair[1].severity {
                    prop_assert!(pair[0].id < pair[1].id);
                }
            }

            let sorted = run("| sort severity desc", entries);
            for pair in sorted.windows(2) {
                if pair[0].severity == pair[1].severity {
                    prop_assert!(pair[0].id < pair[1].id);
                }
            }
        }

        #[test]
        fn prop_limit_is_a_prefix_of_matches(
            filter in arb_filter(),
            n in 1..50usize,
            entries in arb_entries(),
        ) {
            let all = run(filter, entries.clone());
            let limited = run(&format!("{filter} | limit {n}"), entries);
            prop_assert_eq!(limited.len(), n.min(all.len()));
            prop_assert_eq!(ids(&limited), ids(&all[..limited.len()]));
        }
    }
}

//! The built-in RabbitMQ vocabulary.

use super::{CatalogueBuilder, FieldType};

/// Version of the built-in catalogue. Bumped with the engine so that client
/// and server never disagree on vocabulary.
pub const CATALOGUE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest accepted `limit`.
pub(super) const MAX_LIMIT: u64 = 10_000;

const LABELS: &[&str] = &[
    "access_control",
    "amqp10",
    "auth",
    "channels",
    "classic_queues",
    "clustering",
    "connections",
    "consumers",
    "definitions",
    "deprecated_features",
    "elections",
    "erl_process_crash",
    "exceptions",
    "exchanges",
    "feature_flags",
    "federation",
    "khepri",
    "limits",
    "metrics",
    "mqtt",
    "networking",
    "peer_discovery",
    "plugins",
    "policies",
    "queues",
    "quorum_queues",
    "raft",
    "shovels",
    "shutdown",
    "startup",
    "stomp",
    "streams",
    "timeouts",
    "tls",
    "virtual_hosts",
    "websockets",
];

/// (name, description, expansion)
const PRESETS: &[(&str, &str, &str)] = &[
    ("errors", "Error-level entries", r#"severity == "error""#),
    (
        "crashes",
        "Erlang process crashes and exceptions",
        "#erl_process_crash or #exceptions",
    ),
    (
        "errors_or_crashes",
        "Errors, process crashes and exceptions",
        r#"severity == "error" or #erl_process_crash or #exceptions"#,
    ),
    ("warnings", "Warning-level entries", r#"severity == "warning""#),
    (
        "warnings_and_above",
        "Warnings and anything more urgent",
        r#"severity >= "warning""#,
    ),
    (
        "tls_issues",
        "TLS-related warnings and errors",
        r#"#tls and severity >= "warning""#,
    ),
    ("timeouts", "Timeouts of any kind", "#timeouts"),
    (
        "connection_churn",
        "Client connections being closed",
        r#"#connections and (message contains "closing" or message contains "closed")"#,
    ),
    (
        "raft",
        "Raft, leader elections and quorum queues",
        "#raft or #elections or #quorum_queues",
    ),
    (
        "startup_and_shutdown",
        "Node boot and shutdown sequences",
        "#startup or #shutdown",
    ),
];

pub(super) fn builder() -> CatalogueBuilder {
    use FieldType::{Enum, Integer, Set, String, Timestamp};

    let builder = CatalogueBuilder::default()
        .field("id", Integer, true, "Ingestion-order identifier")
        .field("timestamp", Timestamp, true, "When the entry was logged")
        .field("severity", Enum, true, "debug, info, notice, warning, error or critical")
        .field("node", String, true, "Erlang node name, e.g. rabbit@node-1")
        .field("erlang_pid", String, false, "Erlang process identifier")
        .field("subsystem", String, true, "Broker subsystem")
        .field("message", String, false, "Log message text")
        .field("labels", Set, false, "Classification labels; prefer #label")
        .field("doc_url", String, false, "Related documentation link")
        .field(
            "resolution_or_discussion_url",
            String,
            false,
            "Known resolution or discussion link",
        )
        .operator("==", &[String, Enum, Timestamp, Integer], "Equals (case-sensitive)")
        .operator("!=", &[String, Enum, Timestamp, Integer], "Does not equal")
        .operator("contains", &[String, Set], "Substring match, or label membership")
        .operator("<", &[Timestamp, Enum], "Earlier than / less severe than")
        .operator("<=", &[Timestamp, Enum], "At or before / at most as severe as")
        .operator(">", &[Timestamp, Enum], "Later than / more severe than")
        .operator(">=", &[Timestamp, Enum], "At or after / at least as severe as")
        .pipeline_stage("limit", "limit <n>", "Keep the first n entries")
        .pipeline_stage("sort", "sort <field> [asc|desc]", "Stable sort by a field")
        .duration_unit("s", 1, "seconds")
        .duration_unit("m", 60, "minutes")
        .duration_unit("h", 3_600, "hours")
        .duration_unit("d", 86_400, "days")
        .duration_unit("w", 604_800, "weeks")
        .special_filter(":", ":<preset>", "Expand a named preset")
        .special_filter("@", "@<amount><unit>", "Entries newer than now minus the window")
        .special_filter("#", "#<label>", "Entries carrying a label")
        .special_filter("-#", "-#<label>", "Entries without a label")
        .max_limit(MAX_LIMIT);

    let builder = LABELS.iter().fold(builder, |b, label| b.label(*label));
    PRESETS
        .iter()
        .fold(builder, |b, (name, description, source)| {
            b.preset(*name, *description, *source)
        })
}

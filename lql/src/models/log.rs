//! Log data model.
//!
//! Defines the `LogEntry` structure parsed out of RabbitMQ node logs and the
//! `Severity` scale the query language compares against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use validator::Validate;

/// Log severity, ordered by increasing urgency.
///
/// The derived `Ord` is the urgency rank used by relational comparisons
/// (`debug < info < notice < warning < error < critical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Debug information.
    Debug,
    /// Informational messages.
    Info,
    /// Normal but significant conditions.
    Notice,
    /// Warning conditions.
    Warning,
    /// Error conditions.
    Error,
    /// Critical conditions.
    Critical,
}

impl Severity {
    /// All severities, least urgent first.
    pub const ALL: [Severity; 6] = [
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// Returns the lowercase name used in queries and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Looks up a severity by its exact (case-sensitive) name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Returns the urgency rank (0 = debug).
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

/// The queryable attributes of a `LogEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogField {
    /// `id`
    Id,
    /// `timestamp`
    Timestamp,
    /// `severity`
    Severity,
    /// `node`
    Node,
    /// `erlang_pid`
    ErlangPid,
    /// `subsystem`
    Subsystem,
    /// `message`
    Message,
    /// `labels`
    Labels,
    /// `doc_url`
    DocUrl,
    /// `resolution_or_discussion_url`
    ResolutionOrDiscussionUrl,
}

impl LogField {
    /// Every field, in declaration order.
    pub const ALL: [LogField; 10] = [
        Self::Id,
        Self::Timestamp,
        Self::Severity,
        Self::Node,
        Self::ErlangPid,
        Self::Subsystem,
        Self::Message,
        Self::Labels,
        Self::DocUrl,
        Self::ResolutionOrDiscussionUrl,
    ];

    /// The name used in queries and in serialized entries.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Timestamp => "timestamp",
            Self::Severity => "severity",
            Self::Node => "node",
            Self::ErlangPid => "erlang_pid",
            Self::Subsystem => "subsystem",
            Self::Message => "message",
            Self::Labels => "labels",
            Self::DocUrl => "doc_url",
            Self::ResolutionOrDiscussionUrl => "resolution_or_discussion_url",
        }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for LogField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single RabbitMQ log event.
///
/// # Example
///
/// ```
/// use lql::models::{LogEntry, Severity};
///
/// let entry = LogEntry::new(1, Severity::Error, "rabbit@node-1", "Connection closed")
///     .with_subsystem("connections")
///     .with_label("connections");
///
/// assert!(entry.validate_entry().is_ok());
/// assert!(entry.has_label("connections"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LogEntry {
    /// Identifier assigned at ingestion, increasing in ingestion order.
    pub id: u64,

    /// When the event was logged.
    pub timestamp: DateTime<Utc>,

    /// Severity of the event.
    #[serde(default)]
    pub severity: Severity,

    /// Erlang node name, e.g. `rabbit@node-1`.
    #[validate(length(min = 1, message = "Node name cannot be empty"))]
    pub node: String,

    /// Erlang process identifier that emitted the line, e.g. `<0.208.0>`.
    #[serde(default)]
    pub erlang_pid: String,

    /// Broker subsystem, when the line could be attributed to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystem: Option<String>,

    /// The log message content.
    pub message: String,

    /// Classification tags attached at ingestion.
    #[serde(default)]
    pub labels: BTreeSet<String>,

    /// Link to documentation relevant to this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,

    /// Link to a known resolution or discussion thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_or_discussion_url: Option<String>,
}

/// Errors that can occur during log entry validation.
#[derive(Debug, Error)]
pub enum LogValidationError {
    /// The node name is empty.
    #[error("Node name cannot be empty")]
    EmptyNode,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl LogEntry {
    /// Creates a new log entry stamped with the current time.
    #[must_use]
    pub fn new(
        id: u64,
        severity: Severity,
        node: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            severity,
            node: node.into(),
            erlang_pid: String::new(),
            subsystem: None,
            message: message.into(),
            labels: BTreeSet::new(),
            doc_url: None,
            resolution_or_discussion_url: None,
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the Erlang process identifier.
    #[must_use]
    pub fn with_erlang_pid(mut self, pid: impl Into<String>) -> Self {
        self.erlang_pid = pid.into();
        self
    }

    /// Sets the subsystem.
    #[must_use]
    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// Sets the documentation URL.
    #[must_use]
    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }

    /// Sets the resolution or discussion URL.
    #[must_use]
    pub fn with_resolution_url(mut self, url: impl Into<String>) -> Self {
        self.resolution_or_discussion_url = Some(url.into());
        self
    }

    /// Returns true if the entry carries `label`.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Validates the log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the node name is empty.
    pub fn validate_entry(&self) -> Result<(), LogValidationError> {
        if self.node.is_empty() {
            return Err(LogValidationError::EmptyNode);
        }
        self.validate()?;
        Ok(())
    }
}

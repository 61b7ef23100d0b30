//! Data models for RabbitMQ log entries.

pub mod log;

pub use log::{LogEntry, LogField, LogValidationError, Severity};

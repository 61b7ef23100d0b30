//! LQL: the log query language for RabbitMQ logs.
//!
//! This crate contains the query engine shared by the RLQT server and its
//! clients: the log entry model, the LQL lexer, parser, validator and
//! evaluator, the metadata catalogue, and the facade that ties them together.
//!
//! # Modules
//!
//! - [`models`] - The `LogEntry` model and severities
//! - [`query`] - Lexing, parsing, validation and evaluation of LQL
//! - [`catalogue`] - Fields, operators, presets and other vocabulary
//! - [`engine`] - The `Engine` facade
//! - [`handle`] - Lazily loaded engine for client embeddings
//!
//! # Example
//!
//! ```
//! use lql::engine::Engine;
//! use lql::models::{LogEntry, Severity};
//!
//! let engine = Engine::builtin().unwrap();
//! let entries = vec![
//!     LogEntry::new(1, Severity::Warning, "rabbit@a", "TLS handshake failed").with_label("tls"),
//!     LogEntry::new(2, Severity::Info, "rabbit@a", "accepting AMQP connection"),
//! ];
//!
//! let matched = engine.evaluate(":tls_issues | limit 10", entries).unwrap();
//! assert_eq!(matched[0].id, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalogue;
pub mod engine;
pub mod handle;
pub mod models;
pub mod query;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;

//! The LQL query language: lexer, parser, validator and evaluator.
//!
//! # Syntax
//!
//! ```text
//! :errors                                     preset
//! @24h                                        time window (s, m, h, d, w)
//! #tls  -#timeouts                            label present / absent
//! severity >= "warning"                       field comparison
//! (#tls or #auth) and not node == "rabbit@b"  boolean combinators
//! @1h :errors #tls                            juxtaposed terms are AND-ed
//! ... | sort timestamp desc | limit 50        pipeline, run in written order
//! ```
//!
//! # Example
//!
//! ```
//! use lql::catalogue::Catalogue;
//! use lql::query::{parse_query, validate, ValidationOptions};
//!
//! let catalogue = Catalogue::builtin().unwrap();
//! let query = parse_query("@24h :errors | sort timestamp desc | limit 20").unwrap();
//!
//! assert!(validate(&query, &catalogue, ValidationOptions::default()).valid);
//! ```

pub mod ast;
mod error;
mod executor;
pub mod lexer;
mod parser;
pub mod suggest;
mod validator;

pub use ast::*;
pub use error::QueryError;
pub use executor::{compile, expand_presets, ComparisonOp, CompiledQuery};
pub use lexer::{tokenize, LexError, Token, TokenKind};
pub use parser::{parse, parse_query, ParseError};
pub use validator::{
    check, parse_timestamp, validate, LabelPolicy, SemanticError, ValidationOptions,
    ValidationResult, Warning,
};

pub(crate) use validator::check_preset;

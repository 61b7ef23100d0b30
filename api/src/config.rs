//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::net::SocketAddr;

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `LQT_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `LQT_PORT`: The port to listen on (default: 8080)
/// - `LQT_DEFAULT_LIMIT`: Entries returned when a query request sets no limit (default: 1000)
/// - `LQT_MAX_LIMIT`: Upper bound on the `limit` a request may ask for (default: 10000)
/// - `LQT_STRICT_LABELS`: Reject unknown `#label`s instead of ignoring them (default: false)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Entries returned per query when the request does not say.
    pub default_limit: usize,
    /// Hard cap on entries returned per query.
    pub max_limit: usize,
    /// Whether unknown labels fail validation.
    pub strict_labels: bool,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable is set but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let host = std::env::var("LQT_HOST").unwrap_or(defaults.host);
        let port = parse_var("LQT_PORT")?.unwrap_or(defaults.port);
        let default_limit = parse_var("LQT_DEFAULT_LIMIT")?.unwrap_or(defaults.default_limit);
        let max_limit = parse_var("LQT_MAX_LIMIT")?.unwrap_or(defaults.max_limit);
        let strict_labels = parse_var("LQT_STRICT_LABELS")?.unwrap_or(defaults.strict_labels);

        Ok(Self {
            host,
            port,
            default_limit: default_limit.min(max_limit),
            max_limit,
            strict_labels,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            default_limit: 1_000,
            max_limit: 10_000,
            strict_labels: false,
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{name} has an invalid value"))
}

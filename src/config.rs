//! Configuration handling for the database browser.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! Database connection settings are never read from here; every request
//! carries its own.

use crate::annotate::HttpAnnotator;
use crate::error::DbResult;
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_ANNOTATION_TIMEOUT_SECS: u64 = 180;

/// Configuration for the database browser.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-browser",
    about = "Database browser backend - schema introspection and filtered row queries over HTTP",
    version,
    author
)]
pub struct Config {
    /// HTTP host to bind to
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "DB_BROWSER_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "DB_BROWSER_HTTP_PORT"
    )]
    pub http_port: u16,

    /// Connection timeout in seconds, used when a request sets none (0 disables)
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "DB_BROWSER_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DB_BROWSER_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_BROWSER_JSON_LOGS")]
    pub json_logs: bool,

    /// URL of the schema labeling service. Labeling is skipped when unset.
    #[arg(long, value_name = "URL", env = "DB_BROWSER_ANNOTATOR_URL")]
    pub annotator_url: Option<String>,

    /// API key sent to the labeling service when a request carries none
    #[arg(
        long,
        value_name = "KEY",
        env = "DB_BROWSER_ANNOTATOR_API_KEY",
        hide_env_values = true
    )]
    pub annotator_api_key: Option<String>,

    /// Labeling timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_ANNOTATION_TIMEOUT_SECS,
        env = "DB_BROWSER_ANNOTATION_TIMEOUT"
    )]
    pub annotation_timeout: u64,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
            annotator_url: None,
            annotator_api_key: None,
            annotation_timeout: DEFAULT_ANNOTATION_TIMEOUT_SECS,
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Default connect timeout, `None` when disabled.
    pub fn connect_timeout_duration(&self) -> Option<Duration> {
        (self.connect_timeout > 0).then(|| Duration::from_secs(self.connect_timeout))
    }

    /// Get the labeling timeout as a Duration.
    pub fn annotation_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.annotation_timeout)
    }

    /// Build the labeling client if a service URL is configured.
    pub fn annotator(&self) -> DbResult<Option<HttpAnnotator>> {
        let Some(url) = &self.annotator_url else {
            return Ok(None);
        };
        let mut annotator = HttpAnnotator::new(url)?;
        if let Some(key) = self.annotator_api_key.as_deref().filter(|k| !k.is_empty()) {
            annotator = annotator.with_api_key(key);
        }
        Ok(Some(annotator))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

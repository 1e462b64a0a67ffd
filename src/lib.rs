//! Tagwalk: a randomized link-walking crawler
//!
//! This crate implements an unattended crawler that wanders a website's
//! link graph at random, optionally executing configured form-fill/click
//! actions on matching pages, while enforcing URL admission rules and
//! periodically resetting browser session state. It is built for
//! marketing-tag verification and exploratory crawling, not exhaustive
//! indexing.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod history;
pub mod output;
pub mod url;

use thiserror::Error;

/// Main error type for tagwalk operations
#[derive(Debug, Error)]
pub enum TagwalkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Browser engine error: {0}")]
    Engine(#[from] browser::EngineError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(String),
}

/// Errors raised while fetching a page through either strategy
///
/// A fetch error never crosses a step boundary: the controller either
/// falls back to the plain-HTTP strategy or ends the run gracefully.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Non-HTML content for {url}: {content_type}")]
    NonHtml { url: String, content_type: String },
}

/// Result type alias for tagwalk operations
pub type Result<T> = std::result::Result<T, TagwalkError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use crate::browser::{EngineError, RenderSession};
pub use crate::config::{CrawlConfig, Store};
pub use crate::crawler::Controller;
pub use crate::url::AdmissionFilter;

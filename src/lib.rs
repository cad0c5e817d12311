//! pagescribe: a breadth-first page capture crawler
//!
//! This crate crawls web pages from seed URLs, captures a snapshot of every
//! page it visits, and hands captured pages to a captioning provider that
//! writes a description for each one. The crawl engine enforces robots.txt,
//! per-domain throttling, depth limits and bounded retries.

pub mod caption;
pub mod capture;
pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for pagescribe operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} returned by {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Render failed for {url}: {message}")]
    Render { url: String, message: String },

    #[error("Disallowed by robots.txt: {0}")]
    RobotsDenied(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Captioning failed: {0}")]
    Caption(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Unknown captioning provider '{0}'")]
    UnknownProvider(String),
}

/// Result type alias for pagescribe operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOptions, CrawlStats, Orchestrator};
pub use state::{Job, JobStatus, Priority};
pub use url::{domain_of, extract_domain, normalize_url};

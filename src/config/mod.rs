//! Configuration module for pagescribe
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Precedence is built-in defaults, then the file, then command-line
//! overrides.
//!
//! # Example
//!
//! ```no_run
//! use pagescribe::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagescribe.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CaptioningConfig, CliOverrides, Config, CrawlerConfig, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_or_default, load_config_with_hash};
pub use validation::validate;

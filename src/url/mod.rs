//! URL handling module for pagescribe
//!
//! This module provides URL normalization, domain extraction, domain-list
//! matching and the admission filter that decides which discovered URLs
//! become crawl jobs.

mod admission;
mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use admission::{AdmissionFilter, Rejection};
pub use domain::{domain_of, extract_domain};
pub use matcher::{matches_any, matches_domain};
pub use normalize::normalize_url;

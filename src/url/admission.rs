//! Admission control for discovered URLs
//!
//! The filter owns the process-scoped visited set and the per-domain
//! admission counters. `admit` runs the admission check, the caller's insert
//! and the visited-marking under one lock, so two workers discovering the
//! same link cannot both create a job for it.

use crate::config::CrawlerConfig;
use crate::url::matcher::matches_any;
use crate::url::{domain_of, normalize_url};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use url::Url;

/// Reason a URL was refused admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyVisited,
    InvalidScheme,
    Blocked,
    NotAllowed,
    DomainBudgetExhausted,
}

#[derive(Debug, Default)]
struct AdmissionState {
    visited: HashSet<String>,
    per_domain: HashMap<String, u32>,
}

/// Decides whether a URL may become a new crawl job
#[derive(Debug)]
pub struct AdmissionFilter {
    allowed_domains: Vec<String>,
    blocked_domains: Vec<String>,
    max_urls_per_domain: u32,
    state: Mutex<AdmissionState>,
}

impl AdmissionFilter {
    pub fn new(
        allowed_domains: Vec<String>,
        blocked_domains: Vec<String>,
        max_urls_per_domain: u32,
    ) -> Self {
        Self {
            allowed_domains,
            blocked_domains,
            max_urls_per_domain,
            state: Mutex::new(AdmissionState::default()),
        }
    }

    /// Creates a filter from the crawler section of the configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.allowed_domains.clone(),
            config.blocked_domains.clone(),
            config.max_urls_per_domain,
        )
    }

    /// Returns true if the URL would currently be admitted
    pub fn should_admit(&self, url: &str) -> bool {
        let state = self.lock();
        self.check(&state, url).is_ok()
    }

    /// Checks a URL and, when admitted, runs `insert` with its normalized form
    ///
    /// The URL is marked visited and counted against its domain only when
    /// `insert` reports a created value. A rejected URL never reaches
    /// `insert`.
    ///
    /// # Arguments
    ///
    /// * `url` - The candidate URL
    /// * `insert` - Called under the filter lock with the normalized URL
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the URL is rejected or `insert` created nothing,
    /// otherwise whatever `insert` returned
    pub fn admit<T, E, F>(&self, url: &str, insert: F) -> Result<Option<T>, E>
    where
        F: FnOnce(&str) -> Result<Option<T>, E>,
    {
        let mut state = self.lock();

        if let Err(reason) = self.check(&state, url) {
            debug!("Not admitting {}: {:?}", url, reason);
            return Ok(None);
        }

        let normalized = normalize_url(url);
        let created = insert(&normalized)?;

        if created.is_some() {
            let domain = domain_of(&normalized);
            state.visited.insert(normalized);
            *state.per_domain.entry(domain).or_insert(0) += 1;
        }

        Ok(created)
    }

    /// Marks a URL visited without going through admission
    pub fn mark_visited(&self, url: &str) {
        let normalized = normalize_url(url);
        self.lock().visited.insert(normalized);
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().visited.contains(&normalize_url(url))
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    /// Clears the visited set and the per-domain counters
    pub fn reset(&self) {
        let mut state = self.lock();
        state.visited.clear();
        state.per_domain.clear();
    }

    fn check(&self, state: &AdmissionState, url: &str) -> Result<(), Rejection> {
        let normalized = normalize_url(url);
        if state.visited.contains(&normalized) {
            return Err(Rejection::AlreadyVisited);
        }

        let parsed = Url::parse(url).map_err(|_| Rejection::InvalidScheme)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Rejection::InvalidScheme);
        }

        let domain = domain_of(url);
        if matches_any(&self.blocked_domains, &domain) {
            return Err(Rejection::Blocked);
        }

        if !self.allowed_domains.is_empty() && !matches_any(&self.allowed_domains, &domain) {
            return Err(Rejection::NotAllowed);
        }

        let admitted = state.per_domain.get(&domain).copied().unwrap_or(0);
        if admitted >= self.max_urls_per_domain {
            return Err(Rejection::DomainBudgetExhausted);
        }

        Ok(())
    }

    // The guarded state stays consistent even if a holder panicked
    fn lock(&self) -> MutexGuard<'_, AdmissionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

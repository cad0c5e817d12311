//! Robots.txt caching implementation
//!
//! Entries live for the lifetime of the cache. Only successfully fetched
//! files are stored; the cache never holds a failure.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Cached robots.txt data for a domain
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots instance stamped with the current time
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }
}

/// Domain to robots.txt map shared by all workers of a gate
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cached robots.txt of a domain
    ///
    /// # Arguments
    ///
    /// * `domain` - Cache key, the host with its port when one is given
    pub fn get(&self, domain: &str) -> Option<CachedRobots> {
        self.lock().get(domain).cloned()
    }

    /// Caches a parsed robots.txt, replacing any earlier entry
    ///
    /// # Arguments
    ///
    /// * `domain` - Cache key, the host with its port when one is given
    /// * `robots` - The parsed file
    pub fn insert(&self, domain: &str, robots: ParsedRobots) {
        self.lock()
            .insert(domain.to_string(), CachedRobots::new(robots));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Cached domains, sorted
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.lock().keys().cloned().collect();
        domains.sort();
        domains
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedRobots>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

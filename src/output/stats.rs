//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! store-wide statistics from the storage layer.

use crate::state::JobStatus;
use crate::storage::Storage;
use crate::Result;
use serde::Serialize;

/// Store-wide statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatistics {
    /// Total number of jobs ever queued
    pub total_jobs: u64,

    /// Job counts per status, in state-machine order, zero counts omitted
    pub jobs_by_status: Vec<(JobStatus, u64)>,

    /// Number of captured pages
    pub captures: u64,

    /// Number of generated captions
    pub captions: u64,

    /// Number of unique domains with at least one capture
    pub unique_domains: u64,
}

impl StoreStatistics {
    pub fn count(&self, status: JobStatus) -> u64 {
        self.jobs_by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Captures still waiting for a caption
    pub fn uncaptioned(&self) -> u64 {
        self.captures.saturating_sub(self.captions)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// A `StoreStatistics` with job counts per status and capture totals
pub fn load_statistics(storage: &dyn Storage) -> Result<StoreStatistics> {
    let mut jobs_by_status = Vec::new();
    let mut total_jobs = 0;

    for status in JobStatus::all_statuses() {
        let count = storage.count_jobs_by_status(status)?;
        total_jobs += count;
        if count > 0 {
            jobs_by_status.push((status, count));
        }
    }

    Ok(StoreStatistics {
        total_jobs,
        jobs_by_status,
        captures: storage.count_captures()?,
        captions: storage.count_captions()?,
        unique_domains: storage.count_unique_domains()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");

    println!("Overview:");
    println!("  Total jobs: {}", stats.total_jobs);
    println!("  Pages captured: {}", stats.captures);
    println!("  Captions generated: {}", stats.captions);
    println!("  Unique domains: {}", stats.unique_domains);
    println!();

    if !stats.jobs_by_status.is_empty() {
        println!("Jobs by Status:");
        for (status, count) in &stats.jobs_by_status {
            let percentage = if stats.total_jobs > 0 {
                (*count as f64 / stats.total_jobs as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", status, count, percentage);
        }
        println!();
    }

    let completed = stats.count(JobStatus::Completed);
    let success_rate = if stats.total_jobs > 0 {
        (completed as f64 / stats.total_jobs as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} jobs completed)",
        success_rate, completed, stats.total_jobs
    );
}

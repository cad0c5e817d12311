//! Output module for crawl summaries and reports
//!
//! This module handles:
//! - Printing the counters of a finished crawl run
//! - Store-wide statistics for the `stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, StoreStatistics};

use crate::crawler::CrawlStats;

/// Prints the counters of a crawl run to stdout
pub fn print_crawl_summary(stats: &CrawlStats) {
    println!("=== Crawl Summary ===\n");

    if let (Some(started), Some(finished)) = (stats.started_at, stats.finished_at) {
        let elapsed = (finished - started).num_milliseconds() as f64 / 1000.0;
        println!("Duration: {:.1}s", elapsed);
    }

    println!("  URLs discovered: {}", stats.urls_discovered);
    println!("  URLs crawled: {}", stats.urls_crawled);
    println!("  URLs skipped: {}", stats.urls_skipped);
    println!("  URLs failed: {}", stats.urls_failed);
    println!("  Screenshots taken: {}", stats.screenshots_taken);
    println!("  Captions generated: {}", stats.captions_generated);
    println!("  Bytes downloaded: {}", format_bytes(stats.bytes_downloaded));
}

/// Formats a byte count with a binary unit
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

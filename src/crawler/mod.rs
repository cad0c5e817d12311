//! Crawler module for crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - The frontier of pending jobs, kept in storage
//! - The worker pool that drains it with bounded retries
//! - The orchestrator that captures, captions and expands each page

mod frontier;
mod orchestrator;
mod scheduler;

pub use frontier::Frontier;
pub use orchestrator::{CrawlOptions, CrawlStats, Orchestrator, SingleCapture};
pub use scheduler::{HandlerOutcome, JobHandler, Scheduler, SchedulerConfig, StopHandle};

//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::capture::Capture;
use crate::state::{Job, JobStatus, Priority};
use crate::storage::{CaptionRecord, CaptureRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Storage lock poisoned: {0}")]
    Lock(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all persistence operations needed by the crawl engine.
/// Jobs are keyed by their normalized URL, which is unique across the store.
pub trait Storage {
    // ===== Job Management =====

    /// Inserts a new pending job unless one exists for the normalized URL
    ///
    /// # Arguments
    ///
    /// * `url` - The URL as discovered
    /// * `normalized_url` - The identity key of the URL
    /// * `depth` - Link distance from the seed
    /// * `parent_url` - The page the URL was found on, `None` for seeds
    /// * `priority` - Dispatch tier
    ///
    /// # Returns
    ///
    /// The created job, or `None` if a job with the same normalized URL
    /// already exists
    fn create_job_if_absent(
        &mut self,
        url: &str,
        normalized_url: &str,
        depth: u32,
        parent_url: Option<&str>,
        priority: Priority,
    ) -> StorageResult<Option<Job>>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<Job>;

    /// Gets up to `limit` pending jobs, highest priority first, oldest first
    /// within a priority
    fn fetch_pending_jobs(&self, limit: usize) -> StorageResult<Vec<Job>>;

    /// Updates the status of a job
    ///
    /// When `error` is given it replaces the job's last error; otherwise the
    /// previous error is kept.
    ///
    /// # Arguments
    ///
    /// * `job_id` - The job ID
    /// * `status` - The new status
    /// * `error` - Optional error message to record
    fn update_job_status(
        &mut self,
        job_id: i64,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Increments the retry count of a job and returns the new count
    fn increment_retry(&mut self, job_id: i64) -> StorageResult<u32>;

    /// Checks if a job exists for the normalized URL
    fn job_exists_by_url(&self, normalized_url: &str) -> StorageResult<bool>;

    /// Counts jobs in a status
    fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<u64>;

    /// Returns jobs left in flight by a previous process to `pending`
    ///
    /// Returns the number of jobs that were reset.
    fn reset_interrupted_jobs(&mut self) -> StorageResult<usize>;

    // ===== Capture Management =====

    /// Saves a capture, replacing an earlier capture of the same URL
    ///
    /// # Arguments
    ///
    /// * `capture` - The captured page
    /// * `screenshot_path` - Where the screenshot was written, if it was
    ///
    /// # Returns
    ///
    /// The capture ID
    fn save_capture(
        &mut self,
        capture: &Capture,
        screenshot_path: Option<&str>,
    ) -> StorageResult<i64>;

    /// Checks if a capture exists for the normalized URL
    fn capture_exists_by_url(&self, normalized_url: &str) -> StorageResult<bool>;

    /// Gets the capture of a normalized URL
    fn get_capture_by_url(&self, normalized_url: &str) -> StorageResult<Option<CaptureRecord>>;

    /// Gets up to `limit` captures that have no caption yet, oldest first
    fn get_uncaptioned_captures(&self, limit: usize) -> StorageResult<Vec<CaptureRecord>>;

    // ===== Caption Management =====

    /// Saves a caption for a capture and returns the caption ID
    fn save_caption(
        &mut self,
        capture_id: i64,
        provider: &str,
        model: &str,
        text: &str,
        tokens_used: Option<u32>,
    ) -> StorageResult<i64>;

    /// Gets all captions of a capture, oldest first
    fn get_captions_for_capture(&self, capture_id: i64) -> StorageResult<Vec<CaptionRecord>>;

    // ===== Statistics =====

    /// Gets total capture count
    fn count_captures(&self) -> StorageResult<u64>;

    /// Gets total caption count
    fn count_captions(&self) -> StorageResult<u64>;

    /// Gets count of unique domains that have at least one capture
    fn count_unique_domains(&self) -> StorageResult<u64>;
}

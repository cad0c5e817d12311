//! Crawl frontier backed by the job store
//!
//! The frontier owns no queue of its own: pending jobs live in storage and
//! are read back in dispatch order. What it adds is a wake-up signal, so the
//! scheduler can sleep until work is inserted or re-queued instead of
//! polling the store.

use crate::state::{Job, JobStatus, Priority};
use crate::storage::{self, SharedStorage};
use crate::url::normalize_url;
use crate::Result;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::debug;

pub struct Frontier {
    storage: SharedStorage,
    notify: Notify,
}

impl Frontier {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            notify: Notify::new(),
        }
    }

    /// Adds a pending job for `url`
    ///
    /// # Arguments
    ///
    /// * `url` - The URL as discovered; it is normalized before lookup
    /// * `depth` - Link distance from the seed
    /// * `parent_url` - The page the URL was found on, `None` for seeds
    /// * `priority` - Dispatch tier
    ///
    /// # Returns
    ///
    /// The created job, or `None` when a job or a capture already exists for
    /// the normalized URL
    pub fn add_job(
        &self,
        url: &str,
        depth: u32,
        parent_url: Option<&str>,
        priority: Priority,
    ) -> Result<Option<Job>> {
        let normalized = normalize_url(url);

        let job = {
            let mut store = storage::lock(&self.storage)?;
            if store.capture_exists_by_url(&normalized)? {
                debug!("Already captured: {}", normalized);
                return Ok(None);
            }
            store.create_job_if_absent(url, &normalized, depth, parent_url, priority)?
        };

        if let Some(job) = &job {
            debug!("Queued job {} for {} (depth {})", job.id, job.url, job.depth);
            self.notify.notify_one();
        }

        Ok(job)
    }

    /// Up to `limit` pending jobs, by priority tier and then creation order
    pub fn next_batch(&self, limit: usize) -> Result<Vec<Job>> {
        Ok(storage::lock(&self.storage)?.fetch_pending_jobs(limit)?)
    }

    pub fn mark_status(&self, job_id: i64, status: JobStatus, error: Option<&str>) -> Result<()> {
        storage::lock(&self.storage)?.update_job_status(job_id, status, error)?;
        if status == JobStatus::Pending {
            self.notify.notify_one();
        }
        Ok(())
    }

    /// Increments a job's retry count and returns the new count
    pub fn increment_retry(&self, job_id: i64) -> Result<u32> {
        Ok(storage::lock(&self.storage)?.increment_retry(job_id)?)
    }

    pub fn pending_count(&self) -> Result<u64> {
        Ok(storage::lock(&self.storage)?.count_jobs_by_status(JobStatus::Pending)?)
    }

    /// Returns jobs left in flight by a previous process to pending
    pub fn recover_interrupted(&self) -> Result<usize> {
        let reset = storage::lock(&self.storage)?.reset_interrupted_jobs()?;
        if reset > 0 {
            self.notify.notify_one();
        }
        Ok(reset)
    }

    /// Resolves once work is inserted or re-queued
    ///
    /// A notification sent while nobody is waiting is kept for the next
    /// waiter, so an insert between an empty poll and this call is not lost.
    pub fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }
}

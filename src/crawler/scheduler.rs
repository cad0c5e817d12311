//! Worker pool that drains the frontier
//!
//! This module handles:
//! - Dispatching pending jobs in frontier order to at most `concurrency`
//!   workers
//! - Converting handler outcomes into job status transitions
//! - Bounded retries for jobs whose handler returned an error
//! - Detecting when the crawl has run dry, and cooperative stopping
//!
//! Only the control loop touches job status. Workers run the handler and hand
//! the outcome back through the `JoinSet`; a worker that panics is settled
//! like a handler error.

use crate::config::CrawlerConfig;
use crate::crawler::Frontier;
use crate::state::{Job, JobStatus};
use async_trait::async_trait;
use crate::CrawlError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Tuning for the worker pool
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of jobs handled at once
    pub concurrency: usize,

    /// Re-queues allowed for a failing job before it is marked failed
    pub max_retries: u32,

    /// Pending jobs pulled from the frontier per poll
    pub batch_size: usize,

    /// Poll interval while workers are busy, and the grace period of the
    /// final emptiness check
    pub idle_wait: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_retries: 3,
            batch_size: 10,
            idle_wait: Duration::from_millis(500),
        }
    }
}

impl SchedulerConfig {
    pub fn from_crawler(config: &CrawlerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1) as usize,
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

/// How a handler disposed of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The page was processed
    Completed,

    /// The page was deliberately not processed and must not be retried
    Skipped,

    /// The job was not attempted; it goes back to pending untouched
    Deferred,
}

/// Processes one job
///
/// An `Err` is treated as a transient failure and retried.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job) -> crate::Result<HandlerOutcome>;
}

/// Cooperative stop signal for a running scheduler
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops dispatching new jobs; in-flight jobs run to completion
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type CompleteCallback = Box<dyn Fn(&Job) + Send + Sync>;
type FailedCallback = Box<dyn Fn(&Job, &str) + Send + Sync>;

type WorkerResult = (Job, crate::Result<HandlerOutcome>);

/// Running workers, with the job each task was spawned for
///
/// A worker that panics never returns its job, so the job is looked up by
/// task id instead.
#[derive(Default)]
struct Workers {
    tasks: JoinSet<WorkerResult>,
    jobs: HashMap<Id, Job>,
}

impl Workers {
    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for the next worker and pairs its result with its job
    ///
    /// A worker that panicked yields its job with a `CrawlError::Worker`, so
    /// the panic goes through the same retry path as a handler error.
    async fn join_next(&mut self) -> Option<WorkerResult> {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            if let Some(finished) = self.finish(joined) {
                return Some(finished);
            }
        }
        None
    }

    fn finish(&mut self, joined: Result<(Id, WorkerResult), JoinError>) -> Option<WorkerResult> {
        let e = match joined {
            Ok((id, finished)) => {
                self.jobs.remove(&id);
                return Some(finished);
            }
            Err(e) => e,
        };

        let Some(job) = self.jobs.remove(&e.id()) else {
            error!("Worker task {} ended abnormally without a job: {}", e.id(), e);
            return None;
        };

        error!("Worker for job {} ({}) ended abnormally: {}", job.id, job.url, e);
        let reason = if e.is_panic() {
            "handler panicked".to_string()
        } else {
            e.to_string()
        };
        let error = CrawlError::Worker(format!("{} while handling {}", reason, job.url));
        Some((job, Err(error)))
    }
}

pub struct Scheduler {
    frontier: Arc<Frontier>,
    config: SchedulerConfig,
    stop: StopHandle,
    on_complete: Option<CompleteCallback>,
    on_failed: Option<FailedCallback>,
}

impl Scheduler {
    pub fn new(frontier: Arc<Frontier>, config: SchedulerConfig) -> Self {
        Self {
            frontier,
            config,
            stop: StopHandle::new(),
            on_complete: None,
            on_failed: None,
        }
    }

    /// Uses an existing stop handle instead of a fresh one
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Called for every job that ends completed, skipped jobs included
    pub fn on_complete(mut self, callback: impl Fn(&Job) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Called with the last error for every job that ends failed
    pub fn on_failed(mut self, callback: impl Fn(&Job, &str) + Send + Sync + 'static) -> Self {
        self.on_failed = Some(Box::new(callback));
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs until the frontier is drained or the scheduler is stopped
    ///
    /// Handler errors and panics are retried or recorded on the job. Storage
    /// errors end the run; workers already in flight are awaited first.
    ///
    /// # Arguments
    ///
    /// * `handler` - Processes each dispatched job
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The frontier drained or the scheduler was stopped
    /// * `Err(_)` - The store failed while recording an outcome
    pub async fn run<H: JobHandler>(&self, handler: Arc<H>) -> crate::Result<()> {
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut workers = Workers::default();

        let result = self.drive(&handler, &permits, &mut workers).await;
        if result.is_err() {
            self.stop.stop();
        }

        // Let in-flight jobs finish so callers can release their resources
        while let Some(finished) = workers.join_next().await {
            if let Err(e) = self.settle(finished) {
                error!("Failed to record job outcome: {}", e);
            }
        }

        result
    }

    async fn drive<H: JobHandler>(
        &self,
        handler: &Arc<H>,
        permits: &Arc<Semaphore>,
        workers: &mut Workers,
    ) -> crate::Result<()> {
        loop {
            let stopped = self.stop.is_stopped();

            if !stopped && self.dispatch(handler, permits, workers)? > 0 {
                continue;
            }

            if workers.is_empty() {
                if stopped {
                    info!("Scheduler stopped");
                    return Ok(());
                }
                if self.is_drained().await? {
                    info!("Frontier drained");
                    return Ok(());
                }
                continue;
            }

            tokio::select! {
                finished = workers.join_next() => {
                    if let Some(finished) = finished {
                        self.settle(finished)?;
                    }
                }
                _ = self.frontier.notified(), if !stopped => {}
                _ = tokio::time::sleep(self.config.idle_wait) => {}
            }
        }
    }

    /// Pulls pending jobs for the free workers and starts them
    ///
    /// Returns the number of jobs dispatched.
    fn dispatch<H: JobHandler>(
        &self,
        handler: &Arc<H>,
        permits: &Arc<Semaphore>,
        workers: &mut Workers,
    ) -> crate::Result<usize> {
        let free = permits.available_permits();
        if free == 0 {
            return Ok(0);
        }

        let batch = self.frontier.next_batch(free.min(self.config.batch_size))?;
        let mut dispatched = 0;

        for job in batch {
            let Ok(permit) = permits.clone().try_acquire_owned() else {
                break;
            };

            // Marked before spawning so the next poll cannot pick it up again
            self.frontier.mark_status(job.id, JobStatus::Crawling, None)?;
            debug!("Dispatching job {} ({})", job.id, job.url);

            let handler = Arc::clone(handler);
            let task = job.clone();
            let spawned = workers.tasks.spawn(async move {
                let _permit = permit;
                let result = handler.handle(task.clone()).await;
                (task, result)
            });
            workers.jobs.insert(spawned.id(), job);
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// No pending work, confirmed a second time after the idle wait
    async fn is_drained(&self) -> crate::Result<bool> {
        if self.frontier.pending_count()? > 0 {
            return Ok(false);
        }
        let _ = tokio::time::timeout(self.config.idle_wait, self.frontier.notified()).await;
        Ok(self.frontier.pending_count()? == 0)
    }

    /// Applies a finished worker's outcome to its job
    fn settle(&self, finished: WorkerResult) -> crate::Result<()> {
        let (job, result) = finished;

        match result {
            Ok(HandlerOutcome::Completed) | Ok(HandlerOutcome::Skipped) => {
                self.frontier
                    .mark_status(job.id, JobStatus::Completed, None)?;
                if let Some(callback) = &self.on_complete {
                    callback(&job);
                }
            }
            Ok(HandlerOutcome::Deferred) => {
                self.frontier.mark_status(job.id, JobStatus::Pending, None)?;
            }
            Err(e) => {
                let message = e.to_string();
                if job.retry_count < self.config.max_retries {
                    let attempt = self.frontier.increment_retry(job.id)?;
                    warn!(
                        "Job {} ({}) failed, retry {}/{}: {}",
                        job.id, job.url, attempt, self.config.max_retries, message
                    );
                    self.frontier
                        .mark_status(job.id, JobStatus::Pending, Some(&message))?;
                } else {
                    error!(
                        "Job {} ({}) failed after {} retries: {}",
                        job.id, job.url, job.retry_count, message
                    );
                    self.frontier
                        .mark_status(job.id, JobStatus::Failed, Some(&message))?;
                    if let Some(callback) = &self.on_failed {
                        callback(&job, &message);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Priority;
    use crate::storage::{self, shared, SharedStorage, SqliteStorage};
    use crate::CrawlError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn setup() -> (Arc<Frontier>, SharedStorage) {
        let storage = shared(SqliteStorage::open_in_memory().unwrap());
        (Arc::new(Frontier::new(storage.clone())), storage)
    }

    fn config(concurrency: usize, max_retries: u32) -> SchedulerConfig {
        SchedulerConfig {
            concurrency,
            max_retries,
            batch_size: 10,
            idle_wait: Duration::from_millis(20),
        }
    }

    /// Records the order in which jobs are handled
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: Job) -> crate::Result<HandlerOutcome> {
            self.seen.lock().unwrap().push(job.url);
            Ok(HandlerOutcome::Completed)
        }
    }

    /// Fails every job
    struct FailingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for FailingHandler {
        async fn handle(&self, job: Job) -> crate::Result<HandlerOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CrawlError::Render {
                url: job.url,
                message: "boom".to_string(),
            })
        }
    }

    /// Panics on every job
    struct PanickingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for PanickingHandler {
        async fn handle(&self, job: Job) -> crate::Result<HandlerOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("handler crashed on {}", job.url);
        }
    }

    /// Adds a child for every job shallower than `max_depth`
    struct ExpandingHandler {
        frontier: Arc<Frontier>,
        max_depth: u32,
    }

    #[async_trait]
    impl JobHandler for ExpandingHandler {
        async fn handle(&self, job: Job) -> crate::Result<HandlerOutcome> {
            if job.depth < self.max_depth {
                let child = format!("{}/d{}", job.url, job.depth + 1);
                self.frontier
                    .add_job(&child, job.depth + 1, Some(&job.url), Priority::Normal)?;
            }
            Ok(HandlerOutcome::Completed)
        }
    }

    #[tokio::test]
    async fn test_dispatch_follows_priority_with_single_worker() {
        let (frontier, _) = setup();
        frontier.add_job("https://a.com/low", 1, None, Priority::Low).unwrap();
        frontier.add_job("https://a.com/normal", 1, None, Priority::Normal).unwrap();
        frontier.add_job("https://a.com/high", 0, None, Priority::High).unwrap();

        let handler = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });
        Scheduler::new(frontier.clone(), config(1, 3))
            .run(handler.clone())
            .await
            .unwrap();

        assert_eq!(
            *handler.seen.lock().unwrap(),
            vec!["https://a.com/high", "https://a.com/normal", "https://a.com/low"]
        );
    }

    #[tokio::test]
    async fn test_failing_job_retries_then_fails() {
        let (frontier, storage) = setup();
        let job = frontier
            .add_job("https://a.com/broken", 0, None, Priority::High)
            .unwrap()
            .unwrap();

        let failed = Arc::new(Mutex::new(Vec::new()));
        let failed_in_cb = failed.clone();
        let handler = Arc::new(FailingHandler {
            calls: AtomicUsize::new(0),
        });

        Scheduler::new(frontier.clone(), config(2, 2))
            .on_failed(move |job, error| {
                failed_in_cb
                    .lock()
                    .unwrap()
                    .push((job.id, error.to_string()));
            })
            .run(handler.clone())
            .await
            .unwrap();

        // One first attempt plus max_retries re-queues
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

        let stored = storage::lock(&storage).unwrap().get_job(job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.retry_count, 2);
        assert!(stored.last_error.unwrap().contains("boom"));

        let failed = failed.lock().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, job.id);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_retried_then_failed() {
        let (frontier, storage) = setup();
        let job = frontier
            .add_job("https://a.com/poison", 0, None, Priority::High)
            .unwrap()
            .unwrap();
        frontier
            .add_job("https://a.com/other", 0, None, Priority::Normal)
            .unwrap();

        let failed = Arc::new(AtomicUsize::new(0));
        let failed_in_cb = failed.clone();
        let handler = Arc::new(PanickingHandler {
            calls: AtomicUsize::new(0),
        });

        Scheduler::new(frontier.clone(), config(2, 2))
            .on_failed(move |_, _| {
                failed_in_cb.fetch_add(1, Ordering::SeqCst);
            })
            .run(handler.clone())
            .await
            .unwrap();

        // Two jobs, each tried once plus max_retries times
        assert_eq!(handler.calls.load(Ordering::SeqCst), 6);
        assert_eq!(failed.load(Ordering::SeqCst), 2);

        let store = storage::lock(&storage).unwrap();
        let stored = store.get_job(job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.retry_count, 2);
        assert!(stored.last_error.unwrap().contains("panicked"));
        assert_eq!(store.count_jobs_by_status(JobStatus::Crawling).unwrap(), 0);
        assert_eq!(store.count_jobs_by_status(JobStatus::Failed).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_fails_immediately() {
        let (frontier, storage) = setup();
        let job = frontier
            .add_job("https://a.com/", 0, None, Priority::High)
            .unwrap()
            .unwrap();
        let handler = Arc::new(FailingHandler {
            calls: AtomicUsize::new(0),
        });

        Scheduler::new(frontier, config(1, 0))
            .run(handler.clone())
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        let stored = storage::lock(&storage).unwrap().get_job(job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.retry_count, 0);
    }

    #[tokio::test]
    async fn test_children_added_by_workers_are_drained() {
        let (frontier, storage) = setup();
        frontier.add_job("https://a.com", 0, None, Priority::High).unwrap();

        let completed = Arc::new(AtomicUsize::new(0));
        let completed_in_cb = completed.clone();
        let handler = Arc::new(ExpandingHandler {
            frontier: frontier.clone(),
            max_depth: 3,
        });

        Scheduler::new(frontier.clone(), config(3, 1))
            .on_complete(move |_| {
                completed_in_cb.fetch_add(1, Ordering::SeqCst);
            })
            .run(handler)
            .await
            .unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 4);
        let store = storage::lock(&storage).unwrap();
        assert_eq!(store.count_jobs_by_status(JobStatus::Completed).unwrap(), 4);
        assert_eq!(store.count_jobs_by_status(JobStatus::Pending).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_frontier_returns() {
        let (frontier, _) = setup();
        let handler = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
        });
        Scheduler::new(frontier, config(2, 1))
            .run(handler.clone())
            .await
            .unwrap();
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    /// Stops the scheduler on the first job and defers everything after it
    struct StoppingHandler {
        stop: StopHandle,
        handled: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for StoppingHandler {
        async fn handle(&self, _job: Job) -> crate::Result<HandlerOutcome> {
            if self.stop.is_stopped() {
                return Ok(HandlerOutcome::Deferred);
            }
            self.handled.fetch_add(1, Ordering::SeqCst);
            self.stop.stop();
            Ok(HandlerOutcome::Completed)
        }
    }

    #[tokio::test]
    async fn test_stop_leaves_remaining_jobs_pending() {
        let (frontier, storage) = setup();
        for i in 0..5 {
            frontier
                .add_job(&format!("https://a.com/{}", i), 0, None, Priority::Normal)
                .unwrap();
        }

        let scheduler = Scheduler::new(frontier.clone(), config(1, 1));
        let handler = Arc::new(StoppingHandler {
            stop: scheduler.stop_handle(),
            handled: AtomicUsize::new(0),
        });
        scheduler.run(handler.clone()).await.unwrap();

        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
        let store = storage::lock(&storage).unwrap();
        assert_eq!(store.count_jobs_by_status(JobStatus::Completed).unwrap(), 1);
        assert_eq!(store.count_jobs_by_status(JobStatus::Pending).unwrap(), 4);
        assert_eq!(store.count_jobs_by_status(JobStatus::Crawling).unwrap(), 0);
    }
}

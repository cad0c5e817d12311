//! Crawl orchestration
//!
//! The orchestrator wires the crawl together: it seeds the frontier, runs
//! the scheduler with a handler that captures each page, stores the capture,
//! captions it and queues the page's internal links, and keeps the run's
//! statistics. It also serves the one-off `single` and `caption` commands,
//! which reuse the same capture and caption steps outside the frontier.

use crate::caption::{CaptionInput, CaptionResult, CaptionService};
use crate::capture::{Capture, Renderer};
use crate::config::Config;
use crate::crawler::{Frontier, HandlerOutcome, JobHandler, Scheduler, SchedulerConfig, StopHandle};
use crate::robots::{RobotsCheck, RobotsGate};
use crate::state::{DomainThrottle, Job, Priority};
use crate::storage::{self, CaptureRecord, SharedStorage};
use crate::url::{domain_of, AdmissionFilter};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-run options for [`Orchestrator::crawl`]
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Stop after this many pages have been captured
    ///
    /// Best effort: jobs already in flight when the cap is reached still
    /// finish, so the final count may overshoot by up to `concurrency - 1`.
    pub max_urls: Option<usize>,

    /// Caption pages as they are captured
    pub caption_on_crawl: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_urls: None,
            caption_on_crawl: true,
        }
    }
}

/// Counters for one orchestrator
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlStats {
    pub urls_discovered: u64,
    pub urls_crawled: u64,
    pub urls_failed: u64,
    pub urls_skipped: u64,
    pub screenshots_taken: u64,
    pub captions_generated: u64,
    pub bytes_downloaded: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Result of [`Orchestrator::capture_single`]
#[derive(Debug, Clone)]
pub struct SingleCapture {
    pub capture: CaptureRecord,
    pub caption: Option<CaptionResult>,
}

/// State shared by the orchestrator and its crawl handler
struct Inner {
    config: Config,
    storage: SharedStorage,
    frontier: Arc<Frontier>,
    admission: AdmissionFilter,
    robots: Option<RobotsGate>,
    throttle: DomainThrottle,
    renderer: Arc<dyn Renderer>,
    captioner: Option<CaptionService>,
    stats: Mutex<CrawlStats>,
}

pub struct Orchestrator {
    inner: Arc<Inner>,
    stop: StopHandle,
}

impl Orchestrator {
    /// Creates an orchestrator
    ///
    /// A robots gate is built from the configured user agent unless
    /// robots.txt is switched off.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `storage` - Shared store for jobs, captures and captions
    /// * `renderer` - Produces a capture for each URL
    /// * `caption_service` - Captioning provider, `None` to only capture
    pub fn new(
        config: Config,
        storage: SharedStorage,
        renderer: Arc<dyn Renderer>,
        caption_service: Option<CaptionService>,
    ) -> Result<Self> {
        let robots = if config.crawler.respect_robots_txt {
            Some(RobotsGate::new(&config.crawler.user_agent)?)
        } else {
            None
        };
        Ok(Self::with_robots_gate(
            config,
            storage,
            renderer,
            caption_service,
            robots,
        ))
    }

    /// Creates an orchestrator with a caller-supplied robots gate
    ///
    /// `None` disables robots.txt checks regardless of the configuration.
    pub fn with_robots_gate(
        config: Config,
        storage: SharedStorage,
        renderer: Arc<dyn Renderer>,
        caption_service: Option<CaptionService>,
        robots: Option<RobotsGate>,
    ) -> Self {
        let inner = Inner {
            frontier: Arc::new(Frontier::new(storage.clone())),
            admission: AdmissionFilter::from_config(&config.crawler),
            throttle: DomainThrottle::new(
                Duration::from_millis(config.crawler.rate_limit),
                Duration::from_millis(config.crawler.max_crawl_delay),
            ),
            config,
            storage,
            robots,
            renderer,
            captioner: caption_service,
            stats: Mutex::new(CrawlStats::default()),
        };

        Self {
            inner: Arc::new(inner),
            stop: StopHandle::new(),
        }
    }

    /// Queues seed URLs at depth 0 with high priority
    ///
    /// Seeds pass the scheme and domain-list checks but not the depth
    /// limit.
    ///
    /// # Returns
    ///
    /// The number of jobs created. Seeds that were rejected, already queued
    /// or already captured are not counted.
    pub fn add_seeds<S: AsRef<str>>(&self, urls: &[S]) -> Result<usize> {
        let mut added = 0;

        for url in urls {
            let url = url.as_ref();
            let created = self.inner.admission.admit(url, |_| {
                self.inner.frontier.add_job(url, 0, None, Priority::High)
            })?;

            match created {
                Some(job) => {
                    debug!("Seeded job {} for {}", job.id, job.url);
                    added += 1;
                }
                None => info!("Seed not queued (filtered or already known): {}", url),
            }
        }

        self.inner.update_stats(|s| s.urls_discovered += added as u64);
        Ok(added)
    }

    /// Runs the crawl until the frontier drains, the cap is hit or it is stopped
    pub async fn crawl(&self, options: CrawlOptions) -> Result<CrawlStats> {
        let recovered = self.inner.frontier.recover_interrupted()?;
        if recovered > 0 {
            info!("Recovered {} interrupted jobs", recovered);
        }

        self.inner.update_stats(|s| {
            s.started_at = Some(Utc::now());
            s.finished_at = None;
        });

        let caption = options.caption_on_crawl && self.inner.captioner.is_some();
        info!(
            "Starting crawl (concurrency {}, max depth {}, captioning {})",
            self.inner.config.crawler.concurrency,
            self.inner.config.crawler.max_depth,
            if caption { "on" } else { "off" }
        );

        let failed_stats = Arc::clone(&self.inner);
        let scheduler = Scheduler::new(
            Arc::clone(&self.inner.frontier),
            SchedulerConfig::from_crawler(&self.inner.config.crawler),
        )
        .with_stop_handle(self.stop.clone())
        .on_failed(move |_, _| failed_stats.update_stats(|s| s.urls_failed += 1));

        let handler = Arc::new(CrawlHandler {
            inner: Arc::clone(&self.inner),
            stop: self.stop.clone(),
            max_urls: options.max_urls,
            caption,
        });

        let result = scheduler.run(handler).await;
        self.inner
            .update_stats(|s| s.finished_at = Some(Utc::now()));
        result?;

        let stats = self.stats();
        info!(
            "Crawl finished: {} crawled, {} skipped, {} failed, {} captioned",
            stats.urls_crawled, stats.urls_skipped, stats.urls_failed, stats.captions_generated
        );
        Ok(stats)
    }

    /// Captures one URL outside the frontier
    ///
    /// # Arguments
    ///
    /// * `url` - The page to capture
    /// * `caption` - Whether to caption the capture
    ///
    /// # Returns
    ///
    /// * `Ok(Some(_))` - The stored capture and its caption, if one was made
    /// * `Ok(None)` - The renderer declined the page
    /// * `Err(CrawlError::RobotsDenied)` - robots.txt disallows the URL
    pub async fn capture_single(&self, url: &str, caption: bool) -> Result<Option<SingleCapture>> {
        if let Some(check) = self.inner.robots_check(url).await {
            if !check.is_allowed {
                return Err(CrawlError::RobotsDenied(url.to_string()));
            }
        }

        let Some(capture) = self.inner.renderer.capture(url, 0).await? else {
            self.inner.update_stats(|s| s.urls_skipped += 1);
            return Ok(None);
        };

        let capture_id = self.inner.persist(&capture).await?;

        let caption = if caption {
            self.inner.caption_capture(&capture, capture_id).await
        } else {
            None
        };

        let record = storage::lock(&self.inner.storage)?
            .get_capture_by_url(&capture.normalized_url)?
            .ok_or_else(|| CrawlError::Render {
                url: url.to_string(),
                message: "capture was not stored".to_string(),
            })?;

        Ok(Some(SingleCapture {
            capture: record,
            caption,
        }))
    }

    /// Captions up to `limit` stored captures that have no caption yet
    ///
    /// Failures are logged and skipped. Returns the number captioned.
    pub async fn caption_pending(&self, limit: usize) -> Result<usize> {
        let Some(captioner) = &self.inner.captioner else {
            return Err(CrawlError::Caption(
                "no captioning provider configured".to_string(),
            ));
        };

        let records = storage::lock(&self.inner.storage)?.get_uncaptioned_captures(limit)?;
        info!(
            "Captioning {} captures with {}",
            records.len(),
            captioner.provider_name()
        );

        let mut captioned = 0;
        for record in records {
            match captioner.caption(&CaptionInput::from_record(&record)).await {
                Ok(result) => {
                    self.inner.store_caption(record.id, &result)?;
                    captioned += 1;
                }
                Err(e) => warn!("Failed to caption {}: {}", record.url, e),
            }
        }

        Ok(captioned)
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CrawlStats {
        self.inner.stats_snapshot()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn admission(&self) -> &AdmissionFilter {
        &self.inner.admission
    }
}

impl Inner {
    fn update_stats(&self, update: impl FnOnce(&mut CrawlStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut stats);
    }

    fn stats_snapshot(&self) -> CrawlStats {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// `None` when robots.txt is not consulted
    async fn robots_check(&self, url: &str) -> Option<RobotsCheck> {
        let robots = self.robots.as_ref()?;
        Some(robots.check(url, &self.config.crawler.user_agent).await)
    }

    /// Stores a capture and its screenshot; returns the capture ID
    async fn persist(&self, capture: &Capture) -> Result<i64> {
        let screenshot_path = self.write_screenshot(capture).await?;

        let id = storage::lock(&self.storage)?.save_capture(capture, screenshot_path.as_deref())?;

        self.update_stats(|s| {
            s.urls_crawled += 1;
            s.bytes_downloaded += capture.bytes_downloaded;
            if screenshot_path.is_some() {
                s.screenshots_taken += 1;
            }
        });

        Ok(id)
    }

    /// Writes the screenshot under `data_dir/screenshots`, named by the
    /// SHA-256 of the normalized URL
    async fn write_screenshot(&self, capture: &Capture) -> Result<Option<String>> {
        let Some(bytes) = &capture.screenshot else {
            return Ok(None);
        };

        let limit = self.config.storage.max_screenshot_size;
        if bytes.len() as u64 > limit {
            warn!(
                "Screenshot of {} is {} bytes, over the {} byte limit; not stored",
                capture.url,
                bytes.len(),
                limit
            );
            return Ok(None);
        }

        let dir = PathBuf::from(&self.config.storage.data_dir).join("screenshots");
        tokio::fs::create_dir_all(&dir).await?;

        let name = hex::encode(Sha256::digest(capture.normalized_url.as_bytes()));
        let path = dir.join(format!("{}.png", name));
        tokio::fs::write(&path, bytes).await?;

        Ok(Some(path.to_string_lossy().into_owned()))
    }

    /// Captions a capture and stores the result
    ///
    /// Failures are logged and yield `None`.
    async fn caption_capture(&self, capture: &Capture, capture_id: i64) -> Option<CaptionResult> {
        let captioner = self.captioner.as_ref()?;

        let result = match captioner.caption(&CaptionInput::from_capture(capture)).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to caption {}: {}", capture.url, e);
                return None;
            }
        };

        if let Err(e) = self.store_caption(capture_id, &result) {
            warn!("Failed to store caption for {}: {}", capture.url, e);
            return None;
        }
        Some(result)
    }

    fn store_caption(&self, capture_id: i64, result: &CaptionResult) -> Result<()> {
        storage::lock(&self.storage)?.save_caption(
            capture_id,
            &result.provider,
            &result.model,
            &result.text,
            result.tokens_used,
        )?;
        self.update_stats(|s| s.captions_generated += 1);
        Ok(())
    }

    /// Queues the internal links of a captured page one level deeper
    ///
    /// Returns the number of jobs created.
    fn expand_links(&self, job: &Job, capture: &Capture) -> Result<usize> {
        let depth = job.depth + 1;
        let mut created = 0;

        for link in capture.internal_links() {
            let job = self.admission.admit(&link.url, |_| {
                self.frontier
                    .add_job(&link.url, depth, Some(&job.url), Priority::Normal)
            })?;
            if job.is_some() {
                created += 1;
            }
        }

        self.update_stats(|s| s.urls_discovered += created as u64);
        Ok(created)
    }
}

/// Per-job work of a crawl run
struct CrawlHandler {
    inner: Arc<Inner>,
    stop: StopHandle,
    max_urls: Option<usize>,
    caption: bool,
}

impl CrawlHandler {
    fn cap_reached(&self) -> bool {
        match self.max_urls {
            Some(max) => self.inner.stats_snapshot().urls_crawled >= max as u64,
            None => false,
        }
    }
}

#[async_trait]
impl JobHandler for CrawlHandler {
    async fn handle(&self, job: Job) -> Result<HandlerOutcome> {
        if self.cap_reached() {
            debug!("URL cap reached, deferring {}", job.url);
            self.stop.stop();
            return Ok(HandlerOutcome::Deferred);
        }

        let mut crawl_delay = None;
        if let Some(check) = self.inner.robots_check(&job.url).await {
            if !check.is_allowed {
                info!("Disallowed by robots.txt: {}", job.url);
                self.inner.update_stats(|s| s.urls_skipped += 1);
                return Ok(HandlerOutcome::Skipped);
            }
            crawl_delay = check.crawl_delay;
        }

        let waited = self
            .inner
            .throttle
            .wait(&domain_of(&job.url), crawl_delay)
            .await;
        if !waited.is_zero() {
            debug!("Waited {:?} before {}", waited, job.url);
        }

        let Some(capture) = self.inner.renderer.capture(&job.url, job.depth).await? else {
            debug!("Renderer skipped {}", job.url);
            self.inner.update_stats(|s| s.urls_skipped += 1);
            return Ok(HandlerOutcome::Skipped);
        };

        let capture_id = self.inner.persist(&capture).await?;
        info!(
            "Captured {} (depth {}, {} links)",
            job.url,
            job.depth,
            capture.links.len()
        );

        if self.caption {
            self.inner.caption_capture(&capture, capture_id).await;
        }

        if job.depth < self.inner.config.crawler.max_depth {
            let queued = self.inner.expand_links(&job, &capture)?;
            debug!("Queued {} links from {}", queued, job.url);
        }

        Ok(HandlerOutcome::Completed)
    }
}

//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::capture::{Capture, PageLink};
use crate::state::{Job, JobStatus, Priority};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CaptionRecord, CaptureRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const JOB_COLUMNS: &str = "id, url, normalized_url, depth, parent_url, priority, status, \
     retry_count, last_error, created_at, updated_at";

const CAPTURE_COLUMNS: &str = "id, url, normalized_url, domain, depth, status_code, title, \
     description, text, html, css, links, screenshot_path, bytes_downloaded, captured_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CrawlError)` - Failed to open database
    pub fn new(path: &Path) -> crate::Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Raw job columns, converted to a [`Job`] outside the row callback so
/// that bad values surface as [`StorageError::InvalidValue`]
struct JobRow {
    id: i64,
    url: String,
    normalized_url: String,
    depth: u32,
    parent_url: Option<String>,
    priority: i64,
    status: String,
    retry_count: u32,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            normalized_url: row.get(2)?,
            depth: row.get(3)?,
            parent_url: row.get(4)?,
            priority: row.get(5)?,
            status: row.get(6)?,
            retry_count: row.get(7)?,
            last_error: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_job(self) -> StorageResult<Job> {
        let priority = Priority::from_rank(self.priority).ok_or_else(|| {
            StorageError::InvalidValue(format!("priority {} for job {}", self.priority, self.id))
        })?;
        let status = JobStatus::from_db_string(&self.status).ok_or_else(|| {
            StorageError::InvalidValue(format!("status '{}' for job {}", self.status, self.id))
        })?;

        Ok(Job {
            id: self.id,
            url: self.url,
            normalized_url: self.normalized_url,
            depth: self.depth,
            parent_url: self.parent_url,
            priority,
            status,
            retry_count: self.retry_count,
            last_error: self.last_error,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct CaptureRow {
    id: i64,
    url: String,
    normalized_url: String,
    domain: String,
    depth: u32,
    status_code: u16,
    title: Option<String>,
    description: Option<String>,
    text: String,
    html: Option<String>,
    css: Option<String>,
    links: String,
    screenshot_path: Option<String>,
    bytes_downloaded: i64,
    captured_at: String,
}

impl CaptureRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            normalized_url: row.get(2)?,
            domain: row.get(3)?,
            depth: row.get(4)?,
            status_code: row.get(5)?,
            title: row.get(6)?,
            description: row.get(7)?,
            text: row.get(8)?,
            html: row.get(9)?,
            css: row.get(10)?,
            links: row.get(11)?,
            screenshot_path: row.get(12)?,
            bytes_downloaded: row.get(13)?,
            captured_at: row.get(14)?,
        })
    }

    fn into_record(self) -> StorageResult<CaptureRecord> {
        let links: Vec<PageLink> = serde_json::from_str(&self.links)?;
        Ok(CaptureRecord {
            id: self.id,
            url: self.url,
            normalized_url: self.normalized_url,
            domain: self.domain,
            depth: self.depth,
            status_code: self.status_code,
            title: self.title,
            description: self.description,
            text: self.text,
            html: self.html,
            css: self.css,
            links,
            screenshot_path: self.screenshot_path,
            bytes_downloaded: self.bytes_downloaded.max(0) as u64,
            captured_at: parse_timestamp(&self.captured_at)?,
        })
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidValue(format!("timestamp '{}': {}", value, e)))
}

impl Storage for SqliteStorage {
    // ===== Job Management =====

    fn create_job_if_absent(
        &mut self,
        url: &str,
        normalized_url: &str,
        depth: u32,
        parent_url: Option<&str>,
        priority: Priority,
    ) -> StorageResult<Option<Job>> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO jobs
             (url, normalized_url, depth, parent_url, priority, status, retry_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
            params![
                url,
                normalized_url,
                depth,
                parent_url,
                priority.rank(),
                JobStatus::Pending.to_db_string(),
                now
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }

        let id = self.conn.last_insert_rowid();
        self.get_job(id).map(Some)
    }

    fn get_job(&self, job_id: i64) -> StorageResult<Job> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                JobRow::from_row,
            )
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))?;

        row.into_job()
    }

    fn fetch_pending_jobs(&self, limit: usize) -> StorageResult<Vec<Job>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM jobs WHERE status = ?1 ORDER BY priority ASC, id ASC LIMIT ?2",
            JOB_COLUMNS
        ))?;

        let rows = stmt
            .query_map(
                params![JobStatus::Pending.to_db_string(), limit as i64],
                JobRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    fn update_job_status(
        &mut self,
        job_id: i64,
        status: JobStatus,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE jobs SET status = ?1, last_error = COALESCE(?2, last_error), updated_at = ?3
             WHERE id = ?4",
            params![status.to_db_string(), error, now, job_id],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn increment_retry(&mut self, job_id: i64) -> StorageResult<u32> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE jobs SET retry_count = retry_count + 1, updated_at = ?1 WHERE id = ?2",
            params![now, job_id],
        )?;

        if updated == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }

        let count: u32 = self.conn.query_row(
            "SELECT retry_count FROM jobs WHERE id = ?1",
            params![job_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn job_exists_by_url(&self, normalized_url: &str) -> StorageResult<bool> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM jobs WHERE normalized_url = ?1",
                params![normalized_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn count_jobs_by_status(&self, status: JobStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn reset_interrupted_jobs(&mut self) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let reset = self.conn.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE status IN (?3, ?4, ?5)",
            params![
                JobStatus::Pending.to_db_string(),
                now,
                JobStatus::Crawling.to_db_string(),
                JobStatus::Processing.to_db_string(),
                JobStatus::Captioning.to_db_string()
            ],
        )?;
        Ok(reset)
    }

    // ===== Capture Management =====

    fn save_capture(
        &mut self,
        capture: &Capture,
        screenshot_path: Option<&str>,
    ) -> StorageResult<i64> {
        let links = serde_json::to_string(&capture.links)?;
        self.conn.execute(
            "INSERT INTO captures
             (url, normalized_url, domain, depth, status_code, title, description, text, html, css,
              links, screenshot_path, bytes_downloaded, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(normalized_url) DO UPDATE SET
                url = excluded.url,
                domain = excluded.domain,
                depth = excluded.depth,
                status_code = excluded.status_code,
                title = excluded.title,
                description = excluded.description,
                text = excluded.text,
                html = excluded.html,
                css = excluded.css,
                links = excluded.links,
                screenshot_path = excluded.screenshot_path,
                bytes_downloaded = excluded.bytes_downloaded,
                captured_at = excluded.captured_at",
            params![
                capture.url,
                capture.normalized_url,
                capture.domain,
                capture.depth,
                capture.status_code,
                capture.title,
                capture.description,
                capture.text,
                capture.html,
                capture.css,
                links,
                screenshot_path,
                capture.bytes_downloaded as i64,
                capture.captured_at.to_rfc3339()
            ],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM captures WHERE normalized_url = ?1",
            params![capture.normalized_url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn capture_exists_by_url(&self, normalized_url: &str) -> StorageResult<bool> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM captures WHERE normalized_url = ?1",
                params![normalized_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    fn get_capture_by_url(&self, normalized_url: &str) -> StorageResult<Option<CaptureRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM captures WHERE normalized_url = ?1",
                    CAPTURE_COLUMNS
                ),
                params![normalized_url],
                CaptureRow::from_row,
            )
            .optional()?;

        row.map(CaptureRow::into_record).transpose()
    }

    fn get_uncaptioned_captures(&self, limit: usize) -> StorageResult<Vec<CaptureRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM captures c
             WHERE NOT EXISTS (SELECT 1 FROM captions WHERE capture_id = c.id)
             ORDER BY c.id ASC LIMIT ?1",
            CAPTURE_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![limit as i64], CaptureRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(CaptureRow::into_record).collect()
    }

    // ===== Caption Management =====

    fn save_caption(
        &mut self,
        capture_id: i64,
        provider: &str,
        model: &str,
        text: &str,
        tokens_used: Option<u32>,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO captions (capture_id, provider, model, text, tokens_used, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![capture_id, provider, model, text, tokens_used, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_captions_for_capture(&self, capture_id: i64) -> StorageResult<Vec<CaptionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, capture_id, provider, model, text, tokens_used, created_at
             FROM captions WHERE capture_id = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![capture_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<u32>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, capture_id, provider, model, text, tokens_used, created_at)| {
                    Ok(CaptionRecord {
                        id,
                        capture_id,
                        provider,
                        model,
                        text,
                        tokens_used,
                        created_at: parse_timestamp(&created_at)?,
                    })
                },
            )
            .collect()
    }

    // ===== Statistics =====

    fn count_captures(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM captures", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_captions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM captions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unique_domains(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT domain) FROM captures", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}

//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Job queue persistence (status, priority, retries)
//! - Captured pages and their captions

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::capture::PageLink;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the frontier, the orchestrator and workers
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Wraps a storage backend for sharing
pub fn shared<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks a shared storage handle
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage
        .lock()
        .map_err(|e| StorageError::Lock(e.to_string()))
}

/// Opens a storage database, creating its parent directory if needed
pub fn open_storage(path: &Path) -> crate::Result<SqliteStorage> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::new(path)
}

/// A captured page as stored in the database
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub id: i64,
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub depth: u32,
    pub status_code: u16,
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: String,
    pub html: Option<String>,
    pub css: Option<String>,
    pub links: Vec<PageLink>,
    pub screenshot_path: Option<String>,
    pub bytes_downloaded: u64,
    pub captured_at: DateTime<Utc>,
}

/// A generated caption as stored in the database
#[derive(Debug, Clone)]
pub struct CaptionRecord {
    pub id: i64,
    pub capture_id: i64,
    pub provider: String,
    pub model: String,
    pub text: String,
    pub tokens_used: Option<u32>,
    pub created_at: DateTime<Utc>,
}

use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Dispatch priority of a job
///
/// Pending jobs are dispatched high first, then normal, then low; within a
/// tier they are dispatched in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Sort key used by the store; lower is dispatched first
    pub fn rank(&self) -> i64 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }

    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            0 => Some(Self::High),
            1 => Some(Self::Normal),
            2 => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of crawl work
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,

    /// URL as it was discovered
    pub url: String,

    /// Canonical form, unique across all jobs
    pub normalized_url: String,

    /// Link distance from the seed this job descends from
    pub depth: u32,

    /// Page the URL was discovered on; `None` for seeds
    pub parent_url: Option<String>,

    pub priority: Priority,
    pub status: JobStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_seed(&self) -> bool {
        self.parent_url.is_none()
    }
}

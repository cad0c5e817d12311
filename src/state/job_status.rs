//! Job status definitions for tracking crawl progress
//!
//! A job moves `pending -> crawling -> (completed | pending | failed)` under
//! the scheduler. `processing` and `captioning` mark the later stages of a
//! job that is already in flight.

use serde::Serialize;
use std::fmt;

/// Represents the current status of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    // ===== Waiting =====
    /// Job is queued and waiting to be dispatched
    Pending,

    // ===== In flight =====
    /// Job has been dispatched to a worker and is being fetched
    Crawling,

    /// Page was captured and its capture is being persisted
    Processing,

    /// Capture is being sent to the captioning provider
    Captioning,

    // ===== Terminal =====
    /// Job finished (captured, or skipped by policy)
    Completed,

    /// Job exhausted its retries
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal status (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if a worker owns the job
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Crawling | Self::Processing | Self::Captioning)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Processing => "processing",
            Self::Captioning => "captioning",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "crawling" => Some(Self::Crawling),
            "processing" => Some(Self::Processing),
            "captioning" => Some(Self::Captioning),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Crawling,
            Self::Processing,
            Self::Captioning,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Crawling.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Captioning.is_terminal());

        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_is_in_flight() {
        assert!(JobStatus::Crawling.is_in_flight());
        assert!(JobStatus::Processing.is_in_flight());
        assert!(JobStatus::Captioning.is_in_flight());

        assert!(!JobStatus::Pending.is_in_flight());
        assert!(!JobStatus::Completed.is_in_flight());
        assert!(!JobStatus::Failed.is_in_flight());
    }

    #[test]
    fn test_from_db_string() {
        assert_eq!(JobStatus::from_db_string("pending"), Some(JobStatus::Pending));
        assert_eq!(
            JobStatus::from_db_string("captioning"),
            Some(JobStatus::Captioning)
        );
        assert_eq!(JobStatus::from_db_string("failed"), Some(JobStatus::Failed));
        assert_eq!(JobStatus::from_db_string("invalid"), None);
        assert_eq!(JobStatus::from_db_string("PENDING"), None);
    }

    #[test]
    fn test_roundtrip_db_string() {
        for status in JobStatus::all_statuses() {
            let db_str = status.to_db_string();
            let parsed = JobStatus::from_db_string(db_str);
            assert_eq!(Some(status), parsed, "Failed roundtrip for {:?}", status);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", JobStatus::Pending), "pending");
        assert_eq!(format!("{}", JobStatus::Completed), "completed");
    }
}

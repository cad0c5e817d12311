//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Job` / `Priority`: a unit of crawl work and its dispatch tier
//! - `JobStatus`: the per-job state machine driven by the scheduler
//! - `DomainThrottle`: per-domain request spacing for rate limiting

mod domain_state;
mod job;
mod job_status;

// Re-export main types
pub use domain_state::{effective_delay, DomainState, DomainThrottle};
pub use job::{Job, Priority};
pub use job_status::JobStatus;

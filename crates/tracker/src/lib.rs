//! # Tracker
//!
//! In-memory job tracker.
//!
//! Responsibilities:
//! - Own every job, stage and step
//! - Serialize writers and let readers proceed concurrently
//! - Enforce the job/stage state machine
//! - Publish a [`JobEvent`] for every mutation
//!
//! The tracker is constructed once and shared as `Arc<JobTracker>`.

mod store;
mod tracker;

pub use contracts::{Job, JobEvent, JobId, MonitoringSnapshot, TrackerConfig, TrackerError};
pub use tracker::{JobTracker, StageTransition};

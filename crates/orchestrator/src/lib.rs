//! # Orchestrator
//!
//! Restore pipeline worker.
//!
//! Responsibilities:
//! - Drive the validate -> restore -> finalize phases for one job
//! - Measure the wall-clock duration of every phase operation
//! - Translate phase outcomes into tracker updates
//! - Stop at the first failed phase
//!
//! One job runs on one tokio task; any number of jobs share a tracker.

pub mod error;
pub mod operations;
pub mod orchestrator;
pub mod phase;
pub mod stage;

pub use error::PipelineError;
pub use operations::{CommandOperations, Operations, SimulatedOperations};
pub use orchestrator::{JobReport, Orchestrator, PhaseTiming, RestoreRequest};
pub use phase::{PhaseAction, PhaseDescriptor};
pub use stage::{apply_phase_update, derive_progress, PhaseUpdate};

//! # Contracts
//!
//! Shared data structures and traits for the restore tracker.
//! Every other crate in the workspace depends on this one; it depends on none of them.
//!
//! ## Model
//! - A [`Job`] is one execution of the restore pipeline for a single backup file
//! - A job owns an ordered list of [`Stage`]s, one per pipeline phase
//! - A stage owns an append-only list of [`Step`] observations
//!
//! Progress per stage is coarse on purpose: 0, 50 or 100 (see [`StageProgress`]).

mod config;
mod error;
mod event;
mod job;
mod operations;
mod stage;
mod step;

pub use config::*;
pub use error::*;
pub use event::*;
pub use job::*;
pub use operations::{LocalPhaseOperations, PhaseOperations, ValidationReport};
pub use stage::*;
pub use step::*;

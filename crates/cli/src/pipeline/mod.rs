//! Restore batch orchestration module.

mod batch;
mod stats;

pub use batch::{BatchConfig, RestoreBatch};
pub use stats::BatchStats;

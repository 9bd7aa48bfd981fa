//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_restore;
pub use validate::run_validate;

use anyhow::{Context, Result};
use std::path::Path;

use contracts::ServiceConfig;

use crate::error::CliError;

/// Load a configuration file that must exist
fn load_config_file(path: &Path) -> Result<ServiceConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

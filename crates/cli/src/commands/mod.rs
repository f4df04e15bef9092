//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_receiver;
pub use validate::run_validate;

use anyhow::{Context, Result};
use std::path::Path;

use crate::error::CliError;

/// Load and validate a blueprint, failing early on a missing file
fn load_blueprint(path: &Path) -> Result<contracts::ReceiverBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

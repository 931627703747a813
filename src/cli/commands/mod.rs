//! CLI command implementations

pub mod config;
pub mod query;
pub mod run;

use std::path::Path;

use crate::cli::error::CliError;
use crate::database::EtlConfig;

/// Load the configuration named by `--config`, or the default lookup
pub fn load_config(path: Option<&Path>) -> Result<EtlConfig, CliError> {
    if let Some(path) = path.filter(|p| !p.exists()) {
        return Err(CliError::ConfigNotFound(path.to_path_buf()));
    }
    Ok(EtlConfig::load(path)?)
}

/// Current-thread runtime; backends hold non-`Send` futures
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

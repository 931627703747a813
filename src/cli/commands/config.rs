//! `config` command: print a configuration file

use std::path::Path;

use crate::cli::commands::load_config;
use crate::cli::error::CliError;
use crate::database::config::sample_config;

/// Print the annotated sample, or the resolved configuration with `resolved`
///
/// Passwords are masked in the resolved output.
pub fn handle_config(path: Option<&Path>, resolved: bool) -> Result<(), CliError> {
    if resolved {
        let mut config = load_config(path)?;
        for settings in [&mut config.source, &mut config.destination] {
            if !settings.password.is_empty() {
                settings.password = "****".to_string();
            }
        }
        print!("{}", config.to_toml()?);
    } else {
        print!("{}", sample_config());
    }
    Ok(())
}

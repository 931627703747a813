//! SQL query CLI command
//!
//! Runs ad-hoc SQL against the warehouse connection.

use std::path::PathBuf;

use crate::cli::commands::{load_config, runtime};
use crate::cli::error::CliError;
use crate::database::{OutputFormat, connect, format_query_result};

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// SQL query to execute
    pub sql: String,
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Output format
    pub format: String,
}

/// Execute a SQL query against the destination database
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;

    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    runtime()?.block_on(async {
        let backend = connect(&config.destination).await?;
        let result = backend.query(&args.sql).await;
        if let Err(e) = backend.close().await {
            tracing::warn!("Failed to close connection: {}", e);
        }
        let result = result?;

        println!("{}", format_query_result(&result, output_format));

        // Print execution time for non-JSON formats
        if output_format != OutputFormat::Json {
            eprintln!("\nExecution time: {}ms", result.execution_time_ms);
        }
        Ok::<(), CliError>(())
    })
}

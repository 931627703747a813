//! Pipeline commands: `init`, `run` and `task`

use std::path::PathBuf;

use crate::cli::commands::{load_config, runtime};
use crate::cli::error::CliError;
use crate::pipeline::{Pipeline, Task};

/// Arguments shared by the pipeline commands
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Explicit config file
    pub config: Option<PathBuf>,
    /// Skip the configured retries
    pub no_retry: bool,
}

fn pipeline(args: &RunArgs) -> Result<Pipeline, CliError> {
    let config = load_config(args.config.as_deref())?;
    tracing::debug!(
        "source {}, destination {}",
        config.source.connection_string_masked(),
        config.destination.connection_string_masked()
    );
    let pipeline = Pipeline::new(config);
    Ok(if args.no_retry {
        pipeline.with_retry(crate::pipeline::RetryPolicy::none())
    } else {
        pipeline
    })
}

/// Create the warehouse schema
pub fn handle_init(args: &RunArgs) -> Result<(), CliError> {
    let pipeline = pipeline(args)?;
    let status = runtime()?.block_on(pipeline.init())?;
    println!("{}", status);
    Ok(())
}

/// Run the whole DAG
pub fn handle_run(args: &RunArgs) -> Result<(), CliError> {
    let pipeline = pipeline(args)?;
    let statuses = runtime()?.block_on(pipeline.run_all())?;
    for (task, status) in statuses {
        println!("{:<22} {}", task.id(), status);
    }
    Ok(())
}

/// Run a single task by identifier
pub fn handle_task(name: &str, args: &RunArgs) -> Result<(), CliError> {
    let task: Task = name.parse()?;
    let pipeline = pipeline(args)?;
    let status = runtime()?.block_on(pipeline.run_task(task))?;
    println!("{}", status);
    Ok(())
}

//! CLI binary entry point for warehouse-etl

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use warehouse_etl::cli::commands::config::handle_config;
#[cfg(feature = "cli")]
use warehouse_etl::cli::commands::query::{QueryArgs, handle_query};
#[cfg(feature = "cli")]
use warehouse_etl::cli::commands::run::{RunArgs, handle_init, handle_run, handle_task};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "warehouse-etl")]
#[command(about = "Load the AdventureWorks sales database into a dimensional warehouse")]
#[command(version)]
struct Cli {
    /// Config file (default: ./.warehouse-etl.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Create the warehouse schema, sequences and tables
    Init,

    /// Run every task in dependency order
    Run {
        /// Fail on the first error instead of retrying
        #[arg(long)]
        no_retry: bool,
    },

    /// Run a single task (start, populate_dim_date, extract_and_stage,
    /// transform_dimensions, load_dimensions, transform_fact_sales,
    /// load_fact_sales, end)
    Task {
        /// Task identifier
        name: String,
    },

    /// Execute SQL against the warehouse
    Query {
        /// SQL query to execute
        sql: String,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Print a sample configuration file
    Config {
        /// Print the configuration in effect instead
        #[arg(long)]
        resolved: bool,
    },
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let run_args = RunArgs {
        config: cli.config.clone(),
        no_retry: false,
    };

    let result = match cli.command {
        Commands::Init => handle_init(&run_args),
        Commands::Run { no_retry } => handle_run(&RunArgs {
            no_retry,
            ..run_args
        }),
        Commands::Task { name } => handle_task(&name, &run_args),
        Commands::Query { sql, format } => handle_query(&QueryArgs {
            sql,
            config: cli.config,
            format,
        }),
        Commands::Config { resolved } => handle_config(cli.config.as_deref(), resolved),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}

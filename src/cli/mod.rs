//! Command-line interface for the `warehouse-etl` binary

pub mod commands;
pub mod error;

pub use error::CliError;

//! Staging area for raw copies of the source tables
//!
//! Every run re-extracts each configured source table in full and replaces its
//! staging table. Nothing in the staging schema survives between runs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use warehouse_etl::database::{DuckDBBackend, config::default_tables};
//! use warehouse_etl::staging::StagingLoader;
//!
//! let source = DuckDBBackend::new("adventureworks.duckdb")?;
//! let warehouse = DuckDBBackend::new("warehouse.duckdb")?;
//!
//! let loader = StagingLoader::new(&source, &warehouse).with_batch_size(1000);
//! for stats in loader.load_all(&default_tables()).await? {
//!     println!("{}: {} rows", stats.staging_table, stats.rows_loaded);
//! }
//! ```

mod error;
pub mod inference;
mod loader;

pub use error::{StagingError, StagingResult};
pub use inference::{
    InferredSchema, PrefixSampling, ReservoirSampling, SamplingStrategy, StorageType,
    TypeInferrer, ValueKind,
};
pub use loader::{DEFAULT_BATCH_SIZE, LoadStats, StagingLoader, effective_batch_size};

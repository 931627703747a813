//! Warehouse ETL - loads the AdventureWorks OLTP database into a star schema
//!
//! Provides:
//! - Backend-neutral database connections (PostgreSQL, DuckDB)
//! - Staging loads with per-column type inference
//! - Dimension upserts, calendar generation and the sales fact load
//! - Scheduler-facing units of work with retry

pub mod database;
pub mod pipeline;
pub mod staging;
pub mod warehouse;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use database::{
    DatabaseBackend, DatabaseError, DatabaseResult, EtlConfig, QueryResult, SqlValue,
};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBBackend;
#[cfg(feature = "postgres-backend")]
pub use database::PostgresBackend;
pub use pipeline::{Pipeline, PipelineError, PipelineResult, RetryPolicy, Task};
pub use staging::{LoadStats, StagingError, StagingLoader, TypeInferrer};
pub use warehouse::{
    DateDimensionBuilder, DateDimensionOutcome, Dimension, DimensionTransformer, FactTransformer,
    WarehouseError, WarehouseSchema,
};

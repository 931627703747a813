//! Dimensional warehouse built from the staging tables
//!
//! - [`schema`]: DDL for the dimension and fact tables
//! - [`dimensions`]: upserts of the five entity dimensions
//! - [`date_dimension`]: one-off population of the calendar
//! - [`facts`]: insert-only load of `fact_sales`
//!
//! Transforms read staging and write the warehouse through a single
//! connection, so both schemas must live in the same database.

pub mod date_dimension;
pub mod dimensions;
pub mod facts;
pub mod schema;
pub mod sql;

use thiserror::Error;

use crate::database::DatabaseError;

pub use date_dimension::{DateDimensionBuilder, DateDimensionOutcome, DateRow, calendar_rows};
pub use dimensions::{Dimension, DimensionSpec, DimensionStats, DimensionTransformer};
pub use facts::{FactStats, FactTransformer};
pub use schema::WarehouseSchema;

/// Errors raised while building the warehouse
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A transform statement against `target` failed
    #[error("Failed to transform {target}: {source}")]
    Transform {
        target: String,
        source: DatabaseError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type for warehouse operations
pub type WarehouseResult<T> = Result<T, WarehouseError>;

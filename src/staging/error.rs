//! Error types for staging loads

use thiserror::Error;

use crate::database::DatabaseError;

/// Errors raised while extracting a source table into staging
#[derive(Error, Debug)]
pub enum StagingError {
    /// Table name rejected before any SQL was issued
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    /// Reading the source table failed
    #[error("Failed to extract {table}: {source}")]
    Extract {
        table: String,
        source: DatabaseError,
    },

    /// Replacing or filling the staging table failed; the table's transaction was rolled back
    #[error("Failed to load {table}: {source}")]
    Load {
        table: String,
        source: DatabaseError,
    },

    /// Other database failure
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type for staging operations
pub type StagingResult<T> = Result<T, StagingError>;

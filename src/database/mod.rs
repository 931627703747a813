//! Database backend abstraction for the source system and the warehouse
//!
//! This module provides one connection abstraction used on both ends of the
//! pipeline:
//! - PostgreSQL: the usual source replica and warehouse deployment
//! - DuckDB: embedded file or in-memory database, used for local runs and tests
//!
//! Both engines speak the same SQL subset used by the loaders (`CREATE SCHEMA IF
//! NOT EXISTS`, `DROP TABLE ... CASCADE`, multi-row `INSERT`, `ON CONFLICT`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod config;
pub mod value;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresBackend;

pub use config::{ConnectionSettings, DatabaseBackendType, EtlConfig};
pub use value::SqlValue;

/// Upper bound on bind parameters in a single statement (PostgreSQL wire limit)
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names, in select-list order
    pub columns: Vec<String>,
    /// Rows of data, each aligned with `columns`
    pub rows: Vec<Vec<SqlValue>>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value at `row` for the named column
    pub fn get(&self, row: usize, column: &str) -> Option<&SqlValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// First column of the first row as an integer (for `COUNT(*)` style queries)
    pub fn scalar_i64(&self) -> Option<i64> {
        self.rows.first().and_then(|r| r.first()).and_then(SqlValue::as_i64)
    }
}

/// Database backend trait
///
/// Both the source connection and the warehouse connection implement this.
/// A backend value owns exactly one connection; dropping it releases the
/// connection.
#[async_trait(?Send)]
pub trait DatabaseBackend {
    /// Execute a single statement and return the number of rows affected
    async fn execute(&self, sql: &str) -> DatabaseResult<u64>;

    /// Execute one or more statements separated by semicolons
    async fn execute_batch(&self, sql: &str) -> DatabaseResult<()>;

    /// Execute a query and return its rows
    async fn query(&self, sql: &str) -> DatabaseResult<QueryResult>;

    /// Insert rows with one multi-row `INSERT` statement
    ///
    /// # Arguments
    /// * `table` - Target table (may be schema-qualified)
    /// * `columns` - Column names, quoted by the implementation
    /// * `rows` - Row values aligned with `columns`
    /// * `on_conflict` - Optional `ON CONFLICT ...` clause appended verbatim
    ///
    /// # Returns
    /// Number of rows inserted
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
        on_conflict: Option<&str>,
    ) -> DatabaseResult<u64>;

    /// Open a transaction on this connection
    async fn begin(&self) -> DatabaseResult<()> {
        self.execute_batch("BEGIN TRANSACTION")
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    /// Commit the open transaction
    async fn commit(&self) -> DatabaseResult<()> {
        self.execute_batch("COMMIT")
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    /// Roll back the open transaction
    async fn rollback(&self) -> DatabaseResult<()> {
        self.execute_batch("ROLLBACK")
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    /// Check if database is healthy and accessible
    async fn health_check(&self) -> DatabaseResult<bool> {
        let result = self.query("SELECT 1").await?;
        Ok(result.scalar_i64() == Some(1))
    }

    /// Get the database backend type name ("duckdb" or "postgres")
    fn backend_type(&self) -> &'static str;

    /// Close the database connection
    async fn close(&self) -> DatabaseResult<()>;
}

/// Open a connection for the given settings
///
/// The returned backend is owned by the caller; each unit of work opens its own
/// and closes it when it finishes.
pub async fn connect(settings: &ConnectionSettings) -> DatabaseResult<Box<dyn DatabaseBackend>> {
    match settings.backend {
        DatabaseBackendType::Postgres => {
            #[cfg(feature = "postgres-backend")]
            {
                let backend = PostgresBackend::connect(settings).await?;
                Ok(Box::new(backend))
            }
            #[cfg(not(feature = "postgres-backend"))]
            {
                Err(DatabaseError::ConfigError(
                    "PostgreSQL backend not enabled. Build with --features postgres-backend"
                        .to_string(),
                ))
            }
        }
        DatabaseBackendType::DuckDB => {
            #[cfg(feature = "duckdb-backend")]
            {
                let backend = match settings.path.as_deref() {
                    Some(path) if !path.is_empty() => DuckDBBackend::new(path)?,
                    _ => DuckDBBackend::in_memory()?,
                };
                Ok(Box::new(backend))
            }
            #[cfg(not(feature = "duckdb-backend"))]
            {
                Err(DatabaseError::ConfigError(
                    "DuckDB backend not enabled. Build with --features duckdb-backend".to_string(),
                ))
            }
        }
    }
}

/// Quote an identifier with double quotes, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build a multi-row `INSERT` statement
///
/// `placeholder` renders the bind marker for a 1-based parameter position
/// (`$1` for PostgreSQL, `?` for DuckDB).
pub(crate) fn build_insert_sql(
    table: &str,
    columns: &[String],
    row_count: usize,
    on_conflict: Option<&str>,
    placeholder: impl Fn(usize) -> String,
) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let width = columns.len();
    let tuples = (0..row_count)
        .map(|r| {
            let markers = (0..width)
                .map(|c| placeholder(r * width + c + 1))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", markers)
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("INSERT INTO {} ({}) VALUES {}", table, column_list, tuples);
    if let Some(clause) = on_conflict {
        sql.push(' ');
        sql.push_str(clause);
    }
    sql
}

/// Validate that rows match the column count before building a statement
pub(crate) fn check_row_shape(columns: &[String], rows: &[Vec<SqlValue>]) -> DatabaseResult<()> {
    if columns.is_empty() {
        return Err(DatabaseError::InvalidInput(
            "INSERT requires at least one column".to_string(),
        ));
    }
    if columns.len() * rows.len() > MAX_BIND_PARAMS {
        return Err(DatabaseError::InvalidInput(format!(
            "{} rows x {} columns exceeds the {} bind parameter limit",
            rows.len(),
            columns.len(),
            MAX_BIND_PARAMS
        )));
    }
    if let Some((idx, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, r)| r.len() != columns.len())
    {
        return Err(DatabaseError::InvalidInput(format!(
            "row {} has {} values, expected {}",
            idx,
            row.len(),
            columns.len()
        )));
    }
    Ok(())
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format_as_json(result),
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn format_as_json(result: &QueryResult) -> String {
    let rows: Vec<serde_json::Value> = result
        .rows
        .iter()
        .map(|row| {
            let map: serde_json::Map<String, serde_json::Value> = result
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(SqlValue::to_json))
                .collect();
            serde_json::Value::Object(map)
        })
        .collect();
    serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&result.columns.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = row
            .iter()
            .map(|value| match value {
                SqlValue::Null => String::new(),
                other => {
                    let s = other.to_string();
                    if s.contains(',') || s.contains('"') || s.contains('\n') {
                        format!("\"{}\"", s.replace('"', "\"\""))
                    } else {
                        s
                    }
                }
            })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.len());
            }
        }
    }

    let mut output = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &rendered {
        let values: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{:width$}", s, width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        output.push_str(&values.join(" | "));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}

//! DuckDB database backend implementation
//!
//! Provides an embedded database backend using DuckDB. Used for local runs of
//! the pipeline and as the engine behind the test suite, where both the
//! source and the warehouse live in-memory.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, ToSqlOutput, Value, ValueRef};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{
    DatabaseBackend, DatabaseError, DatabaseResult, QueryResult, SqlValue, build_insert_sql,
    check_row_shape,
};

/// DuckDB database backend
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDBBackend {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBBackend {
    /// Create a new DuckDB backend with a file-based database
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    ///
    /// # Returns
    /// A new DuckDB backend instance
    pub fn new(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB backend
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> DatabaseResult<std::sync::MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Convert a DuckDB ValueRef to an engine-neutral value
    fn decode(value: ValueRef<'_>) -> SqlValue {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Boolean(b) => SqlValue::Bool(b),
            ValueRef::TinyInt(i) => SqlValue::Int(i.into()),
            ValueRef::SmallInt(i) => SqlValue::Int(i.into()),
            ValueRef::Int(i) => SqlValue::Int(i.into()),
            ValueRef::BigInt(i) => SqlValue::Int(i),
            ValueRef::UTinyInt(i) => SqlValue::Int(i.into()),
            ValueRef::USmallInt(i) => SqlValue::Int(i.into()),
            ValueRef::UInt(i) => SqlValue::Int(i.into()),
            ValueRef::UBigInt(i) => match i64::try_from(i) {
                Ok(v) => SqlValue::Int(v),
                Err(_) => SqlValue::Text(i.to_string()),
            },
            ValueRef::HugeInt(i) => match i64::try_from(i) {
                Ok(v) => SqlValue::Int(v),
                Err(_) => SqlValue::Text(i.to_string()),
            },
            ValueRef::Float(f) => SqlValue::Float(f.into()),
            ValueRef::Double(f) => SqlValue::Float(f),
            ValueRef::Decimal(d) => SqlValue::Decimal(d),
            ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => {
                SqlValue::Text(bytes.iter().map(|b| format!("{:02x}", b)).collect())
            }
            ValueRef::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
                .map(SqlValue::Date)
                .unwrap_or(SqlValue::Null),
            ValueRef::Timestamp(unit, raw) => {
                DateTime::from_timestamp_micros(to_micros(unit, raw))
                    .map(|ts| SqlValue::Timestamp(ts.naive_utc()))
                    .unwrap_or(SqlValue::Null)
            }
            ValueRef::Time64(unit, raw) => {
                let micros = to_micros(unit, raw);
                NaiveTime::from_num_seconds_from_midnight_opt(
                    (micros / 1_000_000) as u32,
                    (micros % 1_000_000 * 1_000) as u32,
                )
                .map(|t| SqlValue::Text(t.to_string()))
                .unwrap_or(SqlValue::Null)
            }
            other => {
                tracing::warn!(
                    "Cannot decode DuckDB value of type {}, storing NULL",
                    other.data_type()
                );
                SqlValue::Null
            }
        }
    }
}

fn to_micros(unit: TimeUnit, raw: i64) -> i64 {
    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

/// Parameter adapter binding a [`SqlValue`] into a DuckDB statement
///
/// Decimals and temporal values are bound as text; DuckDB casts them to the
/// target column type on insert.
struct Bind<'a>(&'a SqlValue);

impl duckdb::ToSql for Bind<'_> {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self.0 {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Boolean(*b),
            SqlValue::Int(i) => Value::BigInt(*i),
            SqlValue::Float(f) => Value::Double(*f),
            other => Value::Text(other.to_string()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

#[async_trait(?Send)]
impl DatabaseBackend for DuckDBBackend {
    async fn execute(&self, sql: &str) -> DatabaseResult<u64> {
        let conn = self.lock()?;
        conn.execute(sql, [])
            .map(|n| n as u64)
            .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))
    }

    async fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    async fn query(&self, sql: &str) -> DatabaseResult<QueryResult> {
        let start = std::time::Instant::now();
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // In DuckDB 1.4+, we need to execute the query first, then get columns
        let mut result_rows = stmt
            .query([])
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            let values = (0..column_count)
                .map(|i| row.get_ref(i).map(Self::decode).unwrap_or(SqlValue::Null))
                .collect();
            rows.push(values);
        }

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
        on_conflict: Option<&str>,
    ) -> DatabaseResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        check_row_shape(columns, rows)?;

        let sql = build_insert_sql(table, columns, rows.len(), on_conflict, |_| "?".to_string());
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        let params = rows.iter().flatten().map(Bind);
        stmt.execute(duckdb::params_from_iter(params))
            .map(|n| n as u64)
            .map_err(|e| DatabaseError::QueryFailed(format!("Insert into {} failed: {}", table, e)))
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn close(&self) -> DatabaseResult<()> {
        // DuckDB connection is closed when dropped
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_in_memory_database() {
        let backend = DuckDBBackend::in_memory().unwrap();
        assert!(backend.is_in_memory());
        assert!(backend.db_path().is_none());
    }

    #[tokio::test]
    async fn test_health_check() {
        let backend = DuckDBBackend::in_memory().unwrap();
        assert!(backend.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_backend_type() {
        let backend = DuckDBBackend::in_memory().unwrap();
        assert_eq!(backend.backend_type(), "duckdb");
    }

    #[tokio::test]
    async fn test_insert_rows_binds_every_kind() {
        let backend = DuckDBBackend::in_memory().unwrap();
        backend
            .execute_batch(
                "CREATE TABLE t (id BIGINT, price NUMERIC(18,4), day DATE, at TIMESTAMP, name TEXT, ok BOOLEAN)",
            )
            .await
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2011, 5, 31).unwrap();
        let columns: Vec<String> = ["id", "price", "day", "at", "name", "ok"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let rows = vec![
            vec![
                SqlValue::Int(1),
                SqlValue::Decimal(Decimal::new(2024990, 4)),
                SqlValue::Date(day),
                SqlValue::Timestamp(day.and_hms_opt(0, 0, 0).unwrap()),
                SqlValue::from("Ana"),
                SqlValue::Bool(true),
            ],
            vec![
                SqlValue::Int(2),
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
                SqlValue::Null,
            ],
        ];

        let inserted = backend.insert_rows("t", &columns, &rows, None).await.unwrap();
        assert_eq!(inserted, 2);

        let result = backend
            .query("SELECT id, price, day, at, name, ok FROM t ORDER BY id")
            .await
            .unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.get(0, "id"), Some(&SqlValue::Int(1)));
        assert_eq!(
            result.get(0, "price").and_then(SqlValue::as_decimal),
            Some(Decimal::new(2024990, 4))
        );
        assert_eq!(result.get(0, "day"), Some(&SqlValue::Date(day)));
        assert_eq!(
            result.get(0, "at"),
            Some(&SqlValue::Timestamp(day.and_hms_opt(0, 0, 0).unwrap()))
        );
        assert_eq!(result.get(0, "name"), Some(&SqlValue::from("Ana")));
        assert_eq!(result.get(1, "price"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_insert_rows_on_conflict_skips_duplicates() {
        let backend = DuckDBBackend::in_memory().unwrap();
        backend
            .execute_batch("CREATE TABLE k (id INTEGER PRIMARY KEY, v TEXT)")
            .await
            .unwrap();
        let columns = vec!["id".to_string(), "v".to_string()];
        let rows = vec![vec![SqlValue::Int(1), SqlValue::from("a")]];

        backend.insert_rows("k", &columns, &rows, None).await.unwrap();
        backend
            .insert_rows("k", &columns, &rows, Some("ON CONFLICT (id) DO NOTHING"))
            .await
            .unwrap();

        let count = backend.query("SELECT COUNT(*) FROM k").await.unwrap();
        assert_eq!(count.scalar_i64(), Some(1));
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let backend = DuckDBBackend::in_memory().unwrap();
        backend.execute_batch("CREATE TABLE r (id INTEGER)").await.unwrap();

        backend.begin().await.unwrap();
        backend.execute("INSERT INTO r VALUES (1)").await.unwrap();
        backend.rollback().await.unwrap();

        let count = backend.query("SELECT COUNT(*) FROM r").await.unwrap();
        assert_eq!(count.scalar_i64(), Some(0));
    }

    #[tokio::test]
    async fn test_unsupported_values_decode_as_null() {
        let backend = DuckDBBackend::in_memory().unwrap();
        let result = backend
            .query("SELECT TIME '10:30:00' AS t, INTERVAL 3 DAY AS i, [1, 2] AS l")
            .await
            .unwrap();
        assert_eq!(
            result.rows[0],
            vec![
                SqlValue::Text("10:30:00".to_string()),
                SqlValue::Null,
                SqlValue::Null,
            ]
        );
    }

    #[tokio::test]
    async fn test_query_error_is_reported() {
        let backend = DuckDBBackend::in_memory().unwrap();
        let err = backend.query("SELECT * FROM missing_table").await;
        assert!(matches!(err, Err(DatabaseError::QueryFailed(_))));
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dw.duckdb");
        {
            let backend = DuckDBBackend::new(&path).unwrap();
            backend
                .execute_batch("CREATE TABLE p (id INTEGER); INSERT INTO p VALUES (7)")
                .await
                .unwrap();
        }
        let backend = DuckDBBackend::new(&path).unwrap();
        assert_eq!(backend.db_path(), Some(path.as_path()));
        let result = backend.query("SELECT id FROM p").await.unwrap();
        assert_eq!(result.scalar_i64(), Some(7));
    }
}

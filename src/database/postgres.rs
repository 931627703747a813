//! PostgreSQL database backend implementation
//!
//! Provides a PostgreSQL backend for the usual deployment, where the source
//! replica and the warehouse are both PostgreSQL servers.

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

use super::config::ConnectionSettings;
use super::{
    DatabaseBackend, DatabaseError, DatabaseResult, QueryResult, SqlValue, build_insert_sql,
    check_row_shape,
};

/// PostgreSQL database backend
///
/// Owns one client connection; the connection driver runs on a spawned task.
pub struct PostgresBackend {
    /// Connection string with the password masked
    masked: String,
    /// PostgreSQL client (wrapped for async access)
    client: Arc<Mutex<tokio_postgres::Client>>,
}

impl PostgresBackend {
    /// Create a new PostgreSQL backend from a connection string
    ///
    /// # Arguments
    /// * `connection_string` - libpq key/value or URL connection string
    pub async fn new(connection_string: &str) -> DatabaseResult<Self> {
        let (client, connection) =
            tokio_postgres::connect(connection_string, tokio_postgres::NoTls)
                .await
                .map_err(|e| {
                    DatabaseError::ConnectionFailed(format!(
                        "Failed to connect to PostgreSQL: {}",
                        e
                    ))
                })?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            masked: mask_password(connection_string),
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Connect using structured settings
    pub async fn connect(settings: &ConnectionSettings) -> DatabaseResult<Self> {
        tracing::debug!("Connecting to {}", settings.connection_string_masked());
        let mut backend = Self::new(&settings.connection_string()).await?;
        backend.masked = settings.connection_string_masked();
        Ok(backend)
    }

    /// Get the connection string (masked for security)
    pub fn connection_string_masked(&self) -> &str {
        &self.masked
    }

    /// Decode one column of a row by its declared type
    fn decode(row: &tokio_postgres::Row, idx: usize) -> SqlValue {
        let ty = row.columns()[idx].type_().clone();
        let value = match ty {
            Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(SqlValue::Bool)),
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .map(|v| v.map(|n| SqlValue::Int(n.into()))),
            Type::INT4 => row
                .try_get::<_, Option<i32>>(idx)
                .map(|v| v.map(|n| SqlValue::Int(n.into()))),
            Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(SqlValue::Int)),
            Type::OID => row
                .try_get::<_, Option<u32>>(idx)
                .map(|v| v.map(|n| SqlValue::Int(n.into()))),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .map(|v| v.map(|n| SqlValue::Float(n.into()))),
            Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(|v| v.map(SqlValue::Float)),
            Type::NUMERIC => row
                .try_get::<_, Option<Decimal>>(idx)
                .map(|v| v.map(SqlValue::Decimal)),
            Type::DATE => row
                .try_get::<_, Option<NaiveDate>>(idx)
                .map(|v| v.map(SqlValue::Date)),
            Type::TIMESTAMP => row
                .try_get::<_, Option<NaiveDateTime>>(idx)
                .map(|v| v.map(SqlValue::Timestamp)),
            Type::TIMESTAMPTZ => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)
                .map(|v| v.map(|ts| SqlValue::Timestamp(ts.naive_utc()))),
            Type::TIME => row
                .try_get::<_, Option<NaiveTime>>(idx)
                .map(|v| v.map(|t| SqlValue::Text(t.to_string()))),
            Type::UUID => row
                .try_get::<_, Option<uuid::Uuid>>(idx)
                .map(|v| v.map(|u| SqlValue::Text(u.to_string()))),
            Type::JSON | Type::JSONB => row
                .try_get::<_, Option<serde_json::Value>>(idx)
                .map(|v| v.map(|j| SqlValue::Text(j.to_string()))),
            _ => row.try_get::<_, Option<String>>(idx).map(|v| v.map(SqlValue::Text)),
        };

        match value {
            Ok(v) => v.unwrap_or(SqlValue::Null),
            Err(e) => {
                tracing::warn!(
                    "Cannot decode column {} of type {}: {}",
                    row.columns()[idx].name(),
                    ty,
                    e
                );
                SqlValue::Null
            }
        }
    }
}

/// Mask the password in a key/value or URL connection string
fn mask_password(connection_string: &str) -> String {
    if let Some(at_pos) = connection_string.find('@')
        && let Some(colon_pos) = connection_string[..at_pos].rfind(':')
    {
        let prefix = &connection_string[..colon_pos + 1];
        let suffix = &connection_string[at_pos..];
        return format!("{}****{}", prefix, suffix);
    }
    connection_string
        .split_whitespace()
        .map(|part| {
            if part.starts_with("password=") {
                "password=****"
            } else {
                part
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parameter adapter binding a [`SqlValue`] to whatever type the server
/// inferred for the placeholder
struct PgParam<'a>(&'a SqlValue);

type BoxError = Box<dyn Error + Sync + Send>;

impl std::fmt::Debug for PgParam<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.0 {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ => bind_text(&b.to_string(), ty, out),
            },
            SqlValue::Int(i) => bind_int(*i, ty, out),
            SqlValue::Float(f) => match *ty {
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::from_f64(*f)
                    .ok_or_else(|| format!("{} has no decimal representation", f))?
                    .to_sql(ty, out),
                _ => bind_text(&f.to_string(), ty, out),
            },
            SqlValue::Decimal(d) => match *ty {
                Type::NUMERIC => d.to_sql(ty, out),
                Type::FLOAT8 => d
                    .to_f64()
                    .ok_or_else(|| format!("{} does not fit a double", d))?
                    .to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 if d.fract().is_zero() => bind_int(
                    d.to_i64()
                        .ok_or_else(|| format!("{} does not fit a bigint", d))?,
                    ty,
                    out,
                ),
                _ => bind_text(&d.to_string(), ty, out),
            },
            SqlValue::Date(d) => match *ty {
                Type::DATE => d.to_sql(ty, out),
                Type::TIMESTAMP => d.and_time(NaiveTime::MIN).to_sql(ty, out),
                _ => bind_text(&self.0.to_string(), ty, out),
            },
            SqlValue::Timestamp(ts) => match *ty {
                Type::TIMESTAMP => ts.to_sql(ty, out),
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                Type::DATE => ts.date().to_sql(ty, out),
                _ => bind_text(&self.0.to_string(), ty, out),
            },
            SqlValue::Text(s) => bind_text(s, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn bind_int(value: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        Type::INT8 => value.to_sql(ty, out),
        Type::NUMERIC => Decimal::from(value).to_sql(ty, out),
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::BOOL => (value != 0).to_sql(ty, out),
        _ => bind_text(&value.to_string(), ty, out),
    }
}

/// Bind a textual value, parsing it when the target is not a text type
fn bind_text(value: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            value.to_sql(ty, out)
        }
        Type::INT2 | Type::INT4 | Type::INT8 => bind_int(value.trim().parse()?, ty, out),
        Type::NUMERIC => value.trim().parse::<Decimal>()?.to_sql(ty, out),
        Type::FLOAT4 | Type::FLOAT8 => value.trim().parse::<f64>()?.to_sql(ty, out),
        Type::BOOL => value.trim().parse::<bool>()?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(value.trim(), super::value::DATE_FORMAT)?
            .to_sql(ty, out),
        Type::TIMESTAMP => {
            NaiveDateTime::parse_from_str(value.trim(), super::value::TIMESTAMP_FORMAT)?
                .to_sql(ty, out)
        }
        Type::UUID => uuid::Uuid::parse_str(value.trim())?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(value)?.to_sql(ty, out),
        _ => Err(format!("cannot bind text to a {} parameter", ty).into()),
    }
}

#[async_trait(?Send)]
impl DatabaseBackend for PostgresBackend {
    async fn execute(&self, sql: &str) -> DatabaseResult<u64> {
        let client = self.client.lock().await;
        client
            .execute(sql, &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))
    }

    async fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        let client = self.client.lock().await;
        client
            .batch_execute(sql)
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    async fn query(&self, sql: &str) -> DatabaseResult<QueryResult> {
        let start = std::time::Instant::now();
        let client = self.client.lock().await;

        let stmt = client
            .prepare(sql)
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let rows = client
            .query(&stmt, &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = rows
            .iter()
            .map(|row| (0..columns.len()).map(|i| Self::decode(row, i)).collect())
            .collect();

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

        let sql = build_insert_sql(table, columns, rows.len(), on_conflict, |i| {
            format!("${}", i)
        });
        let params: Vec<PgParam<'_>> = rows.iter().flatten().map(PgParam).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let client = self.client.lock().await;
        client.execute(&sql, &param_refs).await.map_err(|e| {
            DatabaseError::QueryFailed(format!("Insert into {} failed: {}", table, e))
        })
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) -> DatabaseResult<()> {
        // PostgreSQL connection is closed when client is dropped
        Ok(())
    }
}

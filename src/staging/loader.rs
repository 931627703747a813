//! Full-refresh extraction of source tables into staging

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::error::{StagingError, StagingResult};
use super::inference::{InferredSchema, TypeInferrer};
use crate::database::config::{LoadSection, TableMapping, is_identifier, is_qualified_name};
use crate::database::{DatabaseBackend, DatabaseResult, MAX_BIND_PARAMS, SqlValue};

/// Default rows per INSERT batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Statistics from loading one staging table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStats {
    /// Fully-qualified source table
    pub source_table: String,
    /// Qualified staging table
    pub staging_table: String,
    /// Rows extracted and loaded
    pub rows_loaded: usize,
    /// Columns in the staging table
    pub columns: usize,
    /// INSERT statements issued
    pub batches: usize,
    /// Whether the placeholder schema was used
    pub placeholder: bool,
    /// Wall time for the table
    #[serde(skip)]
    pub duration: Duration,
}

impl LoadStats {
    /// Rows per second throughput
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rows_loaded as f64 / secs
        }
    }
}

/// Copies source tables into freshly created staging tables
///
/// Each call to [`StagingLoader::load_table`] reads the whole source table,
/// drops and recreates the staging table from the inferred schema, and inserts
/// the rows in batches. The replacement runs inside one destination
/// transaction, so a failed batch leaves no partially filled table behind.
pub struct StagingLoader<'a> {
    source: &'a dyn DatabaseBackend,
    destination: &'a dyn DatabaseBackend,
    inferrer: TypeInferrer,
    batch_size: usize,
    schema: String,
}

impl<'a> StagingLoader<'a> {
    pub fn new(source: &'a dyn DatabaseBackend, destination: &'a dyn DatabaseBackend) -> Self {
        Self {
            source,
            destination,
            inferrer: TypeInferrer::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            schema: "staging".to_string(),
        }
    }

    /// Apply batch size, sampling and schema name from the `[load]` section
    pub fn with_config(mut self, load: &LoadSection) -> Self {
        self.inferrer = TypeInferrer::from_config(load);
        self.batch_size = load.batch_size.max(1);
        self.schema = load.staging_schema.clone();
        self
    }

    pub fn with_inferrer(mut self, inferrer: TypeInferrer) -> Self {
        self.inferrer = inferrer;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Qualified name of a staging table
    pub fn staging_name(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }

    /// Extract `mapping.source` and replace `mapping.staging` with its rows
    pub async fn load_table(&self, mapping: &TableMapping) -> StagingResult<LoadStats> {
        if !is_qualified_name(&mapping.source) {
            return Err(StagingError::InvalidTableName(mapping.source.clone()));
        }
        if !is_identifier(&mapping.staging) || !is_identifier(&self.schema) {
            return Err(StagingError::InvalidTableName(
                self.staging_name(&mapping.staging),
            ));
        }

        let start = Instant::now();
        let target = self.staging_name(&mapping.staging);
        tracing::info!("Processing {} -> {}", mapping.source, target);

        let extracted = self
            .source
            .query(&format!("SELECT * FROM {}", mapping.source))
            .await
            .map_err(|source| StagingError::Extract {
                table: mapping.source.clone(),
                source,
            })?;

        let schema = self.inferrer.infer(&extracted.columns, &extracted.rows);
        tracing::debug!(
            "Inferred {} columns for {} from at most {} rows ({} sampling)",
            schema.len(),
            mapping.source,
            self.inferrer.sample_size(),
            self.inferrer.strategy_name()
        );

        self.destination
            .execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
            .await?;

        self.destination.begin().await?;
        let batches = match self.replace(&target, &schema, &extracted.rows).await {
            Ok(batches) => batches,
            Err(source) => {
                if let Err(e) = self.destination.rollback().await {
                    tracing::warn!("Rollback of {} failed: {}", target, e);
                }
                return Err(StagingError::Load {
                    table: target,
                    source,
                });
            }
        };
        self.destination
            .commit()
            .await
            .map_err(|source| StagingError::Load {
                table: target.clone(),
                source,
            })?;

        let stats = LoadStats {
            source_table: mapping.source.clone(),
            staging_table: target,
            rows_loaded: extracted.rows.len(),
            columns: schema.len(),
            batches,
            placeholder: schema.is_placeholder(),
            duration: start.elapsed(),
        };

        if stats.placeholder {
            tracing::info!("{}: 0 rows (empty table)", stats.staging_table);
        } else {
            tracing::info!(
                "{}: {} rows loaded in {:?} ({:.0} rows/s)",
                stats.staging_table,
                stats.rows_loaded,
                stats.duration,
                stats.throughput()
            );
        }

        Ok(stats)
    }

    /// Load every mapping in order, stopping at the first failure
    pub async fn load_all(&self, tables: &[TableMapping]) -> StagingResult<Vec<LoadStats>> {
        let mut all = Vec::with_capacity(tables.len());
        for mapping in tables {
            all.push(self.load_table(mapping).await?);
        }
        Ok(all)
    }

    /// Drop, recreate and fill one staging table; returns the batch count
    async fn replace(
        &self,
        target: &str,
        schema: &InferredSchema,
        rows: &[Vec<SqlValue>],
    ) -> DatabaseResult<usize> {
        self.destination
            .execute_batch(&format!("DROP TABLE IF EXISTS {} CASCADE", target))
            .await?;
        self.destination
            .execute_batch(&schema.create_table_sql(target))
            .await?;

        if schema.is_placeholder() {
            return Ok(0);
        }

        let columns = schema.column_names();
        let chunk = effective_batch_size(self.batch_size, columns.len());
        let mut batches = 0;
        for batch in rows.chunks(chunk) {
            let coerced: Vec<Vec<SqlValue>> =
                batch.iter().map(|row| schema.coerce_row(row)).collect();
            self.destination
                .insert_rows(target, &columns, &coerced, None)
                .await?;
            batches += 1;
        }
        Ok(batches)
    }
}

/// Rows per INSERT so that rows x columns stays within the bind parameter limit
pub fn effective_batch_size(batch_size: usize, column_count: usize) -> usize {
    let limit = MAX_BIND_PARAMS / column_count.max(1);
    batch_size.min(limit).max(1)
}

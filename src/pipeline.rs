//! Units of work exposed to the scheduler
//!
//! Each [`Task`] opens the connections it needs, runs to completion and closes
//! them again. Tasks share no state besides the databases themselves, so any
//! task can be run on its own once its upstream tasks have run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::database::config::RetrySection;
use crate::database::{DatabaseBackend, DatabaseError, EtlConfig, connect};
use crate::staging::{StagingError, StagingLoader};
use crate::warehouse::{
    DateDimensionBuilder, DimensionTransformer, FactTransformer, WarehouseError, WarehouseSchema,
};

/// Errors raised by a task
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Task {task} failed: {source}")]
    TaskFailed {
        task: Task,
        #[source]
        source: Box<PipelineError>,
    },

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// One node of the load DAG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Start,
    PopulateDimDate,
    ExtractAndStage,
    TransformDimensions,
    LoadDimensions,
    TransformFactSales,
    LoadFactSales,
    End,
}

impl Task {
    /// Every task in dependency order
    pub const ALL: [Task; 8] = [
        Task::Start,
        Task::PopulateDimDate,
        Task::ExtractAndStage,
        Task::TransformDimensions,
        Task::LoadDimensions,
        Task::TransformFactSales,
        Task::LoadFactSales,
        Task::End,
    ];

    /// Stable identifier used by schedulers and the CLI
    pub fn id(&self) -> &'static str {
        match self {
            Task::Start => "start",
            Task::PopulateDimDate => "populate_dim_date",
            Task::ExtractAndStage => "extract_and_stage",
            Task::TransformDimensions => "transform_dimensions",
            Task::LoadDimensions => "load_dimensions",
            Task::TransformFactSales => "transform_fact_sales",
            Task::LoadFactSales => "load_fact_sales",
            Task::End => "end",
        }
    }

    /// Structural tasks that do no work
    pub fn is_checkpoint(&self) -> bool {
        matches!(
            self,
            Task::Start | Task::LoadDimensions | Task::LoadFactSales | Task::End
        )
    }

    /// Tasks that must have completed before this one
    pub fn upstream(&self) -> &'static [Task] {
        match self {
            Task::Start => &[],
            Task::PopulateDimDate | Task::ExtractAndStage => &[Task::Start],
            Task::TransformDimensions => &[Task::PopulateDimDate, Task::ExtractAndStage],
            Task::LoadDimensions => &[Task::TransformDimensions],
            Task::TransformFactSales => &[Task::LoadDimensions],
            Task::LoadFactSales => &[Task::TransformFactSales],
            Task::End => &[Task::LoadFactSales],
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Task {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Task::ALL
            .into_iter()
            .find(|t| t.id() == wanted)
            .ok_or_else(|| PipelineError::UnknownTask(s.to_string()))
    }
}

/// Retry policy applied around each task by [`Pipeline::run_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySection::default())
    }
}

impl From<&RetrySection> for RetryPolicy {
    fn from(section: &RetrySection) -> Self {
        Self {
            retries: section.retries,
            delay: Duration::from_secs(section.delay_secs),
        }
    }
}

/// Runs tasks against the configured source and warehouse
pub struct Pipeline {
    config: EtlConfig,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self { config, retry }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Create the warehouse schema, sequences and tables
    pub async fn init(&self) -> PipelineResult<String> {
        let warehouse = connect(&self.config.destination).await?;
        let result = WarehouseSchema::ensure(warehouse.as_ref(), &self.config.load.warehouse_schema)
            .await
            .map_err(PipelineError::from);
        release(warehouse.as_ref(), "destination").await;
        result?;
        Ok(format!(
            "warehouse schema {} ready",
            self.config.load.warehouse_schema
        ))
    }

    /// Run a single task and return its status line
    pub async fn run_task(&self, task: Task) -> PipelineResult<String> {
        if task.is_checkpoint() {
            tracing::info!("{} reached", task);
            return Ok(format!("{} checkpoint", task));
        }

        tracing::info!("Running {}", task);
        let warehouse = connect(&self.config.destination).await?;
        let result = match task {
            Task::ExtractAndStage => self.extract_and_stage(warehouse.as_ref()).await,
            _ => self.transform(task, warehouse.as_ref()).await,
        };
        release(warehouse.as_ref(), "destination").await;

        match &result {
            Ok(status) => tracing::info!("{} finished: {}", task, status),
            Err(e) => tracing::error!("{} failed: {}", task, e),
        }
        result
    }

    /// Run every task in dependency order, retrying each per the policy
    ///
    /// Stops at the first task that still fails after its retries.
    pub async fn run_all(&self) -> PipelineResult<Vec<(Task, String)>> {
        let mut statuses = Vec::with_capacity(Task::ALL.len());
        for task in Task::ALL {
            let status = self.run_with_retry(task).await?;
            statuses.push((task, status));
        }
        Ok(statuses)
    }

    async fn run_with_retry(&self, task: Task) -> PipelineResult<String> {
        let mut attempt = 0;
        loop {
            match self.run_task(task).await {
                Ok(status) => return Ok(status),
                Err(e) if attempt < self.retry.retries => {
                    attempt += 1;
                    tracing::warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        task,
                        e,
                        attempt,
                        self.retry.retries,
                        self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => {
                    return Err(PipelineError::TaskFailed {
                        task,
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    async fn extract_and_stage(&self, warehouse: &dyn DatabaseBackend) -> PipelineResult<String> {
        let source = connect(&self.config.source).await?;
        let result = StagingLoader::new(source.as_ref(), warehouse)
            .with_config(&self.config.load)
            .load_all(&self.config.tables)
            .await;
        release(source.as_ref(), "source").await;

        let stats = result?;
        let rows: usize = stats.iter().map(|s| s.rows_loaded).sum();
        tracing::info!("Staged {} tables, {} rows", stats.len(), rows);
        Ok("extraction and staging complete".to_string())
    }

    async fn transform(&self, task: Task, warehouse: &dyn DatabaseBackend) -> PipelineResult<String> {
        let load = &self.config.load;
        WarehouseSchema::ensure(warehouse, &load.warehouse_schema).await?;

        match task {
            Task::PopulateDimDate => {
                let outcome = DateDimensionBuilder::new(warehouse)
                    .with_schema(&load.warehouse_schema)
                    .with_locale(self.config.calendar.locale()?)
                    .ensure(self.config.calendar.start, self.config.calendar.end)
                    .await?;
                Ok(outcome.status().to_string())
            }
            Task::TransformDimensions => {
                DimensionTransformer::new(warehouse)
                    .with_schemas(&load.staging_schema, &load.warehouse_schema)
                    .transform_all()
                    .await?;
                Ok("dimensions transformed".to_string())
            }
            Task::TransformFactSales => {
                FactTransformer::new(warehouse)
                    .with_schemas(&load.staging_schema, &load.warehouse_schema)
                    .transform()
                    .await?;
                Ok("fact transformed".to_string())
            }
            other => Err(PipelineError::UnknownTask(other.to_string())),
        }
    }
}

async fn release(backend: &dyn DatabaseBackend, role: &str) {
    if let Err(e) = backend.close().await {
        tracing::warn!("Failed to close {} connection: {}", role, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids_round_trip() {
        for task in Task::ALL {
            assert_eq!(task.id().parse::<Task>().unwrap(), task);
        }
        assert_eq!(
            "transform-fact-sales".parse::<Task>().unwrap(),
            Task::TransformFactSales
        );
    }

    #[test]
    fn test_unknown_task() {
        let err = "load_everything".parse::<Task>().unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTask(name) if name == "load_everything"));
    }

    #[test]
    fn test_all_respects_upstream() {
        for (idx, task) in Task::ALL.iter().enumerate() {
            for dep in task.upstream() {
                let dep_idx = Task::ALL.iter().position(|t| t == dep).unwrap();
                assert!(dep_idx < idx, "{} runs before its upstream {}", task, dep);
            }
        }
    }

    #[test]
    fn test_checkpoints() {
        let checkpoints: Vec<_> = Task::ALL.iter().filter(|t| t.is_checkpoint()).collect();
        assert_eq!(checkpoints.len(), 4);
        assert!(!Task::ExtractAndStage.is_checkpoint());
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 1);
        assert_eq!(policy.delay, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_checkpoint_needs_no_connection() {
        let mut config = EtlConfig::new();
        config.destination.host = "unreachable.invalid".to_string();
        let pipeline = Pipeline::new(config);

        assert_eq!(
            pipeline.run_task(Task::LoadDimensions).await.unwrap(),
            "load_dimensions checkpoint"
        );
    }
}

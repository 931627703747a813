//! Storage type inference for extracted tables
//!
//! Source tables arrive without a declared schema. Each column's storage type
//! is derived from a bounded sample of its values: every sampled value is
//! classified, and the observed kinds are consolidated into one type that can
//! hold all of them.

use chrono::NaiveTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::database::config::{LoadSection, SamplingMethod};
use crate::database::{SqlValue, quote_ident};

/// Default number of rows inspected per table
pub const DEFAULT_SAMPLE_SIZE: usize = 500;

/// Column created when the source table has no rows
pub const PLACEHOLDER_COLUMN: &str = "dummy";

/// Resolved storage type of a staging column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Boolean,
    Integer,
    Double,
    Numeric,
    Timestamp,
    Text,
}

impl StorageType {
    /// DDL type name used in `CREATE TABLE`
    pub fn ddl(&self) -> &'static str {
        match self {
            StorageType::Boolean => "BOOLEAN",
            StorageType::Integer => "BIGINT",
            StorageType::Double => "DOUBLE PRECISION",
            StorageType::Numeric => "NUMERIC(18,4)",
            StorageType::Timestamp => "TIMESTAMP",
            StorageType::Text => "TEXT",
        }
    }

    /// Convert a value into the representation this column stores
    ///
    /// Values that cannot be converted without loss are passed through
    /// unchanged and left for the destination engine to accept or reject.
    pub fn coerce(&self, value: &SqlValue) -> SqlValue {
        match (self, value) {
            (_, SqlValue::Null) => SqlValue::Null,
            (StorageType::Text, other) => SqlValue::Text(other.to_string()),
            (StorageType::Numeric, SqlValue::Int(i)) => SqlValue::Decimal(Decimal::from(*i)),
            (StorageType::Numeric, SqlValue::Float(f)) => Decimal::from_f64(*f)
                .map(SqlValue::Decimal)
                .unwrap_or_else(|| value.clone()),
            (StorageType::Double, SqlValue::Int(i)) => SqlValue::Float(*i as f64),
            (StorageType::Timestamp, SqlValue::Date(d)) => {
                SqlValue::Timestamp(d.and_time(NaiveTime::MIN))
            }
            (StorageType::Integer, SqlValue::Decimal(_)) => value
                .as_i64()
                .map(SqlValue::Int)
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.ddl())
    }
}

/// Classification of a single sampled value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    Decimal,
    Temporal,
    Text,
}

impl ValueKind {
    pub fn of(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => ValueKind::Null,
            SqlValue::Bool(_) => ValueKind::Boolean,
            SqlValue::Int(_) => ValueKind::Integer,
            SqlValue::Float(_) => ValueKind::Float,
            SqlValue::Decimal(_) => ValueKind::Decimal,
            SqlValue::Date(_) | SqlValue::Timestamp(_) => ValueKind::Temporal,
            SqlValue::Text(_) => ValueKind::Text,
        }
    }

    /// Storage type a column of only this kind would get
    ///
    /// A null carries no type information and counts as text, so a column
    /// mixing nulls with any other kind consolidates to text.
    pub fn storage_type(&self) -> StorageType {
        match self {
            ValueKind::Null | ValueKind::Text => StorageType::Text,
            ValueKind::Boolean => StorageType::Boolean,
            ValueKind::Integer => StorageType::Integer,
            ValueKind::Float => StorageType::Double,
            ValueKind::Decimal => StorageType::Numeric,
            ValueKind::Temporal => StorageType::Timestamp,
        }
    }
}

/// Consolidate the storage types observed in one column
pub fn consolidate(observed: &BTreeSet<StorageType>) -> StorageType {
    let mut types = observed.iter();
    match (types.next(), types.next()) {
        (None, _) => StorageType::Text,
        (Some(only), None) => *only,
        _ if observed
            .iter()
            .all(|t| matches!(t, StorageType::Integer | StorageType::Numeric)) =>
        {
            StorageType::Numeric
        }
        _ => StorageType::Text,
    }
}

/// Column name to storage type mapping for one staging table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredSchema {
    columns: Vec<(String, StorageType)>,
}

impl InferredSchema {
    pub fn new(columns: Vec<(String, StorageType)>) -> Self {
        Self { columns }
    }

    /// Single integer column standing in for a table with no rows
    pub fn placeholder() -> Self {
        Self::new(vec![(PLACEHOLDER_COLUMN.to_string(), StorageType::Integer)])
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.columns.as_slice(), [(name, StorageType::Integer)] if name == PLACEHOLDER_COLUMN)
    }

    pub fn columns(&self) -> &[(String, StorageType)] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Storage type of a column, if present
    pub fn get(&self, name: &str) -> Option<StorageType> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, ty)| *ty)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// `CREATE TABLE` statement for this schema
    pub fn create_table_sql(&self, table: &str) -> String {
        let definitions = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.ddl()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", table, definitions)
    }

    /// Convert a row into the column types of this schema
    pub fn coerce_row(&self, row: &[SqlValue]) -> Vec<SqlValue> {
        self.columns
            .iter()
            .zip(row)
            .map(|((_, ty), value)| ty.coerce(value))
            .collect()
    }
}

/// Selection policy for the rows the inferrer inspects
pub trait SamplingStrategy {
    /// Pick at most `max` rows
    fn select<'a>(&self, rows: &'a [Vec<SqlValue>], max: usize) -> Vec<&'a Vec<SqlValue>>;

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// The first `max` rows of the result set
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixSampling;

impl SamplingStrategy for PrefixSampling {
    fn select<'a>(&self, rows: &'a [Vec<SqlValue>], max: usize) -> Vec<&'a Vec<SqlValue>> {
        rows.iter().take(max).collect()
    }

    fn name(&self) -> &'static str {
        "prefix"
    }
}

/// Uniform sample over the whole result set (reservoir algorithm R)
#[derive(Debug, Clone, Copy)]
pub struct ReservoirSampling {
    seed: u64,
}

impl ReservoirSampling {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl SamplingStrategy for ReservoirSampling {
    fn select<'a>(&self, rows: &'a [Vec<SqlValue>], max: usize) -> Vec<&'a Vec<SqlValue>> {
        if rows.len() <= max {
            return rows.iter().collect();
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut reservoir: Vec<&Vec<SqlValue>> = rows.iter().take(max).collect();
        for (i, row) in rows.iter().enumerate().skip(max) {
            let j = rng.gen_range(0..=i);
            if j < max {
                reservoir[j] = row;
            }
        }
        reservoir
    }

    fn name(&self) -> &'static str {
        "reservoir"
    }
}

/// Derives an [`InferredSchema`] from sampled rows
pub struct TypeInferrer {
    sample_size: usize,
    strategy: Box<dyn SamplingStrategy>,
}

impl Default for TypeInferrer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}

impl TypeInferrer {
    /// Prefix-sampling inferrer inspecting at most `sample_size` rows
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size,
            strategy: Box::new(PrefixSampling),
        }
    }

    /// Replace the sampling strategy
    pub fn with_strategy(mut self, strategy: impl SamplingStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// Build from the `[load]` configuration section
    pub fn from_config(load: &LoadSection) -> Self {
        let inferrer = Self::new(load.sample_size);
        match load.sampling {
            SamplingMethod::Prefix => inferrer,
            SamplingMethod::Reservoir => {
                inferrer.with_strategy(ReservoirSampling::new(load.sample_seed))
            }
        }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Infer one storage type per column
    ///
    /// With no rows the result is the single placeholder column.
    pub fn infer(&self, columns: &[String], rows: &[Vec<SqlValue>]) -> InferredSchema {
        if rows.is_empty() {
            return InferredSchema::placeholder();
        }

        let sample = self.strategy.select(rows, self.sample_size.max(1));
        let mut observed = vec![BTreeSet::new(); columns.len()];
        for row in &sample {
            for (idx, seen) in observed.iter_mut().enumerate() {
                let kind = row.get(idx).map(ValueKind::of).unwrap_or(ValueKind::Null);
                seen.insert(kind.storage_type());
            }
        }

        InferredSchema::new(
            columns
                .iter()
                .cloned()
                .zip(observed.iter().map(consolidate))
                .collect(),
        )
    }
}

//! Calendar dimension
//!
//! `dim_date` is populated once. When it already holds any row the builder
//! leaves it alone; it never extends or refreshes an existing range.

use chrono::{Datelike, Locale, NaiveDate};
use serde::{Deserialize, Serialize};

use super::schema::DIM_DATE;
use super::sql::qualified;
use super::{WarehouseError, WarehouseResult};
use crate::database::{DatabaseBackend, DatabaseResult, SqlValue};

/// Default first calendar day
pub fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2008, 1, 1).unwrap_or_default()
}

/// Default last calendar day (inclusive)
pub fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default()
}

const INSERT_BATCH: usize = 1000;

const COLUMNS: [&str; 8] = [
    "date_key",
    "full_date",
    "year",
    "quarter",
    "month",
    "day",
    "month_name",
    "weekday_name",
];

/// 8-digit `YYYYMMDD` key of a date
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// One `dim_date` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRow {
    pub date_key: i32,
    pub full_date: NaiveDate,
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub day: u32,
    pub month_name: String,
    pub weekday_name: String,
}

impl DateRow {
    pub fn new(date: NaiveDate, locale: Locale) -> Self {
        Self {
            date_key: date_key(date),
            full_date: date,
            year: date.year(),
            quarter: (date.month() - 1) / 3 + 1,
            month: date.month(),
            day: date.day(),
            month_name: date.format_localized("%B", locale).to_string(),
            weekday_name: date.format_localized("%A", locale).to_string(),
        }
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Int(self.date_key.into()),
            SqlValue::Date(self.full_date),
            SqlValue::Int(self.year.into()),
            SqlValue::Int(self.quarter.into()),
            SqlValue::Int(self.month.into()),
            SqlValue::Int(self.day.into()),
            SqlValue::Text(self.month_name.clone()),
            SqlValue::Text(self.weekday_name.clone()),
        ]
    }
}

/// Every day in `[start, end]`
pub fn calendar_rows(
    start: NaiveDate,
    end: NaiveDate,
    locale: Locale,
) -> WarehouseResult<Vec<DateRow>> {
    if start > end {
        return Err(WarehouseError::InvalidInput(format!(
            "calendar start {} is after end {}",
            start, end
        )));
    }
    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| DateRow::new(d, locale))
        .collect())
}

/// What [`DateDimensionBuilder::ensure`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateDimensionOutcome {
    /// The table was empty and this many rows were inserted
    Populated(u64),
    /// The table already held this many rows; nothing was written
    AlreadyPresent(u64),
}

impl DateDimensionOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            DateDimensionOutcome::Populated(_) => "dim_date populated",
            DateDimensionOutcome::AlreadyPresent(_) => "dim_date already present",
        }
    }

    pub fn rows(&self) -> u64 {
        match self {
            DateDimensionOutcome::Populated(n) | DateDimensionOutcome::AlreadyPresent(n) => *n,
        }
    }
}

/// Populates `dim_date` when it is empty
pub struct DateDimensionBuilder<'a> {
    warehouse: &'a dyn DatabaseBackend,
    schema: String,
    locale: Locale,
}

impl<'a> DateDimensionBuilder<'a> {
    pub fn new(warehouse: &'a dyn DatabaseBackend) -> Self {
        Self {
            warehouse,
            schema: "dw".to_string(),
            locale: Locale::en_US,
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    /// Locale for month and weekday names
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Populate the inclusive range unless the table already has rows
    pub async fn ensure(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WarehouseResult<DateDimensionOutcome> {
        let table = qualified(&self.schema, DIM_DATE);
        let existing = self
            .warehouse
            .query(&format!("SELECT COUNT(*) FROM {}", table))
            .await?
            .scalar_i64()
            .unwrap_or(0);

        if existing > 0 {
            tracing::info!("{} already has {} rows, skipping", table, existing);
            return Ok(DateDimensionOutcome::AlreadyPresent(existing as u64));
        }

        let rows = calendar_rows(start, end, self.locale)?;
        self.warehouse.begin().await?;
        match self.insert(&table, &rows).await {
            Ok(inserted) => {
                self.warehouse.commit().await?;
                tracing::info!(
                    "{} populated with {} days from {} to {}",
                    table,
                    inserted,
                    start,
                    end
                );
                Ok(DateDimensionOutcome::Populated(inserted))
            }
            Err(source) => {
                if let Err(e) = self.warehouse.rollback().await {
                    tracing::warn!("Rollback of {} failed: {}", table, e);
                }
                Err(WarehouseError::Transform {
                    target: table,
                    source,
                })
            }
        }
    }

    async fn insert(&self, table: &str, rows: &[DateRow]) -> DatabaseResult<u64> {
        let columns: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut inserted = 0;
        for batch in rows.chunks(INSERT_BATCH) {
            let values: Vec<Vec<SqlValue>> = batch.iter().map(DateRow::values).collect();
            inserted += self
                .warehouse
                .insert_rows(
                    table,
                    &columns,
                    &values,
                    Some("ON CONFLICT (date_key) DO NOTHING"),
                )
                .await?;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_key_encoding() {
        assert_eq!(date_key(ymd(2011, 5, 31)), 20110531);
        assert_eq!(date_key(ymd(2008, 1, 1)), 20080101);
    }

    #[test]
    fn test_default_range_has_every_day() {
        let rows = calendar_rows(default_start(), default_end(), Locale::en_US).unwrap();
        assert_eq!(rows.len(), 6575);
        assert_eq!(rows.first().unwrap().date_key, 20080101);
        assert_eq!(rows.last().unwrap().date_key, 20251231);
    }

    #[test]
    fn test_row_attributes() {
        let row = DateRow::new(ymd(2011, 5, 31), Locale::en_US);
        assert_eq!(row.quarter, 2);
        assert_eq!(row.month_name, "May");
        assert_eq!(row.weekday_name, "Tuesday");

        let row = DateRow::new(ymd(2011, 12, 1), Locale::en_US);
        assert_eq!(row.quarter, 4);
    }

    #[test]
    fn test_localized_names() {
        let row = DateRow::new(ymd(2011, 5, 31), Locale::pt_BR);
        assert_eq!(row.month_name, "maio");
        assert_ne!(row.weekday_name, "Tuesday");
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = calendar_rows(ymd(2020, 1, 2), ymd(2020, 1, 1), Locale::en_US);
        assert!(matches!(err, Err(WarehouseError::InvalidInput(_))));
    }

    #[test]
    fn test_single_day_range() {
        let rows = calendar_rows(ymd(2020, 2, 29), ymd(2020, 2, 29), Locale::en_US).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(
            DateDimensionOutcome::Populated(3).status(),
            "dim_date populated"
        );
        assert_eq!(
            DateDimensionOutcome::AlreadyPresent(3).status(),
            "dim_date already present"
        );
        assert_eq!(DateDimensionOutcome::AlreadyPresent(3).rows(), 3);
    }
}

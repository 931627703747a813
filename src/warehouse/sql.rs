//! SQL fragments shared by the warehouse transforms
//!
//! Staging column types are inferred per run, so the same logical column may
//! arrive as BIGINT one day and TEXT the next. The lenient casts below go
//! through text first, which every staging type converts to, and treat empty
//! strings as NULL. All fragments are valid on PostgreSQL and DuckDB.

use crate::database::quote_ident;

/// `alias."Column"`
pub fn col(alias: &str, name: &str) -> String {
    format!("{}.{}", alias, quote_ident(name))
}

/// `schema.table`
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}

/// Text rendering of `expr`, NULL when empty
pub fn nonempty_text(expr: &str) -> String {
    format!("NULLIF(TRIM(CAST({} AS TEXT)), '')", expr)
}

/// `expr` as TEXT
pub fn text(expr: &str) -> String {
    format!("CAST({} AS TEXT)", expr)
}

/// Integer value of `expr`; accepts integral, decimal and textual columns
pub fn lenient_int(expr: &str) -> String {
    format!("CAST(CAST({} AS NUMERIC(18,4)) AS INTEGER)", nonempty_text(expr))
}

/// Decimal value of `expr` at staging precision
pub fn lenient_decimal(expr: &str) -> String {
    format!("CAST({} AS NUMERIC(18,4))", nonempty_text(expr))
}

/// Calendar date of `expr`; accepts timestamp, date and textual columns
pub fn lenient_date(expr: &str) -> String {
    format!("CAST(CAST({} AS TIMESTAMP) AS DATE)", nonempty_text(expr))
}

/// Fixed-point amount defaulting to zero when null or empty
pub fn amount_or_zero(expr: &str, precision: u8, scale: u8) -> String {
    format!(
        "CAST(COALESCE({}, 0) AS NUMERIC({},{}))",
        lenient_decimal(expr),
        precision,
        scale
    )
}

/// Round to `scale` places and fix the column type
pub fn rounded(expr: &str, precision: u8, scale: u8) -> String {
    format!(
        "CAST(ROUND({}, {}) AS NUMERIC({},{}))",
        expr, scale, precision, scale
    )
}

/// 8-digit `YYYYMMDD` integer key of a DATE expression
pub fn date_key(date_expr: &str) -> String {
    format!(
        "CAST(EXTRACT(YEAR FROM {d}) * 10000 + EXTRACT(MONTH FROM {d}) * 100 + EXTRACT(DAY FROM {d}) AS INTEGER)",
        d = date_expr
    )
}

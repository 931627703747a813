//! Warehouse schema definitions
//!
//! Provides DDL for the dimension and fact tables that works with both DuckDB
//! and PostgreSQL. Surrogate keys are drawn from per-table sequences rather
//! than identity columns, since DuckDB has no `GENERATED ... AS IDENTITY`.

use crate::database::{DatabaseBackend, DatabaseResult};

/// Dimension and fact table names
pub const DIM_CUSTOMER: &str = "dim_customer";
pub const DIM_PRODUCT: &str = "dim_product";
pub const DIM_TERRITORY: &str = "dim_territory";
pub const DIM_SALES_PERSON: &str = "dim_sales_person";
pub const DIM_PROMOTION: &str = "dim_promotion";
pub const DIM_DATE: &str = "dim_date";
pub const FACT_SALES: &str = "fact_sales";

/// Every warehouse table, in creation order
pub const TABLES: [&str; 7] = [
    DIM_CUSTOMER,
    DIM_PRODUCT,
    DIM_TERRITORY,
    DIM_SALES_PERSON,
    DIM_PROMOTION,
    DIM_DATE,
    FACT_SALES,
];

const CREATE_SQL: &str = r#"
CREATE SCHEMA IF NOT EXISTS {schema};

-- Surrogate key sequences
CREATE SEQUENCE IF NOT EXISTS {schema}.seq_dim_customer START 1;
CREATE SEQUENCE IF NOT EXISTS {schema}.seq_dim_product START 1;
CREATE SEQUENCE IF NOT EXISTS {schema}.seq_dim_territory START 1;
CREATE SEQUENCE IF NOT EXISTS {schema}.seq_dim_sales_person START 1;
CREATE SEQUENCE IF NOT EXISTS {schema}.seq_dim_promotion START 1;
CREATE SEQUENCE IF NOT EXISTS {schema}.seq_fact_sales START 1;

CREATE TABLE IF NOT EXISTS {schema}.dim_customer (
    customer_key BIGINT PRIMARY KEY DEFAULT nextval('{schema}.seq_dim_customer'),
    customer_id INTEGER NOT NULL UNIQUE,
    first_name TEXT,
    last_name TEXT,
    full_name TEXT,
    email TEXT,
    create_date DATE,
    update_date DATE
);

CREATE TABLE IF NOT EXISTS {schema}.dim_product (
    product_key BIGINT PRIMARY KEY DEFAULT nextval('{schema}.seq_dim_product'),
    product_id INTEGER NOT NULL UNIQUE,
    product_name TEXT,
    category TEXT,
    subcategory TEXT,
    model TEXT,
    color TEXT,
    size TEXT,
    standard_cost NUMERIC(12,2),
    list_price NUMERIC(12,2),
    start_date DATE
);

CREATE TABLE IF NOT EXISTS {schema}.dim_territory (
    territory_key BIGINT PRIMARY KEY DEFAULT nextval('{schema}.seq_dim_territory'),
    territory_id INTEGER NOT NULL UNIQUE,
    territory_name TEXT,
    country_region TEXT,
    group_name TEXT
);

CREATE TABLE IF NOT EXISTS {schema}.dim_sales_person (
    sales_person_key BIGINT PRIMARY KEY DEFAULT nextval('{schema}.seq_dim_sales_person'),
    sales_person_id INTEGER NOT NULL UNIQUE,
    full_name TEXT,
    territory_key BIGINT,
    hire_date DATE,
    quota NUMERIC(14,2)
);

CREATE TABLE IF NOT EXISTS {schema}.dim_promotion (
    promotion_key BIGINT PRIMARY KEY DEFAULT nextval('{schema}.seq_dim_promotion'),
    promotion_id INTEGER NOT NULL UNIQUE,
    promotion_name TEXT,
    discount_pct NUMERIC(5,4),
    start_date DATE,
    end_date DATE
);

CREATE TABLE IF NOT EXISTS {schema}.dim_date (
    date_key INTEGER PRIMARY KEY,
    full_date DATE NOT NULL,
    year INTEGER NOT NULL,
    quarter INTEGER NOT NULL,
    month INTEGER NOT NULL,
    day INTEGER NOT NULL,
    month_name TEXT,
    weekday_name TEXT
);

CREATE TABLE IF NOT EXISTS {schema}.fact_sales (
    sales_key BIGINT PRIMARY KEY DEFAULT nextval('{schema}.seq_fact_sales'),
    date_key INTEGER,
    customer_key BIGINT,
    product_key BIGINT,
    territory_key BIGINT,
    sales_person_key BIGINT,
    promotion_key BIGINT,
    order_id INTEGER NOT NULL,
    order_line INTEGER NOT NULL,
    quantity INTEGER,
    unit_price NUMERIC(12,2),
    extended_price NUMERIC(14,2),
    discount_amount NUMERIC(14,2),
    total_amount NUMERIC(14,2),
    cost_amount NUMERIC(14,2),
    margin_amount NUMERIC(14,2),
    UNIQUE (order_id, order_line)
);
"#;

/// Warehouse schema helper
pub struct WarehouseSchema;

impl WarehouseSchema {
    /// DDL creating the warehouse schema, sequences and tables
    ///
    /// Every statement is `IF NOT EXISTS`, so running it against an
    /// initialized warehouse changes nothing.
    pub fn create_sql(schema: &str) -> String {
        CREATE_SQL.replace("{schema}", schema)
    }

    /// Create whatever part of the warehouse schema is missing
    pub async fn ensure(backend: &dyn DatabaseBackend, schema: &str) -> DatabaseResult<()> {
        tracing::debug!("Ensuring warehouse schema {}", schema);
        backend.execute_batch(&Self::create_sql(schema)).await
    }

    /// Row count of every warehouse table
    pub async fn table_counts(
        backend: &dyn DatabaseBackend,
        schema: &str,
    ) -> DatabaseResult<Vec<(&'static str, i64)>> {
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let result = backend
                .query(&format!("SELECT COUNT(*) FROM {}.{}", schema, table))
                .await?;
            counts.push((table, result.scalar_i64().unwrap_or(0)));
        }
        Ok(counts)
    }
}

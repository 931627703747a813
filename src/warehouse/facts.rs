//! Sales fact load
//!
//! Order lines are joined to their header and to the loaded dimensions, and
//! inserted at most once per `(order_id, order_line)`. Lines that are already
//! in the fact table are skipped, even if their source values have changed
//! since.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::schema::{
    DIM_CUSTOMER, DIM_PRODUCT, DIM_PROMOTION, DIM_SALES_PERSON, DIM_TERRITORY, FACT_SALES,
};
use super::sql::{
    amount_or_zero, col, date_key, lenient_date, lenient_decimal, lenient_int, qualified, rounded,
};
use super::{WarehouseError, WarehouseResult};
use crate::database::DatabaseBackend;

/// Columns written to `fact_sales`
pub const FACT_COLUMNS: [&str; 15] = [
    "date_key",
    "customer_key",
    "product_key",
    "territory_key",
    "sales_person_key",
    "promotion_key",
    "order_id",
    "order_line",
    "quantity",
    "unit_price",
    "extended_price",
    "discount_amount",
    "total_amount",
    "cost_amount",
    "margin_amount",
];

/// Result of one fact load
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactStats {
    /// Order lines inserted by this run
    pub inserted: u64,
    /// Rows in the fact table after the load
    pub records: i64,
    #[serde(skip)]
    pub duration: Duration,
}

/// Builds `fact_sales` from staged order lines
pub struct FactTransformer<'a> {
    warehouse: &'a dyn DatabaseBackend,
    staging_schema: String,
    warehouse_schema: String,
}

impl<'a> FactTransformer<'a> {
    pub fn new(warehouse: &'a dyn DatabaseBackend) -> Self {
        Self {
            warehouse,
            staging_schema: "staging".to_string(),
            warehouse_schema: "dw".to_string(),
        }
    }

    pub fn with_schemas(mut self, staging: &str, warehouse: &str) -> Self {
        self.staging_schema = staging.to_string();
        self.warehouse_schema = warehouse.to_string();
        self
    }

    /// The `INSERT ... SELECT` statement for the fact load
    ///
    /// Measures are rounded to cents before the margin is taken, so
    /// `total_amount - cost_amount = margin_amount` holds exactly on every row.
    pub fn insert_sql(&self) -> String {
        let stg = |table: &str| qualified(&self.staging_schema, table);
        let dw = |table: &str| qualified(&self.warehouse_schema, table);

        let quantity = lenient_int(&col("sod", "OrderQty"));
        let unit_price = format!(
            "CAST({} AS NUMERIC(12,2))",
            lenient_decimal(&col("sod", "UnitPrice"))
        );
        let discount = amount_or_zero(&col("sod", "UnitPriceDiscount"), 6, 4);
        let extended = format!("{} * {}", unit_price, quantity);

        format!(
            "INSERT INTO {fact} ({columns}) \
             SELECT date_key, customer_key, product_key, territory_key, sales_person_key, \
             promotion_key, order_id, order_line, quantity, unit_price, extended_price, \
             discount_amount, total_amount, cost_amount, total_amount - cost_amount \
             FROM (\
             SELECT {date_key} AS date_key, \
             dc.customer_key AS customer_key, \
             dp.product_key AS product_key, \
             dt.territory_key AS territory_key, \
             dsp.sales_person_key AS sales_person_key, \
             dpr.promotion_key AS promotion_key, \
             {order_id} AS order_id, \
             {order_line} AS order_line, \
             {quantity} AS quantity, \
             {unit_price} AS unit_price, \
             {extended_price} AS extended_price, \
             {discount_amount} AS discount_amount, \
             {total_amount} AS total_amount, \
             {cost_amount} AS cost_amount \
             FROM {detail} sod \
             JOIN {header} soh ON {detail_order} = {order_id} \
             LEFT JOIN {dim_customer} dc ON dc.customer_id = {customer_id} \
             LEFT JOIN {dim_product} dp ON dp.product_id = {product_id} \
             LEFT JOIN {dim_territory} dt ON dt.territory_id = {territory_id} \
             LEFT JOIN {dim_sales_person} dsp ON dsp.sales_person_id = {sales_person_id} \
             LEFT JOIN {dim_promotion} dpr ON dpr.promotion_id = {promotion_id}\
             ) AS measures \
             WHERE order_id IS NOT NULL AND order_line IS NOT NULL \
             ON CONFLICT (order_id, order_line) DO NOTHING",
            fact = dw(FACT_SALES),
            columns = FACT_COLUMNS.join(", "),
            date_key = date_key(&lenient_date(&col("soh", "OrderDate"))),
            order_id = lenient_int(&col("soh", "SalesOrderID")),
            order_line = lenient_int(&col("sod", "SalesOrderDetailID")),
            quantity = quantity,
            unit_price = unit_price,
            extended_price = rounded(&extended, 14, 2),
            discount_amount = rounded(&format!("{} * {}", extended, discount), 14, 2),
            total_amount = rounded(&format!("{} * (1 - {})", extended, discount), 14, 2),
            cost_amount = rounded(
                &format!("COALESCE(dp.standard_cost, 0) * {}", quantity),
                14,
                2
            ),
            detail = stg("stg_sales_order_detail"),
            header = stg("stg_sales_order_header"),
            detail_order = lenient_int(&col("sod", "SalesOrderID")),
            dim_customer = dw(DIM_CUSTOMER),
            dim_product = dw(DIM_PRODUCT),
            dim_territory = dw(DIM_TERRITORY),
            dim_sales_person = dw(DIM_SALES_PERSON),
            dim_promotion = dw(DIM_PROMOTION),
            customer_id = lenient_int(&col("soh", "CustomerID")),
            product_id = lenient_int(&col("sod", "ProductID")),
            territory_id = lenient_int(&col("soh", "TerritoryID")),
            sales_person_id = lenient_int(&col("soh", "SalesPersonID")),
            promotion_id = lenient_int(&col("sod", "SpecialOfferID")),
        )
    }

    /// Insert new order lines; existing ones are left untouched
    pub async fn transform(&self) -> WarehouseResult<FactStats> {
        let start = Instant::now();
        let table = qualified(&self.warehouse_schema, FACT_SALES);
        let sql = self.insert_sql();
        tracing::debug!("{}: {}", table, sql);

        let inserted = self
            .warehouse
            .execute(&sql)
            .await
            .map_err(|source| WarehouseError::Transform {
                target: table.clone(),
                source,
            })?;

        let records = self
            .warehouse
            .query(&format!("SELECT COUNT(*) FROM {}", table))
            .await?
            .scalar_i64()
            .unwrap_or(0);

        let stats = FactStats {
            inserted,
            records,
            duration: start.elapsed(),
        };
        tracing::info!(
            "{} loaded: {} new order lines, {} total in {:?}",
            table,
            stats.inserted,
            stats.records,
            stats.duration
        );
        Ok(stats)
    }
}

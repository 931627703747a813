//! Conformed dimension loads
//!
//! Each dimension is one `INSERT ... SELECT ... ON CONFLICT DO UPDATE` keyed
//! by its natural key: new keys are inserted, existing rows are overwritten
//! in place (Type-1, no history). Surrogate keys are assigned by the table's
//! sequence on first insert and never change afterwards.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::schema::{DIM_CUSTOMER, DIM_PRODUCT, DIM_PROMOTION, DIM_SALES_PERSON, DIM_TERRITORY};
use super::sql::{amount_or_zero, col, lenient_date, lenient_int, qualified, text};
use super::{WarehouseError, WarehouseResult};
use crate::database::DatabaseBackend;

/// Conformed dimensions loaded from staging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Customer,
    Product,
    Territory,
    SalesPerson,
    Promotion,
}

impl Dimension {
    /// Load order; sales person resolves territory surrogate keys
    pub const ORDER: [Dimension; 5] = [
        Dimension::Customer,
        Dimension::Product,
        Dimension::Territory,
        Dimension::SalesPerson,
        Dimension::Promotion,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Dimension::Customer => DIM_CUSTOMER,
            Dimension::Product => DIM_PRODUCT,
            Dimension::Territory => DIM_TERRITORY,
            Dimension::SalesPerson => DIM_SALES_PERSON,
            Dimension::Promotion => DIM_PROMOTION,
        }
    }

    pub fn natural_key(&self) -> &'static str {
        match self {
            Dimension::Customer => "customer_id",
            Dimension::Product => "product_id",
            Dimension::Territory => "territory_id",
            Dimension::SalesPerson => "sales_person_id",
            Dimension::Promotion => "promotion_id",
        }
    }

    /// Mapping and upsert definition against the given schemas
    pub fn spec(&self, staging: &str, warehouse: &str) -> DimensionSpec {
        let stg = |table: &str| qualified(staging, table);
        let full_name = |alias: &str| {
            format!(
                "{} || ' ' || {}",
                text(&col(alias, "FirstName")),
                text(&col(alias, "LastName"))
            )
        };

        let (columns, select, update): (Vec<&'static str>, String, Vec<(String, String)>) = match self {
            Dimension::Customer => (
                vec![
                    "customer_id",
                    "first_name",
                    "last_name",
                    "full_name",
                    "email",
                    "create_date",
                ],
                format!(
                    "SELECT {id}, {first}, {last}, {full}, CAST(NULL AS TEXT), CURRENT_DATE \
                     FROM {customer} c \
                     LEFT JOIN {person} p ON {person_id} = {customer_person} \
                     WHERE {id} IS NOT NULL",
                    id = lenient_int(&col("c", "CustomerID")),
                    first = text(&col("p", "FirstName")),
                    last = text(&col("p", "LastName")),
                    full = full_name("p"),
                    customer = stg("stg_customer"),
                    person = stg("stg_person"),
                    person_id = lenient_int(&col("p", "BusinessEntityID")),
                    customer_person = lenient_int(&col("c", "PersonID")),
                ),
                {
                    let mut update = overwrite(&["first_name", "last_name", "full_name"]);
                    update.push(("update_date".to_string(), "CURRENT_DATE".to_string()));
                    update
                },
            ),
            Dimension::Product => (
                vec![
                    "product_id",
                    "product_name",
                    "category",
                    "subcategory",
                    "model",
                    "color",
                    "size",
                    "standard_cost",
                    "list_price",
                    "start_date",
                ],
                format!(
                    "SELECT {id}, {name}, {category}, {subcategory}, {model}, {color}, {size}, \
                     {standard_cost}, {list_price}, CURRENT_DATE \
                     FROM {product} p \
                     LEFT JOIN {product_subcategory} psc ON {psc_id} = {p_psc_id} \
                     LEFT JOIN {product_category} pc ON {pc_id} = {psc_pc_id} \
                     WHERE {id} IS NOT NULL",
                    id = lenient_int(&col("p", "ProductID")),
                    name = text(&col("p", "Name")),
                    category = text(&col("pc", "Name")),
                    subcategory = text(&col("psc", "Name")),
                    model = text(&lenient_int(&col("p", "ProductModelID"))),
                    color = text(&col("p", "Color")),
                    size = text(&col("p", "Size")),
                    standard_cost = amount_or_zero(&col("p", "StandardCost"), 12, 2),
                    list_price = amount_or_zero(&col("p", "ListPrice"), 12, 2),
                    product = stg("stg_product"),
                    product_subcategory = stg("stg_product_subcategory"),
                    product_category = stg("stg_product_category"),
                    psc_id = lenient_int(&col("psc", "ProductSubcategoryID")),
                    p_psc_id = lenient_int(&col("p", "ProductSubcategoryID")),
                    pc_id = lenient_int(&col("pc", "ProductCategoryID")),
                    psc_pc_id = lenient_int(&col("psc", "ProductCategoryID")),
                ),
                overwrite(&[
                    "product_name",
                    "category",
                    "subcategory",
                    "model",
                    "color",
                    "size",
                    "standard_cost",
                    "list_price",
                ]),
            ),
            Dimension::Territory => (
                vec!["territory_id", "territory_name", "country_region", "group_name"],
                format!(
                    "SELECT DISTINCT {id}, {name}, {region}, {group} \
                     FROM {territory} st \
                     WHERE {id} IS NOT NULL",
                    id = lenient_int(&col("st", "TerritoryID")),
                    name = text(&col("st", "Name")),
                    region = text(&col("st", "CountryRegionCode")),
                    group = text(&col("st", "Group")),
                    territory = stg("stg_sales_territory"),
                ),
                overwrite(&["territory_name", "country_region", "group_name"]),
            ),
            Dimension::SalesPerson => (
                vec![
                    "sales_person_id",
                    "full_name",
                    "territory_key",
                    "hire_date",
                    "quota",
                ],
                format!(
                    "SELECT {id}, {full}, dt.territory_key, {hire_date}, {quota} \
                     FROM {sales_person} sp \
                     LEFT JOIN {employee} e ON {e_id} = {id} \
                     LEFT JOIN {person} pp ON {pp_id} = {id} \
                     LEFT JOIN {dim_territory} dt ON dt.territory_id = {sp_territory} \
                     WHERE {id} IS NOT NULL",
                    id = lenient_int(&col("sp", "BusinessEntityID")),
                    full = full_name("pp"),
                    hire_date = lenient_date(&col("e", "HireDate")),
                    quota = amount_or_zero(&col("sp", "SalesQuota"), 14, 2),
                    sales_person = stg("stg_sales_person"),
                    employee = stg("stg_employee"),
                    person = stg("stg_person"),
                    dim_territory = qualified(warehouse, DIM_TERRITORY),
                    e_id = lenient_int(&col("e", "BusinessEntityID")),
                    pp_id = lenient_int(&col("pp", "BusinessEntityID")),
                    sp_territory = lenient_int(&col("sp", "TerritoryID")),
                ),
                overwrite(&["full_name", "territory_key", "hire_date", "quota"]),
            ),
            Dimension::Promotion => (
                vec![
                    "promotion_id",
                    "promotion_name",
                    "discount_pct",
                    "start_date",
                    "end_date",
                ],
                format!(
                    "SELECT {id}, {name}, {discount}, {start}, {end} \
                     FROM {special_offer} so \
                     WHERE {id} IS NOT NULL",
                    id = lenient_int(&col("so", "SpecialOfferID")),
                    name = text(&col("so", "Description")),
                    discount = amount_or_zero(&col("so", "DiscountPct"), 5, 4),
                    start = lenient_date(&col("so", "StartDate")),
                    end = lenient_date(&col("so", "EndDate")),
                    special_offer = stg("stg_special_offer"),
                ),
                overwrite(&["promotion_name", "discount_pct", "start_date", "end_date"]),
            ),
        };

        DimensionSpec {
            dimension: *self,
            table: qualified(warehouse, self.table()),
            natural_key: self.natural_key(),
            columns,
            select,
            update,
        }
    }
}

/// `column = EXCLUDED.column` for each column
fn overwrite(columns: &[&str]) -> Vec<(String, String)> {
    columns
        .iter()
        .map(|c| (c.to_string(), format!("EXCLUDED.{}", c)))
        .collect()
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Source-to-target mapping of one dimension
#[derive(Debug, Clone)]
pub struct DimensionSpec {
    pub dimension: Dimension,
    /// Qualified target table
    pub table: String,
    /// Column carrying the source system identifier
    pub natural_key: &'static str,
    /// Insert column list, aligned with the select list
    pub columns: Vec<&'static str>,
    /// Mapping query over the staging tables
    pub select: String,
    /// `column = expression` assignments applied when the natural key exists
    pub update: Vec<(String, String)>,
}

impl DimensionSpec {
    /// Full upsert statement
    pub fn upsert_sql(&self) -> String {
        let assignments = self
            .update
            .iter()
            .map(|(column, expr)| format!("{} = {}", column, expr))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) {} ON CONFLICT ({}) DO UPDATE SET {}",
            self.table,
            self.columns.join(", "),
            self.select,
            self.natural_key,
            assignments
        )
    }
}

/// Result of one dimension load
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionStats {
    pub dimension: Dimension,
    /// Rows inserted or updated by the upsert
    pub rows_affected: u64,
    /// Rows in the dimension after the load
    pub records: i64,
    #[serde(skip)]
    pub duration: Duration,
}

/// Runs the dimension upserts against the warehouse connection
pub struct DimensionTransformer<'a> {
    warehouse: &'a dyn DatabaseBackend,
    staging_schema: String,
    warehouse_schema: String,
}

impl<'a> DimensionTransformer<'a> {
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

    /// Load one dimension
    pub async fn transform(&self, dimension: Dimension) -> WarehouseResult<DimensionStats> {
        let start = Instant::now();
        let spec = dimension.spec(&self.staging_schema, &self.warehouse_schema);
        let sql = spec.upsert_sql();
        tracing::debug!("{}: {}", dimension, sql);

        let rows_affected = self
            .warehouse
            .execute(&sql)
            .await
            .map_err(|source| WarehouseError::Transform {
                target: spec.table.clone(),
                source,
            })?;

        let records = self
            .warehouse
            .query(&format!("SELECT COUNT(*) FROM {}", spec.table))
            .await?
            .scalar_i64()
            .unwrap_or(0);

        let stats = DimensionStats {
            dimension,
            rows_affected,
            records,
            duration: start.elapsed(),
        };
        tracing::info!(
            "{} loaded: {} rows upserted, {} records in {:?}",
            dimension,
            stats.rows_affected,
            stats.records,
            stats.duration
        );
        Ok(stats)
    }

    /// Load every dimension in dependency order, stopping at the first failure
    pub async fn transform_all(&self) -> WarehouseResult<Vec<DimensionStats>> {
        let mut all = Vec::with_capacity(Dimension::ORDER.len());
        for dimension in Dimension::ORDER {
            all.push(self.transform(dimension).await?);
        }
        Ok(all)
    }
}

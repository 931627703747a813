//! Shared fixtures: a miniature AdventureWorks source in DuckDB

#![allow(dead_code)]

use std::path::Path;

use warehouse_etl::database::config::ConnectionSettings;
use warehouse_etl::database::{DatabaseBackend, DuckDBBackend, EtlConfig};
use warehouse_etl::pipeline::{Pipeline, RetryPolicy};

/// DDL for the twelve source tables, with AdventureWorks column casing
pub const SOURCE_DDL: &str = r#"
CREATE SCHEMA IF NOT EXISTS Sales;
CREATE SCHEMA IF NOT EXISTS Production;
CREATE SCHEMA IF NOT EXISTS HumanResources;
CREATE SCHEMA IF NOT EXISTS Person;

CREATE TABLE Sales.Customer ("CustomerID" INTEGER, "PersonID" INTEGER, "TerritoryID" INTEGER);
CREATE TABLE Person.Person ("BusinessEntityID" INTEGER, "FirstName" VARCHAR, "LastName" VARCHAR);
CREATE TABLE Production.ProductCategory ("ProductCategoryID" INTEGER, "Name" VARCHAR);
CREATE TABLE Production.ProductSubcategory ("ProductSubcategoryID" INTEGER, "ProductCategoryID" INTEGER, "Name" VARCHAR);
CREATE TABLE Production.Product (
    "ProductID" INTEGER, "Name" VARCHAR, "ProductSubcategoryID" INTEGER, "ProductModelID" INTEGER,
    "Color" VARCHAR, "Size" VARCHAR, "StandardCost" DECIMAL(19,4), "ListPrice" DECIMAL(19,4)
);
CREATE TABLE Sales.SalesTerritory ("TerritoryID" INTEGER, "Name" VARCHAR, "CountryRegionCode" VARCHAR, "Group" VARCHAR);
CREATE TABLE Sales.SalesPerson ("BusinessEntityID" INTEGER, "TerritoryID" INTEGER, "SalesQuota" DECIMAL(19,4));
CREATE TABLE HumanResources.Employee ("BusinessEntityID" INTEGER, "HireDate" DATE);
CREATE TABLE Sales.SpecialOffer (
    "SpecialOfferID" INTEGER, "Description" VARCHAR, "DiscountPct" DECIMAL(10,4),
    "StartDate" TIMESTAMP, "EndDate" TIMESTAMP
);
CREATE TABLE Sales.SpecialOfferProduct ("SpecialOfferID" INTEGER, "ProductID" INTEGER);
CREATE TABLE Sales.SalesOrderHeader (
    "SalesOrderID" INTEGER, "OrderDate" TIMESTAMP, "CustomerID" INTEGER,
    "TerritoryID" INTEGER, "SalesPersonID" INTEGER
);
CREATE TABLE Sales.SalesOrderDetail (
    "SalesOrderID" INTEGER, "SalesOrderDetailID" INTEGER, "OrderQty" SMALLINT, "ProductID" INTEGER,
    "SpecialOfferID" INTEGER, "UnitPrice" DECIMAL(19,4), "UnitPriceDiscount" DECIMAL(19,4)
);
"#;

/// One order with one line: 2 x 10.00 at a 10% discount, unit cost 6.00
pub const SOURCE_ROWS: &str = r#"
INSERT INTO Sales.Customer VALUES (1, 10, 1);
INSERT INTO Person.Person VALUES (10, 'Ana', 'Silva'), (274, 'Stephen', 'Jiang');
INSERT INTO Production.ProductCategory VALUES (1, 'Bikes');
INSERT INTO Production.ProductSubcategory VALUES (2, 1, 'Road Bikes');
INSERT INTO Production.Product VALUES (707, 'Road-150 Red, 44', 2, 25, 'Red', '44', 6.0000, 10.0000);
INSERT INTO Sales.SalesTerritory VALUES (1, 'Northwest', 'US', 'North America');
INSERT INTO Sales.SalesPerson VALUES (274, 1, 300000.0000);
INSERT INTO HumanResources.Employee VALUES (274, DATE '2009-01-04');
INSERT INTO Sales.SpecialOffer VALUES (1, 'No Discount', 0.0000, TIMESTAMP '2011-05-01 00:00:00', TIMESTAMP '2014-11-30 00:00:00');
INSERT INTO Sales.SpecialOfferProduct VALUES (1, 707);
INSERT INTO Sales.SalesOrderHeader VALUES (43659, TIMESTAMP '2011-05-31 00:00:00', 1, 1, 274);
INSERT INTO Sales.SalesOrderDetail VALUES (43659, 1, 2, 707, 1, 10.0000, 0.1000);
"#;

/// Create and fill the source database at `path`
///
/// The connection is dropped on return so the pipeline can open the file.
pub async fn seed_source(path: &Path) {
    let source = DuckDBBackend::new(path).unwrap();
    source.execute_batch(SOURCE_DDL).await.unwrap();
    source.execute_batch(SOURCE_ROWS).await.unwrap();
}

/// Run extra statements against a database file
pub async fn execute(path: &Path, sql: &str) {
    let backend = DuckDBBackend::new(path).unwrap();
    backend.execute_batch(sql).await.unwrap();
}

/// Single integer result of `sql` against a database file
pub async fn scalar(path: &Path, sql: &str) -> Option<i64> {
    let backend = DuckDBBackend::new(path).unwrap();
    backend.query(sql).await.unwrap().scalar_i64()
}

/// First row of `sql` rendered as text
pub async fn first_row(path: &Path, sql: &str) -> Vec<String> {
    let backend = DuckDBBackend::new(path).unwrap();
    let result = backend.query(sql).await.unwrap();
    result
        .rows
        .first()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .unwrap_or_default()
}

/// Config with file-backed DuckDB source and warehouse in `dir`
pub fn config_for(dir: &Path) -> EtlConfig {
    let mut config = EtlConfig::new();
    config.source = ConnectionSettings::duckdb(Some(&path_str(&dir.join("source.duckdb"))));
    config.destination =
        ConnectionSettings::duckdb(Some(&path_str(&dir.join("warehouse.duckdb"))));
    config
}

pub fn source_path(dir: &Path) -> std::path::PathBuf {
    dir.join("source.duckdb")
}

pub fn warehouse_path(dir: &Path) -> std::path::PathBuf {
    dir.join("warehouse.duckdb")
}

/// Pipeline over a freshly seeded source, without retry delays
pub async fn seeded_pipeline(dir: &Path) -> Pipeline {
    seed_source(&source_path(dir)).await;
    Pipeline::new(config_for(dir)).with_retry(RetryPolicy::none())
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// In-memory warehouse whose staging schema holds the fixture rows,
/// plus any `extra` statements run against the source first
pub async fn staged_warehouse(extra: &str) -> DuckDBBackend {
    use warehouse_etl::database::config::default_tables;
    use warehouse_etl::staging::StagingLoader;
    use warehouse_etl::warehouse::WarehouseSchema;

    let source = DuckDBBackend::in_memory().unwrap();
    source.execute_batch(SOURCE_DDL).await.unwrap();
    source.execute_batch(SOURCE_ROWS).await.unwrap();
    if !extra.is_empty() {
        source.execute_batch(extra).await.unwrap();
    }

    let warehouse = DuckDBBackend::in_memory().unwrap();
    StagingLoader::new(&source, &warehouse)
        .load_all(&default_tables())
        .await
        .unwrap();
    WarehouseSchema::ensure(&warehouse, "dw").await.unwrap();
    warehouse
}

/// Parse a decimal literal for comparisons
pub fn dec(s: &str) -> rust_decimal::Decimal {
    s.parse().unwrap()
}

//! Dimension, calendar and fact transforms over staged fixture data

mod common;

use common::{dec, staged_warehouse};
use warehouse_etl::database::{DatabaseBackend, DuckDBBackend, SqlValue};
use warehouse_etl::warehouse::{
    DateDimensionBuilder, DateDimensionOutcome, Dimension, DimensionTransformer, FactTransformer,
    WarehouseSchema, date_dimension,
};

async fn count(backend: &DuckDBBackend, table: &str) -> i64 {
    backend
        .query(&format!("SELECT COUNT(*) FROM {}", table))
        .await
        .unwrap()
        .scalar_i64()
        .unwrap()
}

async fn load_dimensions(warehouse: &DuckDBBackend) {
    DimensionTransformer::new(warehouse)
        .transform_all()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_customer_full_name_from_person() {
    let warehouse = staged_warehouse("").await;
    let stats = DimensionTransformer::new(&warehouse)
        .transform(Dimension::Customer)
        .await
        .unwrap();
    assert_eq!(stats.records, 1);

    let result = warehouse
        .query("SELECT customer_id, full_name, create_date FROM dw.dim_customer")
        .await
        .unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.get(0, "customer_id").unwrap().as_i64(), Some(1));
    assert_eq!(
        result.get(0, "full_name"),
        Some(&SqlValue::Text("Ana Silva".to_string()))
    );
    assert!(matches!(result.get(0, "create_date"), Some(SqlValue::Date(_))));
}

#[tokio::test]
async fn test_dimension_upsert_is_idempotent() {
    let warehouse = staged_warehouse("").await;
    let transformer = DimensionTransformer::new(&warehouse);

    let first = transformer.transform_all().await.unwrap();
    let keys_before = warehouse
        .query("SELECT customer_key FROM dw.dim_customer")
        .await
        .unwrap();
    let second = transformer.transform_all().await.unwrap();

    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.records, b.records, "{}", a.dimension);
    }
    let duplicates = warehouse
        .query(
            "SELECT COUNT(*) FROM (SELECT customer_id FROM dw.dim_customer \
             GROUP BY customer_id HAVING COUNT(*) > 1) d",
        )
        .await
        .unwrap();
    assert_eq!(duplicates.scalar_i64(), Some(0));

    let keys_after = warehouse
        .query("SELECT customer_key FROM dw.dim_customer")
        .await
        .unwrap();
    assert_eq!(keys_before.rows, keys_after.rows);
}

#[tokio::test]
async fn test_upsert_overwrites_changed_attributes() {
    let warehouse = staged_warehouse("").await;
    let transformer = DimensionTransformer::new(&warehouse);
    transformer.transform(Dimension::Customer).await.unwrap();

    warehouse
        .execute("UPDATE staging.stg_person SET \"LastName\" = 'Souza' WHERE \"BusinessEntityID\" = 10")
        .await
        .unwrap();
    transformer.transform(Dimension::Customer).await.unwrap();

    let result = warehouse
        .query("SELECT full_name, update_date FROM dw.dim_customer")
        .await
        .unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0][0], SqlValue::Text("Ana Souza".to_string()));
    assert!(!result.rows[0][1].is_null());
}

#[tokio::test]
async fn test_dimension_attributes() {
    let warehouse = staged_warehouse("").await;
    load_dimensions(&warehouse).await;

    let product = warehouse
        .query("SELECT category, subcategory, model, standard_cost, list_price FROM dw.dim_product")
        .await
        .unwrap();
    assert_eq!(product.rows[0][0], SqlValue::Text("Bikes".to_string()));
    assert_eq!(product.rows[0][1], SqlValue::Text("Road Bikes".to_string()));
    assert_eq!(product.rows[0][2], SqlValue::Text("25".to_string()));
    assert_eq!(product.rows[0][3].as_decimal(), Some(dec("6.00")));
    assert_eq!(product.rows[0][4].as_decimal(), Some(dec("10.00")));

    let sales_person = warehouse
        .query(
            "SELECT sp.full_name, t.territory_id, sp.quota FROM dw.dim_sales_person sp \
             JOIN dw.dim_territory t ON t.territory_key = sp.territory_key",
        )
        .await
        .unwrap();
    assert_eq!(sales_person.row_count(), 1);
    assert_eq!(
        sales_person.rows[0][0],
        SqlValue::Text("Stephen Jiang".to_string())
    );
    assert_eq!(sales_person.rows[0][1].as_i64(), Some(1));
    assert_eq!(sales_person.rows[0][2].as_decimal(), Some(dec("300000.00")));

    assert_eq!(count(&warehouse, "dw.dim_promotion").await, 1);
}

#[tokio::test]
async fn test_date_dimension_populates_once() {
    let warehouse = DuckDBBackend::in_memory().unwrap();
    WarehouseSchema::ensure(&warehouse, "dw").await.unwrap();
    let builder = DateDimensionBuilder::new(&warehouse);

    let first = builder
        .ensure(date_dimension::default_start(), date_dimension::default_end())
        .await
        .unwrap();
    assert_eq!(first, DateDimensionOutcome::Populated(6575));

    let second = builder
        .ensure(date_dimension::default_start(), date_dimension::default_end())
        .await
        .unwrap();
    assert_eq!(second, DateDimensionOutcome::AlreadyPresent(6575));
    assert_eq!(count(&warehouse, "dw.dim_date").await, 6575);

    let row = warehouse
        .query("SELECT month_name, weekday_name, quarter FROM dw.dim_date WHERE date_key = 20110531")
        .await
        .unwrap();
    assert_eq!(row.rows[0][0], SqlValue::Text("May".to_string()));
    assert_eq!(row.rows[0][1], SqlValue::Text("Tuesday".to_string()));
    assert_eq!(row.rows[0][2].as_i64(), Some(2));
}

#[tokio::test]
async fn test_fact_measures() {
    let warehouse = staged_warehouse("").await;
    load_dimensions(&warehouse).await;

    let stats = FactTransformer::new(&warehouse).transform().await.unwrap();
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.records, 1);

    let fact = warehouse
        .query(
            "SELECT date_key, quantity, unit_price, extended_price, discount_amount, \
             total_amount, cost_amount, margin_amount FROM dw.fact_sales",
        )
        .await
        .unwrap();
    let value = |name: &str| fact.get(0, name).unwrap().clone();

    assert_eq!(value("date_key").as_i64(), Some(20110531));
    assert_eq!(value("quantity").as_i64(), Some(2));
    assert_eq!(value("unit_price").as_decimal(), Some(dec("10.00")));
    assert_eq!(value("extended_price").as_decimal(), Some(dec("20.00")));
    assert_eq!(value("discount_amount").as_decimal(), Some(dec("2.00")));
    assert_eq!(value("total_amount").as_decimal(), Some(dec("18.00")));
    assert_eq!(value("cost_amount").as_decimal(), Some(dec("12.00")));
    assert_eq!(value("margin_amount").as_decimal(), Some(dec("6.00")));
}

#[tokio::test]
async fn test_fact_keys_resolve_dimensions() {
    let warehouse = staged_warehouse("").await;
    load_dimensions(&warehouse).await;
    FactTransformer::new(&warehouse).transform().await.unwrap();

    let unresolved = warehouse
        .query(
            "SELECT COUNT(*) FROM dw.fact_sales WHERE customer_key IS NULL OR product_key IS NULL \
             OR territory_key IS NULL OR sales_person_key IS NULL OR promotion_key IS NULL",
        )
        .await
        .unwrap();
    assert_eq!(unresolved.scalar_i64(), Some(0));
}

#[tokio::test]
async fn test_fact_rerun_inserts_nothing() {
    let warehouse = staged_warehouse("").await;
    load_dimensions(&warehouse).await;
    let transformer = FactTransformer::new(&warehouse);

    transformer.transform().await.unwrap();
    let again = transformer.transform().await.unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.records, 1);
}

#[tokio::test]
async fn test_margin_identity_holds_on_awkward_amounts() {
    let warehouse = staged_warehouse(
        r#"INSERT INTO Sales.SalesOrderHeader VALUES (43660, TIMESTAMP '2011-06-01 00:00:00', 1, 1, 274);
           INSERT INTO Sales.SalesOrderDetail VALUES
               (43660, 2, 3, 707, 1, 3.3333, 0.0333),
               (43660, 3, 7, 707, 1, 19.9950, 0.1500),
               (43660, 4, 1, 707, 1, 0.0050, 0.0000);"#,
    )
    .await;
    load_dimensions(&warehouse).await;
    FactTransformer::new(&warehouse).transform().await.unwrap();

    let facts = warehouse
        .query("SELECT total_amount, cost_amount, margin_amount FROM dw.fact_sales")
        .await
        .unwrap();
    assert_eq!(facts.row_count(), 4);
    for row in &facts.rows {
        let total = row[0].as_decimal().unwrap();
        let cost = row[1].as_decimal().unwrap();
        let margin = row[2].as_decimal().unwrap();
        assert_eq!(total - cost, margin);
    }
}

#[tokio::test]
async fn test_unknown_customer_loads_with_null_key() {
    let warehouse = staged_warehouse(
        r#"INSERT INTO Sales.SalesOrderHeader VALUES (43661, TIMESTAMP '2011-06-02 00:00:00', 999, 1, 274);
           INSERT INTO Sales.SalesOrderDetail VALUES (43661, 5, 1, 707, 1, 10.0000, 0.0000);"#,
    )
    .await;
    load_dimensions(&warehouse).await;
    FactTransformer::new(&warehouse).transform().await.unwrap();

    let result = warehouse
        .query("SELECT customer_key, product_key FROM dw.fact_sales WHERE order_id = 43661")
        .await
        .unwrap();
    assert_eq!(result.row_count(), 1);
    assert!(result.rows[0][0].is_null());
    assert!(!result.rows[0][1].is_null());
}

#[tokio::test]
async fn test_line_without_header_is_dropped() {
    let warehouse = staged_warehouse(
        "INSERT INTO Sales.SalesOrderDetail VALUES (99999, 6, 1, 707, 1, 10.0000, 0.0000);",
    )
    .await;
    load_dimensions(&warehouse).await;
    let stats = FactTransformer::new(&warehouse).transform().await.unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(count(&warehouse, "dw.fact_sales").await, 1);
}

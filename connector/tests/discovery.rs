#![cfg(feature = "test-utils")]

use connector::discovery::{discover_all, refresh_schema, refresh_schemas, resolve_schema_for_query};
use connector::schema::PortableSchema;
use connector::test_utils::memory::{MemoryColumn, MemoryDatabase, MemoryTable};
use connector::test_utils::{PERSONS_TABLE, persons_database, persons_table};
use firebird::types::{PropertyType, native};
use telemetry::tracing::init_test_tracing;

#[tokio::test]
async fn refresh_of_persons_reads_columns_keys_sample_and_count() {
    init_test_tracing();
    let database = persons_database(8).await;

    let schema = refresh_schema(&database, PortableSchema::for_table(PERSONS_TABLE), 5)
        .await
        .unwrap();

    let names: Vec<&str> = schema.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["LASTNAME", "FIRSTNAME", "ADDRESS", "CITY", "PERSONID"]);

    for property in &schema.properties {
        assert_eq!(property.is_key, property.name == "PERSONID", "{}", property.name);
    }
    assert_eq!(schema.properties[0].property_type, PropertyType::String);
    assert_eq!(schema.properties[0].type_at_source, "VARCHAR(255)");
    assert!(schema.properties[0].is_nullable);
    assert_eq!(schema.properties[4].property_type, PropertyType::Integer);
    assert!(!schema.properties[4].is_nullable);

    assert_eq!(schema.id, "\"PERSONS\"");
    assert_eq!(schema.sample.len(), 5);
    assert_eq!(schema.count, 8);
    assert_eq!(schema.sample[0]["\"LASTNAME\""], "Last1");
    assert_eq!(database.open_connections().await, 0);
}

#[tokio::test]
async fn sample_is_bounded_by_row_count() {
    init_test_tracing();
    let database = persons_database(2).await;

    let schema = refresh_schema(&database, PortableSchema::for_table(PERSONS_TABLE), 5)
        .await
        .unwrap();

    assert_eq!(schema.sample.len(), 2);
    assert_eq!(schema.count, 2);
}

#[tokio::test]
async fn discover_all_groups_columns_by_table_and_merges_keys() {
    init_test_tracing();
    let database = persons_database(1).await;
    database
        .add_table(
            MemoryTable::new("ORDERS")
                .column(MemoryColumn::new("ORDERID", native::BIGINT).primary_key())
                .column(MemoryColumn::new("LINE", native::SMALLINT).primary_key())
                .column(MemoryColumn::new("AMOUNT", native::NUMERIC).with_precision(18, 2))
                .column(MemoryColumn::new("NOTES", native::TEXT)),
        )
        .await;
    database
        .add_table(MemoryTable::new("AUDIT").column(MemoryColumn::varchar("MESSAGE", 2000)))
        .await;

    let schemas = discover_all(&database, 5).await.unwrap();

    let ids: Vec<&str> = schemas.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["\"AUDIT\"", "\"ORDERS\"", "\"PERSONS\""]);

    let audit = &schemas[0];
    assert_eq!(audit.properties.len(), 1);
    assert!(!audit.properties[0].is_key);
    assert_eq!(audit.properties[0].property_type, PropertyType::Text);
    assert_eq!(audit.count, 0);
    assert!(audit.sample.is_empty());

    let orders = &schemas[1];
    let keys: Vec<&str> = orders.key_properties().map(|p| p.name.as_str()).collect();
    assert_eq!(keys, vec!["ORDERID", "LINE"]);
    assert_eq!(orders.properties[2].property_type, PropertyType::Decimal);
    assert_eq!(orders.properties[2].type_at_source, "NUMERIC(18,2)");
    assert_eq!(orders.properties[3].type_at_source, "BLOB SUB_TYPE 1");

    assert_eq!(schemas[2].count, 1);
    assert_eq!(database.open_connections().await, 0);
}

#[tokio::test]
async fn refresh_connects_to_the_named_database() {
    init_test_tracing();
    let database = persons_database(1).await;

    let mut schema = PortableSchema::for_table(PERSONS_TABLE);
    schema.id = "\"archive\".\"main\".\"PERSONS\"".to_string();

    let schema = refresh_schema(&database, schema, 5).await.unwrap();

    assert_eq!(schema.properties.len(), 5);
    assert_eq!(
        database.connected_databases().await.first(),
        Some(&Some("archive".to_string()))
    );
}

#[tokio::test]
async fn query_schema_collapses_duplicate_index_rows() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    database
        .add_table(
            MemoryTable::new("ITEMS")
                .column(
                    MemoryColumn::new("ITEMID", native::INTEGER)
                        .primary_key()
                        .with_extra_segments(2),
                )
                .column(MemoryColumn::varchar("LABEL", 40)),
        )
        .await;

    let schema = resolve_schema_for_query(
        &database,
        PortableSchema::for_query("\"ITEMS\"", "SELECT * FROM \"ITEMS\""),
        5,
    )
    .await
    .unwrap();

    assert_eq!(schema.properties.len(), 2);
    assert!(schema.properties[0].is_key);
    assert_eq!(schema.properties[0].name, "ITEMID");
    assert!(!schema.properties[1].is_key);
}

#[tokio::test]
async fn refresh_schemas_samples_query_schemas_from_their_query() {
    init_test_tracing();
    let database = persons_database(7).await;

    let schemas = refresh_schemas(
        &database,
        vec![PortableSchema::for_query("test", "SELECT * FROM \"PERSONS\"")],
        3,
    )
    .await
    .unwrap();

    let schema = &schemas[0];
    assert_eq!(schema.id, "test");
    assert_eq!(schema.query, "SELECT * FROM \"PERSONS\"");
    assert!(schema.properties.is_empty());
    assert_eq!(schema.sample.len(), 3);
    assert_eq!(schema.count, 7);
    assert_eq!(schema.sample[0]["\"CITY\""], "Springfield");
}

#[tokio::test]
async fn refresh_of_missing_table_fails_on_sampling() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    database.add_table(persons_table(0)).await;

    let err = refresh_schema(&database, PortableSchema::for_table("UNKNOWN"), 5)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), connector::error::ErrorKind::SourceSchemaError);
    assert_eq!(database.open_connections().await, 0);
}

#![cfg(feature = "test-utils")]

use connector::error::ErrorKind;
use connector::replication::{
    DropReason, METADATA_TABLE_NAME, REPLICATION_RECORD_ID, REPLICATION_VERSION_IDS,
    REPLICATION_VERSION_RECORD_ID, Replication, WriteGate, golden_table, record_exists,
    reconcile_replication_job, replication_settings,
};
use connector::schema::{PortableProperty, PortableSchema};
use connector::test_utils::memory::MemoryDatabase;
use connector::test_utils::replication_request;
use connector::types::{PrepareWriteRequest, Record, RecordVersion};
use firebird::DriverError;
use firebird::error::gds;
use firebird::types::{Cell, PropertyType};
use telemetry::tracing::init_test_tracing;

fn persons_schema() -> PortableSchema {
    let mut schema = PortableSchema::for_table("PERSONS");
    schema.properties = vec![
        PortableProperty::new("PERSONID", PropertyType::Integer, "INTEGER").with_key(true),
        PortableProperty::new("NAME", PropertyType::String, "VARCHAR(255)"),
    ];
    schema
}

fn request(golden: &str, version: &str, job_version: i64, shape_version: i64) -> PrepareWriteRequest {
    replication_request(persons_schema(), golden, version, job_version, shape_version)
}

async fn replication_for(database: &MemoryDatabase, request: &PrepareWriteRequest) -> Replication<MemoryDatabase> {
    reconcile_replication_job(database, request).await.unwrap();
    let settings = replication_settings(request).unwrap();
    Replication::new(database.clone(), request.schema.clone(), &settings, WriteGate::new())
}

async fn replication_with_gate(
    database: &MemoryDatabase,
    request: &PrepareWriteRequest,
    gate: WriteGate,
) -> Replication<MemoryDatabase> {
    reconcile_replication_job(database, request).await.unwrap();
    let settings = replication_settings(request).unwrap();
    Replication::new(database.clone(), request.schema.clone(), &settings, gate)
}

fn record(record_id: &str, data_json: &str, versions: &[(&str, &str)]) -> Record {
    Record {
        record_id: record_id.to_string(),
        correlation_id: format!("corr-{record_id}"),
        data_json: data_json.to_string(),
        versions: versions
            .iter()
            .map(|(id, data)| RecordVersion {
                record_id: id.to_string(),
                data_json: data.to_string(),
            })
            .collect(),
        ..Default::default()
    }
}

fn drops(executed: &[String]) -> Vec<&str> {
    executed
        .iter()
        .filter(|sql| sql.starts_with("DROP TABLE"))
        .map(String::as_str)
        .collect()
}

#[tokio::test]
async fn first_prepare_creates_tables_and_metadata() {
    init_test_tracing();
    let database = MemoryDatabase::new();

    let outcome = reconcile_replication_job(&database, &request("G", "V", 1, 1))
        .await
        .unwrap();

    assert!(outcome.first_run);
    assert!(database.has_table("G").await);
    assert!(database.has_table("V").await);
    assert_eq!(database.row_count(METADATA_TABLE_NAME).await, 1);

    let golden = database.table("G").await.unwrap();
    let key: Vec<&str> = golden
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(key, vec![REPLICATION_RECORD_ID]);
    assert_eq!(database.open_connections().await, 0);
}

#[tokio::test]
async fn repeated_prepare_is_idempotent() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    reconcile_replication_job(&database, &request("G", "V", 1, 1)).await.unwrap();
    database.clear_executed().await;

    let outcome = reconcile_replication_job(&database, &request("G", "V", 1, 1))
        .await
        .unwrap();

    let executed = database.executed_sql().await;
    assert!(!outcome.first_run);
    assert_eq!(outcome.golden_dropped, None);
    assert_eq!(outcome.version_dropped, None);
    assert!(drops(&executed).is_empty());
    assert!(!executed.iter().any(|sql| sql.starts_with("CREATE TABLE")));
    assert!(executed.iter().any(|sql| sql.starts_with("UPDATE \"NaveegoReplicationMetaData\"")));
    assert_eq!(database.row_count(METADATA_TABLE_NAME).await, 1);
}

#[tokio::test]
async fn golden_rename_drops_only_the_previous_golden_table() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    reconcile_replication_job(&database, &request("A", "V", 1, 1)).await.unwrap();
    database.clear_executed().await;

    let outcome = reconcile_replication_job(&database, &request("B", "V", 1, 1))
        .await
        .unwrap();

    assert_eq!(outcome.golden_dropped, Some(DropReason::GoldenNameChanged));
    assert_eq!(outcome.version_dropped, None);
    assert_eq!(drops(&database.executed_sql().await), vec!["DROP TABLE \"A\""]);
    assert!(!database.has_table("A").await);
    assert!(database.has_table("B").await);
    assert!(database.has_table("V").await);
}

#[tokio::test]
async fn job_data_version_bump_recreates_both_tables() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    let first = request("G", "V", 1, 1);
    let replication = replication_for(&database, &first).await;
    let ack = replication
        .write_record(&record("r1", r#"{"\"PERSONID\"": 1, "\"NAME\"": "Ada"}"#, &[("v1", "{}")]))
        .await;
    assert!(ack.is_success(), "{}", ack.error);
    database.clear_executed().await;

    let outcome = reconcile_replication_job(&database, &request("G", "V", 2, 1))
        .await
        .unwrap();

    let executed = database.executed_sql().await;
    assert_eq!(outcome.golden_dropped, Some(DropReason::JobDataVersionChanged));
    assert_eq!(outcome.version_dropped, Some(DropReason::JobDataVersionChanged));
    assert_eq!(drops(&executed), vec!["DROP TABLE \"G\"", "DROP TABLE \"V\""]);
    assert_eq!(
        executed
            .iter()
            .filter(|sql| sql.starts_with("CREATE TABLE \"G\"") || sql.starts_with("CREATE TABLE \"V\""))
            .count(),
        2
    );
    assert_eq!(database.row_count("G").await, 0);
    assert_eq!(database.row_count("V").await, 0);
}

#[tokio::test]
async fn shape_data_version_bump_is_reported_over_rename() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    reconcile_replication_job(&database, &request("A", "V", 1, 1)).await.unwrap();

    let outcome = reconcile_replication_job(&database, &request("B", "V", 1, 2))
        .await
        .unwrap();

    assert_eq!(outcome.golden_dropped, Some(DropReason::ShapeDataVersionChanged));
    assert_eq!(outcome.version_dropped, Some(DropReason::ShapeDataVersionChanged));
    assert!(!database.has_table("A").await);
    assert!(database.has_table("B").await);
    assert!(database.has_table("V").await);
}

#[tokio::test]
async fn failed_metadata_upsert_reports_both_attempts() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    reconcile_replication_job(&database, &request("G", "V", 1, 1)).await.unwrap();
    database
        .fail_statements_containing(
            "UPDATE \"NaveegoReplicationMetaData\"",
            DriverError::query("lock conflict on no wait transaction"),
        )
        .await;
    database
        .fail_statements_containing(
            "INSERT INTO \"NaveegoReplicationMetaData\"",
            DriverError::query("violation of PRIMARY or UNIQUE KEY constraint")
                .with_gds_code(gds::UNIQUE_KEY_VIOLATION),
        )
        .await;

    let err = reconcile_replication_job(&database, &request("G", "V", 1, 1))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MetadataUpsertFailed);
    assert_eq!(
        err.kinds(),
        vec![
            ErrorKind::MetadataUpsertFailed,
            ErrorKind::SourceQueryFailed,
            ErrorKind::ConstraintViolation
        ]
    );
    assert_eq!(database.open_connections().await, 0);
}

#[tokio::test]
async fn failed_metadata_update_tries_insert_before_giving_up() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    reconcile_replication_job(&database, &request("G", "V", 1, 1)).await.unwrap();
    database
        .fail_statements_containing(
            "UPDATE \"NaveegoReplicationMetaData\"",
            DriverError::query("lock conflict on no wait transaction"),
        )
        .await;
    database.clear_executed().await;

    let err = reconcile_replication_job(&database, &request("G", "V", 1, 1))
        .await
        .unwrap_err();

    let metadata_writes: Vec<String> = database
        .executed_sql()
        .await
        .into_iter()
        .filter(|sql| sql.starts_with("UPDATE \"Naveego") || sql.starts_with("INSERT INTO \"Naveego"))
        .collect();
    assert_eq!(metadata_writes.len(), 2);
    assert!(metadata_writes[0].starts_with("UPDATE"));
    assert!(metadata_writes[1].starts_with("INSERT"));
    assert_eq!(err.errors().len(), 3);

    database.clear_failures().await;
    reconcile_replication_job(&database, &request("G", "V", 1, 1)).await.unwrap();
    assert_eq!(database.row_count(METADATA_TABLE_NAME).await, 1);
}

#[tokio::test]
async fn empty_record_deletes_golden_row_and_versions() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    let request = request("G", "V", 1, 1);
    let replication = replication_for(&database, &request).await;

    let ack = replication
        .write_record(&record(
            "r1",
            r#"{"\"PERSONID\"": 1, "\"NAME\"": "Ada"}"#,
            &[("v1", r#"{"\"NAME\"": "Ada"}"#), ("v2", r#"{"\"NAME\"": "Ada L"}"#)],
        ))
        .await;
    assert!(ack.is_success(), "{}", ack.error);
    assert_eq!(database.row_count("V").await, 2);

    let ack = replication.write_record(&record("r1", "{}", &[])).await;

    assert!(ack.is_success(), "{}", ack.error);
    assert_eq!(ack.correlation_id, "corr-r1");
    let golden = golden_table(&request.schema, "G");
    assert!(!record_exists(&database, &golden, "r1").await.unwrap());
    assert_eq!(database.row_count("V").await, 0);
}

#[tokio::test]
async fn stale_versions_are_deleted_and_current_ones_upserted() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    let replication = replication_for(&database, &request("G", "V", 1, 1)).await;

    replication
        .write_record(&record(
            "r1",
            r#"{"\"PERSONID\"": 1, "\"NAME\"": "Ada"}"#,
            &[("v1", r#"{"\"NAME\"": "A"}"#), ("v2", r#"{"\"NAME\"": "B"}"#)],
        ))
        .await;
    let ack = replication
        .write_record(&record(
            "r1",
            r#"{"\"PERSONID\"": 1, "\"NAME\"": "Ada"}"#,
            &[("v2", r#"{"\"NAME\"": "B2"}"#), ("v3", r#"{"\"NAME\"": "C"}"#)],
        ))
        .await;

    assert!(ack.is_success(), "{}", ack.error);
    assert_eq!(database.row_count("V").await, 2);
    assert!(database.find_row("V", REPLICATION_VERSION_RECORD_ID, "v1").await.is_none());

    let v2 = database
        .find_row("V", REPLICATION_VERSION_RECORD_ID, "v2")
        .await
        .unwrap();
    assert_eq!(v2.get_string("NAME").as_deref(), Some("B2"));
    assert_eq!(v2.get_string(REPLICATION_RECORD_ID).as_deref(), Some("r1"));
    assert!(database.find_row("V", REPLICATION_VERSION_RECORD_ID, "v3").await.is_some());

    let golden = database.find_row("G", REPLICATION_RECORD_ID, "r1").await.unwrap();
    assert_eq!(
        golden.get(REPLICATION_VERSION_IDS),
        Some(&Cell::from(r#"["v2","v3"]"#))
    );
    assert_eq!(database.row_count("G").await, 1);
}

#[tokio::test]
async fn write_failures_are_reported_in_the_ack() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    let replication = replication_for(&database, &request("G", "V", 1, 1)).await;
    database
        .fail_statements_containing(
            "UPDATE OR INSERT INTO \"G\"",
            DriverError::query("validation error for column \"NAME\"").with_gds_code(gds::NOT_VALID),
        )
        .await;

    let ack = replication
        .write_record(&record("r1", r#"{"\"PERSONID\"": 1, "\"NAME\"": "Ada"}"#, &[]))
        .await;

    assert!(!ack.is_success());
    assert_eq!(ack.correlation_id, "corr-r1");
    assert_eq!(ack.error, "validation error for column \"NAME\"");
    assert_eq!(database.open_connections().await, 0);

    database.clear_failures().await;
    let ack = replication
        .write_record(&record("r2", r#"{"\"PERSONID\"": 2, "\"NAME\"": "Grace"}"#, &[]))
        .await;
    assert!(ack.is_success(), "{}", ack.error);
}

#[tokio::test]
async fn concurrent_writers_sharing_a_gate_keep_versions_consistent() {
    init_test_tracing();
    let database = MemoryDatabase::new();
    let request = request("G", "V", 1, 1);
    let gate = WriteGate::new();
    let first = replication_with_gate(&database, &request, gate.clone()).await;
    let second = replication_with_gate(&database, &request, gate.clone()).await;

    let older = record(
        "r1",
        r#"{"\"PERSONID\"": 1, "\"NAME\"": "Ada"}"#,
        &[("v1", r#"{"\"NAME\"": "A"}"#), ("v2", r#"{"\"NAME\"": "B"}"#)],
    );
    let newer = record(
        "r1",
        r#"{"\"PERSONID\"": 1, "\"NAME\"": "Ada L"}"#,
        &[("v3", r#"{"\"NAME\"": "C"}"#)],
    );
    let (older_ack, newer_ack) =
        tokio::join!(first.write_record(&older), second.write_record(&newer));

    assert!(older_ack.is_success(), "{}", older_ack.error);
    assert!(newer_ack.is_success(), "{}", newer_ack.error);
    assert!(!gate.is_locked());

    let golden = database.find_row("G", REPLICATION_RECORD_ID, "r1").await.unwrap();
    let version_ids: Vec<String> =
        serde_json::from_str(&golden.get_string(REPLICATION_VERSION_IDS).unwrap()).unwrap();
    assert!(
        version_ids == ["v1", "v2"] || version_ids == ["v3"],
        "{version_ids:?}"
    );
    assert_eq!(database.row_count("V").await, version_ids.len());
    for version_id in &version_ids {
        assert!(
            database
                .find_row("V", REPLICATION_VERSION_RECORD_ID, version_id)
                .await
                .is_some()
        );
    }
}

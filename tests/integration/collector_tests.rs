//! Metadata collection against a scripted DB2 catalog

use crate::common::{StubConnection, column_rows, int, results, text};
use dbcontext::catalog::names;
use dbcontext::collect::{
    CollectionOutcome, DocumentationSet, MetadataCollector, load_snapshot, load_table_snapshot,
};
use dbcontext::db::Provider;
use dbcontext::metadata::ObjectIdentifier;

fn catalog_stub() -> StubConnection {
    StubConnection::db2()
        .respond(
            names::GET_SERVER_VERSION,
            results(&["VERSION"], vec![vec![text("DB2 v11.5.8.0")]]),
        )
        .respond(
            names::GET_SYSTEM_TABLES,
            results(
                &["TABSCHEMA", "TABNAME", "COLCOUNT"],
                vec![
                    vec![text("SYSCAT"), text("TABLES"), int(60)],
                    vec![text("SYSCAT"), text("COLUMNS"), int(40)],
                    vec![text("SYSCAT"), text("INDEXES"), int(50)],
                ],
            ),
        )
}

fn collector(dir: &std::path::Path) -> MetadataCollector {
    MetadataCollector::new(dir, DocumentationSet::builtin().unwrap())
}

fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_collect_twice_writes_once() {
    let dir = tempfile::tempdir().unwrap();
    let (stub, metadata) = catalog_stub().into_metadata();
    let collector = collector(dir.path());

    let first = collector.collect_metadata(&metadata).await.unwrap();
    let expected = dir.path().join("db2_11.5_system_tables.json");
    assert_eq!(first, CollectionOutcome::Collected(expected.clone()));

    let second = collector.collect_metadata(&metadata).await.unwrap();
    assert_eq!(second, CollectionOutcome::AlreadyCollected(expected));

    assert_eq!(stub.count(names::GET_SYSTEM_TABLES), 1);
    assert_eq!(file_count(dir.path()), 1);
}

#[tokio::test]
async fn test_concurrent_collection_pulls_once() {
    let dir = tempfile::tempdir().unwrap();
    let (stub, metadata) = catalog_stub().into_metadata();
    let collector = collector(dir.path());

    let (a, b) = tokio::join!(
        collector.collect_metadata(&metadata),
        collector.collect_metadata(&metadata)
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let collected = outcomes
        .iter()
        .filter(|o| matches!(o, CollectionOutcome::Collected(_)))
        .count();
    assert_eq!(collected, 1);
    assert_eq!(stub.count(names::GET_SYSTEM_TABLES), 1);
    assert_eq!(file_count(dir.path()), 1);
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (_stub, metadata) = catalog_stub().into_metadata();

    let outcome = collector(dir.path())
        .collect_metadata(&metadata)
        .await
        .unwrap();
    let snapshot = load_snapshot(outcome.path()).unwrap();

    assert_eq!(snapshot.provider, Provider::Db2);
    assert_eq!(snapshot.version, "11.5");
    assert_eq!(snapshot.system_tables.count, 3);
    let columns: Vec<&str> = snapshot
        .system_tables
        .columns
        .iter()
        .map(|c| c.column_name.as_str())
        .collect();
    assert_eq!(columns, vec!["TABSCHEMA", "TABNAME", "COLCOUNT"]);
    assert_eq!(snapshot.system_tables.data[1]["TABNAME"], "COLUMNS");
    assert!(snapshot.relationships["tables"].is_object());
    assert!(snapshot.query_patterns["patterns"].is_object());

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(outcome.path()).unwrap()).unwrap();
    assert!(raw.get("collectedAt").is_some());
    assert!(raw.get("systemTables").is_some());
    assert!(raw.get("queryPatterns").is_some());
}

#[tokio::test]
async fn test_failed_version_probe_uses_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let (_stub, metadata) = catalog_stub()
        .fail(names::GET_SERVER_VERSION)
        .into_metadata();

    let outcome = collector(dir.path())
        .collect_metadata(&metadata)
        .await
        .unwrap();
    let expected = dir.path().join("db2_unknown_system_tables.json");
    assert_eq!(outcome.path(), expected.as_path());
}

#[tokio::test]
async fn test_missing_documentation_gives_empty_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let (_stub, metadata) = catalog_stub().into_metadata();

    let outcome = MetadataCollector::new(dir.path(), DocumentationSet::default())
        .collect_metadata(&metadata)
        .await
        .unwrap();
    let snapshot = load_snapshot(outcome.path()).unwrap();
    assert_eq!(snapshot.relationships, serde_json::json!({}));
    assert_eq!(snapshot.query_patterns, serde_json::json!({}));
}

#[tokio::test]
async fn test_table_collection_skips_version_probe() {
    let dir = tempfile::tempdir().unwrap();
    let (stub, metadata) = catalog_stub()
        .respond(
            names::GET_TABLE_COLUMNS,
            column_rows(&[("ID", "INTEGER"), ("STATUS", "CHAR")]),
        )
        .into_metadata();
    let collector = collector(dir.path());
    let table = ObjectIdentifier::new("SALES", "ORDERS");

    let first = collector
        .collect_table_metadata(&metadata, &table, "dev")
        .await
        .unwrap();
    assert_eq!(
        first,
        CollectionOutcome::Collected(dir.path().join("db2_table_SALES_ORDERS_11.5_dev.json"))
    );
    let again = collector
        .collect_table_metadata(&metadata, &table, "dev")
        .await
        .unwrap();
    assert!(matches!(again, CollectionOutcome::AlreadyCollected(_)));

    assert_eq!(stub.count(names::GET_SERVER_VERSION), 0);
    assert_eq!(stub.count(names::GET_TABLE_COLUMNS), 1);

    let snapshot = load_table_snapshot(first.path()).unwrap();
    assert_eq!(snapshot.table, table);
    assert_eq!(snapshot.profile, "dev");
    assert_eq!(snapshot.columns.count, 2);
    assert_eq!(snapshot.indexes.count, 0);
}

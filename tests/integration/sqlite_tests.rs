//! End-to-end runs against a real SQLite database

use crate::common::builtin_catalog;
use clap::Parser;
use dbcontext::collect::{CollectionOutcome, DocumentationSet, MetadataCollector, load_snapshot};
use dbcontext::commands::{self, Cli};
use dbcontext::context::{
    ContextBuilder, ContextOptions, RelationshipContextBuilder, Section, TableContextBuilder,
    ViewContextBuilder,
};
use dbcontext::db::Connection;
use dbcontext::db::sqlite::SqliteConnection;
use dbcontext::ddl::DdlGenerator;
use dbcontext::error::ContextError;
use dbcontext::metadata::{MetadataProvider, ObjectIdentifier};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const FIXTURE: &[&str] = &[
    "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email VARCHAR(80))",
    "CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
        total DECIMAL(10,2) DEFAULT 0,
        status TEXT
    )",
    "CREATE INDEX ix_orders_status ON orders(status)",
    "CREATE TABLE products (id INTEGER PRIMARY KEY, title TEXT)",
    "CREATE VIEW open_orders AS SELECT id, total FROM orders WHERE status = 'open'",
    "INSERT INTO customers (id, name, email) VALUES (1, 'Ada', 'ada@example.com'), (2, 'Lin', NULL)",
    "INSERT INTO orders (id, customer_id, total, status) VALUES
        (1, 1, 10.5, 'open'), (2, 1, 20, 'closed'), (3, 2, 7.25, NULL)",
];

struct Fixture {
    _dir: tempfile::TempDir,
    path: PathBuf,
    metadata: MetadataProvider,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    let conn = SqliteConnection::open(path.to_str().unwrap()).await.unwrap();
    for sql in FIXTURE {
        conn.execute_non_query(sql, &[]).await.unwrap();
    }
    let metadata = MetadataProvider::for_connection(Arc::new(conn), builtin_catalog())
        .await
        .unwrap();
    Fixture {
        _dir: dir,
        path,
        metadata,
    }
}

#[tokio::test]
async fn test_table_report_end_to_end() {
    let fx = fixture().await;
    let options = ContextOptions {
        include_profile: true,
        include_sample: true,
        ..ContextOptions::default()
    };
    let report = TableContextBuilder::new(fx.metadata.clone())
        .build_context("main", "orders", &options)
        .await
        .unwrap();

    let columns: Vec<&str> = report
        .columns()
        .unwrap()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(columns, vec!["id", "customer_id", "total", "status"]);

    let edges = report.relationships().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to, ObjectIdentifier::new("main", "customers"));
    assert_eq!(edges[0].delete_rule.as_deref(), Some("CASCADE"));

    assert!(report.has_section(|s| matches!(
        s,
        Section::Indexes { indexes } if indexes.iter().any(|i| i.name == "ix_orders_status")
    )));
    assert!(report.has_section(|s| matches!(
        s,
        Section::Profile { profiles } if profiles.len() == 4
    )));
    assert!(report.has_section(|s| matches!(s, Section::Sample { fetched: 3, .. })));
    assert!(!report.has_section(|s| matches!(s, Section::ChangeCapture { .. })));

    let markdown = report.to_markdown();
    assert!(markdown.contains("customer_id"));
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["object"]["name"], "orders");
}

#[tokio::test]
async fn test_missing_table_end_to_end() {
    let fx = fixture().await;
    let err = TableContextBuilder::new(fx.metadata.clone())
        .build_context("main", "nope", &ContextOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::ObjectNotFound(_)));
}

#[tokio::test]
async fn test_relationship_end_to_end() {
    let fx = fixture().await;
    let builder = RelationshipContextBuilder::new(fx.metadata.clone());

    let related = ContextOptions {
        target: Some(ObjectIdentifier::new("main", "customers")),
        ..ContextOptions::default()
    };
    let report = builder.build_context("main", "orders", &related).await.unwrap();
    assert_eq!(report.relationships().unwrap().len(), 1);

    let unrelated = ContextOptions {
        target: Some(ObjectIdentifier::new("main", "products")),
        ..ContextOptions::default()
    };
    let report = builder.build_context("main", "orders", &unrelated).await.unwrap();
    assert!(report.relationships().is_none());
    assert!(report.has_section(|s| matches!(s, Section::NoRelationship { .. })));
}

#[tokio::test]
async fn test_view_report_end_to_end() {
    let fx = fixture().await;
    let options = ContextOptions {
        include_source_code: true,
        ..ContextOptions::default()
    };
    let report = ViewContextBuilder::new(fx.metadata.clone())
        .build_context("main", "open_orders", &options)
        .await
        .unwrap();

    let columns: Vec<&str> = report
        .columns()
        .unwrap()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(columns, vec!["id", "total"]);
    assert!(report.has_section(|s| matches!(
        s,
        Section::Source { text } if text.contains("CREATE VIEW open_orders")
    )));
}

#[tokio::test]
async fn test_generated_ddl_recreates_table() {
    let fx = fixture().await;
    let ddl = DdlGenerator::new(fx.metadata.clone())
        .generate_table_ddl("main", "orders")
        .await
        .unwrap();

    assert!(ddl.starts_with("CREATE TABLE \"main\".\"orders\" ("));
    assert!(ddl.contains("\"customer_id\" INTEGER NOT NULL"));
    assert!(ddl.contains("\"total\" DECIMAL(10,2) DEFAULT 0"));
    assert!(ddl.contains("PRIMARY KEY (\"id\")"));
    assert!(ddl.contains(
        "FOREIGN KEY (\"customer_id\") REFERENCES \"customers\" (\"id\") ON DELETE CASCADE"
    ));
    assert!(ddl.contains("CREATE INDEX \"main\".\"ix_orders_status\" ON \"orders\" (\"status\");"));

    let scratch = SqliteConnection::open(":memory:").await.unwrap();
    for statement in ddl.split(";\n").map(str::trim).filter(|s| !s.is_empty()) {
        scratch.execute_non_query(statement, &[]).await.unwrap();
    }
}

#[tokio::test]
async fn test_reference_to_implicit_primary_key() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    for sql in [
        "CREATE TABLE c (id INTEGER PRIMARY KEY, name TEXT)",
        "CREATE TABLE o (id INTEGER PRIMARY KEY, cid INTEGER REFERENCES c)",
    ] {
        conn.execute_non_query(sql, &[]).await.unwrap();
    }
    let metadata = MetadataProvider::for_connection(Arc::new(conn), builtin_catalog())
        .await
        .unwrap();

    let report = TableContextBuilder::new(metadata.clone())
        .build_context("main", "o", &ContextOptions::default())
        .await
        .unwrap();
    let edges = report.relationships().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from_columns, vec!["cid".to_string()]);
    assert_eq!(edges[0].to_columns, vec!["id".to_string()]);

    let ddl = DdlGenerator::new(metadata)
        .generate_table_ddl("main", "o")
        .await
        .unwrap();
    assert!(ddl.contains("FOREIGN KEY (\"cid\") REFERENCES \"c\" (\"id\")"));

    let scratch = SqliteConnection::open(":memory:").await.unwrap();
    scratch
        .execute_non_query("CREATE TABLE c (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();
    for statement in ddl.split(";\n").map(str::trim).filter(|s| !s.is_empty()) {
        scratch.execute_non_query(statement, &[]).await.unwrap();
    }
}

#[tokio::test]
async fn test_ddl_for_missing_table_is_not_found() {
    let fx = fixture().await;
    let err = DdlGenerator::new(fx.metadata.clone())
        .generate_table_ddl("main", "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::ObjectNotFound(_)));
}

#[tokio::test]
async fn test_collect_metadata_end_to_end() {
    let fx = fixture().await;
    let out = tempfile::tempdir().unwrap();
    let collector = MetadataCollector::new(out.path(), DocumentationSet::builtin().unwrap());

    let first = collector.collect_metadata(&fx.metadata).await.unwrap();
    assert!(matches!(first, CollectionOutcome::Collected(_)));
    let name = first.path().file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("sqlite_3."), "unexpected file {}", name);
    assert!(name.ends_with("_system_tables.json"));

    let second = collector.collect_metadata(&fx.metadata).await.unwrap();
    assert!(matches!(second, CollectionOutcome::AlreadyCollected(_)));

    let snapshot = load_snapshot(first.path()).unwrap();
    assert_eq!(snapshot.system_tables.count, 5);
    assert!(snapshot.relationships["tables"].is_object());
}

#[tokio::test]
async fn test_cli_writes_listing() {
    let fx = fixture().await;
    let out = tempfile::tempdir().unwrap();
    let out_file = out.path().join("tables.json");
    let url = format!("sqlite://{}", fx.path.display());

    let cli = Cli::try_parse_from([
        "dbcontext",
        "--url",
        url.as_str(),
        "list-tables",
        "--schema",
        "main",
        "--out",
        out_file.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(commands::run(cli).await, ExitCode::SUCCESS);

    let listing: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_file).unwrap()).unwrap();
    let tables: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["tabname"].as_str())
        .collect();
    assert_eq!(tables, vec!["customers", "orders", "products"]);
}

#[tokio::test]
async fn test_cli_writes_error_object() {
    let fx = fixture().await;
    let out = tempfile::tempdir().unwrap();
    let out_file = out.path().join("nope.json");
    let url = format!("sqlite://{}", fx.path.display());

    let cli = Cli::try_parse_from([
        "dbcontext",
        "--url",
        url.as_str(),
        "table-props",
        "main.nope",
        "--out",
        out_file.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(commands::run(cli).await, ExitCode::FAILURE);

    let body: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_file).unwrap()).unwrap();
    assert_eq!(body["error"]["command"], "table-props");
    assert!(body["error"]["message"].as_str().unwrap().contains("main.nope"));
}

//! Package dependency analysis against a scripted DB2 catalog

use crate::common::{StubConnection, int, results, text};
use dbcontext::analysis::DependencyAnalyzer;
use dbcontext::catalog::names;
use dbcontext::db::CellValue;
use dbcontext::metadata::{DependencyKind, ObjectIdentifier};

/// (STMTNO, SECTNO, SEQNO, TEXT)
fn statement_parts(parts: &[(i64, i64, i64, &str)]) -> dbcontext::db::QueryResults {
    results(
        &["STMTNO", "SECTNO", "SEQNO", "TEXT"],
        parts
            .iter()
            .map(|(stmt, sect, seq, sql)| vec![int(*stmt), int(*sect), int(*seq), text(sql)])
            .collect::<Vec<Vec<CellValue>>>(),
    )
}

fn package_stub() -> StubConnection {
    StubConnection::db2()
        .respond(
            names::GET_PACKAGE_METADATA,
            results(&["QUALIFIER"], vec![vec![text("SALES")]]),
        )
        .respond(
            names::PACKAGE_GET_STATEMENTS,
            statement_parts(&[
                (2, 1, 1, "CALL SALES.REFRESH_TOTALS(?)"),
                (1, 1, 2, "ERS O JOIN CUSTOMERS C ON C.ID = O.CUSTOMER_ID"),
                (1, 1, 1, "SELECT O.ID FROM ORD"),
                (3, 1, 1, "UPDATE ORDERS SET STATUS = 'X' WHERE ID = ?"),
            ]),
        )
}

#[tokio::test]
async fn test_statement_parts_reassembled_in_order() {
    let (_stub, metadata) = package_stub().into_metadata();
    let statements = DependencyAnalyzer::new(metadata)
        .fetch_statements("APP", "PKG1")
        .await
        .unwrap();

    assert_eq!(statements.len(), 3);
    assert_eq!(
        statements[0].text,
        "SELECT O.ID FROM ORDERS O JOIN CUSTOMERS C ON C.ID = O.CUSTOMER_ID"
    );
    assert_eq!(statements[1].stmt_no, 2);
}

#[tokio::test]
async fn test_unverified_relations_default_to_tables() {
    let (_stub, metadata) = package_stub().into_metadata();
    let deps = DependencyAnalyzer::new(metadata)
        .analyze_dependencies("APP", "PKG1")
        .await
        .unwrap();

    let orders = ObjectIdentifier::new("SALES", "ORDERS");
    assert!(deps.tables_used.contains(&orders));
    assert!(deps.tables_used.contains(&ObjectIdentifier::new("SALES", "CUSTOMERS")));
    assert!(deps.views_used.is_empty());
    assert!(deps
        .procedures_called
        .contains(&ObjectIdentifier::new("SALES", "REFRESH_TOTALS")));

    let detail = deps.details.iter().find(|d| d.object == orders).unwrap();
    assert_eq!(detail.usage_count, 2);
    assert_eq!(detail.statements, vec![1, 3]);
    assert!(!detail.verified);
}

#[tokio::test]
async fn test_catalog_confirms_views() {
    let (stub, metadata) = package_stub()
        .respond(names::GET_RELATION_TYPE, results(&["TYPE"], vec![vec![text("V")]]))
        .into_metadata();
    let deps = DependencyAnalyzer::new(metadata)
        .analyze_dependencies("APP", "PKG1")
        .await
        .unwrap();

    assert!(deps.tables_used.is_empty());
    assert_eq!(deps.views_used.len(), 2);
    assert!(deps
        .details
        .iter()
        .filter(|d| d.kind == DependencyKind::View)
        .all(|d| d.verified));
    assert_eq!(stub.count(names::GET_RELATION_TYPE), 2);
}

#[tokio::test]
async fn test_failed_type_lookup_keeps_table() {
    let (_stub, metadata) = package_stub()
        .fail(names::GET_RELATION_TYPE)
        .into_metadata();
    let deps = DependencyAnalyzer::new(metadata)
        .analyze_dependencies("APP", "PKG1")
        .await
        .unwrap();

    assert_eq!(deps.tables_used.len(), 2);
    assert!(deps.details.iter().all(|d| !d.verified));
}

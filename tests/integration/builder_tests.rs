//! Context builders against a scripted DB2 catalog

use crate::common::{
    RELATIONSHIP_COLUMNS, StubConnection, column_rows, int, null, relationship_row, results, text,
};
use dbcontext::catalog::names;
use dbcontext::context::{
    ContextBuilder, ContextOptions, FunctionContextBuilder, PackageContextBuilder,
    ProcedureContextBuilder, RelationshipContextBuilder, Section, TableContextBuilder,
    ViewContextBuilder,
};
use dbcontext::error::ContextError;
use dbcontext::metadata::{ObjectIdentifier, ParameterMode};

fn table_metadata_row(datacapture: &str) -> dbcontext::db::QueryResults {
    results(
        &[
            "TABSCHEMA",
            "TABNAME",
            "TYPE",
            "REMARKS",
            "CARD",
            "NPAGES",
            "TBSPACE",
            "DATACAPTURE",
            "OWNER",
            "CREATE_TIME",
            "STATS_TIME",
        ],
        vec![vec![
            text("SALES"),
            text("ORDERS"),
            text("T"),
            text("Customer orders"),
            int(1200),
            int(-1),
            text("TS_DATA"),
            text(datacapture),
            text("DB2INST1"),
            text("2024-01-05-10.00.00"),
            null(),
        ]],
    )
}

fn package_statements(n: i64) -> dbcontext::db::QueryResults {
    results(
        &["STMTNO", "SECTNO", "SEQNO", "TEXT"],
        (1..=n)
            .map(|i| {
                vec![
                    int(i),
                    int(i),
                    int(0),
                    text(&format!("SELECT C{} FROM SALES.ORDERS", i)),
                ]
            })
            .collect(),
    )
}

fn package_metadata() -> dbcontext::db::QueryResults {
    results(
        &["BOUNDBY", "OWNER", "QUALIFIER", "VALID", "ISOLATION"],
        vec![vec![
            text("DB2INST1"),
            text("DB2INST1"),
            text("SCHEMA1"),
            text("Y"),
            text("CS"),
        ]],
    )
}

/// (PARMNAME, TYPENAME, LENGTH, SCALE, ROWTYPE, ORDINAL, SPECIFICNAME)
fn parameter_rows(
    rows: &[(&str, &str, i64, i64, &str, i64, &str)],
) -> dbcontext::db::QueryResults {
    results(
        &[
            "PARMNAME",
            "TYPENAME",
            "LENGTH",
            "SCALE",
            "ROWTYPE",
            "ORDINAL",
            "REMARKS",
            "SPECIFICNAME",
        ],
        rows.iter()
            .map(|(name, ty, len, scale, mode, ord, specific)| {
                vec![
                    text(name),
                    text(ty),
                    int(*len),
                    int(*scale),
                    text(mode),
                    int(*ord),
                    null(),
                    text(specific),
                ]
            })
            .collect(),
    )
}

fn routine_metadata(specific: &str, return_type: Option<&str>) -> dbcontext::db::QueryResults {
    results(
        &["LANGUAGE", "SQL_DATA_ACCESS", "FUNCTION_TYPE", "RETURN_TYPE", "SPECIFICNAME"],
        vec![vec![
            text("SQL"),
            text("M"),
            text("S"),
            return_type.map(text).unwrap_or_else(null),
            text(specific),
        ]],
    )
}

#[tokio::test]
async fn test_table_columns_follow_colno() {
    let scrambled = results(
        &["COLNAME", "COLNO", "TYPENAME", "LENGTH", "SCALE", "NULLS"],
        vec![
            vec![text("STATUS"), int(2), text("CHAR"), int(1), int(0), text("Y")],
            vec![text("ID"), int(0), text("INTEGER"), int(4), int(0), text("N")],
            vec![text("CUST_ID"), int(1), text("INTEGER"), int(4), int(0), text("N")],
        ],
    );
    let (_stub, metadata) = StubConnection::db2()
        .respond(names::GET_TABLE_METADATA, table_metadata_row("N"))
        .respond(names::GET_TABLE_COLUMNS, scrambled)
        .into_metadata();

    let report = TableContextBuilder::new(metadata)
        .build_context("SALES", "ORDERS", &ContextOptions::default())
        .await
        .unwrap();

    let names: Vec<&str> = report
        .columns()
        .unwrap()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["ID", "CUST_ID", "STATUS"]);
}

#[tokio::test]
async fn test_table_report_sections() {
    let (_stub, metadata) = StubConnection::db2()
        .respond(names::GET_TABLE_METADATA, table_metadata_row("Y"))
        .respond(names::GET_TABLE_COLUMNS, column_rows(&[("ID", "INTEGER"), ("CUST_ID", "INTEGER")]))
        .respond(
            names::GET_TABLE_RELATIONSHIPS,
            results(
                RELATIONSHIP_COLUMNS,
                vec![relationship_row(
                    "FK_CUST",
                    ("SALES", "ORDERS"),
                    ("SALES", "CUSTOMERS"),
                    "CUST_ID",
                    "ID",
                )],
            ),
        )
        .into_metadata();

    let report = TableContextBuilder::new(metadata)
        .build_context("SALES", "ORDERS", &ContextOptions::default())
        .await
        .unwrap();

    let Section::Metadata { entries } = &report.sections[0] else {
        panic!("metadata comes first");
    };
    assert!(entries.iter().any(|e| e.label == "Comment" && e.value == "Customer orders"));
    assert!(!entries.iter().any(|e| e.label == "Pages"), "-1 is left out");

    assert_eq!(report.relationships().unwrap().len(), 1);
    assert!(report.has_section(|s| matches!(
        s,
        Section::ChangeCapture { enabled: true, mode } if mode == "CHANGES"
    )));
    assert!(!report.has_section(|s| matches!(s, Section::Sample { .. })));
}

#[tokio::test]
async fn test_missing_table_is_not_found() {
    let (_stub, metadata) = StubConnection::db2().into_metadata();
    let err = TableContextBuilder::new(metadata)
        .build_context("SALES", "NOPE", &ContextOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::ObjectNotFound(msg) if msg.contains("SALES.NOPE")));
}

#[tokio::test]
async fn test_trigger_failure_leaves_section_out() {
    let (stub, metadata) = StubConnection::db2()
        .respond(names::GET_TABLE_COLUMNS, column_rows(&[("ID", "INTEGER")]))
        .fail(names::GET_TABLE_TRIGGERS)
        .into_metadata();

    let report = TableContextBuilder::new(metadata)
        .build_context("SALES", "ORDERS", &ContextOptions::default())
        .await
        .unwrap();
    assert_eq!(stub.count(names::GET_TABLE_TRIGGERS), 1);
    assert!(!report.has_section(|s| matches!(s, Section::Triggers { .. })));
}

#[tokio::test]
async fn test_sample_display_is_capped() {
    let sample = results(&["ID"], (1..=8).map(|i| vec![int(i)]).collect());
    let (_stub, metadata) = StubConnection::db2()
        .respond(names::GET_TABLE_COLUMNS, column_rows(&[("ID", "INTEGER")]))
        .respond_containing("FROM \"SALES\".\"ORDERS\" FETCH FIRST 20 ROWS ONLY", sample)
        .into_metadata();

    let options = ContextOptions {
        include_sample: true,
        sample_rows: 20,
        ..ContextOptions::default()
    };
    let report = TableContextBuilder::new(metadata)
        .build_context("SALES", "ORDERS", &options)
        .await
        .unwrap();

    let sample = report
        .sections
        .iter()
        .find_map(|s| match s {
            Section::Sample { rows, fetched, .. } => Some((rows.len(), *fetched)),
            _ => None,
        })
        .unwrap();
    assert_eq!(sample, (5, 8));
}

#[tokio::test]
async fn test_profile_counts_non_lob_columns() {
    let profile = results(
        &["TOTAL_ROWS", "NON_NULL", "DISTINCT_VALUES"],
        vec![vec![int(10), int(8), int(4)]],
    );
    let (stub, metadata) = StubConnection::db2()
        .respond(
            names::GET_TABLE_COLUMNS,
            column_rows(&[("ID", "INTEGER"), ("NOTES", "CLOB")]),
        )
        .respond_containing("COUNT(DISTINCT", profile)
        .into_metadata();

    let options = ContextOptions {
        include_profile: true,
        ..ContextOptions::default()
    };
    let report = TableContextBuilder::new(metadata)
        .build_context("SALES", "ORDERS", &options)
        .await
        .unwrap();

    let profiles = report
        .sections
        .iter()
        .find_map(|s| match s {
            Section::Profile { profiles } => Some(profiles.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].column, "ID");
    assert_eq!(profiles[0].null_percent, 20.0);
    let profile_calls = stub
        .calls()
        .iter()
        .filter(|c| c.contains("COUNT(DISTINCT"))
        .count();
    assert_eq!(profile_calls, 1);
}

#[tokio::test]
async fn test_view_source_only_when_asked() {
    let view_meta = results(
        &["VIEWSCHEMA", "VIEWNAME", "VIEWCHECK", "READONLY", "VALID"],
        vec![vec![text("SALES"), text("OPEN_ORDERS"), text("N"), text("Y"), text("Y")]],
    );
    let definition = results(
        &["TEXT"],
        vec![vec![text("CREATE VIEW SALES.OPEN_ORDERS AS SELECT * FROM SALES.ORDERS")]],
    );
    let (stub, metadata) = StubConnection::db2()
        .respond(names::GET_VIEW_METADATA, view_meta)
        .respond(names::GET_VIEW_DEFINITION, definition)
        .into_metadata();
    let builder = ViewContextBuilder::new(metadata);

    let plain = builder
        .build_context("SALES", "OPEN_ORDERS", &ContextOptions::default())
        .await
        .unwrap();
    assert!(!plain.has_section(|s| matches!(s, Section::Source { .. })));
    assert_eq!(stub.count(names::GET_VIEW_DEFINITION), 0);
    assert_eq!(stub.count(names::GET_VIEW_DEPENDENCIES), 0);

    let options = ContextOptions {
        include_source_code: true,
        ..ContextOptions::default()
    };
    let full = builder
        .build_context("SALES", "OPEN_ORDERS", &options)
        .await
        .unwrap();
    assert!(full.has_section(|s| matches!(s, Section::Source { text } if text.contains("OPEN_ORDERS"))));
    assert_eq!(stub.count(names::GET_VIEW_DEFINITION), 1);
}

#[tokio::test]
async fn test_missing_procedure_is_not_found() {
    let (_stub, metadata) = StubConnection::db2().into_metadata();
    let err = ProcedureContextBuilder::new(metadata)
        .build_context("SALES", "NOPE", &ContextOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::ObjectNotFound(_)));
}

#[tokio::test]
async fn test_procedure_parameters_from_one_overload() {
    let interleaved = parameter_rows(&[
        ("P_ID", "INTEGER", 4, 0, "P", 1, "SQL240105100000100"),
        ("P_ID", "BIGINT", 8, 0, "P", 1, "SQL240105100000200"),
        ("P_STATUS", "CHAR", 1, 0, "P", 2, "SQL240105100000100"),
        ("P_NOTE", "VARCHAR", 40, 0, "P", 2, "SQL240105100000200"),
        ("P_TOTAL", "DECIMAL", 10, 2, "O", 3, "SQL240105100000100"),
    ]);
    let (_stub, metadata) = StubConnection::db2()
        .respond(
            names::GET_PROCEDURE_METADATA,
            routine_metadata("SQL240105100000100", None),
        )
        .respond(names::GET_PROCEDURE_PARAMETERS, interleaved)
        .into_metadata();

    let report = ProcedureContextBuilder::new(metadata)
        .build_context("SALES", "CLOSE_ORDER", &ContextOptions::default())
        .await
        .unwrap();

    let params = report.parameters().unwrap();
    let names: Vec<&str> = params.iter().filter_map(|p| p.name.as_deref()).collect();
    assert_eq!(names, vec!["P_ID", "P_STATUS", "P_TOTAL"]);
    assert_eq!(params[0].data_type, "INTEGER");
    assert_eq!(params[2].data_type, "DECIMAL(10,2)");
    assert_eq!(params[2].mode, ParameterMode::Out);
}

#[tokio::test]
async fn test_procedure_source_and_dependencies_only_when_asked() {
    let source = results(
        &["TEXT"],
        vec![vec![text("CREATE PROCEDURE SALES.CLOSE_ORDER (IN P_ID INTEGER) BEGIN END")]],
    );
    let deps = results(
        &["BSCHEMA", "BNAME", "BTYPE"],
        vec![vec![text("SALES"), text("ORDERS"), text("T")]],
    );
    let (stub, metadata) = StubConnection::db2()
        .respond(
            names::GET_PROCEDURE_METADATA,
            routine_metadata("SQL240105100000100", None),
        )
        .respond(names::GET_PROCEDURE_SOURCE, source)
        .respond(names::GET_PROCEDURE_DEPENDENCIES, deps)
        .into_metadata();
    let builder = ProcedureContextBuilder::new(metadata);

    let plain = builder
        .build_context("SALES", "CLOSE_ORDER", &ContextOptions::default())
        .await
        .unwrap();
    assert!(!plain.has_section(|s| matches!(s, Section::Source { .. })));
    assert_eq!(stub.count(names::GET_PROCEDURE_SOURCE), 0);
    assert_eq!(stub.count(names::GET_PROCEDURE_DEPENDENCIES), 0);

    let options = ContextOptions {
        include_source_code: true,
        include_dependencies: true,
        ..ContextOptions::default()
    };
    let full = builder
        .build_context("SALES", "CLOSE_ORDER", &options)
        .await
        .unwrap();
    assert!(full.has_section(|s| matches!(s, Section::Source { text } if text.contains("CLOSE_ORDER"))));
    assert!(full.has_section(|s| matches!(
        s,
        Section::Dependencies { objects }
            if objects.iter().any(|d| d.object == ObjectIdentifier::new("SALES", "ORDERS"))
    )));
    assert_eq!(stub.count(names::GET_PROCEDURE_SOURCE), 1);
    assert_eq!(stub.count(names::GET_PROCEDURE_DEPENDENCIES), 1);
}

#[tokio::test]
async fn test_function_return_type_and_parameters() {
    let params = parameter_rows(&[
        ("AMOUNT", "DECIMAL", 12, 2, "P", 1, "SQL240105100000300"),
        ("RATE", "DOUBLE", 8, 0, "P", 2, "SQL240105100000300"),
    ]);
    let (stub, metadata) = StubConnection::db2()
        .respond(
            names::GET_FUNCTION_METADATA,
            routine_metadata("SQL240105100000300", Some("DECIMAL")),
        )
        .respond(names::GET_FUNCTION_PARAMETERS, params)
        .into_metadata();

    let report = FunctionContextBuilder::new(metadata)
        .build_context("SALES", "NET_PRICE", &ContextOptions::default())
        .await
        .unwrap();

    assert!(report.has_section(|s| matches!(
        s,
        Section::Metadata { entries }
            if entries.iter().any(|e| e.label == "Return Type" && e.value == "DECIMAL")
                && entries.iter().any(|e| e.label == "Function Type" && e.value == "SCALAR")
    )));
    let ordinals: Vec<i64> = report.parameters().unwrap().iter().map(|p| p.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2]);
    assert_eq!(report.parameters().unwrap()[0].data_type, "DECIMAL(12,2)");
    assert_eq!(stub.count(names::GET_FUNCTION_SOURCE), 0);
    assert_eq!(stub.count(names::GET_FUNCTION_DEPENDENCIES), 0);
}

#[tokio::test]
async fn test_package_with_many_statements_is_capped() {
    let (_stub, metadata) = StubConnection::db2()
        .respond(names::GET_PACKAGE_METADATA, package_metadata())
        .respond(names::PACKAGE_GET_STATEMENTS, package_statements(15))
        .into_metadata();

    let report = PackageContextBuilder::new(metadata)
        .build_context("SCHEMA1", "PKG1", &ContextOptions::default())
        .await
        .unwrap();

    assert!(report.has_section(|s| matches!(
        s,
        Section::Statements { total: 15, shown } if shown.len() == 10
    )));
    assert!(report.to_markdown().contains("showing first 10 of 15 statements"));
}

#[tokio::test]
async fn test_package_with_few_statements_shows_all() {
    let (_stub, metadata) = StubConnection::db2()
        .respond(names::GET_PACKAGE_METADATA, package_metadata())
        .respond(names::PACKAGE_GET_STATEMENTS, package_statements(3))
        .into_metadata();

    let report = PackageContextBuilder::new(metadata)
        .build_context("SCHEMA1", "PKG1", &ContextOptions::default())
        .await
        .unwrap();

    assert!(report.has_section(|s| matches!(
        s,
        Section::Statements { total: 3, shown } if shown.len() == 3
    )));
    assert!(!report.to_markdown().contains("showing first"));
}

#[tokio::test]
async fn test_package_dependencies_from_statements() {
    let statements = results(
        &["STMTNO", "SECTNO", "SEQNO", "TEXT"],
        vec![
            vec![int(1), int(1), int(0), text("SELECT * FROM SCHEMA1.ORDERS o ")],
            vec![
                int(1),
                int(1),
                int(1),
                text("JOIN SCHEMA1.CUSTOMERS c ON o.CID = c.ID"),
            ],
        ],
    );
    let (_stub, metadata) = StubConnection::db2()
        .respond(names::GET_PACKAGE_METADATA, package_metadata())
        .respond(names::PACKAGE_GET_STATEMENTS, statements)
        .into_metadata();

    let options = ContextOptions {
        include_dependencies: true,
        ..ContextOptions::default()
    };
    let report = PackageContextBuilder::new(metadata)
        .build_context("SCHEMA1", "PKG1", &options)
        .await
        .unwrap();

    let deps = report
        .sections
        .iter()
        .find_map(|s| match s {
            Section::PackageDependencies { dependencies } => Some(dependencies.clone()),
            _ => None,
        })
        .unwrap();
    let tables: Vec<String> = deps.tables_used.iter().map(|t| t.to_string()).collect();
    assert_eq!(tables, vec!["SCHEMA1.CUSTOMERS", "SCHEMA1.ORDERS"]);
    assert!(deps.procedures_called.is_empty());
    assert!(deps.functions_called.is_empty());
}

#[tokio::test]
async fn test_unrelated_tables_have_no_edge() {
    let edges = results(
        RELATIONSHIP_COLUMNS,
        vec![relationship_row(
            "FK_CUST",
            ("SALES", "ORDERS"),
            ("SALES", "CUSTOMERS"),
            "CUST_ID",
            "ID",
        )],
    );
    let (_stub, metadata) = StubConnection::db2()
        .respond(names::GET_TABLE_RELATIONSHIPS, edges)
        .respond(names::GET_TABLE_COLUMNS, column_rows(&[("ID", "INTEGER")]))
        .into_metadata();
    let builder = RelationshipContextBuilder::new(metadata);

    let unrelated = ContextOptions {
        target: Some(ObjectIdentifier::new("SALES", "PRODUCTS")),
        ..ContextOptions::default()
    };
    let report = builder
        .build_context("SALES", "ORDERS", &unrelated)
        .await
        .unwrap();
    assert!(report.relationships().is_none());
    assert!(report.has_section(|s| matches!(s, Section::NoRelationship { .. })));

    let related = ContextOptions {
        target: Some(ObjectIdentifier::new("SALES", "CUSTOMERS")),
        ..ContextOptions::default()
    };
    let report = builder
        .build_context("SALES", "ORDERS", &related)
        .await
        .unwrap();
    assert_eq!(report.relationships().unwrap().len(), 1);
    assert!(report.has_section(|s| matches!(s, Section::Diagram { .. })));
}

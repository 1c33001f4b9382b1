//! Common test utilities and helpers
//!
//! Shared test infrastructure for integration tests: a scripted connection
//! that answers catalog statements by name and records every call, plus
//! small builders for result sets.

#![allow(dead_code)]

use async_trait::async_trait;
use dbcontext::catalog::StatementCatalog;
use dbcontext::db::{
    CellValue, ColumnDef, Connection, DataType, Page, Provider, QueryResults, Row, SqlParam,
};
use dbcontext::error::{DbError, DbResult};
use dbcontext::metadata::MetadataProvider;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Statement set the DB2 stubs resolve against
pub const DB2_VERSION: &str = "11.5";

/// Built-in statement catalog
pub fn builtin_catalog() -> Arc<StatementCatalog> {
    Arc::new(StatementCatalog::builtin().expect("built-in catalog parses"))
}

/// Connection that answers scripted SQL and counts calls
pub struct StubConnection {
    provider: Provider,
    catalog: Arc<StatementCatalog>,
    version: String,
    /// (SQL or fragment, canned result)
    responses: Vec<(String, QueryResults)>,
    /// SQL that fails with `QueryFailed`
    failures: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl StubConnection {
    pub fn new(provider: Provider, catalog: Arc<StatementCatalog>, version: &str) -> Self {
        Self {
            provider,
            catalog,
            version: version.to_string(),
            responses: Vec::new(),
            failures: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// DB2 stub over the built-in catalog
    pub fn db2() -> Self {
        Self::new(Provider::Db2, builtin_catalog(), DB2_VERSION)
    }

    fn statement_sql(&self, name: &str) -> String {
        self.catalog
            .get_statement(self.provider, &self.version, name)
            .unwrap_or_else(|e| panic!("stub refers to unknown statement: {}", e))
            .sql
            .clone()
    }

    /// Answer the named catalog statement with `results`
    pub fn respond(mut self, statement: &str, results: QueryResults) -> Self {
        let sql = self.statement_sql(statement);
        self.responses.push((sql, results));
        self
    }

    /// Answer any SQL containing `fragment` (generated queries)
    pub fn respond_containing(mut self, fragment: &str, results: QueryResults) -> Self {
        self.responses.push((fragment.to_string(), results));
        self
    }

    /// Make the named catalog statement fail
    pub fn fail(mut self, statement: &str) -> Self {
        let sql = self.statement_sql(statement);
        self.failures.push(sql);
        self
    }

    /// Every SQL text executed so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// How many times the named catalog statement was executed
    pub fn count(&self, statement: &str) -> usize {
        let sql = self.statement_sql(statement);
        self.calls.lock().unwrap().iter().filter(|c| **c == sql).count()
    }

    /// Metadata provider over this stub, pinned to the stub's version
    pub fn into_metadata(self) -> (Arc<StubConnection>, MetadataProvider) {
        let catalog = Arc::clone(&self.catalog);
        let version = self.version.clone();
        let stub = Arc::new(self);
        let conn: Arc<dyn Connection> = stub.clone();
        (stub, MetadataProvider::new(conn, catalog, version))
    }
}

#[async_trait]
impl Connection for StubConnection {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn execute_query(
        &self,
        sql: &str,
        _params: &[SqlParam],
        page: Page,
    ) -> DbResult<QueryResults> {
        self.calls.lock().unwrap().push(sql.to_string());

        if self.failures.iter().any(|f| f == sql) {
            return Err(DbError::QueryFailed("scripted failure".to_string()));
        }

        let canned = self
            .responses
            .iter()
            .find(|(key, _)| key == sql)
            .or_else(|| self.responses.iter().find(|(key, _)| sql.contains(key.as_str())));

        Ok(match canned {
            Some((_, results)) => {
                let rows: Vec<Row> = results
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| page.contains(*i))
                    .map(|(_, r)| r.clone())
                    .collect();
                let count = rows.len();
                QueryResults::new(results.columns.clone(), rows, Duration::ZERO, count)
            }
            None => QueryResults::empty(),
        })
    }

    async fn execute_non_query(&self, sql: &str, _params: &[SqlParam]) -> DbResult<u64> {
        self.calls.lock().unwrap().push(sql.to_string());
        Ok(0)
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn reconnect(&mut self) -> DbResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        Ok(())
    }
}

/// Result set with text-typed columns
pub fn results(columns: &[&str], rows: Vec<Vec<CellValue>>) -> QueryResults {
    let count = rows.len();
    QueryResults::new(
        columns
            .iter()
            .map(|name| ColumnDef {
                name: name.to_string(),
                data_type: DataType::Text,
            })
            .collect(),
        rows.into_iter().map(|values| Row { values }).collect(),
        Duration::ZERO,
        count,
    )
}

pub fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

pub fn int(i: i64) -> CellValue {
    CellValue::Integer(i)
}

pub fn null() -> CellValue {
    CellValue::Null
}

/// `GetTableColumns_All` rows for `(name, type)` pairs, numbered from 0
pub fn column_rows(columns: &[(&str, &str)]) -> QueryResults {
    results(
        &[
            "COLNAME", "COLNO", "TYPENAME", "LENGTH", "SCALE", "NULLS", "DEFAULT", "REMARKS",
            "IDENTITY",
        ],
        columns
            .iter()
            .enumerate()
            .map(|(i, (name, ty))| {
                vec![
                    text(name),
                    int(i as i64),
                    text(ty),
                    int(4),
                    int(0),
                    text("N"),
                    null(),
                    null(),
                    text("N"),
                ]
            })
            .collect(),
    )
}

/// `GetTableRelationships` row
pub fn relationship_row(
    constname: &str,
    child: (&str, &str),
    parent: (&str, &str),
    fk_cols: &str,
    pk_cols: &str,
) -> Vec<CellValue> {
    vec![
        text(constname),
        text(child.0),
        text(child.1),
        text(parent.0),
        text(parent.1),
        text(fk_cols),
        text(pk_cols),
        text("A"),
        text("A"),
    ]
}

pub const RELATIONSHIP_COLUMNS: &[&str] = &[
    "CONSTNAME",
    "TABSCHEMA",
    "TABNAME",
    "REFTABSCHEMA",
    "REFTABNAME",
    "FK_COLNAMES",
    "PK_COLNAMES",
    "DELETERULE",
    "UPDATERULE",
];

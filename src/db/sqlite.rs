//! SQLite connection
//!
//! rusqlite is synchronous, so every call hops onto the blocking pool and
//! the handle lives behind a mutex.

use crate::db::provider::{Connection, Page, Provider, SqlParam};
use crate::db::types::{CellValue, ColumnDef, DataType, QueryResults, Row};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// SQLite connection
pub struct SqliteConnection {
    /// Open handle (`None` once closed)
    conn: Arc<Mutex<Option<rusqlite::Connection>>>,
    /// File path or `:memory:`
    path: String,
}

impl SqliteConnection {
    /// Open a database file, or an in-memory database for `:memory:`
    pub async fn open(path: &str) -> DbResult<Self> {
        let conn = open_handle(path.to_string()).await?;
        tracing::debug!(path, "opened sqlite database");
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: path.to_string(),
        })
    }

    /// Run a closure against the open handle on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> DbResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| DbError::QueryFailed("sqlite handle poisoned".to_string()))?;
            let handle = guard.as_ref().ok_or(DbError::NotConnected)?;
            f(handle)
        })
        .await
        .map_err(|e| DbError::QueryFailed(format!("sqlite worker failed: {}", e)))?
    }
}

async fn open_handle(path: String) -> DbResult<rusqlite::Connection> {
    tokio::task::spawn_blocking(move || {
        if path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))
    })
    .await
    .map_err(|e| DbError::ConnectionFailed(format!("sqlite worker failed: {}", e)))?
}

fn to_values(params: &[SqlParam]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            SqlParam::Text(s) => Value::Text(s.clone()),
            SqlParam::Integer(i) => Value::Integer(*i),
            SqlParam::Null => Value::Null,
        })
        .collect()
}

#[async_trait]
impl Connection for SqliteConnection {
    fn provider(&self) -> Provider {
        Provider::Sqlite
    }

    async fn execute_query(
        &self,
        sql: &str,
        params: &[SqlParam],
        page: Page,
    ) -> DbResult<QueryResults> {
        let sql = sql.to_string();
        let values = to_values(params);
        self.with_conn(move |conn| {
            let start = Instant::now();
            let map_err = |e: rusqlite::Error| DbError::QueryFailed(e.to_string());

            let mut stmt = conn.prepare(&sql).map_err(map_err)?;
            let columns: Vec<ColumnDef> = stmt
                .columns()
                .iter()
                .map(|c| ColumnDef {
                    name: c.name().to_string(),
                    data_type: decl_type_to_datatype(c.decl_type()),
                })
                .collect();

            let mut rows = Vec::new();
            let mut row_count = 0;
            let mut result = stmt
                .query(rusqlite::params_from_iter(values))
                .map_err(map_err)?;
            while let Some(row) = result.next().map_err(map_err)? {
                if page.contains(row_count) {
                    let mut cells = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        cells.push(cell_from_ref(row.get_ref(i).map_err(map_err)?));
                    }
                    rows.push(Row { values: cells });
                }
                row_count += 1;
            }

            Ok(QueryResults::new(columns, rows, start.elapsed(), row_count))
        })
        .await
    }

    async fn execute_non_query(&self, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
        let sql = sql.to_string();
        let values = to_values(params);
        self.with_conn(move |conn| {
            conn.execute(&sql, rusqlite::params_from_iter(values))
                .map(|n| n as u64)
                .map_err(|e| DbError::QueryFailed(e.to_string()))
        })
        .await
    }

    async fn is_connected(&self) -> bool {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| DbError::QueryFailed(e.to_string()))
        })
        .await
        .is_ok()
    }

    async fn reconnect(&mut self) -> DbResult<()> {
        let handle = open_handle(self.path.clone()).await?;
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| DbError::ConnectionFailed("sqlite handle poisoned".to_string()))?;
        *guard = Some(handle);
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| DbError::QueryFailed("sqlite handle poisoned".to_string()))?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| DbError::QueryFailed(e.to_string()))?;
        }
        Ok(())
    }
}

/// Map a declared column type to our DataType using SQLite affinity rules
fn decl_type_to_datatype(decl: Option<&str>) -> DataType {
    let Some(decl) = decl else {
        return DataType::Unknown(String::new());
    };
    let upper = decl.to_ascii_uppercase();
    if upper.contains("INT") {
        DataType::BigInt
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        DataType::Text
    } else if upper.contains("BLOB") {
        DataType::Bytea
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        DataType::Double
    } else if upper.contains("BOOL") {
        DataType::Boolean
    } else if upper.contains("DATE") || upper.contains("TIME") {
        DataType::Timestamp
    } else {
        DataType::Numeric
    }
}

fn cell_from_ref(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => CellValue::Binary(b.to_vec()),
    }
}

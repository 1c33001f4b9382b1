//! Connection capability
//!
//! Defines the interface every database backend implements. Everything
//! above this layer (metadata provider, context builders, collection)
//! talks to a `dyn Connection`, which allows:
//! - Multiple catalog dialects (DB2, PostgreSQL, SQLite)
//! - Easy testing with scripted implementations
//! - Consistent error handling

use crate::db::types::{CellValue, QueryResults};
use crate::error::DbResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database product a connection talks to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Db2,
    #[default]
    #[serde(alias = "postgres")]
    Postgresql,
    Sqlite,
}

impl Provider {
    /// Catalog name used in statement files and reports
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Db2 => "DB2",
            Provider::Postgresql => "POSTGRESQL",
            Provider::Sqlite => "SQLITE",
        }
    }

    /// Lowercase prefix for snapshot and resource file names
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Provider::Db2 => "db2",
            Provider::Postgresql => "postgresql",
            Provider::Sqlite => "sqlite",
        }
    }

    /// Fold an unquoted identifier the way the catalog stores it
    pub fn fold_identifier(&self, ident: &str) -> String {
        match self {
            Provider::Db2 => ident.to_uppercase(),
            Provider::Postgresql => ident.to_lowercase(),
            Provider::Sqlite => ident.to_string(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "db2" => Ok(Provider::Db2),
            "postgresql" | "postgres" | "pg" => Ok(Provider::Postgresql),
            "sqlite" | "sqlite3" => Ok(Provider::Sqlite),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// A bound statement parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Null,
}

impl SqlParam {
    /// Parameter rendered for log lines and error context
    pub fn display(&self) -> String {
        match self {
            SqlParam::Text(s) => s.clone(),
            SqlParam::Integer(i) => i.to_string(),
            SqlParam::Null => "NULL".to_string(),
        }
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<&String> for SqlParam {
    fn from(value: &String) -> Self {
        SqlParam::Text(value.clone())
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Integer(value)
    }
}

/// Row window applied to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    /// Maximum number of rows to materialize (`None` = all)
    pub max_rows: Option<usize>,
    /// Rows to skip before materializing
    pub offset: usize,
}

impl Page {
    /// Every row
    pub fn all() -> Self {
        Self::default()
    }

    /// The first `n` rows
    pub fn first(n: usize) -> Self {
        Self {
            max_rows: Some(n),
            offset: 0,
        }
    }

    /// Whether the row at `index` (0-based, pre-offset) falls in this page
    pub fn contains(&self, index: usize) -> bool {
        if index < self.offset {
            return false;
        }
        match self.max_rows {
            Some(max) => index - self.offset < max,
            None => true,
        }
    }
}

/// Connection capability trait
///
/// All backends implement this trait. The metadata layer only ever issues
/// read statements through it; `execute_non_query` exists for callers that
/// own the connection (fixtures, tooling).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Which catalog dialect this connection speaks
    fn provider(&self) -> Provider;

    /// Execute a SQL query with bound parameters
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` if query execution fails
    /// Returns `DbError::NotConnected` if the connection was closed
    /// Returns `DbError::Timeout` if the command timeout elapsed
    async fn execute_query(
        &self,
        sql: &str,
        params: &[SqlParam],
        page: Page,
    ) -> DbResult<QueryResults>;

    /// Execute a query and return the first column of the first row
    async fn execute_scalar(&self, sql: &str, params: &[SqlParam]) -> DbResult<Option<CellValue>> {
        let results = self.execute_query(sql, params, Page::first(1)).await?;
        Ok(results
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.values.into_iter().next())
            .filter(|v| !v.is_null()))
    }

    /// Execute a statement and return the affected row count
    async fn execute_non_query(&self, sql: &str, params: &[SqlParam]) -> DbResult<u64>;

    /// Check if the connection is still alive
    ///
    /// This should be a lightweight check
    async fn is_connected(&self) -> bool;

    /// Re-establish the connection with the original settings
    async fn reconnect(&mut self) -> DbResult<()>;

    /// Close the connection
    async fn close(&mut self) -> DbResult<()>;

    /// Reconnect only if the connection has dropped
    async fn ensure_connected(&mut self) -> DbResult<()> {
        if self.is_connected().await {
            return Ok(());
        }
        tracing::info!(provider = %self.provider(), "connection lost, reconnecting");
        self.reconnect().await
    }
}

//! Database abstraction layer
//!
//! This module provides a trait-based abstraction over catalog access,
//! allowing for multiple database backends and easy testing with stubs.

pub mod postgres;
pub mod provider;
pub mod sqlite;
pub mod types;

use crate::config::ConnectionConfig;
use crate::error::{ConfigError, Result};
use std::sync::Arc;
use std::time::Duration;

// Re-export main types
pub use provider::{Connection, Page, Provider, SqlParam};
pub use types::{CellValue, ColumnDef, DataType, QueryResults, Row, RowRef};

/// Open a connection for a profile.
///
/// `default_timeout` applies when the profile does not set its own.
pub async fn connect(
    config: &ConnectionConfig,
    default_timeout: Duration,
) -> Result<Arc<dyn Connection>> {
    let timeout = config
        .command_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(default_timeout);
    match config.provider {
        Provider::Postgresql => Ok(Arc::new(
            postgres::PostgresConnection::connect(config, timeout).await?,
        )),
        Provider::Sqlite => Ok(Arc::new(
            sqlite::SqliteConnection::open(&config.database).await?,
        )),
        Provider::Db2 => Err(ConfigError::UnsupportedProvider(Provider::Db2.to_string()).into()),
    }
}

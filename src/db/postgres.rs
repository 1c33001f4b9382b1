//! PostgreSQL connection
//!
//! Concrete implementation using tokio-postgres.

use crate::config::ConnectionConfig;
use crate::config::connections::SslMode;
use crate::db::provider::{Connection, Page, Provider, SqlParam};
use crate::db::types::{CellValue, ColumnDef, DataType, QueryResults, Row};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use futures::{TryStreamExt, pin_mut};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::Client;
use tokio_postgres::types::{ToSql, Type};

/// PostgreSQL connection
pub struct PostgresConnection {
    /// The tokio-postgres client (`None` once closed)
    client: Option<Client>,
    /// Settings used to (re)connect
    config: ConnectionConfig,
    /// Per-command timeout
    timeout: Duration,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database.
    ///
    /// The background connection task logs when the session drops
    /// (e.g. server restart, idle timeout); `is_connected` reports it.
    pub async fn connect(config: &ConnectionConfig, timeout: Duration) -> DbResult<Self> {
        let client = open_client(config).await?;
        tracing::debug!(host = %config.host, database = %config.database, "connected to postgres");
        Ok(Self {
            client: Some(client),
            config: config.clone(),
            timeout,
        })
    }

    fn client(&self) -> DbResult<&Client> {
        self.client
            .as_ref()
            .filter(|c| !c.is_closed())
            .ok_or(DbError::NotConnected)
    }

    async fn with_timeout<T, F>(&self, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DbError::Timeout(self.timeout.as_secs()))?
    }
}

async fn open_client(config: &ConnectionConfig) -> DbResult<Client> {
    let conn_string = config.connection_string_with_password();
    let client = match config.ssl_mode {
        SslMode::Disable => {
            let (client, connection) = tokio_postgres::connect(&conn_string, tokio_postgres::NoTls)
                .await
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "postgres connection lost");
                }
            });
            client
        }
        SslMode::Prefer | SslMode::Require => {
            let tls_config = make_tls_config();
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
            let (client, connection) = tokio_postgres::connect(&conn_string, tls)
                .await
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "postgres connection lost");
                }
            });
            client
        }
    };
    Ok(client)
}

/// Box parameters as driver values, preserving call order
fn bind_params(params: &[SqlParam]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    params
        .iter()
        .map(|p| -> Box<dyn ToSql + Sync + Send> {
            match p {
                SqlParam::Text(s) => Box::new(s.clone()),
                SqlParam::Integer(i) => Box::new(*i),
                SqlParam::Null => Box::new(Option::<String>::None),
            }
        })
        .collect()
}

#[async_trait]
impl Connection for PostgresConnection {
    fn provider(&self) -> Provider {
        Provider::Postgresql
    }

    async fn execute_query(
        &self,
        sql: &str,
        params: &[SqlParam],
        page: Page,
    ) -> DbResult<QueryResults> {
        let client = self.client()?;
        let start = std::time::Instant::now();

        self.with_timeout(async {
            let stmt = client
                .prepare(sql)
                .await
                .map_err(|e| DbError::QueryFailed(e.to_string()))?;

            let columns: Vec<ColumnDef> = stmt
                .columns()
                .iter()
                .map(|col| ColumnDef {
                    name: col.name().to_string(),
                    data_type: pg_type_to_datatype(col.type_()),
                })
                .collect();

            let bound = bind_params(params);
            let stream = client
                .query_raw(&stmt, bound.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)))
                .await
                .map_err(|e| DbError::QueryFailed(e.to_string()))?;
            pin_mut!(stream);

            // Rows outside the page are counted but never converted
            let mut rows = Vec::new();
            let mut row_count = 0;
            while let Some(pg_row) = stream
                .try_next()
                .await
                .map_err(|e| DbError::QueryFailed(e.to_string()))?
            {
                if page.contains(row_count) {
                    let values = columns
                        .iter()
                        .enumerate()
                        .map(|(i, col_def)| extract_cell_value(&pg_row, i, &col_def.data_type))
                        .collect();
                    rows.push(Row { values });
                }
                row_count += 1;
            }

            Ok(QueryResults::new(columns, rows, start.elapsed(), row_count))
        })
        .await
    }

    async fn execute_non_query(&self, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
        let client = self.client()?;
        self.with_timeout(async {
            let bound = bind_params(params);
            let refs: Vec<&(dyn ToSql + Sync)> = bound
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            client
                .execute(sql, &refs)
                .await
                .map_err(|e| DbError::QueryFailed(e.to_string()))
        })
        .await
    }

    async fn is_connected(&self) -> bool {
        match self.client() {
            Ok(client) => client.simple_query("SELECT 1").await.is_ok(),
            Err(_) => false,
        }
    }

    async fn reconnect(&mut self) -> DbResult<()> {
        self.client = Some(open_client(&self.config).await?);
        Ok(())
    }

    async fn close(&mut self) -> DbResult<()> {
        // Dropping the client ends the background connection task
        if self.client.take().is_some() {
            tracing::debug!(database = %self.config.database, "closed postgres connection");
        }
        Ok(())
    }
}

/// Map tokio_postgres Type to our DataType enum
fn pg_type_to_datatype(pg_type: &Type) -> DataType {
    match *pg_type {
        Type::INT2 => DataType::SmallInt,
        Type::INT4 | Type::OID => DataType::Integer,
        Type::INT8 => DataType::BigInt,
        Type::FLOAT4 => DataType::Real,
        Type::FLOAT8 => DataType::Double,
        Type::NUMERIC => DataType::Numeric,
        Type::TEXT | Type::NAME => DataType::Text,
        Type::VARCHAR => DataType::Varchar(None),
        Type::CHAR | Type::BPCHAR => DataType::Char(None),
        Type::BOOL => DataType::Boolean,
        Type::DATE => DataType::Date,
        Type::TIME => DataType::Time,
        Type::TIMESTAMP => DataType::Timestamp,
        Type::TIMESTAMPTZ => DataType::TimestampTz,
        Type::INTERVAL => DataType::Interval,
        Type::JSON => DataType::Json,
        Type::JSONB => DataType::Jsonb,
        Type::BYTEA => DataType::Bytea,
        Type::UUID => DataType::Uuid,
        // Array types
        Type::BOOL_ARRAY => DataType::Array(Box::new(DataType::Boolean)),
        Type::INT2_ARRAY => DataType::Array(Box::new(DataType::SmallInt)),
        Type::INT4_ARRAY => DataType::Array(Box::new(DataType::Integer)),
        Type::INT8_ARRAY => DataType::Array(Box::new(DataType::BigInt)),
        Type::FLOAT8_ARRAY => DataType::Array(Box::new(DataType::Double)),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            DataType::Array(Box::new(DataType::Text))
        }
        _ => DataType::Unknown(pg_type.name().to_string()),
    }
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Extract a cell value from a tokio_postgres Row based on the column's DataType.
///
/// Tries the expected type first, then falls back to a string representation.
/// Returns CellValue::Null only for actual NULL values.
fn extract_cell_value(row: &tokio_postgres::Row, idx: usize, data_type: &DataType) -> CellValue {
    match data_type {
        DataType::SmallInt => match row.try_get::<_, Option<i16>>(idx) {
            Ok(Some(v)) => CellValue::Integer(v as i64),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Integer => match row.try_get::<_, Option<i32>>(idx) {
            Ok(Some(v)) => CellValue::Integer(v as i64),
            Ok(None) => CellValue::Null,
            Err(_) => match row.try_get::<_, Option<u32>>(idx) {
                Ok(Some(v)) => CellValue::Integer(v as i64),
                Ok(None) => CellValue::Null,
                Err(_) => try_as_string(row, idx),
            },
        },
        DataType::BigInt => match row.try_get::<_, Option<i64>>(idx) {
            Ok(Some(v)) => CellValue::Integer(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Real => match row.try_get::<_, Option<f32>>(idx) {
            Ok(Some(v)) => CellValue::Float(v as f64),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Double => match row.try_get::<_, Option<f64>>(idx) {
            Ok(Some(v)) => CellValue::Float(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Numeric => match row.try_get::<_, Option<Decimal>>(idx) {
            Ok(Some(v)) => CellValue::Text(v.to_string()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Boolean => match row.try_get::<_, Option<bool>>(idx) {
            Ok(Some(v)) => CellValue::Boolean(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Json | DataType::Jsonb => {
            match row.try_get::<_, Option<serde_json::Value>>(idx) {
                Ok(Some(v)) => CellValue::Json(v),
                Ok(None) => CellValue::Null,
                Err(_) => try_as_string(row, idx),
            }
        }
        DataType::Bytea => match row.try_get::<_, Option<Vec<u8>>>(idx) {
            Ok(Some(v)) => CellValue::Binary(v),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Uuid => match row.try_get::<_, Option<uuid::Uuid>>(idx) {
            Ok(Some(v)) => CellValue::Uuid(v.to_string()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Array(inner) => extract_array_value(row, idx, inner),
        DataType::Timestamp
        | DataType::TimestampTz
        | DataType::Date
        | DataType::Time
        | DataType::Interval => {
            if let Ok(Some(v)) = row.try_get::<_, Option<chrono::NaiveDateTime>>(idx) {
                return CellValue::DateTime(v.to_string());
            }
            if let Ok(Some(v)) = row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx) {
                return CellValue::DateTime(v.to_rfc3339());
            }
            if let Ok(Some(v)) = row.try_get::<_, Option<chrono::NaiveDate>>(idx) {
                return CellValue::DateTime(v.to_string());
            }
            if let Ok(Some(v)) = row.try_get::<_, Option<chrono::NaiveTime>>(idx) {
                return CellValue::DateTime(v.to_string());
            }
            try_as_string(row, idx)
        }
        // Text types and fallback for unknown types
        _ => try_as_string(row, idx),
    }
}

/// Extract an array value from a tokio_postgres Row.
fn extract_array_value(row: &tokio_postgres::Row, idx: usize, inner: &DataType) -> CellValue {
    match inner {
        DataType::Text | DataType::Varchar(_) | DataType::Char(_) => {
            match row.try_get::<_, Option<Vec<String>>>(idx) {
                Ok(Some(v)) => CellValue::Array(v.into_iter().map(CellValue::Text).collect()),
                Ok(None) => CellValue::Null,
                Err(_) => try_as_string(row, idx),
            }
        }
        DataType::SmallInt => match row.try_get::<_, Option<Vec<i16>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|n| CellValue::Integer(n as i64))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Integer => match row.try_get::<_, Option<Vec<i32>>>(idx) {
            Ok(Some(v)) => CellValue::Array(
                v.into_iter()
                    .map(|n| CellValue::Integer(n as i64))
                    .collect(),
            ),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::BigInt => match row.try_get::<_, Option<Vec<i64>>>(idx) {
            Ok(Some(v)) => CellValue::Array(v.into_iter().map(CellValue::Integer).collect()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Double => match row.try_get::<_, Option<Vec<f64>>>(idx) {
            Ok(Some(v)) => CellValue::Array(v.into_iter().map(CellValue::Float).collect()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        DataType::Boolean => match row.try_get::<_, Option<Vec<bool>>>(idx) {
            Ok(Some(v)) => CellValue::Array(v.into_iter().map(CellValue::Boolean).collect()),
            Ok(None) => CellValue::Null,
            Err(_) => try_as_string(row, idx),
        },
        _ => try_as_string(row, idx),
    }
}

/// Try to extract a value as a string (fallback for type mismatches).
///
/// When even the string fallback fails, includes the postgres type name
/// so the report shows what type couldn't be displayed.
fn try_as_string(row: &tokio_postgres::Row, idx: usize) -> CellValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => CellValue::Text(v),
        Ok(None) => CellValue::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            CellValue::Text(format!("<unable to display: {}>", type_name))
        }
    }
}

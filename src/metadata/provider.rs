//! Metadata provider
//!
//! Runs named catalog statements against a connection. The provider owns
//! the (provider, version) pair used for lookups, binds parameters in call
//! order, and attaches the logical name and object to every failure.

use crate::catalog::{StatementCatalog, StatementTemplate, names};
use crate::db::{CellValue, Connection, Page, Provider, QueryResults, SqlParam};
use crate::error::{CatalogError, DbError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Version reported when the server cannot be asked
pub const UNKNOWN_VERSION: &str = "unknown";

static VERSION_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d+)").unwrap());

/// Executes catalog statements for one connection
#[derive(Clone)]
pub struct MetadataProvider {
    connection: Arc<dyn Connection>,
    catalog: Arc<StatementCatalog>,
    /// Statement set used for lookups
    version: String,
    /// Cleaned server version, when it was detected
    server_version: Option<String>,
}

impl MetadataProvider {
    /// Provider pinned to a known statement set version
    pub fn new(
        connection: Arc<dyn Connection>,
        catalog: Arc<StatementCatalog>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            catalog,
            version: version.into(),
            server_version: None,
        }
    }

    /// Ask the server for its version and pick the matching statement set
    pub async fn for_connection(
        connection: Arc<dyn Connection>,
        catalog: Arc<StatementCatalog>,
    ) -> Result<Self> {
        let provider = connection.provider();
        let newest = catalog.resolve_version(provider, None)?;
        let mut metadata = Self::new(connection, catalog, newest);

        let detected = metadata.detect_server_version().await;
        let version = metadata.catalog.resolve_version(provider, Some(&detected))?;
        tracing::info!(
            provider = %provider,
            server_version = %detected,
            statement_set = %version,
            "resolved catalog statements"
        );

        metadata.version = version;
        metadata.server_version = Some(detected);
        Ok(metadata)
    }

    pub fn provider(&self) -> Provider {
        self.connection.provider()
    }

    /// Statement set version in use
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Server version used to name snapshot files
    pub fn server_version(&self) -> &str {
        self.server_version.as_deref().unwrap_or(&self.version)
    }

    pub fn catalog(&self) -> &StatementCatalog {
        &self.catalog
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Whether an optional statement exists for this provider and version
    pub fn supports(&self, name: &str) -> bool {
        self.catalog.contains(self.provider(), &self.version, name)
    }

    /// Look up a template and check the call site's parameter count
    fn prepare(
        &self,
        name: &str,
        params: &[(&str, SqlParam)],
    ) -> Result<(&StatementTemplate, Vec<SqlParam>)> {
        let template = self
            .catalog
            .get_statement(self.provider(), &self.version, name)?;
        if template.parameters.len() != params.len() {
            return Err(CatalogError::ParameterMismatch {
                name: name.to_string(),
                expected: template.parameters.len(),
                actual: params.len(),
            }
            .into());
        }
        Ok((template, params.iter().map(|(_, v)| v.clone()).collect()))
    }

    /// Run a catalog statement and return every row
    pub async fn execute_metadata_query(
        &self,
        name: &str,
        params: &[(&str, SqlParam)],
    ) -> Result<QueryResults> {
        self.execute_metadata_page(name, params, Page::all()).await
    }

    /// Run a catalog statement and keep only one page of rows
    pub async fn execute_metadata_page(
        &self,
        name: &str,
        params: &[(&str, SqlParam)],
        page: Page,
    ) -> Result<QueryResults> {
        let (template, values) = self.prepare(name, params)?;
        tracing::debug!(statement = name, object = %describe_object(params), "catalog query");

        self.connection
            .execute_query(&template.sql, &values, page)
            .await
            .map_err(|source| statement_error(name, params, source).into())
    }

    /// Run a catalog statement and return its first value, if any
    pub async fn execute_scalar(
        &self,
        name: &str,
        params: &[(&str, SqlParam)],
    ) -> Result<Option<CellValue>> {
        let (template, values) = self.prepare(name, params)?;
        tracing::debug!(statement = name, object = %describe_object(params), "catalog scalar");

        self.connection
            .execute_scalar(&template.sql, &values)
            .await
            .map_err(|source| statement_error(name, params, source).into())
    }

    /// Run generated read-only SQL (data samples, column profiles).
    ///
    /// Callers are responsible for quoting every identifier in `sql`.
    pub async fn execute_generated(
        &self,
        label: &str,
        object: &str,
        sql: &str,
        page: Page,
    ) -> Result<QueryResults> {
        tracing::debug!(statement = label, object, "generated query");
        self.connection
            .execute_query(sql, &[], page)
            .await
            .map_err(|source| {
                DbError::Statement {
                    statement: label.to_string(),
                    object: object.to_string(),
                    source: Box::new(source),
                }
                .into()
            })
    }

    /// Cleaned server version, or `"unknown"` when the probe fails
    pub async fn detect_server_version(&self) -> String {
        match self.execute_scalar(names::GET_SERVER_VERSION, &[]).await {
            Ok(Some(value)) => clean_version(&value.display_string(usize::MAX)),
            Ok(None) => {
                tracing::warn!(provider = %self.provider(), "server returned no version");
                UNKNOWN_VERSION.to_string()
            }
            Err(e) => {
                tracing::warn!(provider = %self.provider(), error = %e, "version probe failed");
                UNKNOWN_VERSION.to_string()
            }
        }
    }
}

fn statement_error(name: &str, params: &[(&str, SqlParam)], source: DbError) -> DbError {
    DbError::Statement {
        statement: name.to_string(),
        object: describe_object(params),
        source: Box::new(source),
    }
}

/// `SCHEMA.NAME` from the leading parameters, for diagnostics
fn describe_object(params: &[(&str, SqlParam)]) -> String {
    if params.is_empty() {
        return "catalog".to_string();
    }
    params
        .iter()
        .take(2)
        .map(|(_, v)| v.display())
        .collect::<Vec<_>>()
        .join(".")
}

/// Reduce a raw version string to something usable in a file name
pub fn clean_version(raw: &str) -> String {
    if let Some(m) = VERSION_NUMBER.captures(raw).and_then(|c| c.get(1)) {
        return m.as_str().to_string();
    }
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if matches!(c, ' ' | '.' | '/') { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_VERSION.to_string()
    } else {
        cleaned
    }
}

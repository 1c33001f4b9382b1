//! Table context (deep analysis)
//!
//! Metadata, columns, indexes, relationships in both directions, optional
//! triggers and change-capture status, then per-column profiles and a
//! bounded data sample. Profile and sample queries are generated SQL, so
//! every identifier in them is validated and quoted first.

use crate::catalog::names;
use crate::context::report::{ContextReport, MetadataEntry, Section};
use crate::context::{ContextBuilder, ContextOptions, SAMPLE_DISPLAY_ROWS, entries_from_row};
use crate::db::{Page, Provider, SqlParam};
use crate::error::{ContextError, Result};
use crate::metadata::{
    ColumnMetadata, ColumnProfile, DataSample, IndexInfo, MetadataProvider, ObjectIdentifier,
    ObjectKind, RelationshipEdge, TableAnalysis, TriggerInfo,
};
use crate::sql::{qualified_name, quote_identifier};
use async_trait::async_trait;

/// Table context builder
#[derive(Clone)]
pub struct TableContextBuilder {
    metadata: MetadataProvider,
}

/// Everything one build gathers, before it is laid out as a report
struct TableParts {
    entries: Vec<MetadataEntry>,
    data_capture: Option<String>,
    analysis: TableAnalysis,
    indexes: Vec<IndexInfo>,
    triggers: Vec<TriggerInfo>,
}

impl TableContextBuilder {
    pub fn new(metadata: MetadataProvider) -> Self {
        Self { metadata }
    }

    /// Columns, relationships, profiles and sample for one table
    pub async fn analyze(
        &self,
        table: &ObjectIdentifier,
        options: &ContextOptions,
    ) -> Result<TableAnalysis> {
        Ok(self.gather(table, options).await?.analysis)
    }

    async fn gather(&self, table: &ObjectIdentifier, options: &ContextOptions) -> Result<TableParts> {
        let meta = self
            .metadata
            .execute_metadata_query(names::GET_TABLE_METADATA, &table_params(table))
            .await?;
        let (entries, remarks, data_capture) = match meta.first() {
            Some(row) => (
                entries_from_row(
                    &row,
                    &[
                        ("Comment", "REMARKS"),
                        ("Type", "TYPE"),
                        ("Rows", "CARD"),
                        ("Pages", "NPAGES"),
                        ("Tablespace", "TBSPACE"),
                        ("Owner", "OWNER"),
                        ("Created", "CREATE_TIME"),
                        ("Statistics Collected", "STATS_TIME"),
                    ],
                )
                .into_iter()
                .filter(|e| e.value != "-1")
                .collect(),
                row.text("REMARKS"),
                row.text("DATACAPTURE"),
            ),
            None => (Vec::new(), None, None),
        };

        let columns = fetch_columns(&self.metadata, table).await?;
        if meta.is_empty() && columns.is_empty() {
            return Err(ContextError::ObjectNotFound(format!("table {}", table)));
        }
        let indexes = fetch_indexes(&self.metadata, table).await?;
        let relationships = fetch_relationships(&self.metadata, table).await?;
        let triggers = self.fetch_triggers(table).await;

        let profiles = if options.include_profile {
            self.profile_columns(table, &columns).await?
        } else {
            Vec::new()
        };
        let sample = if options.include_sample {
            self.sample_rows(table, options.sample_rows).await
        } else {
            None
        };

        Ok(TableParts {
            entries,
            data_capture,
            analysis: TableAnalysis {
                table: table.clone(),
                remarks,
                columns,
                profiles,
                relationships,
                sample,
            },
            indexes,
            triggers,
        })
    }

    /// Triggers are optional; a catalog without them, or a failed lookup,
    /// leaves the section out.
    async fn fetch_triggers(&self, table: &ObjectIdentifier) -> Vec<TriggerInfo> {
        if !self.metadata.supports(names::GET_TABLE_TRIGGERS) {
            tracing::debug!(provider = %self.metadata.provider(), "no trigger statement, skipping");
            return Vec::new();
        }
        match self
            .metadata
            .execute_metadata_query(names::GET_TABLE_TRIGGERS, &table_params(table))
            .await
        {
            Ok(results) => results.iter().filter_map(|r| TriggerInfo::from_row(&r)).collect(),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "trigger lookup failed");
                Vec::new()
            }
        }
    }

    /// One counting query per non-LOB column; a failing column is skipped.
    async fn profile_columns(
        &self,
        table: &ObjectIdentifier,
        columns: &[ColumnMetadata],
    ) -> Result<Vec<ColumnProfile>> {
        let from = qualified_name(&table.schema, &table.name)?;
        let object = table.to_string();
        let mut profiles = Vec::new();

        for column in columns.iter().filter(|c| !c.is_lob()) {
            let sql = profile_sql(&from, &column.name)?;
            match self
                .metadata
                .execute_generated("ColumnProfile", &object, &sql, Page::first(1))
                .await
            {
                Ok(results) => {
                    if let Some(row) = results.first() {
                        profiles.push(ColumnProfile::new(
                            column.name.clone(),
                            row.int("TOTAL_ROWS").unwrap_or_default(),
                            row.int("NON_NULL").unwrap_or_default(),
                            row.int("DISTINCT_VALUES").unwrap_or_default(),
                        ));
                    }
                }
                Err(e) => {
                    tracing::warn!(table = %table, column = %column.name, error = %e, "profile query failed");
                }
            }
        }
        Ok(profiles)
    }

    /// Bounded sample; any failure leaves the section out
    async fn sample_rows(&self, table: &ObjectIdentifier, rows: usize) -> Option<DataSample> {
        let sql = match sample_sql(self.metadata.provider(), table, rows) {
            Ok(sql) => sql,
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "cannot build sample query");
                return None;
            }
        };
        match self
            .metadata
            .execute_generated("DataSample", &table.to_string(), &sql, Page::first(rows))
            .await
        {
            Ok(results) => Some(DataSample {
                columns: results.columns.iter().map(|c| c.name.clone()).collect(),
                rows: results.rows.into_iter().map(|r| r.values).collect(),
            }),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "sample query failed");
                None
            }
        }
    }
}

#[async_trait]
impl ContextBuilder for TableContextBuilder {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Table
    }

    async fn build_context(
        &self,
        schema: &str,
        name: &str,
        options: &ContextOptions,
    ) -> Result<ContextReport> {
        let table = ObjectIdentifier::new(schema, name);
        let parts = self.gather(&table, options).await?;
        let mut report = ContextReport::new(ObjectKind::Table, table, self.metadata.provider());

        report.push(Section::Metadata {
            entries: parts.entries,
        });
        report.push(Section::Columns {
            columns: parts.analysis.columns,
        });
        report.push(Section::Indexes {
            indexes: parts.indexes,
        });
        report.push(Section::Relationships {
            edges: parts.analysis.relationships,
        });
        report.push(Section::Triggers {
            triggers: parts.triggers,
        });
        if self.metadata.supports(names::GET_CDC_TABLES) {
            if let Some(code) = parts.data_capture {
                report.push(change_capture_section(&code));
            }
        }
        report.push(Section::Profile {
            profiles: parts.analysis.profiles,
        });
        if let Some(sample) = parts.analysis.sample {
            let fetched = sample.rows.len();
            report.push(Section::Sample {
                columns: sample.columns,
                rows: sample.rows.into_iter().take(SAMPLE_DISPLAY_ROWS).collect(),
                fetched,
            });
        }

        tracing::info!(table = %report.object, sections = report.sections.len(), "table context built");
        Ok(report)
    }
}

/// `[("TABSCHEMA", schema), ("TABNAME", name)]`
pub(crate) fn table_params(table: &ObjectIdentifier) -> [(&'static str, SqlParam); 2] {
    [
        ("TABSCHEMA", SqlParam::from(&table.schema)),
        ("TABNAME", SqlParam::from(&table.name)),
    ]
}

/// Columns in catalog declaration order
pub async fn fetch_columns(
    metadata: &MetadataProvider,
    table: &ObjectIdentifier,
) -> Result<Vec<ColumnMetadata>> {
    let results = metadata
        .execute_metadata_query(names::GET_TABLE_COLUMNS, &table_params(table))
        .await?;
    let mut columns: Vec<ColumnMetadata> = results
        .iter()
        .filter_map(|r| ColumnMetadata::from_row(&r))
        .collect();
    columns.sort_by_key(|c| c.ordinal);
    Ok(columns)
}

pub async fn fetch_indexes(
    metadata: &MetadataProvider,
    table: &ObjectIdentifier,
) -> Result<Vec<IndexInfo>> {
    let results = metadata
        .execute_metadata_query(names::GET_TABLE_INDEXES, &table_params(table))
        .await?;
    Ok(results.iter().filter_map(|r| IndexInfo::from_row(&r)).collect())
}

/// Foreign keys the table owns and those pointing at it
pub async fn fetch_relationships(
    metadata: &MetadataProvider,
    table: &ObjectIdentifier,
) -> Result<Vec<RelationshipEdge>> {
    let results = metadata
        .execute_metadata_query(
            names::GET_TABLE_RELATIONSHIPS,
            &[
                ("TABSCHEMA", SqlParam::from(&table.schema)),
                ("TABNAME", SqlParam::from(&table.name)),
                ("REFTABSCHEMA", SqlParam::from(&table.schema)),
                ("REFTABNAME", SqlParam::from(&table.name)),
            ],
        )
        .await?;
    Ok(results
        .iter()
        .filter_map(|r| RelationshipEdge::from_row(&r))
        .collect())
}

fn change_capture_section(code: &str) -> Section {
    let (enabled, mode) = match code {
        "Y" => (true, "CHANGES"),
        "L" => (true, "CHANGES INCLUDE LONGVAR COLUMNS"),
        _ => (false, "NONE"),
    };
    Section::ChangeCapture {
        enabled,
        mode: mode.to_string(),
    }
}

/// Append a row limit in the provider's dialect
pub(crate) fn limit_sql(provider: Provider, select: &str, rows: usize) -> String {
    match provider {
        Provider::Db2 => format!("{} FETCH FIRST {} ROWS ONLY", select, rows),
        Provider::Postgresql | Provider::Sqlite => format!("{} LIMIT {}", select, rows),
    }
}

fn sample_sql(provider: Provider, table: &ObjectIdentifier, rows: usize) -> Result<String> {
    let from = qualified_name(&table.schema, &table.name)?;
    Ok(limit_sql(provider, &format!("SELECT * FROM {}", from), rows))
}

fn profile_sql(from: &str, column: &str) -> Result<String> {
    let col = quote_identifier(column)?;
    Ok(format!(
        "SELECT COUNT(*) AS TOTAL_ROWS, COUNT({col}) AS NON_NULL, \
         COUNT(DISTINCT {col}) AS DISTINCT_VALUES FROM {from}"
    ))
}

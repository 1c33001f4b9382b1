//! Snapshot file formats
//!
//! Snapshots are plain JSON with camelCase keys. Result sets are stored
//! with their column names and types next to the rows, so a snapshot can
//! be read back without the database that produced it.

use crate::db::{Provider, QueryResults};
use crate::error::Result;
use crate::metadata::ObjectIdentifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Name and type of one dumped column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpColumn {
    pub column_name: String,
    pub data_type: String,
}

/// A result set as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDump {
    pub count: usize,
    pub columns: Vec<DumpColumn>,
    /// One object per row, keyed by column name; NULL becomes `null`
    pub data: Vec<Map<String, Value>>,
}

impl RelationDump {
    pub fn from_results(results: &QueryResults) -> Self {
        let data: Vec<Map<String, Value>> = results
            .rows
            .iter()
            .map(|row| {
                results
                    .columns
                    .iter()
                    .zip(&row.values)
                    .map(|(col, value)| (col.name.clone(), value.to_json()))
                    .collect()
            })
            .collect();
        Self {
            count: data.len(),
            columns: results
                .columns
                .iter()
                .map(|c| DumpColumn {
                    column_name: c.name.clone(),
                    data_type: c.data_type.display_name(),
                })
                .collect(),
            data,
        }
    }
}

/// Catalog-wide snapshot: `{provider}_{version}_system_tables.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSnapshot {
    pub collected_at: DateTime<Utc>,
    pub provider: Provider,
    pub version: String,
    pub description: String,
    pub system_tables: RelationDump,
    pub relationships: Value,
    pub query_patterns: Value,
}

/// Per-table snapshot: `{provider}_table_{schema}_{table}_{version}_{profile}.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub table: ObjectIdentifier,
    pub collected_at: DateTime<Utc>,
    pub provider: Provider,
    pub version: String,
    pub profile: String,
    pub columns: RelationDump,
    pub indexes: RelationDump,
}

/// Read a catalog snapshot back
pub fn load_snapshot(path: &Path) -> Result<MetadataSnapshot> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Read a table snapshot back
pub fn load_table_snapshot(path: &Path) -> Result<TableSnapshot> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

//! Database type definitions
//!
//! Core data structures for representing catalog query results,
//! data types, and values.

use serde::{Serialize, Serializer};
use std::time::Duration;

/// Query execution results
#[derive(Debug, Clone)]
pub struct QueryResults {
    /// Column definitions
    pub columns: Vec<ColumnDef>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Query execution time
    pub execution_time: Duration,
    /// Total row count (may differ from rows.len() if paged)
    pub row_count: usize,
}

/// Column definition in query results
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
}

/// Database data types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    // Integer types
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,
    Numeric,

    // Text types
    Text,
    Varchar(Option<usize>),
    Char(Option<usize>),

    // Boolean
    Boolean,

    // Date/time types
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,

    // JSON types
    Json,
    Jsonb,

    // Binary data
    Bytea,

    // UUID
    Uuid,

    // Array type
    Array(Box<DataType>),

    // Other/unknown types
    Unknown(String),
}

/// A single row of query results
#[derive(Debug, Clone)]
pub struct Row {
    /// Cell values in column order
    pub values: Vec<CellValue>,
}

/// A cell value (single column value in a row)
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// NULL value
    Null,

    /// Integer value
    Integer(i64),

    /// Floating point value
    Float(f64),

    /// Text/string value
    Text(String),

    /// Boolean value
    Boolean(bool),

    /// JSON value (parsed)
    Json(serde_json::Value),

    /// Binary data
    Binary(Vec<u8>),

    /// Date/time value (stored as string)
    DateTime(String),

    /// UUID value
    Uuid(String),

    /// Array value
    Array(Vec<CellValue>),
}

/// Borrowed view of one row with name-based access.
///
/// Catalogs disagree on identifier case (`COLNAME` in DB2, `colname` in
/// PostgreSQL), so lookups ignore ASCII case.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [ColumnDef],
    row: &'a Row,
}

impl QueryResults {
    pub fn new(
        columns: Vec<ColumnDef>,
        rows: Vec<Row>,
        execution_time: Duration,
        row_count: usize,
    ) -> Self {
        Self {
            columns,
            rows,
            execution_time,
            row_count,
        }
    }

    /// Results with no columns and no rows
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Duration::ZERO, 0)
    }

    /// Iterate rows with name-based access
    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(|row| RowRef {
            columns: &self.columns,
            row,
        })
    }

    /// First row, if any
    pub fn first(&self) -> Option<RowRef<'_>> {
        self.iter().next()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a> RowRef<'a> {
    /// Raw cell by case-insensitive column name
    pub fn get(&self, name: &str) -> Option<&'a CellValue> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))?;
        self.row.values.get(idx)
    }

    /// Cell rendered as trimmed text; NULL, missing and blank all map to `None`.
    ///
    /// DB2 pads CHAR catalog columns with trailing blanks, so everything is
    /// trimmed before it reaches a report.
    pub fn text(&self, name: &str) -> Option<String> {
        let value = self.get(name)?;
        let text = match value {
            CellValue::Null => return None,
            CellValue::Text(s) | CellValue::DateTime(s) | CellValue::Uuid(s) => s.trim().to_string(),
            other => other.display_string(usize::MAX),
        };
        if text.is_empty() { None } else { Some(text) }
    }

    /// Cell as an integer, parsing text values when the driver returned them
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            CellValue::Integer(i) => Some(*i),
            CellValue::Float(f) => Some(*f as i64),
            CellValue::Boolean(b) => Some(i64::from(*b)),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Cell as a catalog flag (`Y`/`N`, `true`/`false`, `1`/`0`)
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            CellValue::Boolean(b) => Some(*b),
            CellValue::Integer(i) => Some(*i != 0),
            CellValue::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
                "Y" | "YES" | "TRUE" | "T" | "1" => Some(true),
                "N" | "NO" | "FALSE" | "F" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl DataType {
    /// Get a human-readable display name for this type
    pub fn display_name(&self) -> String {
        match self {
            DataType::SmallInt => "smallint".to_string(),
            DataType::Integer => "integer".to_string(),
            DataType::BigInt => "bigint".to_string(),
            DataType::Real => "real".to_string(),
            DataType::Double => "double precision".to_string(),
            DataType::Numeric => "numeric".to_string(),
            DataType::Text => "text".to_string(),
            DataType::Varchar(Some(n)) => format!("varchar({})", n),
            DataType::Varchar(None) => "varchar".to_string(),
            DataType::Char(Some(n)) => format!("char({})", n),
            DataType::Char(None) => "char".to_string(),
            DataType::Boolean => "boolean".to_string(),
            DataType::Date => "date".to_string(),
            DataType::Time => "time".to_string(),
            DataType::Timestamp => "timestamp".to_string(),
            DataType::TimestampTz => "timestamptz".to_string(),
            DataType::Interval => "interval".to_string(),
            DataType::Json => "json".to_string(),
            DataType::Jsonb => "jsonb".to_string(),
            DataType::Bytea => "bytea".to_string(),
            DataType::Uuid => "uuid".to_string(),
            DataType::Array(inner) => format!("{}[]", inner.display_name()),
            DataType::Unknown(s) => s.clone(),
        }
    }
}

impl CellValue {
    /// Get a display string for this cell value (truncated if needed)
    pub fn display_string(&self, max_len: usize) -> String {
        let full = match self {
            CellValue::Null => "NULL".to_string(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Json(v) => v.to_string(),
            CellValue::Binary(b) => format!("<binary {} bytes>", b.len()),
            CellValue::DateTime(s) => s.clone(),
            CellValue::Uuid(s) => s.clone(),
            CellValue::Array(arr) => {
                let items: Vec<String> = arr.iter().map(|v| v.display_string(max_len)).collect();
                format!("{{{}}}", items.join(","))
            }
        };

        if full.chars().count() > max_len {
            let kept: String = full.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        } else {
            full
        }
    }

    /// Check if this is a NULL value
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert to a JSON value with type preservation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Integer(i) => serde_json::json!(*i),
            CellValue::Float(f) => {
                if f.is_finite() {
                    serde_json::json!(*f)
                } else {
                    // NaN / Infinity aren't valid JSON numbers
                    serde_json::Value::String(f.to_string())
                }
            }
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Boolean(b) => serde_json::Value::Bool(*b),
            CellValue::Json(v) => v.clone(),
            CellValue::Binary(b) => serde_json::Value::String(hex_encode(b)),
            CellValue::DateTime(s) => serde_json::Value::String(s.clone()),
            CellValue::Uuid(s) => serde_json::Value::String(s.clone()),
            CellValue::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(CellValue::to_json).collect())
            }
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Hex-encode binary data (e.g. `\xdeadbeef`).
fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("\\x");
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

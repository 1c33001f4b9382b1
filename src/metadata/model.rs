//! Catalog data model
//!
//! Plain values built from catalog rows. Nothing here talks to a database;
//! every type is constructed per request and serialized into reports.

use crate::db::{Provider, RowRef};
use crate::error::{CommandError, CommandResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// (schema, name) pair identifying a catalog object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    pub schema: String,
    pub name: String,
}

impl ObjectIdentifier {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `SCHEMA.NAME`.
    ///
    /// Unquoted parts are folded the way the provider's catalog stores
    /// them; double-quoted parts are kept verbatim.
    pub fn parse(text: &str, provider: Provider) -> CommandResult<Self> {
        let parts = split_qualified(text.trim());
        let invalid =
            || CommandError::InvalidArgument(format!("expected SCHEMA.NAME, got '{}'", text));

        match parts.as_slice() {
            [(schema, schema_quoted), (name, name_quoted)] => {
                if schema.is_empty() || name.is_empty() {
                    return Err(invalid());
                }
                let fold = |part: &str, quoted: bool| {
                    if quoted {
                        part.to_string()
                    } else {
                        provider.fold_identifier(part)
                    }
                };
                Ok(Self::new(
                    fold(schema, *schema_quoted),
                    fold(name, *name_quoted),
                ))
            }
            _ => Err(invalid()),
        }
    }

    /// Build from two columns of a catalog row
    pub fn from_row(row: &RowRef<'_>, schema_col: &str, name_col: &str) -> Option<Self> {
        Some(Self::new(row.text(schema_col)?, row.text(name_col)?))
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Split on dots outside double quotes; each part reports whether it was quoted
fn split_qualified(text: &str) -> Vec<(String, bool)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            '.' if !in_quotes => {
                parts.push((current.trim().to_string(), quoted));
                current.clear();
                quoted = false;
            }
            _ => current.push(c),
        }
    }
    parts.push((current.trim().to_string(), quoted));
    parts
}

/// Kind of object a report describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    View,
    Procedure,
    Function,
    Package,
    Relationship,
}

impl ObjectKind {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Table => "Table",
            ObjectKind::View => "View",
            ObjectKind::Procedure => "Procedure",
            ObjectKind::Function => "Function",
            ObjectKind::Package => "Package",
            ObjectKind::Relationship => "Relationship",
        }
    }
}

/// One column of a table or view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    pub ordinal: i64,
    pub type_name: String,
    pub length: Option<i64>,
    pub scale: Option<i64>,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default)]
    pub identity: bool,
}

impl ColumnMetadata {
    /// Read a `GetTableColumns_All` / `GetViewColumns` row
    pub fn from_row(row: &RowRef<'_>) -> Option<Self> {
        Some(Self {
            name: row.text("COLNAME")?,
            ordinal: row.int("COLNO").unwrap_or_default(),
            type_name: row.text("TYPENAME").unwrap_or_default(),
            length: row.int("LENGTH"),
            scale: row.int("SCALE"),
            nullable: row.flag("NULLS").unwrap_or(true),
            default: row.text("DEFAULT"),
            remarks: row.text("REMARKS"),
            identity: row.flag("IDENTITY").unwrap_or(false),
        })
    }

    /// Declared type with length/precision, e.g. `VARCHAR(40)` or `DECIMAL(10,2)`
    pub fn display_type(&self) -> String {
        display_type(&self.type_name, self.length, self.scale)
    }

    /// LOB, XML and binary columns are skipped when profiling
    pub fn is_lob(&self) -> bool {
        let upper = self.type_name.to_ascii_uppercase();
        ["BLOB", "CLOB", "XML", "LONG", "BYTEA"]
            .iter()
            .any(|lob| upper.contains(lob))
    }
}

/// Render a catalog type name with its length and scale
pub fn display_type(type_name: &str, length: Option<i64>, scale: Option<i64>) -> String {
    if type_name.contains('(') {
        return type_name.to_string();
    }
    let upper = type_name.to_ascii_uppercase();
    match length.filter(|len| *len > 0) {
        Some(len) if matches!(upper.as_str(), "DECIMAL" | "NUMERIC") => {
            format!("{}({},{})", type_name, len, scale.unwrap_or(0))
        }
        Some(len)
            if matches!(
                upper.as_str(),
                "VARCHAR"
                    | "CHAR"
                    | "CHARACTER"
                    | "CHARACTER VARYING"
                    | "VARGRAPHIC"
                    | "BINARY"
                    | "VARBINARY"
                    | "BPCHAR"
            ) =>
        {
            format!("{}({})", type_name, len)
        }
        _ => type_name.to_string(),
    }
}

/// Routine parameter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterMode {
    In,
    Out,
    InOut,
}

impl ParameterMode {
    /// Map a catalog ROWTYPE / mode code
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "O" | "OUT" => ParameterMode::Out,
            "B" | "INOUT" => ParameterMode::InOut,
            _ => ParameterMode::In,
        }
    }
}

impl fmt::Display for ParameterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParameterMode::In => "IN",
            ParameterMode::Out => "OUT",
            ParameterMode::InOut => "INOUT",
        })
    }
}

/// One routine parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterInfo {
    pub name: Option<String>,
    pub data_type: String,
    pub mode: ParameterMode,
    pub ordinal: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl ParameterInfo {
    pub fn from_row(row: &RowRef<'_>) -> Self {
        let type_name = row.text("TYPENAME").unwrap_or_default();
        Self {
            name: row.text("PARMNAME"),
            data_type: display_type(&type_name, row.int("LENGTH"), row.int("SCALE")),
            mode: ParameterMode::from_code(&row.text("ROWTYPE").unwrap_or_default()),
            ordinal: row.int("ORDINAL").unwrap_or_default(),
            remarks: row.text("REMARKS"),
        }
    }
}

/// Map a referential action code to its SQL text
pub fn referential_rule(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "A" => "NO ACTION".to_string(),
        "C" => "CASCADE".to_string(),
        "N" => "SET NULL".to_string(),
        "R" => "RESTRICT".to_string(),
        "D" => "SET DEFAULT".to_string(),
        other => other.to_string(),
    }
}

/// Foreign key from the referencing table to the referenced one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEdge {
    pub constraint_name: String,
    /// Table holding the foreign key
    pub from: ObjectIdentifier,
    /// Table holding the referenced key
    pub to: ObjectIdentifier,
    pub from_columns: Vec<String>,
    pub to_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_rule: Option<String>,
}

impl RelationshipEdge {
    /// Read a `GetTableRelationships` row
    pub fn from_row(row: &RowRef<'_>) -> Option<Self> {
        let split = |col: &str| -> Vec<String> {
            row.text(col)
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        };
        Some(Self {
            constraint_name: row.text("CONSTNAME")?,
            from: ObjectIdentifier::from_row(row, "TABSCHEMA", "TABNAME")?,
            to: ObjectIdentifier::from_row(row, "REFTABSCHEMA", "REFTABNAME")?,
            from_columns: split("FK_COLNAMES"),
            to_columns: split("PK_COLNAMES"),
            delete_rule: row.text("DELETERULE").map(|c| referential_rule(&c)),
            update_rule: row.text("UPDATERULE").map(|c| referential_rule(&c)),
        })
    }

    /// Whether this edge joins `a` and `b`, in either direction
    pub fn connects(&self, a: &ObjectIdentifier, b: &ObjectIdentifier) -> bool {
        (&self.from == a && &self.to == b) || (&self.from == b && &self.to == a)
    }
}

/// Index uniqueness as recorded in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueRule {
    Primary,
    Unique,
    Duplicate,
}

/// One index column with its sort direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexColumn {
    pub name: String,
    pub descending: bool,
}

/// One index on a table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub schema: Option<String>,
    pub name: String,
    pub unique_rule: UniqueRule,
    pub columns: Vec<IndexColumn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
}

impl IndexInfo {
    /// Read a `GetTableIndexes_All` row
    pub fn from_row(row: &RowRef<'_>) -> Option<Self> {
        let unique_rule = match row.text("UNIQUERULE").as_deref() {
            Some("P") => UniqueRule::Primary,
            Some("U") => UniqueRule::Unique,
            _ => UniqueRule::Duplicate,
        };
        Some(Self {
            schema: row.text("INDSCHEMA"),
            name: row.text("INDNAME")?,
            unique_rule,
            columns: parse_index_columns(&row.text("COLNAMES").unwrap_or_default()),
            index_type: row.text("INDEXTYPE"),
        })
    }
}

/// Split DB2-style `+COL1-COL2` column lists
pub fn parse_index_columns(colnames: &str) -> Vec<IndexColumn> {
    let mut columns = Vec::new();
    let mut current: Option<IndexColumn> = None;
    for c in colnames.chars() {
        match c {
            '+' | '-' => {
                if let Some(col) = current.take().filter(|col| !col.name.is_empty()) {
                    columns.push(col);
                }
                current = Some(IndexColumn {
                    name: String::new(),
                    descending: c == '-',
                });
            }
            _ => current
                .get_or_insert_with(|| IndexColumn {
                    name: String::new(),
                    descending: false,
                })
                .name
                .push(c),
        }
    }
    if let Some(col) = current.filter(|col| !col.name.is_empty()) {
        columns.push(col);
    }
    columns
}

/// One trigger on a table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<String>,
    pub enabled: bool,
}

impl TriggerInfo {
    /// Read a `GetTableTriggers` row
    pub fn from_row(row: &RowRef<'_>) -> Option<Self> {
        let timing = row.text("TRIGTIME").map(|t| match t.as_str() {
            "B" => "BEFORE".to_string(),
            "A" => "AFTER".to_string(),
            "I" => "INSTEAD OF".to_string(),
            _ => t,
        });
        let events = row.text("TRIGEVENT").map(|e| {
            e.split(',')
                .map(|code| match code.trim() {
                    "I" => "INSERT",
                    "U" => "UPDATE",
                    "D" => "DELETE",
                    other => other,
                })
                .collect::<Vec<_>>()
                .join(", ")
        });
        Some(Self {
            name: row.text("TRIGNAME")?,
            timing,
            events,
            enabled: row.flag("ENABLED").unwrap_or(true),
        })
    }
}

/// Statistical profile of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub column: String,
    pub total_rows: i64,
    pub non_null: i64,
    pub distinct_values: i64,
    pub null_percent: f64,
    pub uniqueness_percent: f64,
}

impl ColumnProfile {
    pub fn new(column: impl Into<String>, total_rows: i64, non_null: i64, distinct_values: i64) -> Self {
        let percent = |part: i64| {
            if total_rows > 0 {
                part as f64 * 100.0 / total_rows as f64
            } else {
                0.0
            }
        };
        Self {
            column: column.into(),
            total_rows,
            non_null,
            distinct_values,
            null_percent: percent(total_rows - non_null),
            uniqueness_percent: percent(distinct_values),
        }
    }
}

/// Bounded rows read from a table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSample {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<crate::db::CellValue>>,
}

/// Everything gathered about one table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAnalysis {
    pub table: ObjectIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub columns: Vec<ColumnMetadata>,
    pub profiles: Vec<ColumnProfile>,
    pub relationships: Vec<RelationshipEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<DataSample>,
}

impl TableAnalysis {
    /// Column comments keyed by column name, declaration order
    pub fn column_comments(&self) -> Vec<(&str, &str)> {
        self.columns
            .iter()
            .filter_map(|c| Some((c.name.as_str(), c.remarks.as_deref()?)))
            .collect()
    }
}

/// One (possibly reassembled) static SQL statement of a package
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageStatement {
    pub stmt_no: i64,
    pub section_no: i64,
    pub text: String,
}

/// Map a catalog BTYPE code to a readable object type
pub fn object_type_label(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "T" => "TABLE".to_string(),
        "V" => "VIEW".to_string(),
        "S" => "MQT".to_string(),
        "A" => "ALIAS".to_string(),
        "N" => "NICKNAME".to_string(),
        "F" => "ROUTINE".to_string(),
        "K" => "PACKAGE".to_string(),
        "Q" => "SEQUENCE".to_string(),
        "I" => "INDEX".to_string(),
        "R" => "TYPE".to_string(),
        "O" => "PRIVILEGE".to_string(),
        "B" => "TRIGGER".to_string(),
        other => other.to_string(),
    }
}

/// One catalog-recorded dependency of a view or routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDependency {
    pub object: ObjectIdentifier,
    pub object_type: String,
}

impl ObjectDependency {
    /// Read a row with BSCHEMA, BNAME and BTYPE
    pub fn from_row(row: &RowRef<'_>) -> Option<Self> {
        Some(Self {
            object: ObjectIdentifier::from_row(row, "BSCHEMA", "BNAME")?,
            object_type: object_type_label(&row.text("BTYPE").unwrap_or_default()),
        })
    }
}

/// What a package reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Table,
    View,
    Procedure,
    Function,
}

/// Usage detail for one package dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRef {
    pub object: ObjectIdentifier,
    pub kind: DependencyKind,
    pub usage_count: usize,
    /// Statement numbers that mention the object
    pub statements: Vec<i64>,
    /// Whether the catalog confirmed the object's type
    pub verified: bool,
}

/// Objects referenced by a package's static SQL
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDependencies {
    pub tables_used: BTreeSet<ObjectIdentifier>,
    pub views_used: BTreeSet<ObjectIdentifier>,
    pub procedures_called: BTreeSet<ObjectIdentifier>,
    pub functions_called: BTreeSet<ObjectIdentifier>,
    pub details: Vec<DependencyRef>,
}

impl PackageDependencies {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.tables_used.len()
            + self.views_used.len()
            + self.procedures_called.len()
            + self.functions_called.len()
    }
}

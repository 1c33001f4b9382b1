//! Context report model
//!
//! A report is an ordered list of sections. Builders push sections in
//! report order; empty sections are dropped on the way in, so a missing
//! comment or an object without parameters never shows up as an empty
//! heading.

use crate::db::{CellValue, Provider};
use crate::metadata::{
    ColumnMetadata, ColumnProfile, IndexInfo, ObjectDependency, ObjectIdentifier, ObjectKind,
    PackageDependencies, PackageStatement, ParameterInfo, RelationshipEdge, TriggerInfo,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One labelled attribute in a metadata block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEntry {
    pub label: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// One block of a context report
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "section", rename_all = "camelCase")]
pub enum Section {
    Metadata {
        entries: Vec<MetadataEntry>,
    },
    Columns {
        columns: Vec<ColumnMetadata>,
    },
    Indexes {
        indexes: Vec<IndexInfo>,
    },
    Parameters {
        parameters: Vec<ParameterInfo>,
    },
    Source {
        text: String,
    },
    /// Package statements; `shown` is capped, `total` is not
    Statements {
        total: usize,
        shown: Vec<PackageStatement>,
    },
    Dependencies {
        objects: Vec<ObjectDependency>,
    },
    #[serde(rename_all = "camelCase")]
    PackageDependencies {
        dependencies: PackageDependencies,
    },
    Relationships {
        edges: Vec<RelationshipEdge>,
    },
    /// Explicit "no foreign key" result for a two-table question
    NoRelationship {
        from: ObjectIdentifier,
        to: ObjectIdentifier,
    },
    /// Column summary of one side of a relationship question
    TableSummary {
        table: ObjectIdentifier,
        columns: Vec<ColumnMetadata>,
    },
    Triggers {
        triggers: Vec<TriggerInfo>,
    },
    #[serde(rename_all = "camelCase")]
    ChangeCapture {
        enabled: bool,
        mode: String,
    },
    Profile {
        profiles: Vec<ColumnProfile>,
    },
    /// Displayed rows are capped; `fetched` is how many were read
    Sample {
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
        fetched: usize,
    },
    Diagram {
        mermaid: String,
    },
}

impl Section {
    /// Whether the section carries no data and should be left out
    pub fn is_empty(&self) -> bool {
        match self {
            Section::Metadata { entries } => entries.is_empty(),
            Section::Columns { columns } => columns.is_empty(),
            Section::Indexes { indexes } => indexes.is_empty(),
            Section::Parameters { parameters } => parameters.is_empty(),
            Section::Source { text } => text.trim().is_empty(),
            Section::Statements { total, .. } => *total == 0,
            Section::Dependencies { objects } => objects.is_empty(),
            Section::PackageDependencies { dependencies } => dependencies.is_empty(),
            Section::Relationships { edges } => edges.is_empty(),
            Section::NoRelationship { .. } => false,
            Section::TableSummary { columns, .. } => columns.is_empty(),
            Section::Triggers { triggers } => triggers.is_empty(),
            Section::ChangeCapture { .. } => false,
            Section::Profile { profiles } => profiles.is_empty(),
            Section::Sample { rows, .. } => rows.is_empty(),
            Section::Diagram { mermaid } => mermaid.trim().is_empty(),
        }
    }
}

/// Assembled description of one catalog object
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextReport {
    pub kind: ObjectKind,
    pub object: ObjectIdentifier,
    pub provider: Provider,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<Section>,
}

impl ContextReport {
    pub fn new(kind: ObjectKind, object: ObjectIdentifier, provider: Provider) -> Self {
        Self {
            kind,
            object,
            provider,
            generated_at: Utc::now(),
            sections: Vec::new(),
        }
    }

    /// Append a section unless it is empty
    pub fn push(&mut self, section: Section) {
        if !section.is_empty() {
            self.sections.push(section);
        }
    }

    pub fn columns(&self) -> Option<&[ColumnMetadata]> {
        self.sections.iter().find_map(|s| match s {
            Section::Columns { columns } => Some(columns.as_slice()),
            _ => None,
        })
    }

    pub fn relationships(&self) -> Option<&[RelationshipEdge]> {
        self.sections.iter().find_map(|s| match s {
            Section::Relationships { edges } => Some(edges.as_slice()),
            _ => None,
        })
    }

    pub fn parameters(&self) -> Option<&[ParameterInfo]> {
        self.sections.iter().find_map(|s| match s {
            Section::Parameters { parameters } => Some(parameters.as_slice()),
            _ => None,
        })
    }

    pub fn has_section(&self, predicate: impl Fn(&Section) -> bool) -> bool {
        self.sections.iter().any(predicate)
    }

    /// Pretty-printed JSON form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

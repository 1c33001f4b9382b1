//! Context builders
//!
//! One builder per object kind. Each assembles a single ordered report:
//! identity, metadata, structure (columns or parameters), source,
//! dependencies and, for tables, profile and sample. Source and dependency
//! statements are issued only when the options ask for them.

pub mod markdown;
pub mod mermaid;
pub mod package;
pub mod relationship;
pub mod report;
pub mod routine;
pub mod table;
pub mod view;

use crate::error::Result;
use crate::metadata::{MetadataProvider, ObjectIdentifier, ObjectKind};
use async_trait::async_trait;

pub use package::PackageContextBuilder;
pub use relationship::RelationshipContextBuilder;
pub use report::{ContextReport, MetadataEntry, Section};
pub use routine::{FunctionContextBuilder, ProcedureContextBuilder};
pub use table::TableContextBuilder;
pub use view::ViewContextBuilder;

/// Package statements listed before the listing is cut short
pub const MAX_PACKAGE_STATEMENTS: usize = 10;

/// Sample rows shown in a report, however many were fetched
pub const SAMPLE_DISPLAY_ROWS: usize = 5;

/// What a builder should include
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub include_source_code: bool,
    pub include_dependencies: bool,
    pub include_sample: bool,
    pub include_profile: bool,
    /// Rows fetched for the sample (display is capped separately)
    pub sample_rows: usize,
    /// Second table for relationship questions
    pub target: Option<ObjectIdentifier>,
    /// Pretty-print package statement text
    pub format_sql: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            include_source_code: false,
            include_dependencies: false,
            include_sample: false,
            include_profile: false,
            sample_rows: 20,
            target: None,
            format_sql: true,
        }
    }
}

/// Builds one kind of context report
#[async_trait]
pub trait ContextBuilder: Send + Sync {
    /// Kind of object this builder describes
    fn kind(&self) -> ObjectKind;

    /// Assemble the report for `schema.name`
    ///
    /// # Errors
    /// Catalog configuration errors and failed catalog statements. A missing
    /// comment, parameter list or dependency list is not an error; the
    /// section is left out.
    async fn build_context(
        &self,
        schema: &str,
        name: &str,
        options: &ContextOptions,
    ) -> Result<ContextReport>;
}

/// Builder for a report kind
pub fn builder_for(kind: ObjectKind, metadata: MetadataProvider) -> Box<dyn ContextBuilder> {
    match kind {
        ObjectKind::Table => Box::new(TableContextBuilder::new(metadata)),
        ObjectKind::View => Box::new(ViewContextBuilder::new(metadata)),
        ObjectKind::Procedure => Box::new(ProcedureContextBuilder::new(metadata)),
        ObjectKind::Function => Box::new(FunctionContextBuilder::new(metadata)),
        ObjectKind::Package => Box::new(PackageContextBuilder::new(metadata)),
        ObjectKind::Relationship => Box::new(RelationshipContextBuilder::new(metadata)),
    }
}

/// Collect `(label, value)` metadata entries from a row, skipping blanks
pub(crate) fn entries_from_row(
    row: &crate::db::RowRef<'_>,
    fields: &[(&str, &str)],
) -> Vec<MetadataEntry> {
    fields
        .iter()
        .filter_map(|(label, column)| Some(MetadataEntry::new(*label, row.text(column)?)))
        .collect()
}

/// `Y`/`N` catalog flag rendered as Yes/No
pub(crate) fn flag_entry(
    row: &crate::db::RowRef<'_>,
    label: &str,
    column: &str,
) -> Option<MetadataEntry> {
    let value = row.flag(column)?;
    Some(MetadataEntry::new(label, if value { "Yes" } else { "No" }))
}

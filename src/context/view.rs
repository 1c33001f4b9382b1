//! View context

use crate::catalog::names;
use crate::context::report::{ContextReport, MetadataEntry, Section};
use crate::context::{ContextBuilder, ContextOptions, entries_from_row, flag_entry};
use crate::db::SqlParam;
use crate::error::{ContextError, Result};
use crate::metadata::{ColumnMetadata, MetadataProvider, ObjectDependency, ObjectIdentifier, ObjectKind};
use async_trait::async_trait;

/// View context builder
#[derive(Clone)]
pub struct ViewContextBuilder {
    metadata: MetadataProvider,
}

impl ViewContextBuilder {
    pub fn new(metadata: MetadataProvider) -> Self {
        Self { metadata }
    }

    async fn metadata_entries(&self, params: &[(&str, SqlParam)]) -> Result<Vec<MetadataEntry>> {
        let results = self
            .metadata
            .execute_metadata_query(names::GET_VIEW_METADATA, params)
            .await?;
        let Some(row) = results.first() else {
            return Ok(Vec::new());
        };

        let mut entries = entries_from_row(&row, &[("Comment", "REMARKS")]);
        if let Some(check) = row.text("VIEWCHECK") {
            entries.push(MetadataEntry::new("Check Option", check_option(&check)));
        }
        entries.extend(flag_entry(&row, "Read Only", "READONLY"));
        entries.extend(flag_entry(&row, "Valid", "VALID"));
        entries.extend(entries_from_row(&row, &[("Created", "CREATE_TIME")]));
        Ok(entries)
    }
}

#[async_trait]
impl ContextBuilder for ViewContextBuilder {
    fn kind(&self) -> ObjectKind {
        ObjectKind::View
    }

    async fn build_context(
        &self,
        schema: &str,
        name: &str,
        options: &ContextOptions,
    ) -> Result<ContextReport> {
        let view = ObjectIdentifier::new(schema, name);
        let params = [
            ("VIEWSCHEMA", SqlParam::from(schema)),
            ("VIEWNAME", SqlParam::from(name)),
        ];
        let mut report = ContextReport::new(ObjectKind::View, view, self.metadata.provider());

        let entries = self.metadata_entries(&params).await?;
        let columns: Vec<ColumnMetadata> = self
            .metadata
            .execute_metadata_query(names::GET_VIEW_COLUMNS, &params)
            .await?
            .iter()
            .filter_map(|r| ColumnMetadata::from_row(&r))
            .collect();
        if entries.is_empty() && columns.is_empty() {
            return Err(ContextError::ObjectNotFound(format!("view {}", report.object)));
        }
        report.push(Section::Metadata { entries });
        report.push(Section::Columns { columns });

        if options.include_source_code {
            let definition = self
                .metadata
                .execute_metadata_query(names::GET_VIEW_DEFINITION, &params)
                .await?;
            if let Some(text) = definition.first().and_then(|r| r.text("TEXT")) {
                report.push(Section::Source { text });
            }
        }

        if options.include_dependencies {
            let deps = self
                .metadata
                .execute_metadata_query(names::GET_VIEW_DEPENDENCIES, &params)
                .await?;
            report.push(Section::Dependencies {
                objects: deps
                    .iter()
                    .filter_map(|r| ObjectDependency::from_row(&r))
                    .collect(),
            });
        }

        tracing::info!(view = %report.object, sections = report.sections.len(), "view context built");
        Ok(report)
    }
}

fn check_option(code: &str) -> &str {
    match code {
        "N" => "NONE",
        "L" => "LOCAL",
        "C" => "CASCADED",
        other => other,
    }
}

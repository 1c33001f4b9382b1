//! Relationship context
//!
//! Without a target this lists every foreign key into or out of a table and
//! draws them. With a target it answers "how are these two tables joined":
//! only constraints that connect the pair are kept, and when there are none
//! the report says so instead of guessing from column names.

use crate::context::mermaid::er_diagram;
use crate::context::report::{ContextReport, Section};
use crate::context::table::{fetch_columns, fetch_relationships};
use crate::context::{ContextBuilder, ContextOptions};
use crate::error::Result;
use crate::metadata::{MetadataProvider, ObjectIdentifier, ObjectKind};
use async_trait::async_trait;

/// Relationship context builder
#[derive(Clone)]
pub struct RelationshipContextBuilder {
    metadata: MetadataProvider,
}

impl RelationshipContextBuilder {
    pub fn new(metadata: MetadataProvider) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl ContextBuilder for RelationshipContextBuilder {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Relationship
    }

    async fn build_context(
        &self,
        schema: &str,
        name: &str,
        options: &ContextOptions,
    ) -> Result<ContextReport> {
        let table = ObjectIdentifier::new(schema, name);
        let edges = fetch_relationships(&self.metadata, &table).await?;
        let mut report = ContextReport::new(
            ObjectKind::Relationship,
            table.clone(),
            self.metadata.provider(),
        );

        match &options.target {
            Some(target) => {
                let connecting: Vec<_> = edges
                    .into_iter()
                    .filter(|e| e.connects(&table, target))
                    .collect();

                for side in [&table, target] {
                    report.push(Section::TableSummary {
                        table: side.clone(),
                        columns: fetch_columns(&self.metadata, side).await?,
                    });
                }

                tracing::info!(
                    table = %table,
                    target = %target,
                    edges = connecting.len(),
                    "relationship lookup"
                );
                if connecting.is_empty() {
                    report.push(Section::NoRelationship {
                        from: table,
                        to: target.clone(),
                    });
                } else {
                    let mermaid = er_diagram(&connecting);
                    report.push(Section::Relationships { edges: connecting });
                    report.push(Section::Diagram { mermaid });
                }
            }
            None => {
                tracing::info!(table = %table, edges = edges.len(), "relationship context built");
                let mermaid = er_diagram(&edges);
                report.push(Section::Relationships { edges });
                report.push(Section::Diagram { mermaid });
            }
        }

        Ok(report)
    }
}

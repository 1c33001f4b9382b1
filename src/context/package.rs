//! Package context
//!
//! Bind attributes, the first few static statements and, on request, the
//! objects those statements touch.

use crate::analysis::DependencyAnalyzer;
use crate::catalog::names;
use crate::context::report::{ContextReport, Section};
use crate::context::{ContextBuilder, ContextOptions, MAX_PACKAGE_STATEMENTS, entries_from_row, flag_entry};
use crate::db::SqlParam;
use crate::error::{ContextError, Result};
use crate::metadata::{MetadataProvider, ObjectIdentifier, ObjectKind, PackageStatement};
use crate::sql::format_statement;
use async_trait::async_trait;

/// Package context builder
#[derive(Clone)]
pub struct PackageContextBuilder {
    metadata: MetadataProvider,
}

impl PackageContextBuilder {
    pub fn new(metadata: MetadataProvider) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl ContextBuilder for PackageContextBuilder {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Package
    }

    async fn build_context(
        &self,
        schema: &str,
        name: &str,
        options: &ContextOptions,
    ) -> Result<ContextReport> {
        let package = ObjectIdentifier::new(schema, name);
        let meta = self
            .metadata
            .execute_metadata_query(
                names::GET_PACKAGE_METADATA,
                &[
                    ("PKGSCHEMA", SqlParam::from(schema)),
                    ("PKGNAME", SqlParam::from(name)),
                ],
            )
            .await?;
        let Some(row) = meta.first() else {
            return Err(ContextError::ObjectNotFound(format!("package {}", package)));
        };

        let qualifier = row.text("QUALIFIER");
        let mut entries = entries_from_row(
            &row,
            &[
                ("Bound By", "BOUNDBY"),
                ("Owner", "OWNER"),
                ("Qualifier", "QUALIFIER"),
                ("Isolation", "ISOLATION"),
            ],
        );
        entries.extend(flag_entry(&row, "Valid", "VALID"));
        entries.extend(entries_from_row(
            &row,
            &[
                ("Created", "CREATE_TIME"),
                ("Last Bound", "LAST_BIND_TIME"),
                ("Last Used", "LASTUSED"),
                ("Sections", "TOTAL_SECT"),
                ("Comment", "REMARKS"),
            ],
        ));

        let mut report = ContextReport::new(ObjectKind::Package, package, self.metadata.provider());
        report.push(Section::Metadata { entries });

        let analyzer = DependencyAnalyzer::new(self.metadata.clone());
        let statements = analyzer.fetch_statements(schema, name).await?;
        report.push(Section::Statements {
            total: statements.len(),
            shown: shown_statements(&statements, options.format_sql),
        });

        if options.include_dependencies {
            let default_schema = qualifier.as_deref().unwrap_or(schema);
            let dependencies = analyzer
                .analyze_statements(&statements, default_schema)
                .await;
            report.push(Section::PackageDependencies { dependencies });
        }

        tracing::info!(
            package = %report.object,
            statements = statements.len(),
            "package context built"
        );
        Ok(report)
    }
}

/// First statements of a package, optionally laid out for reading
fn shown_statements(statements: &[PackageStatement], format_sql: bool) -> Vec<PackageStatement> {
    statements
        .iter()
        .take(MAX_PACKAGE_STATEMENTS)
        .map(|s| PackageStatement {
            text: if format_sql {
                format_statement(&s.text)
            } else {
                s.text.clone()
            },
            ..s.clone()
        })
        .collect()
}

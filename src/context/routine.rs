//! Procedure and function context
//!
//! Both routine kinds read the same catalog shapes; they differ only in the
//! statement names and in the extra return-type attributes of functions.

use crate::catalog::names;
use crate::context::report::{ContextReport, MetadataEntry, Section};
use crate::context::{ContextBuilder, ContextOptions, entries_from_row, flag_entry};
use crate::db::{QueryResults, RowRef, SqlParam};
use crate::error::{ContextError, Result};
use crate::metadata::{
    MetadataProvider, ObjectDependency, ObjectIdentifier, ObjectKind, ParameterInfo,
};
use async_trait::async_trait;

/// Statement names for one routine kind
struct RoutineStatements {
    kind: ObjectKind,
    metadata: &'static str,
    parameters: &'static str,
    source: &'static str,
    dependencies: &'static str,
}

const PROCEDURE: RoutineStatements = RoutineStatements {
    kind: ObjectKind::Procedure,
    metadata: names::GET_PROCEDURE_METADATA,
    parameters: names::GET_PROCEDURE_PARAMETERS,
    source: names::GET_PROCEDURE_SOURCE,
    dependencies: names::GET_PROCEDURE_DEPENDENCIES,
};

const FUNCTION: RoutineStatements = RoutineStatements {
    kind: ObjectKind::Function,
    metadata: names::GET_FUNCTION_METADATA,
    parameters: names::GET_FUNCTION_PARAMETERS,
    source: names::GET_FUNCTION_SOURCE,
    dependencies: names::GET_FUNCTION_DEPENDENCIES,
};

/// Stored procedure context builder
#[derive(Clone)]
pub struct ProcedureContextBuilder {
    metadata: MetadataProvider,
}

impl ProcedureContextBuilder {
    pub fn new(metadata: MetadataProvider) -> Self {
        Self { metadata }
    }
}

/// User-defined function context builder
#[derive(Clone)]
pub struct FunctionContextBuilder {
    metadata: MetadataProvider,
}

impl FunctionContextBuilder {
    pub fn new(metadata: MetadataProvider) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl ContextBuilder for ProcedureContextBuilder {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Procedure
    }

    async fn build_context(
        &self,
        schema: &str,
        name: &str,
        options: &ContextOptions,
    ) -> Result<ContextReport> {
        build_routine(&self.metadata, &PROCEDURE, schema, name, options).await
    }
}

#[async_trait]
impl ContextBuilder for FunctionContextBuilder {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Function
    }

    async fn build_context(
        &self,
        schema: &str,
        name: &str,
        options: &ContextOptions,
    ) -> Result<ContextReport> {
        build_routine(&self.metadata, &FUNCTION, schema, name, options).await
    }
}

async fn build_routine(
    metadata: &MetadataProvider,
    statements: &RoutineStatements,
    schema: &str,
    name: &str,
    options: &ContextOptions,
) -> Result<ContextReport> {
    let routine = ObjectIdentifier::new(schema, name);
    let params = [
        ("ROUTINESCHEMA", SqlParam::from(schema)),
        ("ROUTINENAME", SqlParam::from(name)),
    ];

    let meta = metadata
        .execute_metadata_query(statements.metadata, &params)
        .await?;
    let Some(row) = meta.first() else {
        return Err(ContextError::ObjectNotFound(format!(
            "{} {}",
            statements.kind.label().to_lowercase(),
            routine
        )));
    };

    let mut report = ContextReport::new(statements.kind, routine, metadata.provider());
    report.push(Section::Metadata {
        entries: routine_entries(&row, statements.kind),
    });

    let parameters = metadata
        .execute_metadata_query(statements.parameters, &params)
        .await?;
    report.push(Section::Parameters {
        parameters: overload_parameters(&parameters, row.text("SPECIFICNAME").as_deref()),
    });

    if options.include_source_code {
        let source = metadata
            .execute_metadata_query(statements.source, &params)
            .await?;
        if let Some(text) = source.first().and_then(|r| r.text("TEXT")) {
            report.push(Section::Source { text });
        }
    }

    if options.include_dependencies {
        let deps = metadata
            .execute_metadata_query(statements.dependencies, &params)
            .await?;
        report.push(Section::Dependencies {
            objects: deps
                .iter()
                .filter_map(|r| ObjectDependency::from_row(&r))
                .collect(),
        });
    }

    tracing::info!(
        kind = statements.kind.label(),
        routine = %report.object,
        sections = report.sections.len(),
        "routine context built"
    );
    Ok(report)
}

/// Parameters of the overload the metadata row describes.
///
/// Rows without a specific name, or a metadata row without one, are all kept.
fn overload_parameters(rows: &QueryResults, specific_name: Option<&str>) -> Vec<ParameterInfo> {
    rows.iter()
        .filter(|r| match (specific_name, r.text("SPECIFICNAME")) {
            (Some(wanted), Some(name)) => name == wanted,
            _ => true,
        })
        .map(|r| ParameterInfo::from_row(&r))
        .collect()
}

fn routine_entries(row: &RowRef<'_>, kind: ObjectKind) -> Vec<MetadataEntry> {
    let mut entries = entries_from_row(row, &[("Language", "LANGUAGE")]);
    entries.extend(flag_entry(row, "Deterministic", "DETERMINISTIC"));
    if let Some(access) = row.text("SQL_DATA_ACCESS") {
        entries.push(MetadataEntry::new("SQL Access", sql_access(&access)));
    }
    if kind == ObjectKind::Function {
        entries.extend(entries_from_row(row, &[("Return Type", "RETURN_TYPE")]));
        if let Some(code) = row.text("FUNCTION_TYPE") {
            entries.push(MetadataEntry::new("Function Type", function_type(&code)));
        }
    } else {
        entries.extend(entries_from_row(row, &[("Parameter Count", "PARM_COUNT")]));
    }
    entries.extend(entries_from_row(
        row,
        &[
            ("Comment", "REMARKS"),
            ("Created", "CREATE_TIME"),
            ("Specific Name", "SPECIFICNAME"),
        ],
    ));
    entries
}

fn sql_access(code: &str) -> &str {
    match code {
        "C" => "CONTAINS SQL",
        "R" => "READS SQL DATA",
        "M" => "MODIFIES SQL DATA",
        "N" => "NO SQL",
        other => other,
    }
}

fn function_type(code: &str) -> &str {
    match code {
        "S" => "SCALAR",
        "T" => "TABLE",
        "R" => "ROW",
        "C" => "COLUMN",
        other => other,
    }
}

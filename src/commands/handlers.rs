//! Command execution handlers
//!
//! Resolves the connection, dispatches one subcommand and writes its
//! rendered output. Errors never escape as panics: they are rendered as
//! `{"error": {"command", "message"}}` on stderr and into the out file.

use crate::catalog::{StatementCatalog, names};
use crate::collect::{CollectionOutcome, DocumentationSet, MetadataCollector};
use crate::commands::{Cli, Command, OutputArgs, ReportArgs};
use crate::config::{ConnectionConfig, Settings, find_connection, load_settings};
use crate::context::table::table_params;
use crate::context::{ContextOptions, builder_for};
use crate::db::{self, Page, QueryResults, SqlParam};
use crate::ddl::DdlGenerator;
use crate::error::{CommandError, ContextError, Result};
use crate::export::{OutputFormat, markdown_table, rows_to_json};
use crate::metadata::{MetadataProvider, ObjectIdentifier, ObjectKind};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Widest cell in listing tables
const LISTING_CELL_WIDTH: usize = 60;

/// Run the parsed command line
pub async fn run(cli: Cli) -> ExitCode {
    let name = cli.command.name();
    let output = cli.command.output().clone();

    match execute(&cli).await {
        Ok(summary) => {
            println!("SUCCESS: {}", summary);
            println!("SUCCESS: output written to {}", output.out.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(command = name, error = %e, "command failed");
            let body = error_json(name, &e);
            eprintln!("{}", body);
            if let Err(write_err) = write_output(&output.out, &body) {
                tracing::warn!(
                    path = %output.out.display(),
                    error = %write_err,
                    "could not write error file"
                );
            }
            ExitCode::FAILURE
        }
    }
}

/// `{"error": {"command": ..., "message": ...}}`
pub fn error_json(command: &str, error: &ContextError) -> String {
    serde_json::json!({
        "error": {
            "command": command,
            "message": error.to_string(),
        }
    })
    .to_string()
}

async fn execute(cli: &Cli) -> Result<String> {
    let settings = load_settings()?;
    let config = resolve_connection(cli)?;
    let connection = db::connect(&config, Duration::from_secs(settings.command_timeout_secs)).await?;
    let catalog = Arc::new(StatementCatalog::load(settings.statements_dir.as_deref())?);
    let metadata = MetadataProvider::for_connection(connection, catalog).await?;
    let provider = metadata.provider();
    let parse = |text: &str| ObjectIdentifier::parse(text, provider);

    let reports = ReportRunner {
        metadata: &metadata,
        settings: &settings,
    };

    match &cli.command {
        Command::TableProps {
            object,
            report,
            output,
        } => reports.run(ObjectKind::Table, parse(object)?, report, None, output).await,
        Command::ViewInfo {
            object,
            report,
            output,
        } => reports.run(ObjectKind::View, parse(object)?, report, None, output).await,
        Command::ProcedureInfo {
            object,
            report,
            output,
        } => reports.run(ObjectKind::Procedure, parse(object)?, report, None, output).await,
        Command::FunctionInfo {
            object,
            report,
            output,
        } => reports.run(ObjectKind::Function, parse(object)?, report, None, output).await,
        Command::PackageAnalysis {
            object,
            report,
            output,
        } => {
            let report = ReportArgs {
                include_dependencies: true,
                ..report.clone()
            };
            reports.run(ObjectKind::Package, parse(object)?, &report, None, output).await
        }
        Command::Relationship {
            object,
            target,
            output,
        } => {
            let target = target.as_deref().map(parse).transpose()?;
            let report = ReportArgs::default();
            reports.run(ObjectKind::Relationship, parse(object)?, &report, target, output).await
        }
        Command::Dependencies { object, output } => {
            let object = parse(object)?;
            let results = metadata
                .execute_metadata_query(names::GET_OBJECT_DEPENDENCIES, &table_params(&object))
                .await?;
            write_listing(&results, output)?;
            Ok(format!("{} dependencies of {}", results.rows.len(), object))
        }
        Command::CdcInfo { schema, output } => {
            if !metadata.supports(names::GET_CDC_TABLES) {
                return Err(CommandError::InvalidArgument(format!(
                    "change data capture information is not available for {}",
                    provider
                ))
                .into());
            }
            let results = metadata
                .execute_metadata_query(names::GET_CDC_TABLES, &[("TABSCHEMA", schema.into())])
                .await?;
            write_listing(&results, output)?;
            Ok(format!("{} tables with change capture settings", results.rows.len()))
        }
        Command::ListTables {
            schema,
            limit,
            output,
        } => list(&metadata, names::LIST_TABLES, "TABSCHEMA", schema, *limit, output).await,
        Command::ListViews {
            schema,
            limit,
            output,
        } => list(&metadata, names::LIST_VIEWS, "VIEWSCHEMA", schema, *limit, output).await,
        Command::TableDdl { object, output } => {
            let object = parse(object)?;
            let ddl = DdlGenerator::new(metadata.clone())
                .generate_table_ddl(&object.schema, &object.name)
                .await?;
            let rendered = match output.format {
                OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                    "object": object.to_string(),
                    "ddl": ddl,
                }))?,
                OutputFormat::Markdown => format!("# DDL: {}\n\n```sql\n{}```\n", object, ddl),
            };
            write_output(&output.out, &rendered)?;
            Ok(format!("DDL generated for {}", object))
        }
        Command::CollectMetadata { output } => {
            let collector = collector(&settings)?;
            let outcome = collector.collect_metadata(&metadata).await?;
            write_collection(&outcome, output)
        }
        Command::CollectTable { object, output } => {
            let object = parse(object)?;
            let collector = collector(&settings)?;
            let outcome = collector
                .collect_table_metadata(&metadata, &object, &config.name)
                .await?;
            write_collection(&outcome, output)
        }
    }
}

/// `--url` wins over `--profile`; one of them is required
fn resolve_connection(cli: &Cli) -> Result<ConnectionConfig> {
    if let Some(url) = &cli.url {
        return Ok(ConnectionConfig::from_url(url)?);
    }
    match &cli.profile {
        Some(profile) => Ok(find_connection(profile)?),
        None => Err(CommandError::MissingArgument("--profile or --url".to_string()).into()),
    }
}

fn context_options(
    report: &ReportArgs,
    target: Option<ObjectIdentifier>,
    settings: &Settings,
) -> ContextOptions {
    ContextOptions {
        include_source_code: report.include_source_code,
        include_dependencies: report.include_dependencies,
        include_sample: report.include_sample,
        include_profile: settings.include_profile,
        sample_rows: report.limit.unwrap_or(settings.sample_rows),
        target,
        ..ContextOptions::default()
    }
}

/// Builds and writes context reports
struct ReportRunner<'a> {
    metadata: &'a MetadataProvider,
    settings: &'a Settings,
}

impl ReportRunner<'_> {
    async fn run(
        &self,
        kind: ObjectKind,
        object: ObjectIdentifier,
        report: &ReportArgs,
        target: Option<ObjectIdentifier>,
        output: &OutputArgs,
    ) -> Result<String> {
        let options = context_options(report, target, self.settings);
        let report = builder_for(kind, self.metadata.clone())
            .build_context(&object.schema, &object.name, &options)
            .await?;
        let rendered = match output.format {
            OutputFormat::Json => report.to_json()?,
            OutputFormat::Markdown => report.to_markdown(),
        };
        write_output(&output.out, &rendered)?;
        Ok(format!(
            "{} context for {} ({} sections)",
            kind.label(),
            object,
            report.sections.len()
        ))
    }
}

async fn list(
    metadata: &MetadataProvider,
    statement: &str,
    param: &str,
    schema: &str,
    limit: Option<usize>,
    output: &OutputArgs,
) -> Result<String> {
    let page = limit.map(Page::first).unwrap_or_else(Page::all);
    let params: [(&str, SqlParam); 1] = [(param, schema.into())];
    let results = metadata.execute_metadata_page(statement, &params, page).await?;
    write_listing(&results, output)?;
    Ok(format!("{} rows from {}", results.rows.len(), statement))
}

fn write_listing(results: &QueryResults, output: &OutputArgs) -> Result<()> {
    let rendered = match output.format {
        OutputFormat::Json => serde_json::to_string_pretty(&rows_to_json(results))?,
        OutputFormat::Markdown => {
            let headers: Vec<String> = results.columns.iter().map(|c| c.name.clone()).collect();
            let rows: Vec<_> = results.rows.iter().map(|r| r.values.clone()).collect();
            markdown_table(&headers, &rows, LISTING_CELL_WIDTH)
        }
    };
    write_output(&output.out, &rendered)
}

fn collector(settings: &Settings) -> Result<MetadataCollector> {
    Ok(MetadataCollector::new(
        settings.metadata_dir()?,
        DocumentationSet::builtin()?,
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSummary<'a> {
    status: &'static str,
    path: &'a Path,
}

fn write_collection(outcome: &CollectionOutcome, output: &OutputArgs) -> Result<String> {
    let status = match outcome {
        CollectionOutcome::Collected(_) => "collected",
        CollectionOutcome::AlreadyCollected(_) => "alreadyCollected",
    };
    let rendered = match output.format {
        OutputFormat::Json => serde_json::to_string_pretty(&CollectionSummary {
            status,
            path: outcome.path(),
        })?,
        OutputFormat::Markdown => {
            format!("- status: {}\n- path: {}\n", status, outcome.path().display())
        }
    };
    write_output(&output.out, &rendered)?;
    Ok(format!("{} {}", status, outcome.path().display()))
}

/// Write `contents` to `path`, creating parent directories
fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

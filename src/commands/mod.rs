//! Command-line surface
//!
//! Every subcommand resolves one connection, runs one builder or collection
//! operation and writes its result to `--out`. Failures are written there
//! too, as a JSON error object, so callers always find a file to read.

pub mod handlers;

use crate::export::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use handlers::run;

#[derive(Debug, Parser)]
#[command(name = "dbcontext")]
#[command(about = "Extract catalog metadata and object context from DB2, PostgreSQL and SQLite")]
#[command(version)]
pub struct Cli {
    /// Connection profile from connections.toml
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Connection URL (postgres://... or sqlite://...), overrides --profile
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where and how results are written
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// File the result (or the error object) is written to
    #[arg(long)]
    pub out: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

/// Optional report sections
#[derive(Debug, Clone, Default, Args)]
pub struct ReportArgs {
    /// Include view or routine source text
    #[arg(long)]
    pub include_source_code: bool,

    /// Include dependency listings
    #[arg(long)]
    pub include_dependencies: bool,

    /// Include a data sample (tables)
    #[arg(long)]
    pub include_sample: bool,

    /// Rows fetched for the data sample
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Table report: metadata, columns, indexes, keys, profile, sample
    TableProps {
        /// SCHEMA.TABLE
        object: String,
        #[command(flatten)]
        report: ReportArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// View report
    ViewInfo {
        /// SCHEMA.VIEW
        object: String,
        #[command(flatten)]
        report: ReportArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Stored procedure report
    ProcedureInfo {
        /// SCHEMA.PROCEDURE
        object: String,
        #[command(flatten)]
        report: ReportArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Function report
    FunctionInfo {
        /// SCHEMA.FUNCTION
        object: String,
        #[command(flatten)]
        report: ReportArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Package report with its statements and referenced objects
    PackageAnalysis {
        /// SCHEMA.PACKAGE
        object: String,
        #[command(flatten)]
        report: ReportArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Foreign keys of a table, or between two tables
    Relationship {
        /// SCHEMA.TABLE
        object: String,
        /// Second table (SCHEMA.TABLE)
        #[arg(long)]
        target: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Objects a view or table depends on
    Dependencies {
        /// SCHEMA.NAME
        object: String,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Change data capture settings
    CdcInfo {
        /// Schema LIKE pattern
        #[arg(long, default_value = "%")]
        schema: String,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List tables
    ListTables {
        /// Schema LIKE pattern
        #[arg(long, default_value = "%")]
        schema: String,
        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List views
    ListViews {
        /// Schema LIKE pattern
        #[arg(long, default_value = "%")]
        schema: String,
        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Reconstruct CREATE TABLE DDL
    TableDdl {
        /// SCHEMA.TABLE
        object: String,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Snapshot the system catalog into the metadata directory
    CollectMetadata {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Snapshot one table's columns and indexes into the metadata directory
    CollectTable {
        /// SCHEMA.TABLE
        object: String,
        #[command(flatten)]
        output: OutputArgs,
    },
}

impl Command {
    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Command::TableProps { .. } => "table-props",
            Command::ViewInfo { .. } => "view-info",
            Command::ProcedureInfo { .. } => "procedure-info",
            Command::FunctionInfo { .. } => "function-info",
            Command::PackageAnalysis { .. } => "package-analysis",
            Command::Relationship { .. } => "relationship",
            Command::Dependencies { .. } => "dependencies",
            Command::CdcInfo { .. } => "cdc-info",
            Command::ListTables { .. } => "list-tables",
            Command::ListViews { .. } => "list-views",
            Command::TableDdl { .. } => "table-ddl",
            Command::CollectMetadata { .. } => "collect-metadata",
            Command::CollectTable { .. } => "collect-table",
        }
    }

    pub fn output(&self) -> &OutputArgs {
        match self {
            Command::TableProps { output, .. }
            | Command::ViewInfo { output, .. }
            | Command::ProcedureInfo { output, .. }
            | Command::FunctionInfo { output, .. }
            | Command::PackageAnalysis { output, .. }
            | Command::Relationship { output, .. }
            | Command::Dependencies { output, .. }
            | Command::CdcInfo { output, .. }
            | Command::ListTables { output, .. }
            | Command::ListViews { output, .. }
            | Command::TableDdl { output, .. }
            | Command::CollectMetadata { output }
            | Command::CollectTable { output, .. } => output,
        }
    }
}

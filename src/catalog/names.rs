//! Logical statement names
//!
//! Shared between the statement files and every call site. A name used here
//! but missing from a provider's file is a configuration error.

pub const GET_SERVER_VERSION: &str = "GetServerVersion";
pub const GET_SYSTEM_TABLES: &str = "GetSystemTables";

pub const LIST_TABLES: &str = "ListTables";
pub const LIST_VIEWS: &str = "ListViews";

pub const GET_TABLE_METADATA: &str = "GetTableMetadata";
pub const GET_TABLE_COLUMNS: &str = "GetTableColumns_All";
pub const GET_TABLE_INDEXES: &str = "GetTableIndexes_All";
pub const GET_TABLE_PRIMARY_KEY: &str = "GetTablePrimaryKey";
pub const GET_TABLE_RELATIONSHIPS: &str = "GetTableRelationships";
/// Optional: not every catalog exposes triggers
pub const GET_TABLE_TRIGGERS: &str = "GetTableTriggers";
/// Optional: DB2 only
pub const GET_CDC_TABLES: &str = "GetCdcTables";
pub const GET_OBJECT_DEPENDENCIES: &str = "GetObjectDependencies";

pub const GET_VIEW_METADATA: &str = "GetViewMetadata";
pub const GET_VIEW_DEFINITION: &str = "GetViewDefinition";
pub const GET_VIEW_COLUMNS: &str = "GetViewColumns";
pub const GET_VIEW_DEPENDENCIES: &str = "GetViewDependencies";

pub const GET_PROCEDURE_METADATA: &str = "GetProcedureMetadata";
pub const GET_PROCEDURE_PARAMETERS: &str = "GetProcedureParameters";
pub const GET_PROCEDURE_SOURCE: &str = "GetProcedureSource";
pub const GET_PROCEDURE_DEPENDENCIES: &str = "GetProcedureDependencies";

pub const GET_FUNCTION_METADATA: &str = "GetFunctionMetadata";
pub const GET_FUNCTION_PARAMETERS: &str = "GetFunctionParameters";
pub const GET_FUNCTION_SOURCE: &str = "GetFunctionSource";
pub const GET_FUNCTION_DEPENDENCIES: &str = "GetFunctionDependencies";

pub const GET_PACKAGE_METADATA: &str = "GetPackageMetadata";
pub const PACKAGE_GET_STATEMENTS: &str = "PACKAGE_GetStatements";

/// Optional: lets the dependency analyzer tell views from tables
pub const GET_RELATION_TYPE: &str = "GetRelationType";
/// Optional: lets the dependency analyzer confirm routine references
pub const GET_ROUTINE_TYPE: &str = "GetRoutineType";

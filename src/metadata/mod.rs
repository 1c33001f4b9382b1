//! Metadata access
//!
//! The provider runs catalog statements; the model turns their rows into
//! typed values.

pub mod model;
pub mod provider;

pub use model::{
    ColumnMetadata, ColumnProfile, DataSample, DependencyKind, DependencyRef, IndexColumn,
    IndexInfo, ObjectDependency, ObjectIdentifier, ObjectKind, PackageDependencies, PackageStatement,
    ParameterInfo, ParameterMode, RelationshipEdge, TableAnalysis, TriggerInfo, UniqueRule,
};
pub use provider::{MetadataProvider, UNKNOWN_VERSION, clean_version};

//! Dependency analysis for packages

pub mod dependencies;

pub use dependencies::{DependencyAnalyzer, ExtractedReference, ReferenceKind, extract_references};

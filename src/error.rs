//! Error types for dbcontext
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors with clear error chains.
//!
//! The split follows how failures are handled: configuration and catalog
//! errors are fatal and never retried, database errors carry the logical
//! statement and object they were raised for.

use std::io;

/// Main error type for dbcontext
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Statement catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The catalog has no such object
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Identifier rejected before being interpolated into SQL text
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Command parsing errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Failed to establish connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Not connected to a database
    #[error("Not connected to database")]
    NotConnected,

    /// Operation timed out
    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    /// A catalog statement failed; keeps the logical name and object for diagnostics
    #[error("{statement} failed for {object}: {source}")]
    Statement {
        statement: String,
        object: String,
        #[source]
        source: Box<DbError>,
    },
}

/// Configuration loading/parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Home directory not found
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file not found
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read a configuration file
    #[error("Failed to read configuration: {0}")]
    Io(#[from] io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Connection profile not found
    #[error("Connection profile '{0}' not found")]
    ProfileNotFound(String),

    /// Provider has no connection implementation
    #[error("Provider {0} has no driver available")]
    UnsupportedProvider(String),
}

/// Statement catalog errors
///
/// All of these are caller-configuration errors: the logical name, the
/// template or the provider setup is wrong, so retrying cannot help.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No template registered for the (provider, version, name) triple
    #[error("Statement '{name}' not found for {provider} {version}")]
    StatementNotFound {
        provider: String,
        version: String,
        name: String,
    },

    /// The provider has no statement files at all
    #[error("No statements registered for provider {0}")]
    ProviderNotRegistered(String),

    /// Template failed validation while loading
    #[error("Invalid statement template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    /// Call site supplied a different number of parameters than declared
    #[error("Statement '{name}' expects {expected} parameter(s), got {actual}")]
    ParameterMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Statement file could not be parsed
    #[error("Failed to parse statement file {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: toml::de::Error,
    },

    /// Statement directory could not be read
    #[error("Failed to read statement directory: {0}")]
    Io(#[from] io::Error),
}

/// Command parsing and execution errors
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Missing required argument
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Specialized Result type for dbcontext operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Specialized Result type for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Specialized Result type for config operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized Result type for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Specialized Result type for command operations
pub type CommandResult<T> = std::result::Result<T, CommandError>;

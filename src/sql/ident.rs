//! Identifier validation and quoting
//!
//! Catalog statements bind their parameters, but sample queries, column
//! profiles and generated DDL have to name objects in the SQL text itself.
//! Every such name goes through here first.

use crate::error::{ContextError, Result};

/// Longest identifier any supported catalog accepts
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Reject names that cannot be a real catalog identifier
pub fn validate_identifier(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(ContextError::InvalidIdentifier("empty name".to_string()));
    }
    if name.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ContextError::InvalidIdentifier(format!(
            "'{}...' exceeds {} characters",
            name.chars().take(16).collect::<String>(),
            MAX_IDENTIFIER_LEN
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(ContextError::InvalidIdentifier(format!(
            "'{}' contains control characters",
            name.escape_debug()
        )));
    }
    Ok(name)
}

/// Validate and wrap a name in double quotes, doubling embedded quotes
pub fn quote_identifier(name: &str) -> Result<String> {
    let name = validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// `"SCHEMA"."NAME"`
pub fn qualified_name(schema: &str, name: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_identifier(schema)?, quote_identifier(name)?))
}

/// Wrap text as a SQL string literal (for `COMMENT ON ... IS '...'`)
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

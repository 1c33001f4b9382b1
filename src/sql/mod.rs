//! SQL utilities
//!
//! Tokenizing, identifier quoting and formatting shared by the statement
//! catalog, the dependency analyzer and DDL generation.

pub mod formatter;
pub mod ident;
pub mod lexer;

pub use formatter::format_statement;
pub use ident::{qualified_name, quote_identifier, validate_identifier};
pub use lexer::{Token, placeholder_count, tokenize};

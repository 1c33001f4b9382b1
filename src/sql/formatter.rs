//! Package statement layout
//!
//! DB2 stores the SQL of a bound package as section text with no line
//! breaks. Package reports show it one clause per line unless formatting is
//! switched off in the context options.

use sqlformat::{FormatOptions, Indent, QueryParams, format};

/// Lay out one package statement for a report.
///
/// Parameter markers and `:HOSTVAR` references are kept verbatim.
pub fn format_statement(sql: &str) -> String {
    let options = FormatOptions {
        indent: Indent::Spaces(2),
        lines_between_queries: 1,
        ..FormatOptions::default()
    };

    format(sql, &QueryParams::None, &options)
}

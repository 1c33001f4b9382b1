//! Tabular result rendering (JSON / Markdown)
//!
//! Pure serialization functions, no filesystem I/O. The caller writes the
//! returned value to disk.

use crate::db::types::{CellValue, QueryResults};
use unicode_truncate::{Alignment, UnicodeTruncateStr};
use unicode_width::UnicodeWidthStr;

/// Output format for reports and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

/// Query results as a JSON array of objects with typed values.
pub fn rows_to_json(results: &QueryResults) -> serde_json::Value {
    let col_names: Vec<&str> = results.columns.iter().map(|c| c.name.as_str()).collect();

    let rows: Vec<serde_json::Value> = results
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (i, cell) in row.values.iter().enumerate() {
                let key = col_names.get(i).copied().unwrap_or("?");
                obj.insert(key.to_string(), cell.to_json());
            }
            serde_json::Value::Object(obj)
        })
        .collect();

    serde_json::Value::Array(rows)
}

/// Render rows as an aligned Markdown table.
///
/// Cells are cut to `max_cell_width` display columns; widths are measured
/// in terminal cells so CJK text lines up.
pub fn markdown_table(headers: &[String], rows: &[Vec<CellValue>], max_cell_width: usize) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| fit_cell(&cell_text(cell), max_cell_width))
                .collect()
        })
        .collect();
    let headers: Vec<String> = headers
        .iter()
        .map(|h| fit_cell(h, max_cell_width))
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.width().max(3)).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width());
            }
        }
    }

    let mut out = String::new();
    push_row(&mut out, &headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &cells {
        push_row(&mut out, row, &widths);
    }
    out
}

/// Render string rows (already formatted) as a Markdown table
pub fn markdown_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let rows: Vec<Vec<CellValue>> = rows
        .iter()
        .map(|row| row.iter().map(|s| CellValue::Text(s.clone())).collect())
        .collect();
    markdown_table(&headers, &rows, usize::MAX)
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    out.push('|');
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        out.push(' ');
        out.push_str(&cell.unicode_pad(*width, Alignment::Left, true));
        out.push_str(" |");
    }
    out.push('\n');
}

/// Cell text safe for a Markdown table row
fn cell_text(cell: &CellValue) -> String {
    cell.display_string(usize::MAX)
        .replace('|', "\\|")
        .replace(['\r', '\n'], " ")
}

fn fit_cell(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let (kept, _) = text.unicode_truncate(max_width.saturating_sub(3));
    format!("{}...", kept)
}

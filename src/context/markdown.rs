//! Markdown rendering of context reports
//!
//! The text form is meant to be pasted into a prompt, so it favours plain
//! headings and pipe tables over anything clever.

use crate::context::report::{ContextReport, Section};
use crate::export::{markdown_table, markdown_text_table};
use crate::metadata::{
    ColumnMetadata, ObjectIdentifier, PackageDependencies, RelationshipEdge, UniqueRule,
};
use std::collections::BTreeSet;

/// Widest cell in sample tables
const SAMPLE_CELL_WIDTH: usize = 40;

impl ContextReport {
    /// Render the report as Markdown
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}: {}\n", self.kind.label(), self.object));
        out.push_str(&format!(
            "\n_{} catalog, generated {}_\n",
            self.provider,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        for section in &self.sections {
            out.push('\n');
            render_section(&mut out, section);
        }
        out
    }
}

fn render_section(out: &mut String, section: &Section) {
    match section {
        Section::Metadata { entries } => {
            out.push_str("## Metadata\n\n");
            for entry in entries {
                out.push_str(&format!("- **{}:** {}\n", entry.label, entry.value));
            }
        }
        Section::Columns { columns } => {
            out.push_str(&format!("## Columns ({})\n\n", columns.len()));
            out.push_str(&columns_table(columns));
        }
        Section::Indexes { indexes } => {
            out.push_str("## Indexes\n\n");
            let rows: Vec<Vec<String>> = indexes
                .iter()
                .map(|ix| {
                    let kind = match ix.unique_rule {
                        UniqueRule::Primary => "PRIMARY KEY",
                        UniqueRule::Unique => "UNIQUE",
                        UniqueRule::Duplicate => "NON-UNIQUE",
                    };
                    let cols: Vec<String> = ix
                        .columns
                        .iter()
                        .map(|c| {
                            if c.descending {
                                format!("{} DESC", c.name)
                            } else {
                                c.name.clone()
                            }
                        })
                        .collect();
                    vec![
                        ix.name.clone(),
                        kind.to_string(),
                        cols.join(", "),
                        ix.index_type.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            out.push_str(&markdown_text_table(
                &["Name", "Kind", "Columns", "Type"],
                &rows,
            ));
        }
        Section::Parameters { parameters } => {
            out.push_str(&format!("## Parameters ({})\n\n", parameters.len()));
            let rows: Vec<Vec<String>> = parameters
                .iter()
                .map(|p| {
                    vec![
                        p.ordinal.to_string(),
                        p.name.clone().unwrap_or_else(|| "-".to_string()),
                        p.mode.to_string(),
                        p.data_type.clone(),
                        p.remarks.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            out.push_str(&markdown_text_table(
                &["#", "Name", "Mode", "Type", "Comment"],
                &rows,
            ));
        }
        Section::Source { text } => {
            out.push_str(&format!("## Source Code\n\n```sql\n{}\n```\n", text.trim_end()));
        }
        Section::Statements { total, shown } => {
            out.push_str(&format!("## Statements ({})\n\n", total));
            if shown.len() < *total {
                out.push_str(&format!(
                    "_showing first {} of {} statements_\n\n",
                    shown.len(),
                    total
                ));
            }
            for stmt in shown {
                out.push_str(&format!(
                    "### Statement {} (section {})\n\n```sql\n{}\n```\n\n",
                    stmt.stmt_no,
                    stmt.section_no,
                    stmt.text.trim_end()
                ));
            }
        }
        Section::Dependencies { objects } => {
            out.push_str(&format!("## Dependencies ({})\n\n", objects.len()));
            let rows: Vec<Vec<String>> = objects
                .iter()
                .map(|d| vec![d.object.to_string(), d.object_type.clone()])
                .collect();
            out.push_str(&markdown_text_table(&["Object", "Type"], &rows));
        }
        Section::PackageDependencies { dependencies } => {
            out.push_str(&format!("## Dependencies ({})\n\n", dependencies.total()));
            render_package_dependencies(out, dependencies);
        }
        Section::Relationships { edges } => {
            out.push_str(&format!("## Relationships ({})\n\n", edges.len()));
            out.push_str(&relationships_table(edges));
        }
        Section::NoRelationship { from, to } => {
            out.push_str(&format!(
                "## Relationship\n\nNo foreign key relationship found between {} and {}.\n",
                from, to
            ));
        }
        Section::TableSummary { table, columns } => {
            out.push_str(&format!("## Table: {}\n\n", table));
            out.push_str(&columns_table(columns));
        }
        Section::Triggers { triggers } => {
            out.push_str("## Triggers\n\n");
            let rows: Vec<Vec<String>> = triggers
                .iter()
                .map(|t| {
                    vec![
                        t.name.clone(),
                        t.timing.clone().unwrap_or_default(),
                        t.events.clone().unwrap_or_default(),
                        yes_no(t.enabled).to_string(),
                    ]
                })
                .collect();
            out.push_str(&markdown_text_table(
                &["Name", "Timing", "Events", "Enabled"],
                &rows,
            ));
        }
        Section::ChangeCapture { enabled, mode } => {
            out.push_str(&format!(
                "## Change Data Capture\n\n- **Enabled:** {}\n- **Mode:** {}\n",
                yes_no(*enabled),
                mode
            ));
        }
        Section::Profile { profiles } => {
            out.push_str("## Column Profile\n\n");
            let rows: Vec<Vec<String>> = profiles
                .iter()
                .map(|p| {
                    vec![
                        p.column.clone(),
                        p.distinct_values.to_string(),
                        format!("{:.1}%", p.null_percent),
                        format!("{:.1}%", p.uniqueness_percent),
                    ]
                })
                .collect();
            out.push_str(&markdown_text_table(
                &["Column", "Distinct", "Null %", "Uniqueness %"],
                &rows,
            ));
        }
        Section::Sample {
            columns,
            rows,
            fetched,
        } => {
            out.push_str(&format!("## Sample Data (First {} Rows)\n\n", rows.len()));
            out.push_str(&markdown_table(columns, rows, SAMPLE_CELL_WIDTH));
            if *fetched > rows.len() {
                out.push_str(&format!("\n_{} rows fetched_\n", fetched));
            }
        }
        Section::Diagram { mermaid } => {
            out.push_str(&format!("## Diagram\n\n```mermaid\n{}```\n", mermaid));
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn columns_table(columns: &[ColumnMetadata]) -> String {
    let rows: Vec<Vec<String>> = columns
        .iter()
        .map(|c| {
            vec![
                c.ordinal.to_string(),
                c.name.clone(),
                c.display_type(),
                yes_no(c.nullable).to_string(),
                c.default.clone().unwrap_or_default(),
                c.remarks.clone().unwrap_or_default(),
            ]
        })
        .collect();
    markdown_text_table(
        &["#", "Name", "Type", "Nullable", "Default", "Comment"],
        &rows,
    )
}

fn relationships_table(edges: &[RelationshipEdge]) -> String {
    let rows: Vec<Vec<String>> = edges
        .iter()
        .map(|e| {
            vec![
                e.constraint_name.clone(),
                e.from.to_string(),
                e.from_columns.join(", "),
                e.to.to_string(),
                e.to_columns.join(", "),
                e.delete_rule.clone().unwrap_or_default(),
            ]
        })
        .collect();
    markdown_text_table(
        &["Constraint", "From", "Columns", "To", "Columns", "On Delete"],
        &rows,
    )
}

fn render_package_dependencies(out: &mut String, deps: &PackageDependencies) {
    let groups: [(&str, &BTreeSet<ObjectIdentifier>); 4] = [
        ("Tables Used", &deps.tables_used),
        ("Views Used", &deps.views_used),
        ("Procedures Called", &deps.procedures_called),
        ("Functions Called", &deps.functions_called),
    ];
    for (title, set) in groups {
        if set.is_empty() {
            continue;
        }
        out.push_str(&format!("### {} ({})\n\n", title, set.len()));
        for object in set {
            let usage = deps
                .details
                .iter()
                .find(|d| &d.object == object)
                .map(|d| format!(" (used in {} statement(s))", d.usage_count))
                .unwrap_or_default();
            out.push_str(&format!("- {}{}\n", object, usage));
        }
        out.push('\n');
    }
}

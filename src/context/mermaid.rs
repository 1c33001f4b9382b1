//! Mermaid entity-relationship diagrams

use crate::metadata::{ObjectIdentifier, RelationshipEdge};

/// Mermaid entity id for a table (`SCHEMA_TABLE`, word characters only)
pub fn entity_id(table: &ObjectIdentifier) -> String {
    format!("{}_{}", table.schema, table.name)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// `erDiagram` text for a set of foreign keys.
///
/// The referenced table sits on the "one" side, the referencing table on
/// the "many" side.
pub fn er_diagram(edges: &[RelationshipEdge]) -> String {
    if edges.is_empty() {
        return String::new();
    }

    let mut out = String::from("erDiagram\n");
    for edge in edges {
        let label = edge.constraint_name.replace('"', "'");
        out.push_str(&format!(
            "    {} ||--o{{ {} : \"{}\"\n",
            entity_id(&edge.to),
            entity_id(&edge.from),
            label
        ));
    }
    out
}

//! Export: emitting the assembled graph as graph-database statements
//!
//! One `CREATE` per node, then one `MATCH`+`CREATE` per edge, ready to
//! be streamed into an external sink. String values are escaped
//! deterministically; attribute order follows the node's ordered map so
//! repeated exports of the same document are byte-identical.

use crate::graph::{AttrValue, Edge, GraphDoc, Node};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Backslash-escape `\` and `"` for embedding in a quoted string.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Normalize a relation name into an identifier: uppercase, spaces and
/// hyphens to underscores.
pub fn clean_relation(s: &str) -> String {
    s.to_uppercase().replace([' ', '-'], "_")
}

fn render_value(value: &AttrValue) -> String {
    match value {
        AttrValue::String(s) => format!("\"{}\"", escape(s)),
        AttrValue::Int(v) => v.to_string(),
        AttrValue::Float(v) => v.to_string(),
        AttrValue::Bool(v) => v.to_string(),
    }
}

fn node_statement(node: &Node) -> String {
    let mut props = format!(
        "id: \"{}\", label: \"{}\"",
        escape(node.id.as_str()),
        escape(&node.label)
    );
    if let Some(node_type) = node.node_type {
        props.push_str(&format!(", type: \"{}\"", node_type.as_str()));
    }
    for (key, value) in &node.attributes {
        props.push_str(&format!(", {}: {}", key, render_value(value)));
    }
    format!("CREATE (:Entity {{{}}});", props)
}

fn edge_statement(edge: &Edge) -> String {
    let attrs = if edge.attributes.is_empty() {
        String::new()
    } else {
        let pairs: Vec<String> = edge
            .attributes
            .iter()
            .map(|(k, v)| format!("{}: {}", k, render_value(v)))
            .collect();
        format!(" {{ {} }}", pairs.join(", "))
    };
    format!(
        "MATCH (a {{id: \"{}\"}}), (b {{id: \"{}\"}}) CREATE (a)-[:{}{}]->(b);",
        escape(edge.source.as_str()),
        escape(edge.target.as_str()),
        clean_relation(&edge.relation),
        attrs
    )
}

/// Iterate create-node statements, then create-relationship statements.
///
/// A repeated node ID is emitted once; the merge engine should prevent
/// them, but the exporter does not assume a clean document.
pub fn statements(doc: &GraphDoc) -> impl Iterator<Item = String> + '_ {
    let mut seen_ids = HashSet::new();
    let nodes = doc
        .nodes
        .iter()
        .filter(move |n| seen_ids.insert(n.id.clone()))
        .map(node_statement);
    let edges = doc.edges.iter().map(edge_statement);
    nodes.chain(edges)
}

/// Write all statements to a file, one per line.
pub fn write_cypher(doc: &GraphDoc, path: impl AsRef<Path>) -> std::io::Result<()> {
    let path = path.as_ref();
    let text: String = statements(doc)
        .map(|s| s + "\n")
        .collect();
    std::fs::write(path, text)?;
    info!(
        path = %path.display(),
        nodes = doc.node_count(),
        edges = doc.edge_count(),
        "wrote export statements"
    );
    Ok(())
}

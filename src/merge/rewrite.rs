//! Cross-reference rewriting after renumbering
//!
//! Labels may point at sibling nodes with bracketed tokens (`"IF [s1]
//! THEN [s2]"`). Once the allocator has renumbered the patch, every such
//! token, and every edge endpoint, must be pushed through the ID map.
//! Nodes are renumbered first so the map is complete; rewriting edges
//! before the map exists would read stale IDs.

use super::namespace::IdMap;
use crate::graph::{Edge, Node, NodeId};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static BRACKET_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([nswrt]\d+)\]").expect("bracket ref pattern"));

/// Rewrite bracketed managed-ID tokens inside every node label.
///
/// Tokens whose ID is not in the map are left unchanged.
pub fn rewrite_labels(nodes: &mut [Node], map: &IdMap) {
    for node in nodes.iter_mut() {
        node.label = rewrite_label_text(&node.label, map);
    }
}

/// Rewrite a single label's bracketed tokens through the map.
pub fn rewrite_label_text(label: &str, map: &IdMap) -> String {
    BRACKET_REF_RE
        .replace_all(label, |caps: &Captures| {
            let old = NodeId::from_string(&caps[1]);
            match map.get(&old) {
                Some(new_id) => format!("[{}]", new_id),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Rewrite every edge's endpoints through the map.
///
/// Endpoints absent from the map refer to nodes outside this patch and
/// stay as they are.
pub fn rewrite_endpoints(edges: &mut [Edge], map: &IdMap) {
    for edge in edges.iter_mut() {
        if let Some(new_source) = map.get(&edge.source) {
            edge.source = new_source.clone();
        }
        if let Some(new_target) = map.get(&edge.target) {
            edge.target = new_target.clone();
        }
    }
}

//! Global duplicate collapse: one node per (label, type) across the graph
//!
//! Per-patch deduplication is by ID; across many patches the generator
//! still mints distinct IDs for the same fact. The collapser merges
//! nodes whose label and type match exactly, rewires every edge onto the
//! first-encountered survivor, and re-deduplicates the edge list.

use crate::graph::{GraphDoc, NodeId, NodeType};
use std::collections::HashMap;
use tracing::{debug, info};

/// What `merge_duplicate_nodes` did.
#[derive(Debug, Clone, Default)]
pub struct CollapseReport {
    /// Nodes dropped in favor of an earlier survivor
    pub nodes_merged: usize,
    /// Edges removed as duplicates after rewiring
    pub edges_removed: usize,
}

impl CollapseReport {
    /// True if the pass changed nothing
    pub fn is_noop(&self) -> bool {
        self.nodes_merged == 0 && self.edges_removed == 0
    }
}

/// Merge nodes sharing identical (label, type); idempotent.
///
/// The first node of each group in document order survives. Later
/// members are dropped and every edge endpoint pointing at them is
/// rewritten to the survivor; edges that become identical triples are
/// then removed, keeping the first occurrence.
pub fn merge_duplicate_nodes(doc: &mut GraphDoc) -> CollapseReport {
    let mut survivors: HashMap<(String, Option<NodeType>), NodeId> = HashMap::new();
    let mut remap: HashMap<NodeId, NodeId> = HashMap::new();

    for node in &doc.nodes {
        let key = (node.label.clone(), node.node_type);
        match survivors.get(&key) {
            Some(survivor) => {
                debug!(duplicate = %node.id, survivor = %survivor, "collapsing duplicate node");
                remap.insert(node.id.clone(), survivor.clone());
            }
            None => {
                survivors.insert(key, node.id.clone());
            }
        }
    }

    let mut report = CollapseReport {
        nodes_merged: remap.len(),
        edges_removed: 0,
    };
    if remap.is_empty() {
        return report;
    }

    doc.nodes.retain(|n| !remap.contains_key(&n.id));

    for edge in doc.edges.iter_mut() {
        if let Some(survivor) = remap.get(&edge.source) {
            edge.source = survivor.clone();
        }
        if let Some(survivor) = remap.get(&edge.target) {
            edge.target = survivor.clone();
        }
    }

    let before = doc.edges.len();
    let mut seen = std::collections::HashSet::new();
    doc.edges.retain(|e| seen.insert(e.triple()));
    report.edges_removed = before - doc.edges.len();

    info!(
        nodes_merged = report.nodes_merged,
        edges_removed = report.edges_removed,
        "collapsed duplicate nodes"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn typed(id: &str, label: &str, node_type: NodeType) -> Node {
        Node::new(id, label).with_type(node_type)
    }

    #[test]
    fn first_node_in_order_survives() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(typed("n1", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("n2", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("n3", "Driver", NodeType::Entity));

        let report = merge_duplicate_nodes(&mut doc);
        assert_eq!(report.nodes_merged, 1);
        assert_eq!(doc.node_count(), 2);
        assert!(doc.get_node(&NodeId::from_string("n1")).is_some());
        assert!(doc.get_node(&NodeId::from_string("n2")).is_none());
    }

    #[test]
    fn same_label_different_type_is_kept() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(typed("n1", "Coverage", NodeType::Entity));
        doc.nodes.push(typed("t1", "Coverage", NodeType::Topic));

        let report = merge_duplicate_nodes(&mut doc);
        assert!(report.is_noop());
        assert_eq!(doc.node_count(), 2);
    }

    #[test]
    fn edges_rewire_to_survivor() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(typed("n1", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("n2", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("s1", "is insured", NodeType::Statement));
        doc.edges.push(Edge::new("n2", "SUBJECT_OF", "s1"));
        doc.edges.push(Edge::new("s1", "MENTIONS", "n2"));

        merge_duplicate_nodes(&mut doc);
        assert_eq!(doc.edges[0].source.as_str(), "n1");
        assert_eq!(doc.edges[1].target.as_str(), "n1");
    }

    #[test]
    fn rewired_duplicate_edges_collapse() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(typed("n1", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("n2", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("s1", "is insured", NodeType::Statement));
        doc.edges.push(Edge::new("n1", "SUBJECT_OF", "s1"));
        doc.edges.push(Edge::new("n2", "SUBJECT_OF", "s1"));

        let report = merge_duplicate_nodes(&mut doc);
        assert_eq!(report.edges_removed, 1);
        assert_eq!(doc.edge_count(), 1);
    }

    #[test]
    fn rewiring_may_produce_self_loops() {
        // n2 collapses into n1; an n1->n2 edge becomes a self-loop,
        // which is tolerated.
        let mut doc = GraphDoc::new();
        doc.nodes.push(typed("n1", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("n2", "Vehicle", NodeType::Entity));
        doc.edges.push(Edge::new("n1", "SAME_AS", "n2"));

        merge_duplicate_nodes(&mut doc);
        assert_eq!(doc.edge_count(), 1);
        assert_eq!(doc.edges[0].source, doc.edges[0].target);
    }

    #[test]
    fn untyped_nodes_group_together() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("a", "same"));
        doc.nodes.push(Node::new("b", "same"));

        let report = merge_duplicate_nodes(&mut doc);
        assert_eq!(report.nodes_merged, 1);
    }

    #[test]
    fn collapse_is_idempotent() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(typed("n1", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("n2", "Vehicle", NodeType::Entity));
        doc.nodes.push(typed("s1", "is insured", NodeType::Statement));
        doc.edges.push(Edge::new("n1", "SUBJECT_OF", "s1"));
        doc.edges.push(Edge::new("n2", "SUBJECT_OF", "s1"));

        merge_duplicate_nodes(&mut doc);
        let snapshot = doc.clone();

        let report = merge_duplicate_nodes(&mut doc);
        assert!(report.is_noop());
        assert_eq!(doc, snapshot);
    }
}

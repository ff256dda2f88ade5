//! GraphDoc: the persisted single-document graph

use super::edge::{Edge, EdgeTriple};
use super::node::{Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The whole assembled graph, persisted as one JSON document.
///
/// Owned exclusively by the merge engine for the duration of one merge
/// operation; the document on disk is the single source of truth between
/// operations. The invariant that every edge endpoint names an existing
/// node is enforced at merge time, not assumed on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDoc {
    /// All nodes, in insertion order
    pub nodes: Vec<Node>,
    /// All edges, in insertion order
    pub edges: Vec<Edge>,
}

impl GraphDoc {
    /// Create an empty graph document
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up a node by ID
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// The set of all node IDs
    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// The set of all edge identity triples
    pub fn edge_triples(&self) -> HashSet<EdgeTriple> {
        self.edges.iter().map(|e| e.triple()).collect()
    }

    /// True if an edge with this exact (source, relation, target) exists
    pub fn has_edge(&self, source: &NodeId, relation: &str, target: &NodeId) -> bool {
        self.edges
            .iter()
            .any(|e| &e.source == source && e.relation == relation && &e.target == target)
    }
}

//! Edge representation with triple-based identity

use super::node::{Attributes, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The identity of an edge for deduplication purposes.
///
/// Two edges are the same edge iff their (source, relation, target)
/// triples are equal. `edgeId` is a presentational sequence number and
/// plays no part in identity.
pub type EdgeTriple = (NodeId, String, NodeId);

/// A directed edge in the assembled graph
///
/// The graph is a multigraph: two edges between the same pair of nodes
/// coexist as long as their relations differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node
    pub source: NodeId,
    /// Target node
    pub target: NodeId,
    /// Relationship name (e.g., "CAUSES", "HAS_CHILD")
    pub relation: String,
    /// Presentational sequence number (`e1`, `e2`, ...), assigned at merge
    #[serde(rename = "edgeId", skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
    /// Additional scalar attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

impl Edge {
    /// Create a new edge without an edge ID
    pub fn new(
        source: impl Into<NodeId>,
        relation: impl Into<String>,
        target: impl Into<NodeId>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            edge_id: None,
            attributes: BTreeMap::new(),
        }
    }

    /// The (source, relation, target) identity triple
    pub fn triple(&self) -> EdgeTriple {
        (
            self.source.clone(),
            self.relation.clone(),
            self.target.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_ignores_edge_id() {
        let mut a = Edge::new("n1", "rel", "s1");
        let mut b = Edge::new("n1", "rel", "s1");
        a.edge_id = Some("e1".to_string());
        b.edge_id = Some("e99".to_string());
        assert_eq!(a.triple(), b.triple());
    }

    #[test]
    fn distinct_relations_are_distinct_triples() {
        let a = Edge::new("n1", "rel", "s1");
        let b = Edge::new("n1", "other", "s1");
        assert_ne!(a.triple(), b.triple());
    }
}

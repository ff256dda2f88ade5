//! Topic tree: a hierarchy of labeled character spans over one document
//!
//! Each node owns a closed interval `[char_start, char_end]`; children
//! nest strictly inside their parent and siblings do not overlap. The
//! tree is built once per document and read-only afterwards, except for
//! being flattened into Topic graph nodes.

use crate::graph::{Edge, Node, NodeId, NodeType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One labeled span in the topic hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    /// Stable identifier (UUID at build time; opaque on load)
    pub id: String,
    /// Topic label
    pub name: String,
    /// First character of the span (inclusive)
    pub char_start: usize,
    /// Last character of the span (inclusive)
    pub char_end: usize,
    /// Nested sub-topics
    #[serde(default)]
    pub children: Vec<TopicNode>,
}

impl TopicNode {
    /// Create a leaf topic covering `[char_start, char_end]`.
    pub fn new(name: impl Into<String>, char_start: usize, char_end: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            char_start,
            char_end,
            children: Vec::new(),
        }
    }

    /// Add a child span.
    pub fn with_child(mut self, child: TopicNode) -> Self {
        self.children.push(child);
        self
    }

    /// True if this node's interval fully contains `[start, end]`.
    pub fn contains(&self, start: usize, end: usize) -> bool {
        self.char_start <= start && end <= self.char_end
    }

    /// Find the deepest node whose interval contains `[start, end]`.
    ///
    /// Returns None when even this node does not contain the span. With
    /// well-nested input at most one child can claim containment; if the
    /// nesting invariant is violated the first matching child wins.
    pub fn locate(&self, start: usize, end: usize) -> Option<&TopicNode> {
        if !self.contains(start, end) {
            return None;
        }
        for child in &self.children {
            if let Some(found) = child.locate(start, end) {
                return Some(found);
            }
        }
        Some(self)
    }

    /// Flatten the tree into Topic graph nodes and `HAS_CHILD` edges.
    ///
    /// Span boundaries ride along as node attributes. The output merges
    /// through the engine like any other patch; topic IDs are opaque to
    /// the namespace allocator and survive renumbering untouched.
    pub fn flatten(&self) -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        self.flatten_into(&mut nodes, &mut edges);
        (nodes, edges)
    }

    fn flatten_into(&self, nodes: &mut Vec<Node>, edges: &mut Vec<Edge>) {
        nodes.push(
            Node::new(self.id.clone(), self.name.clone())
                .with_type(NodeType::Topic)
                .with_attribute("char_start", self.char_start as i64)
                .with_attribute("char_end", self.char_end as i64),
        );
        for child in &self.children {
            edges.push(Edge::new(
                self.id.clone(),
                "HAS_CHILD",
                child.id.clone(),
            ));
            child.flatten_into(nodes, edges);
        }
    }
}

/// A recursive one-sentence summary tree, as produced upstream of the
/// graph: `{ "summary": ..., "children": [...] }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryNode {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub children: Vec<SummaryNode>,
}

/// Convert a summary tree into a minimal graph patch: one `s*` Summary
/// node per tree node, linked parent-to-child with `HAS_CHILD`.
///
/// IDs are numbered from 1 within the patch; the merge engine renumbers
/// them into the target's statement namespace.
pub fn summary_tree_to_patch(tree: &SummaryNode) -> (Vec<Node>, Vec<Edge>) {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut counter = 0usize;
    walk_summary(tree, None, &mut counter, &mut nodes, &mut edges);
    (nodes, edges)
}

fn walk_summary(
    tree: &SummaryNode,
    parent: Option<NodeId>,
    counter: &mut usize,
    nodes: &mut Vec<Node>,
    edges: &mut Vec<Edge>,
) {
    *counter += 1;
    let id = NodeId::from_string(format!("s{}", counter));
    let label = tree.summary.clone().unwrap_or_default();
    nodes.push(Node::new(id.clone(), label).with_type(NodeType::Summary));
    if let Some(parent) = parent {
        edges.push(Edge::new(parent, "HAS_CHILD", id.clone()));
    }
    for child in &tree.children {
        walk_summary(child, Some(id.clone()), counter, nodes, edges);
    }
}

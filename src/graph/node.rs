//! Node representation in the assembled graph

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a node
///
/// Serializes as a plain string. Managed IDs carry a one-letter type
/// prefix and an integer suffix (`n3`, `s12`, ...); anything else is an
/// externally stable identifier and passes through merges unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Node type classification
///
/// Matches the generator's vocabulary; serialized PascalCase
/// (`"type": "TimeAnchor"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Statement,
    TimeAnchor,
    Entity,
    Rule,
    Topic,
    Summary,
}

impl NodeType {
    /// The wire name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statement => "Statement",
            Self::TimeAnchor => "TimeAnchor",
            Self::Entity => "Entity",
            Self::Rule => "Rule",
            Self::Topic => "Topic",
            Self::Summary => "Summary",
        }
    }
}

/// Scalar attribute values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Attribute collection
///
/// Ordered map so the persisted document and the exported statements are
/// byte-stable across runs.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A node in the assembled graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,
    /// Label text; may embed bracketed cross-references like `[s3]`
    pub label: String,
    /// Type within the generator's vocabulary
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    /// Additional scalar attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

impl Node {
    /// Create a new node with the given ID and label
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set the node type
    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

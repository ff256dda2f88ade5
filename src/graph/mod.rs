//! Core graph data structures

mod document;
mod edge;
mod node;


pub use document::GraphDoc;
pub use edge::{Edge, EdgeTriple};
pub use node::{AttrValue, Attributes, Node, NodeId, NodeType};

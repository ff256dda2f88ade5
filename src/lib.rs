//! Graft: incremental knowledge-graph assembly
//!
//! Small graph fragments ("patches") arrive one at a time from an
//! external, unreliable text generator. Graft assembles them into one
//! consistent, deduplicated knowledge graph persisted as a single JSON
//! document.
//!
//! # Core Concepts
//!
//! - **Patches**: nodes/edges fragments, possibly wrapped in fences or
//!   prose, recovered by a balanced-brace scan
//! - **Namespaces**: one-letter ID prefixes renumbered per merge so
//!   repeated patches never collide
//! - **Synthesis**: causal edges materialized into explicit Rule nodes;
//!   topic attachments compacted when ownership is unambiguous
//!
//! # Example
//!
//! ```
//! use graft::{merge_graph_patch, GraphDoc, MergeOptions, Node};
//!
//! let mut doc = GraphDoc::new();
//! let nodes = vec![Node::new("s1", "first statement")];
//! let report = merge_graph_patch(&mut doc, nodes, vec![], &MergeOptions::default()).unwrap();
//! assert_eq!(report.nodes_added, 1);
//! ```

mod graph;
pub mod export;
pub mod merge;
pub mod patch;
pub mod storage;
pub mod topic;

pub use graph::{AttrValue, Attributes, Edge, EdgeTriple, GraphDoc, Node, NodeId, NodeType};
pub use merge::{
    attach_statements, compact_topics, materialize_rules, merge_duplicate_nodes, merge_edges,
    merge_graph_patch, AmbiguousRule, AttachReport, CollapseReport, CompactionReport, IdAllocator,
    IdMap, MergeEngine, MergeError, MergeOptions, MergeReport, SynthesisOptions, SynthesisReport,
};
pub use patch::{PatchError, PatchSource};
pub use storage::{JsonStore, StorageError, StorageResult};
pub use topic::{summary_tree_to_patch, SummaryNode, TopicNode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

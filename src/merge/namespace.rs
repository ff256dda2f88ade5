//! ID namespace allocation across repeated merges
//!
//! Incoming patches number their nodes from 1 every time (`n1`, `s1`, ...).
//! The allocator rebases those IDs onto the target graph's namespaces so
//! that every merge continues where the last one left off.

use crate::graph::{GraphDoc, Node, NodeId};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// The managed one-letter prefixes: entity, statement, time-anchor,
/// rule, topic. IDs outside these namespaces are externally stable and
/// pass through unchanged.
pub const MANAGED_PREFIXES: [char; 5] = ['n', 's', 'w', 'r', 't'];

static MANAGED_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([nswrt])(\d+)$").expect("managed id pattern"));

static EDGE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^e(\d+)$").expect("edge id pattern"));

/// Mapping from a patch's original node IDs to their IDs in the target
/// graph. Scoped to one merge call; never persisted.
pub type IdMap = HashMap<NodeId, NodeId>;

/// Split a managed ID into its prefix letter and integer suffix.
///
/// Returns None for externally supplied IDs. Suffixes too large for u64
/// are treated as unmanaged rather than wrapped.
pub fn managed_suffix(id: &str) -> Option<(char, u64)> {
    let caps = MANAGED_ID_RE.captures(id)?;
    let prefix = caps[1].chars().next()?;
    let suffix: u64 = caps[2].parse().ok()?;
    Some((prefix, suffix))
}

/// Parse a presentational edge ID (`e7` -> 7).
pub fn edge_suffix(id: &str) -> Option<u64> {
    let caps = EDGE_ID_RE.captures(id)?;
    caps[1].parse().ok()
}

/// Per-prefix counters seeded from the target graph's current contents.
///
/// Constructed fresh at the start of each merge; there is no hidden
/// process-wide state.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    counters: HashMap<char, u64>,
}

impl IdAllocator {
    /// Seed each managed prefix with the highest suffix present in `doc`
    /// (0 if the prefix is unused).
    pub fn from_graph(doc: &GraphDoc) -> Self {
        let mut counters: HashMap<char, u64> =
            MANAGED_PREFIXES.iter().map(|&p| (p, 0)).collect();
        for node in &doc.nodes {
            if let Some((prefix, suffix)) = managed_suffix(node.id.as_str()) {
                let counter = counters.entry(prefix).or_insert(0);
                if suffix > *counter {
                    *counter = suffix;
                }
            }
        }
        Self { counters }
    }

    /// Hand out the next ID in a prefix's namespace.
    pub fn next_id(&mut self, prefix: char) -> NodeId {
        let counter = self.counters.entry(prefix).or_insert(0);
        *counter += 1;
        NodeId::from_string(format!("{}{}", prefix, counter))
    }

    /// Renumber `nodes` in place and return the old->new map.
    ///
    /// Managed IDs get fresh sequential suffixes in order of appearance;
    /// unmanaged IDs are recorded as identity entries so downstream
    /// rewriting is uniform.
    pub fn allocate(&mut self, nodes: &mut [Node]) -> IdMap {
        let mut map = IdMap::new();
        for node in nodes.iter_mut() {
            match managed_suffix(node.id.as_str()) {
                Some((prefix, _)) => {
                    let new_id = self.next_id(prefix);
                    map.insert(node.id.clone(), new_id.clone());
                    node.id = new_id;
                }
                None => {
                    map.insert(node.id.clone(), node.id.clone());
                }
            }
        }
        map
    }
}

/// Highest presentational edge-ID suffix in the document (0 if none).
pub fn max_edge_suffix(doc: &GraphDoc) -> u64 {
    doc.edges
        .iter()
        .filter_map(|e| e.edge_id.as_deref())
        .filter_map(edge_suffix)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn doc_with_nodes(ids: &[&str]) -> GraphDoc {
        let mut doc = GraphDoc::new();
        for id in ids {
            doc.nodes.push(Node::new(*id, format!("label {}", id)));
        }
        doc
    }

    #[test]
    fn managed_suffix_accepts_all_prefixes() {
        assert_eq!(managed_suffix("n3"), Some(('n', 3)));
        assert_eq!(managed_suffix("s12"), Some(('s', 12)));
        assert_eq!(managed_suffix("w1"), Some(('w', 1)));
        assert_eq!(managed_suffix("r9"), Some(('r', 9)));
        assert_eq!(managed_suffix("t40"), Some(('t', 40)));
    }

    #[test]
    fn managed_suffix_rejects_external_ids() {
        assert_eq!(managed_suffix("doc:policy-2024"), None);
        assert_eq!(managed_suffix("n"), None);
        assert_eq!(managed_suffix("x7"), None);
        assert_eq!(managed_suffix("n7b"), None);
        assert_eq!(managed_suffix(""), None);
    }

    #[test]
    fn counters_seed_from_graph_maxima() {
        let doc = doc_with_nodes(&["n2", "n7", "s1", "external"]);
        let mut alloc = IdAllocator::from_graph(&doc);
        assert_eq!(alloc.next_id('n').as_str(), "n8");
        assert_eq!(alloc.next_id('s').as_str(), "s2");
        assert_eq!(alloc.next_id('w').as_str(), "w1");
    }

    #[test]
    fn allocate_renumbers_in_patch_order() {
        let doc = doc_with_nodes(&["s3"]);
        let mut alloc = IdAllocator::from_graph(&doc);

        let mut incoming = vec![
            Node::new("s1", "first"),
            Node::new("n1", "entity"),
            Node::new("s2", "second"),
        ];
        let map = alloc.allocate(&mut incoming);

        assert_eq!(incoming[0].id.as_str(), "s4");
        assert_eq!(incoming[1].id.as_str(), "n1");
        assert_eq!(incoming[2].id.as_str(), "s5");
        assert_eq!(map[&NodeId::from_string("s1")].as_str(), "s4");
        assert_eq!(map[&NodeId::from_string("s2")].as_str(), "s5");
    }

    #[test]
    fn unmanaged_ids_map_to_themselves() {
        let doc = GraphDoc::new();
        let mut alloc = IdAllocator::from_graph(&doc);

        let mut incoming = vec![Node::new("doc:42", "external")];
        let map = alloc.allocate(&mut incoming);

        assert_eq!(incoming[0].id.as_str(), "doc:42");
        assert_eq!(map[&NodeId::from_string("doc:42")].as_str(), "doc:42");
    }

    #[test]
    fn allocation_is_monotonic_across_merges() {
        let mut doc = doc_with_nodes(&["s2"]);

        let mut first = vec![Node::new("s1", "p1")];
        IdAllocator::from_graph(&doc).allocate(&mut first);
        assert_eq!(first[0].id.as_str(), "s3");
        doc.nodes.extend(first);

        let mut second = vec![Node::new("s1", "p2")];
        IdAllocator::from_graph(&doc).allocate(&mut second);
        assert_eq!(second[0].id.as_str(), "s4");
    }

    #[test]
    fn max_edge_suffix_ignores_foreign_ids() {
        let mut doc = GraphDoc::new();
        let mut e1 = Edge::new("a", "r", "b");
        e1.edge_id = Some("e4".to_string());
        let mut e2 = Edge::new("b", "r", "c");
        e2.edge_id = Some("edge-77".to_string());
        doc.edges.push(e1);
        doc.edges.push(e2);
        assert_eq!(max_edge_suffix(&doc), 4);
    }
}

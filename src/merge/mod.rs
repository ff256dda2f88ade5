//! The merge engine: committing patches into the persisted graph
//!
//! One engine, feature-flagged, instead of one merge routine per caller.
//! A full merge renumbers a patch's nodes into the target's namespaces,
//! rewrites cross-references, and appends whatever is new; an edge-only
//! merge translates a corrective patch through the ID map produced by the
//! sibling full merge. Every operation reads the whole persisted
//! document, mutates it in memory, and writes it back in full.

mod collapse;
mod namespace;
mod rewrite;
mod synthesis;

pub use collapse::{merge_duplicate_nodes, CollapseReport};
pub use namespace::{managed_suffix, max_edge_suffix, IdAllocator, IdMap, MANAGED_PREFIXES};
pub use rewrite::{rewrite_endpoints, rewrite_label_text, rewrite_labels};
pub use synthesis::{
    compact_topics, materialize_rules, AmbiguousRule, CompactionReport, SynthesisOptions,
    SynthesisReport,
};

use crate::graph::{Edge, GraphDoc, Node, NodeId};
use crate::patch::{load_list, PatchError, PatchSource};
use crate::storage::{JsonStore, StorageError};
use crate::topic::TopicNode;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while merging a patch
#[derive(Debug, Error)]
pub enum MergeError {
    /// The patch could not be parsed at all; the fact-unit must be
    /// reported and skipped, never silently dropped.
    #[error("malformed patch: {0}")]
    MalformedPatch(#[from] PatchError),

    /// An edge references a node absent from the committed graph and
    /// `drop_missing` is off.
    #[error("edge {edge_source} -[{relation}]-> {target} references a missing node")]
    DanglingEdge {
        edge_source: NodeId,
        relation: String,
        target: NodeId,
    },

    /// Two incoming nodes resolved to the same ID. Cannot happen by
    /// construction; if it does, the allocator's invariant is broken.
    #[error("namespace collision: incoming nodes resolved to duplicate id {0}")]
    NamespaceCollision(NodeId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Feature flags consolidating the merge variants into one engine.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Drop edges whose endpoints are absent from the node set instead
    /// of failing the patch. Guards edge-only patches against nodes a
    /// cleanup pass removed.
    pub drop_missing: bool,
    /// Assign fresh sequential `e<N>` identifiers to appended edges.
    pub reassign_edge_ids: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            drop_missing: false,
            reassign_edge_ids: true,
        }
    }
}

/// What one merge call did.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// Nodes appended
    pub nodes_added: usize,
    /// Nodes skipped because their ID already existed
    pub nodes_skipped: usize,
    /// Edges appended
    pub edges_added: usize,
    /// Edges skipped because their triple already existed
    pub edges_skipped: usize,
    /// Edges dropped for missing endpoints (`drop_missing` only)
    pub edges_dropped: usize,
    /// The old->new ID map built for this patch. Hand it to
    /// `merge_edge_patch` for a corrective patch on the same fact-unit.
    pub id_map: IdMap,
}

impl MergeReport {
    /// True if the merge changed nothing
    pub fn is_noop(&self) -> bool {
        self.nodes_added == 0 && self.edges_added == 0
    }
}

/// Full merge of a nodes+edges patch into an in-memory document.
///
/// Steps, in the required order: allocate fresh IDs (building the map),
/// rewrite labels and endpoints through the map, validate endpoints,
/// then append what is new. A patch that fails validation leaves the
/// document untouched.
pub fn merge_graph_patch(
    doc: &mut GraphDoc,
    mut nodes: Vec<Node>,
    mut edges: Vec<Edge>,
    opts: &MergeOptions,
) -> Result<MergeReport, MergeError> {
    let mut allocator = IdAllocator::from_graph(doc);
    let existing_ids = doc.node_ids();

    let id_map = allocator.allocate(&mut nodes);
    check_collisions(&existing_ids, &id_map)?;

    rewrite_labels(&mut nodes, &id_map);
    rewrite_endpoints(&mut edges, &id_map);

    let mut report = MergeReport {
        id_map,
        ..Default::default()
    };

    let mut known_ids = existing_ids;
    known_ids.extend(nodes.iter().map(|n| n.id.clone()));
    let edges = screen_endpoints(edges, &known_ids, opts, &mut report)?;

    append_nodes(doc, nodes, &mut report);
    append_edges(doc, edges, opts, &mut report);

    info!(
        nodes_added = report.nodes_added,
        edges_added = report.edges_added,
        nodes_skipped = report.nodes_skipped,
        edges_skipped = report.edges_skipped,
        "merged patch"
    );
    Ok(report)
}

/// Edge-only merge of a corrective patch, translated through the ID map
/// produced by the sibling full merge for the same fact-unit.
pub fn merge_edges(
    doc: &mut GraphDoc,
    mut edges: Vec<Edge>,
    id_map: &IdMap,
    opts: &MergeOptions,
) -> Result<MergeReport, MergeError> {
    rewrite_endpoints(&mut edges, id_map);

    let mut report = MergeReport::default();
    let known_ids = doc.node_ids();
    let edges = screen_endpoints(edges, &known_ids, opts, &mut report)?;
    append_edges(doc, edges, opts, &mut report);

    info!(
        edges_added = report.edges_added,
        edges_skipped = report.edges_skipped,
        edges_dropped = report.edges_dropped,
        "merged edge patch"
    );
    Ok(report)
}

/// Verify that freshly allocated IDs collide neither with each other nor
/// with the target graph.
fn check_collisions(existing: &HashSet<NodeId>, id_map: &IdMap) -> Result<(), MergeError> {
    let mut fresh = HashSet::new();
    for (old, new) in id_map {
        if old != new && (existing.contains(new) || !fresh.insert(new.clone())) {
            return Err(MergeError::NamespaceCollision(new.clone()));
        }
    }
    Ok(())
}

/// Apply the `drop_missing` policy: filter dangling edges out, or fail
/// fast on the first one. Runs before any mutation so a rejected patch
/// never half-applies.
fn screen_endpoints(
    edges: Vec<Edge>,
    known_ids: &HashSet<NodeId>,
    opts: &MergeOptions,
    report: &mut MergeReport,
) -> Result<Vec<Edge>, MergeError> {
    if opts.drop_missing {
        let mut kept = Vec::with_capacity(edges.len());
        for edge in edges {
            if known_ids.contains(&edge.source) && known_ids.contains(&edge.target) {
                kept.push(edge);
            } else {
                warn!(
                    source = %edge.source,
                    relation = %edge.relation,
                    target = %edge.target,
                    "dropping edge with missing endpoint"
                );
                report.edges_dropped += 1;
            }
        }
        Ok(kept)
    } else {
        for edge in &edges {
            if !known_ids.contains(&edge.source) || !known_ids.contains(&edge.target) {
                return Err(MergeError::DanglingEdge {
                    edge_source: edge.source.clone(),
                    relation: edge.relation.clone(),
                    target: edge.target.clone(),
                });
            }
        }
        Ok(edges)
    }
}

fn append_nodes(doc: &mut GraphDoc, nodes: Vec<Node>, report: &mut MergeReport) {
    let mut seen = doc.node_ids();
    for node in nodes {
        if seen.insert(node.id.clone()) {
            doc.nodes.push(node);
            report.nodes_added += 1;
        } else {
            debug!(id = %node.id, "skipping duplicate node");
            report.nodes_skipped += 1;
        }
    }
}

fn append_edges(doc: &mut GraphDoc, edges: Vec<Edge>, opts: &MergeOptions, report: &mut MergeReport) {
    let mut seen = doc.edge_triples();
    let mut next_edge = max_edge_suffix(doc);
    for mut edge in edges {
        if seen.insert(edge.triple()) {
            if opts.reassign_edge_ids {
                next_edge += 1;
                edge.edge_id = Some(format!("e{}", next_edge));
            }
            doc.edges.push(edge);
            report.edges_added += 1;
        } else {
            debug!(
                source = %edge.source,
                relation = %edge.relation,
                target = %edge.target,
                "skipping duplicate edge"
            );
            report.edges_skipped += 1;
        }
    }
}

/// What `attach_statements` did.
#[derive(Debug, Clone, Default)]
pub struct AttachReport {
    /// The topic the span landed on, if any
    pub topic: Option<NodeId>,
    /// `HAS_STATEMENT` edges appended
    pub edges_added: usize,
}

/// Attach a fact-unit's nodes to the topic owning its character span.
///
/// Locates the deepest topic containing `[start, end]`, makes sure that
/// topic exists as a graph node, and links it to each given node with a
/// `HAS_STATEMENT` edge. A span outside the tree attaches nothing.
pub fn attach_statements(
    doc: &mut GraphDoc,
    tree: &TopicNode,
    span: (usize, usize),
    ids: &[NodeId],
) -> AttachReport {
    let (start, end) = span;
    let Some(topic) = tree.locate(start, end) else {
        debug!(start, end, "span not contained in topic tree");
        return AttachReport::default();
    };

    let topic_id = NodeId::from_string(topic.id.clone());
    if doc.get_node(&topic_id).is_none() {
        doc.nodes.push(
            Node::new(topic_id.clone(), topic.name.clone())
                .with_type(crate::graph::NodeType::Topic)
                .with_attribute("char_start", topic.char_start as i64)
                .with_attribute("char_end", topic.char_end as i64),
        );
    }

    let mut report = AttachReport {
        topic: Some(topic_id.clone()),
        edges_added: 0,
    };
    let mut next_edge = max_edge_suffix(doc);
    for id in ids {
        if doc.get_node(id).is_none() {
            warn!(id = %id, "cannot attach unknown node to topic");
            continue;
        }
        if !doc.has_edge(&topic_id, "HAS_STATEMENT", id) {
            next_edge += 1;
            let mut edge = Edge::new(topic_id.clone(), "HAS_STATEMENT", id.clone());
            edge.edge_id = Some(format!("e{}", next_edge));
            doc.edges.push(edge);
            report.edges_added += 1;
        }
    }
    report
}

/// Store-backed merge engine: read the whole document, apply one
/// operation, write the whole document back.
///
/// Concurrent callers against the same path race (lost update); the
/// caller serializes, not the engine.
#[derive(Debug)]
pub struct MergeEngine {
    store: JsonStore,
}

impl MergeEngine {
    /// Create an engine over a document store.
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    /// Full merge: the patch's `nodes` and `edges` lists.
    pub fn merge_patch(
        &self,
        patch: &PatchSource,
        opts: &MergeOptions,
    ) -> Result<MergeReport, MergeError> {
        let nodes: Vec<Node> = load_list(patch, "nodes")?;
        let edges: Vec<Edge> = load_list(patch, "edges")?;

        let mut doc = self.store.load()?;
        let report = merge_graph_patch(&mut doc, nodes, edges, opts)?;
        self.store.save(&doc)?;
        Ok(report)
    }

    /// Edge-only merge: the patch's `edges_patch` list, translated
    /// through `id_map` from the sibling full merge.
    pub fn merge_edge_patch(
        &self,
        patch: &PatchSource,
        id_map: &IdMap,
        opts: &MergeOptions,
    ) -> Result<MergeReport, MergeError> {
        let edges: Vec<Edge> = load_list(patch, "edges_patch")?;

        let mut doc = self.store.load()?;
        let report = merge_edges(&mut doc, edges, id_map, opts)?;
        self.store.save(&doc)?;
        Ok(report)
    }

    /// Run both synthesis passes: rule materialization, then topic
    /// compaction.
    pub fn synthesize(
        &self,
        opts: &SynthesisOptions,
    ) -> Result<(SynthesisReport, CompactionReport), MergeError> {
        let mut doc = self.store.load()?;
        let rules = materialize_rules(&mut doc, opts);
        let compaction = compact_topics(&mut doc);
        self.store.save(&doc)?;
        Ok((rules, compaction))
    }

    /// Collapse nodes sharing (label, type) across the whole graph.
    pub fn collapse_duplicates(&self) -> Result<CollapseReport, MergeError> {
        let mut doc = self.store.load()?;
        let report = merge_duplicate_nodes(&mut doc);
        self.store.save(&doc)?;
        Ok(report)
    }

    /// Attach nodes to the topic owning a character span.
    pub fn attach_unit(
        &self,
        tree: &TopicNode,
        span: (usize, usize),
        ids: &[NodeId],
    ) -> Result<AttachReport, MergeError> {
        let mut doc = self.store.load()?;
        let report = attach_statements(&mut doc, tree, span, ids);
        self.store.save(&doc)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_opts() -> MergeOptions {
        MergeOptions::default()
    }

    #[test]
    fn merge_into_empty_graph() {
        let mut doc = GraphDoc::new();
        let nodes = vec![Node::new("s1", "A"), Node::new("n1", "B")];
        let edges = vec![Edge::new("n1", "rel", "s1")];

        let report = merge_graph_patch(&mut doc, nodes, edges, &full_opts()).unwrap();
        assert_eq!(report.nodes_added, 2);
        assert_eq!(report.edges_added, 1);
        assert_eq!(doc.edges[0].edge_id.as_deref(), Some("e1"));
    }

    #[test]
    fn disjoint_prefixes_merge_untouched() {
        // graph {s1:"A"} + patch {n1:"B", n1-rel->s1}
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("s1", "A"));

        let nodes = vec![Node::new("n1", "B")];
        let edges = vec![Edge::new("n1", "rel", "s1")];
        merge_graph_patch(&mut doc, nodes, edges, &full_opts()).unwrap();

        let ids = doc.node_ids();
        assert!(ids.contains(&NodeId::from_string("s1")));
        assert!(ids.contains(&NodeId::from_string("n1")));
        assert_eq!(doc.edge_count(), 1);
        let edge = &doc.edges[0];
        assert_eq!(edge.source.as_str(), "n1");
        assert_eq!(edge.relation, "rel");
        assert_eq!(edge.target.as_str(), "s1");
        assert_eq!(edge.edge_id.as_deref(), Some("e1"));
    }

    #[test]
    fn renumbering_avoids_existing_ids() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("s1", "existing"));

        let nodes = vec![Node::new("s1", "incoming")];
        let report = merge_graph_patch(&mut doc, nodes, vec![], &full_opts()).unwrap();

        assert_eq!(report.nodes_added, 1);
        assert_eq!(doc.node_count(), 2);
        assert!(doc.get_node(&NodeId::from_string("s2")).is_some());
        assert_eq!(doc.get_node(&NodeId::from_string("s1")).unwrap().label, "existing");
    }

    #[test]
    fn labels_rewrite_within_the_same_patch() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("s1", "taken"));
        doc.nodes.push(Node::new("s2", "taken too"));

        // s1 -> s3, s2 -> s4; the second label references [s1]
        let nodes = vec![
            Node::new("s1", "rain fell"),
            Node::new("s2", "because of [s1], the road was wet"),
        ];
        merge_graph_patch(&mut doc, nodes, vec![], &full_opts()).unwrap();

        let rewritten = doc.get_node(&NodeId::from_string("s4")).unwrap();
        assert_eq!(rewritten.label, "because of [s3], the road was wet");
    }

    #[test]
    fn duplicate_triples_are_skipped() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("a", "A"));
        doc.nodes.push(Node::new("b", "B"));
        doc.edges.push(Edge::new("a", "rel", "b"));

        let edges = vec![
            Edge::new("a", "rel", "b"),
            Edge::new("a", "rel", "b"),
            Edge::new("a", "other", "b"),
        ];
        let report = merge_graph_patch(&mut doc, vec![], edges, &full_opts()).unwrap();

        assert_eq!(report.edges_added, 1);
        assert_eq!(report.edges_skipped, 2);
        assert_eq!(doc.edge_count(), 2);
    }

    #[test]
    fn remerging_same_renumbered_patch_is_a_noop() {
        let mut doc = GraphDoc::new();
        let nodes = vec![Node::new("ext:1", "stable")];
        let edges = vec![Edge::new("ext:1", "rel", "ext:1")];
        merge_graph_patch(&mut doc, nodes.clone(), edges.clone(), &full_opts()).unwrap();

        let report = merge_graph_patch(&mut doc, nodes, edges, &full_opts()).unwrap();
        assert!(report.is_noop());
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.edge_count(), 1);
    }

    #[test]
    fn dangling_edge_fails_fast_without_drop_missing() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("a", "A"));

        let edges = vec![Edge::new("a", "rel", "ghost")];
        let err = merge_graph_patch(&mut doc, vec![], edges, &full_opts()).unwrap_err();
        assert!(matches!(err, MergeError::DanglingEdge { .. }));
        // Nothing was applied
        assert_eq!(doc.edge_count(), 0);
    }

    #[test]
    fn dangling_edge_dropped_with_drop_missing() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("a", "A"));
        doc.nodes.push(Node::new("b", "B"));

        let opts = MergeOptions {
            drop_missing: true,
            ..Default::default()
        };
        let edges = vec![Edge::new("a", "rel", "ghost"), Edge::new("a", "rel", "b")];
        let report = merge_graph_patch(&mut doc, vec![], edges, &opts).unwrap();

        assert_eq!(report.edges_added, 1);
        assert_eq!(report.edges_dropped, 1);
        assert_eq!(doc.edge_count(), 1);
        assert_eq!(doc.edges[0].target.as_str(), "b");
    }

    #[test]
    fn edge_ids_continue_from_document_maximum() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("a", "A"));
        doc.nodes.push(Node::new("b", "B"));
        let mut existing = Edge::new("a", "old", "b");
        existing.edge_id = Some("e7".to_string());
        doc.edges.push(existing);

        let edges = vec![Edge::new("a", "rel", "b")];
        merge_graph_patch(&mut doc, vec![], edges, &full_opts()).unwrap();
        assert_eq!(doc.edges[1].edge_id.as_deref(), Some("e8"));
    }

    #[test]
    fn edge_only_merge_translates_through_external_map() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("s5", "renumbered statement"));
        doc.nodes.push(Node::new("n2", "renumbered entity"));

        // The sibling full merge renumbered s1->s5, n1->n2.
        let id_map: IdMap = [
            (NodeId::from_string("s1"), NodeId::from_string("s5")),
            (NodeId::from_string("n1"), NodeId::from_string("n2")),
        ]
        .into_iter()
        .collect();

        let edges = vec![Edge::new("n1", "rel", "s1")];
        let report = merge_edges(&mut doc, edges, &id_map, &full_opts()).unwrap();

        assert_eq!(report.edges_added, 1);
        assert_eq!(doc.edges[0].source.as_str(), "n2");
        assert_eq!(doc.edges[0].target.as_str(), "s5");
    }

    #[test]
    fn edge_only_merge_can_keep_incoming_edge_ids() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("a", "A"));
        doc.nodes.push(Node::new("b", "B"));

        let opts = MergeOptions {
            drop_missing: false,
            reassign_edge_ids: false,
        };
        let mut edge = Edge::new("a", "rel", "b");
        edge.edge_id = Some("e99".to_string());
        merge_edges(&mut doc, vec![edge], &IdMap::new(), &opts).unwrap();
        assert_eq!(doc.edges[0].edge_id.as_deref(), Some("e99"));
    }

    #[test]
    fn engine_roundtrips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("graph.json"));
        store.ensure_exists().unwrap();
        let engine = MergeEngine::new(store);

        let patch = PatchSource::Inline(json!({
            "nodes": [
                { "id": "s1", "label": "A statement", "type": "Statement" }
            ],
            "edges": []
        }));
        let report = engine.merge_patch(&patch, &MergeOptions::default()).unwrap();
        assert_eq!(report.nodes_added, 1);

        let doc = engine.store().load().unwrap();
        assert_eq!(doc.node_count(), 1);
    }

    #[test]
    fn malformed_patch_surfaces_and_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("graph.json"));
        store.ensure_exists().unwrap();
        let engine = MergeEngine::new(store);

        let patch = PatchSource::Raw("the generator rambled with no JSON".to_string());
        let err = engine.merge_patch(&patch, &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, MergeError::MalformedPatch(_)));

        assert_eq!(engine.store().load().unwrap().node_count(), 0);
    }

    #[test]
    fn attach_links_nodes_to_deepest_topic() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("s1", "statement"));

        let tree = TopicNode::new("root", 0, 999)
            .with_child(TopicNode::new("sub", 0, 99));
        let sub_id = tree.children[0].id.clone();

        let report = attach_statements(
            &mut doc,
            &tree,
            (10, 20),
            &[NodeId::from_string("s1")],
        );

        assert_eq!(report.topic.as_ref().unwrap().as_str(), sub_id);
        assert_eq!(report.edges_added, 1);
        assert!(doc.has_edge(
            &NodeId::from_string(sub_id),
            "HAS_STATEMENT",
            &NodeId::from_string("s1")
        ));
    }

    #[test]
    fn attach_outside_tree_is_a_noop() {
        let mut doc = GraphDoc::new();
        doc.nodes.push(Node::new("s1", "statement"));

        let tree = TopicNode::new("root", 0, 99);
        let report = attach_statements(&mut doc, &tree, (200, 300), &[NodeId::from_string("s1")]);
        assert!(report.topic.is_none());
        assert_eq!(doc.edge_count(), 0);
    }
}

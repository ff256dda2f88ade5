//! Structural synthesis: derived rule nodes and topic compaction
//!
//! A causal edge between two statements carries an implicit if/then
//! relationship. Materialization makes it first-class: a Rule node whose
//! condition and conclusion edges point at the statements. Compaction
//! then folds a rule's statement-level topic attachments into a single
//! topic-to-rule link when ownership is unambiguous.

use super::namespace::{max_edge_suffix, IdAllocator};
use crate::graph::{Edge, GraphDoc, Node, NodeId, NodeType};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// How materialization treats the causal edges it consumes.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Keep the original `CAUSES` edge alongside the derived rule.
    pub keep_causal_edges: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            keep_causal_edges: false,
        }
    }
}

/// What `materialize_rules` did.
#[derive(Debug, Clone, Default)]
pub struct SynthesisReport {
    /// Rule nodes created
    pub rules_created: usize,
    /// `CAUSES` edges removed (only when `keep_causal_edges` is off)
    pub causal_edges_removed: usize,
}

/// Materialize every `CAUSES` edge into an explicit Rule node.
///
/// For `sA -CAUSES-> sB` not yet materialized, a fresh `r<N>` node
/// labeled `IF [sA] THEN [sB]` is created with `HAS_CONDITION -> sA` and
/// `HAS_CONCLUSION -> sB` edges. Re-running is a no-op: already-covered
/// pairs are skipped, and the new edges dedup by triple like any others.
pub fn materialize_rules(doc: &mut GraphDoc, opts: &SynthesisOptions) -> SynthesisReport {
    // (condition, conclusion) pairs already covered by some rule
    let mut covered: HashSet<(NodeId, NodeId)> = HashSet::new();
    for rule in rule_node_ids(doc) {
        let conditions = edge_targets(doc, &rule, "HAS_CONDITION");
        let conclusions = edge_targets(doc, &rule, "HAS_CONCLUSION");
        for cond in &conditions {
            for concl in &conclusions {
                covered.insert((cond.clone(), concl.clone()));
            }
        }
    }

    let causal: Vec<(NodeId, NodeId)> = doc
        .edges
        .iter()
        .filter(|e| e.relation == "CAUSES")
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();

    let mut allocator = IdAllocator::from_graph(doc);
    let mut next_edge = max_edge_suffix(doc);
    let mut report = SynthesisReport::default();

    for (cause, effect) in causal {
        if !covered.insert((cause.clone(), effect.clone())) {
            debug!(%cause, %effect, "causal pair already materialized");
            continue;
        }

        let rule_id = allocator.next_id('r');
        doc.nodes.push(
            Node::new(rule_id.clone(), format!("IF [{}] THEN [{}]", cause, effect))
                .with_type(NodeType::Rule),
        );

        let triples = doc.edge_triples();
        for (relation, target) in [("HAS_CONDITION", &cause), ("HAS_CONCLUSION", &effect)] {
            let mut edge = Edge::new(rule_id.clone(), relation, target.clone());
            if !triples.contains(&edge.triple()) {
                next_edge += 1;
                edge.edge_id = Some(format!("e{}", next_edge));
                doc.edges.push(edge);
            }
        }
        report.rules_created += 1;
    }

    if !opts.keep_causal_edges {
        let before = doc.edges.len();
        doc.edges.retain(|e| e.relation != "CAUSES");
        report.causal_edges_removed = before - doc.edges.len();
    }

    info!(
        rules_created = report.rules_created,
        causal_edges_removed = report.causal_edges_removed,
        "materialized rules"
    );
    report
}

/// A rule whose statements span zero or several topics; compaction left
/// it alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousRule {
    pub rule: NodeId,
    pub topic_count: usize,
}

/// What `compact_topics` did.
#[derive(Debug, Clone, Default)]
pub struct CompactionReport {
    /// Rules now attached directly to their single topic
    pub rules_compacted: usize,
    /// Statement-level attachments removed as redundant
    pub edges_removed: usize,
    /// Rules skipped because topic ownership was ambiguous. Not an
    /// error; surfaced for diagnostics.
    pub ambiguous: Vec<AmbiguousRule>,
}

/// Fold statement-level topic attachments into topic-to-rule links.
///
/// For each Rule, union the topics of every statement it references via
/// `HAS_CONDITION`/`HAS_CONCLUSION` (following `HAS_STATEMENT` edges).
/// Exactly one topic: attach the rule to it and drop the statements'
/// direct attachments. Zero topics (not yet assigned, or genuinely
/// topic-less; the two are indistinguishable here) or several: leave
/// the graph unchanged for that rule.
///
/// Topic membership is computed once up front, so rules sharing a
/// statement see the same picture regardless of processing order.
pub fn compact_topics(doc: &mut GraphDoc) -> CompactionReport {
    // statement -> set of topics claiming it
    let mut statement_topics: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    for edge in doc.edges.iter().filter(|e| e.relation == "HAS_STATEMENT") {
        statement_topics
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.source.clone());
    }

    let mut report = CompactionReport::default();
    let mut new_edges: Vec<Edge> = Vec::new();
    let mut removals: HashSet<(NodeId, NodeId)> = HashSet::new(); // (topic, statement)

    for rule in rule_node_ids(doc) {
        let mut statements = edge_targets(doc, &rule, "HAS_CONDITION");
        statements.extend(edge_targets(doc, &rule, "HAS_CONCLUSION"));

        let topics: BTreeSet<NodeId> = statements
            .iter()
            .filter_map(|s| statement_topics.get(s))
            .flatten()
            .cloned()
            .collect();

        let topic_count = topics.len();
        let mut iter = topics.into_iter();
        let topic = match (iter.next(), iter.next()) {
            (Some(topic), None) => topic,
            _ => {
                debug!(rule = %rule, topic_count, "ambiguous topic ownership, skipping");
                report.ambiguous.push(AmbiguousRule { rule, topic_count });
                continue;
            }
        };
        new_edges.push(Edge::new(topic.clone(), "HAS_STATEMENT", rule.clone()));
        for statement in statements {
            removals.insert((topic.clone(), statement));
        }
        report.rules_compacted += 1;
    }

    let before = doc.edges.len();
    doc.edges.retain(|e| {
        !(e.relation == "HAS_STATEMENT"
            && removals.contains(&(e.source.clone(), e.target.clone())))
    });
    report.edges_removed = before - doc.edges.len();

    let triples = doc.edge_triples();
    let mut next_edge = max_edge_suffix(doc);
    let mut seen = triples;
    for mut edge in new_edges {
        if seen.insert(edge.triple()) {
            next_edge += 1;
            edge.edge_id = Some(format!("e{}", next_edge));
            doc.edges.push(edge);
        }
    }

    info!(
        rules_compacted = report.rules_compacted,
        edges_removed = report.edges_removed,
        ambiguous = report.ambiguous.len(),
        "compacted topic attachments"
    );
    report
}

/// IDs of all Rule nodes, in document order.
fn rule_node_ids(doc: &GraphDoc) -> Vec<NodeId> {
    doc.nodes
        .iter()
        .filter(|n| n.node_type == Some(NodeType::Rule))
        .map(|n| n.id.clone())
        .collect()
}

/// Targets of all `relation` edges out of `source`, in document order.
fn edge_targets(doc: &GraphDoc, source: &NodeId, relation: &str) -> Vec<NodeId> {
    doc.edges
        .iter()
        .filter(|e| &e.source == source && e.relation == relation)
        .map(|e| e.target.clone())
        .collect()
}

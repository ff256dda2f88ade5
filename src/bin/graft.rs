//! Graft CLI — incremental knowledge-graph assembly.
//!
//! Usage:
//!   graft init [--graph path]
//!   graft merge <patch> [--drop-missing] [--emit-map path]
//!   graft merge-edges <patch> --map path [--keep-edge-ids]
//!   graft synthesize [--keep-causal]
//!   graft collapse
//!   graft topics <tree> | locate <tree> --start N --end N
//!   graft export [--out path]

use clap::{Parser, Subcommand};
use graft::{
    export, storage, summary_tree_to_patch, IdMap, JsonStore, MergeEngine, MergeOptions,
    PatchSource, SummaryNode, SynthesisOptions,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "graft",
    version,
    about = "Incremental knowledge graph assembly from generator patches"
)]
struct Cli {
    /// Path to the persisted graph document
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty graph document if none exists
    Init,
    /// Reset the graph document to empty
    Reset {
        /// Keep the previous contents in a .bak sibling
        #[arg(long)]
        backup: bool,
    },
    /// Merge a full nodes+edges patch
    Merge {
        /// Patch: a file path or raw generator text
        patch: String,
        /// Drop edges with missing endpoints instead of failing
        #[arg(long)]
        drop_missing: bool,
        /// Write the old->new ID map to this path for a later merge-edges
        #[arg(long)]
        emit_map: Option<PathBuf>,
    },
    /// Merge an edge-only corrective patch
    MergeEdges {
        /// Patch: a file path or raw generator text
        patch: String,
        /// ID map emitted by the sibling full merge
        #[arg(long)]
        map: Option<PathBuf>,
        /// Fail on missing endpoints instead of dropping the edge
        #[arg(long)]
        strict: bool,
        /// Keep the patch's own edge IDs instead of assigning fresh ones
        #[arg(long)]
        keep_edge_ids: bool,
    },
    /// Materialize causal edges into rules and compact topic links
    Synthesize {
        /// Keep the original CAUSES edges alongside the derived rules
        #[arg(long)]
        keep_causal: bool,
    },
    /// Collapse nodes sharing identical (label, type) across the graph
    Collapse,
    /// Merge a topic tree's Topic nodes and HAS_CHILD edges
    Topics {
        /// Path to the topic tree JSON
        tree: PathBuf,
    },
    /// Find the deepest topic containing a character span
    Locate {
        /// Path to the topic tree JSON
        tree: PathBuf,
        /// Span start (inclusive)
        #[arg(long)]
        start: usize,
        /// Span end (inclusive)
        #[arg(long)]
        end: usize,
    },
    /// Merge a recursive summary tree as Summary nodes
    Summary {
        /// Path to the summary tree JSON
        tree: PathBuf,
    },
    /// Emit graph-database import statements
    Export {
        /// Output path for the statement file
        #[arg(long, default_value = "import_kg.cypher")]
        out: PathBuf,
    },
}

/// Default graph path (~/.local/share/graft/graph.json)
fn default_graph_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let graft_dir = data_dir.join("graft");
    std::fs::create_dir_all(&graft_dir).ok();
    graft_dir.join("graph.json")
}

fn open_engine(graph: Option<PathBuf>) -> MergeEngine {
    let path = graph.unwrap_or_else(default_graph_path);
    MergeEngine::new(JsonStore::open(path))
}

fn cmd_init(engine: &MergeEngine) -> i32 {
    match engine.store().ensure_exists() {
        Ok(()) => {
            println!("Graph document ready at {}", engine.store().path().display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_reset(engine: &MergeEngine, backup: bool) -> i32 {
    match engine.store().reset(backup) {
        Ok(()) => {
            println!("Graph document reset");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_merge(
    engine: &MergeEngine,
    patch: &str,
    drop_missing: bool,
    emit_map: Option<&PathBuf>,
) -> i32 {
    let source = PatchSource::detect(patch);
    let opts = MergeOptions {
        drop_missing,
        reassign_edge_ids: true,
    };
    match engine.merge_patch(&source, &opts) {
        Ok(report) => {
            println!(
                "Merged: {} nodes, {} edges ({} nodes, {} edges already present, {} edges dropped)",
                report.nodes_added,
                report.edges_added,
                report.nodes_skipped,
                report.edges_skipped,
                report.edges_dropped
            );
            if let Some(path) = emit_map {
                let map = json!(report.id_map);
                if let Err(e) = std::fs::write(path, map.to_string()) {
                    eprintln!("Error writing ID map: {}", e);
                    return 1;
                }
            }
            0
        }
        Err(e) => {
            // The raw patch goes with the report so the unit can be
            // resubmitted by hand.
            eprintln!("Error: {}", e);
            eprintln!("Rejected patch payload:\n{}", patch);
            1
        }
    }
}

fn cmd_merge_edges(
    engine: &MergeEngine,
    patch: &str,
    map: Option<&PathBuf>,
    strict: bool,
    keep_edge_ids: bool,
) -> i32 {
    let id_map: IdMap = match map {
        Some(path) => match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(map) => map,
            Err(e) => {
                eprintln!("Error reading ID map: {}", e);
                return 1;
            }
        },
        None => IdMap::new(),
    };

    let source = PatchSource::detect(patch);
    let opts = MergeOptions {
        drop_missing: !strict,
        reassign_edge_ids: !keep_edge_ids,
    };
    match engine.merge_edge_patch(&source, &id_map, &opts) {
        Ok(report) => {
            println!(
                "Merged edges: {} added, {} already present, {} dropped",
                report.edges_added, report.edges_skipped, report.edges_dropped
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Rejected patch payload:\n{}", patch);
            1
        }
    }
}

fn cmd_synthesize(engine: &MergeEngine, keep_causal: bool) -> i32 {
    let opts = SynthesisOptions {
        keep_causal_edges: keep_causal,
    };
    match engine.synthesize(&opts) {
        Ok((rules, compaction)) => {
            println!(
                "Synthesized: {} rules created, {} causal edges removed",
                rules.rules_created, rules.causal_edges_removed
            );
            println!(
                "Compacted: {} rules attached, {} edges removed",
                compaction.rules_compacted, compaction.edges_removed
            );
            for ambiguous in &compaction.ambiguous {
                println!(
                    "  ambiguous: rule {} spans {} topics, left unchanged",
                    ambiguous.rule, ambiguous.topic_count
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_collapse(engine: &MergeEngine) -> i32 {
    match engine.collapse_duplicates() {
        Ok(report) => {
            println!(
                "Collapsed: {} duplicate nodes merged, {} duplicate edges removed",
                report.nodes_merged, report.edges_removed
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_topics(engine: &MergeEngine, tree_path: &PathBuf) -> i32 {
    let tree = match storage::load_topic_tree(tree_path) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let (nodes, edges) = tree.flatten();
    let patch = PatchSource::Inline(json!({ "nodes": nodes, "edges": edges }));
    match engine.merge_patch(&patch, &MergeOptions::default()) {
        Ok(report) => {
            println!(
                "Merged topic tree: {} topics, {} edges",
                report.nodes_added, report.edges_added
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_locate(tree_path: &PathBuf, start: usize, end: usize) -> i32 {
    let tree = match storage::load_topic_tree(tree_path) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match tree.locate(start, end) {
        Some(topic) => {
            println!(
                "{} ({}) [{}..{}]",
                topic.name, topic.id, topic.char_start, topic.char_end
            );
            0
        }
        None => {
            println!("No topic contains [{}..{}]", start, end);
            1
        }
    }
}

fn cmd_summary(engine: &MergeEngine, tree_path: &PathBuf) -> i32 {
    let tree: SummaryNode = match std::fs::read_to_string(tree_path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error reading summary tree: {}", e);
            return 1;
        }
    };
    let (nodes, edges) = summary_tree_to_patch(&tree);
    let patch = PatchSource::Inline(json!({ "nodes": nodes, "edges": edges }));
    match engine.merge_patch(&patch, &MergeOptions::default()) {
        Ok(report) => {
            println!(
                "Merged summary tree: {} summaries, {} edges",
                report.nodes_added, report.edges_added
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_export(engine: &MergeEngine, out: &PathBuf) -> i32 {
    let doc = match engine.store().load() {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match export::write_cypher(&doc, out) {
        Ok(()) => {
            println!("Wrote {}", out.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "graft=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let engine = open_engine(cli.graph);

    let code = match cli.command {
        Commands::Init => cmd_init(&engine),
        Commands::Reset { backup } => cmd_reset(&engine, backup),
        Commands::Merge {
            patch,
            drop_missing,
            emit_map,
        } => cmd_merge(&engine, &patch, drop_missing, emit_map.as_ref()),
        Commands::MergeEdges {
            patch,
            map,
            strict,
            keep_edge_ids,
        } => cmd_merge_edges(&engine, &patch, map.as_ref(), strict, keep_edge_ids),
        Commands::Synthesize { keep_causal } => cmd_synthesize(&engine, keep_causal),
        Commands::Collapse => cmd_collapse(&engine),
        Commands::Topics { tree } => cmd_topics(&engine, &tree),
        Commands::Locate { tree, start, end } => cmd_locate(&tree, start, end),
        Commands::Summary { tree } => cmd_summary(&engine, &tree),
        Commands::Export { out } => cmd_export(&engine, &out),
    };
    std::process::exit(code);
}

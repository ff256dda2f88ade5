//! Persistence for the assembled graph and the topic tree
//!
//! The graph lives in a single pretty-printed JSON document that is read
//! and rewritten in full on every merge. There is no partial update and
//! no locking: one writer at a time, serialized by the caller.

use crate::graph::GraphDoc;
use crate::topic::TopicNode;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A graph document stored at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Point a store at a path. The file is not touched until
    /// `ensure_exists`, `load`, or `save` is called.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty document at the path if nothing is there yet.
    pub fn ensure_exists(&self) -> StorageResult<()> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| io_err(&self.path, e))?;
                }
            }
            self.save(&GraphDoc::new())?;
        }
        Ok(())
    }

    /// Read and parse the whole document.
    pub fn load(&self) -> StorageResult<GraphDoc> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Rewrite the whole document, pretty-printed UTF-8.
    pub fn save(&self, doc: &GraphDoc) -> StorageResult<()> {
        let text = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, text).map_err(|e| io_err(&self.path, e))
    }

    /// Replace the document with an empty graph, optionally keeping the
    /// previous contents in a `.bak` sibling.
    pub fn reset(&self, backup: bool) -> StorageResult<()> {
        if backup && self.path.exists() {
            let bak = self.path.with_extension("json.bak");
            std::fs::copy(&self.path, &bak).map_err(|e| io_err(&self.path, e))?;
        }
        self.save(&GraphDoc::new())
    }
}

/// Load a topic tree document.
pub fn load_topic_tree(path: impl AsRef<Path>) -> StorageResult<TopicNode> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a topic tree document, pretty-printed.
pub fn save_topic_tree(path: impl AsRef<Path>, tree: &TopicNode) -> StorageResult<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(tree)?;
    std::fs::write(path, text).map_err(|e| io_err(path, e))
}

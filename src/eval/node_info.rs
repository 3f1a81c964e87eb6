// src/eval/node_info.rs

//! Per-node evaluation records.

use std::path::PathBuf;

use crate::eval::aggregate::Publication;
use crate::tree::{Context, ContextField, NodeId, Payload, Rule};
use crate::types::ReaderKind;

/// Identity of a cached source: one per live (path, reader kind) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    pub path: PathBuf,
    pub kind: ReaderKind,
}

impl SourceKey {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ReaderKind::File,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ReaderKind::Directory,
        }
    }
}

/// Something a node read during its last evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    Source(SourceKey),
    Context(ContextField),
}

/// Where and what a Write node last wrote successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStamp {
    pub path: PathBuf,
    pub digest: String,
}

impl WriteStamp {
    pub fn new(path: PathBuf, payload: &Payload) -> Self {
        Self {
            path,
            digest: payload.digest(),
        }
    }
}

/// Evaluation record of one node, replaced wholesale every time the node is
/// re-evaluated.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub rule: Rule,
    /// Context the node was evaluated under.
    pub context: Context,
    pub parent: Option<NodeId>,
    /// Children produced by the node itself (or an aggregate's body).
    pub children: Vec<NodeId>,
    /// Aggregate stage-2 children, built from `collected`.
    pub derived: Vec<NodeId>,
    pub deps: Vec<Dependency>,
    /// Everything this subtree publishes upwards, in evaluation order.
    pub publications: Vec<Publication>,
    /// Aggregate only: the sequence the derived children were built from.
    pub collected: Option<Vec<String>>,
    /// Write only: the last successful write.
    pub written: Option<WriteStamp>,
}

impl NodeInfo {
    pub fn new(rule: Rule, context: Context, parent: Option<NodeId>) -> Self {
        Self {
            rule,
            context,
            parent,
            children: Vec::new(),
            derived: Vec::new(),
            deps: Vec::new(),
            publications: Vec::new(),
            collected: None,
            written: None,
        }
    }

    pub fn depends_on_source(&self, key: &SourceKey) -> bool {
        self.deps
            .iter()
            .any(|d| matches!(d, Dependency::Source(k) if k == key))
    }

    pub fn depends_on_field(&self, field: ContextField) -> bool {
        self.deps.contains(&Dependency::Context(field))
    }

    pub fn source_deps(&self) -> impl Iterator<Item = &SourceKey> {
        self.deps.iter().filter_map(|d| match d {
            Dependency::Source(k) => Some(k),
            Dependency::Context(_) => None,
        })
    }

    /// Body and derived children, in evaluation order.
    pub fn all_children(&self) -> impl Iterator<Item = &NodeId> {
        self.children.iter().chain(self.derived.iter())
    }
}

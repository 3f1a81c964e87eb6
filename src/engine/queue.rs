// src/engine/queue.rs

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::types::ChangeKind;

/// Queue of change notifications waiting for the evaluation thread.
///
/// Semantics:
/// - With coalescing on, each path appears at most once. A later
///   notification for a queued path replaces its kind in place, so the
///   cached source re-reads once and sees the latest content.
/// - Paths are drained in the order they first arrived; there is no
///   ordering across paths beyond that.
/// - With coalescing off, every notification is kept in arrival order.
#[derive(Debug)]
pub struct ChangeQueue {
    coalesce: bool,
    pending: Vec<(PathBuf, ChangeKind)>,
    positions: HashMap<PathBuf, usize>,
    coalesced: usize,
}

impl ChangeQueue {
    pub fn new(coalesce: bool) -> Self {
        Self {
            coalesce,
            pending: Vec::new(),
            positions: HashMap::new(),
            coalesced: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Total notifications folded into an already-queued entry so far.
    pub fn coalesced(&self) -> usize {
        self.coalesced
    }

    pub fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        if self.coalesce {
            if let Some(&index) = self.positions.get(&path) {
                debug!(path = ?path, %kind, "coalescing change with queued notification");
                self.pending[index].1 = kind;
                self.coalesced += 1;
                return;
            }
            self.positions.insert(path.clone(), self.pending.len());
        }
        self.pending.push((path, kind));
    }

    /// Take everything queued, oldest first.
    pub fn drain_pending(&mut self) -> Vec<(PathBuf, ChangeKind)> {
        self.positions.clear();
        std::mem::take(&mut self.pending)
    }
}

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use watchtree::errors::{Result, WatchtreeError};
use watchtree::watch::WatchBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOp {
    Watch(PathBuf),
    Unwatch(PathBuf),
}

#[derive(Debug, Default)]
struct State {
    ops: Vec<WatchOp>,
    active: BTreeSet<PathBuf>,
    limit: Option<usize>,
}

/// A watch backend that holds no OS resources.
///
/// - records every watch / unwatch call in order
/// - tracks which directories are currently armed
/// - can simulate watch-handle exhaustion with [`with_limit`](Self::with_limit)
///
/// Clones share state, so a test keeps one clone and hands the other to the
/// `WatchManager`.
#[derive(Debug, Clone, Default)]
pub struct RecordingWatchBackend {
    state: Arc<Mutex<State>>,
}

impl RecordingWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to arm more than `max` directories at once.
    pub fn with_limit(self, max: usize) -> Self {
        self.lock().limit = Some(max);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn ops(&self) -> Vec<WatchOp> {
        self.lock().ops.clone()
    }

    /// Directories currently armed, sorted.
    pub fn active(&self) -> Vec<PathBuf> {
        self.lock().active.iter().cloned().collect()
    }

    pub fn is_watching(&self, dir: impl AsRef<Path>) -> bool {
        self.lock().active.contains(dir.as_ref())
    }

    /// How many times `dir` was armed.
    pub fn watch_calls(&self, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, WatchOp::Watch(p) if p == dir))
            .count()
    }
}

impl WatchBackend for RecordingWatchBackend {
    fn watch(&mut self, dir: &Path) -> Result<()> {
        let mut state = self.lock();
        if let Some(max) = state.limit {
            if !state.active.contains(dir) && state.active.len() >= max {
                return Err(WatchtreeError::WatchLimit(dir.to_path_buf()));
            }
        }
        state.ops.push(WatchOp::Watch(dir.to_path_buf()));
        state.active.insert(dir.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, dir: &Path) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(WatchOp::Unwatch(dir.to_path_buf()));
        state.active.remove(dir);
        Ok(())
    }
}

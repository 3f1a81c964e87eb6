// src/watch/manager.rs

//! Subscription bookkeeping on top of a [`WatchBackend`].
//!
//! A subscription for path `P` arms a non-recursive OS watch on `P`'s parent
//! directory (so deleting and recreating `P` is still observed) and, when
//! `P` is a directory, on `P` itself (so entry changes are observed). OS
//! watches are reference-counted per directory and shared between
//! subscriptions.
//!
//! When not even the parent exists, the subscription is pending: it arms
//! the nearest existing ancestor instead, and its owner re-arms once a
//! directory on the way to `P` shows up.
//!
//! The manager never sees change events: routing happens on the evaluation
//! thread by path lookup, so a notification that arrives after its source
//! was torn down simply finds nothing to deliver to.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{Result, WatchtreeError};
use crate::fs::FileSystem;
use crate::watch::backend::WatchBackend;

/// Opaque handle for one subscription. Stale handles are harmless: every
/// operation on a handle that is no longer live is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

#[derive(Debug)]
struct Subscription {
    path: PathBuf,
    dirs: Vec<PathBuf>,
    /// Armed on an ancestor because the parent of `path` is missing.
    pending: bool,
}

pub struct WatchManager {
    backend: Box<dyn WatchBackend>,
    fs: Arc<dyn FileSystem>,
    armed: HashMap<PathBuf, usize>,
    subscriptions: HashMap<u64, Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for WatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchManager")
            .field("armed", &self.armed)
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl WatchManager {
    pub fn new(backend: impl WatchBackend + 'static, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            backend: Box::new(backend),
            fs,
            armed: HashMap::new(),
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Begin monitoring `path`.
    ///
    /// Fails with [`WatchtreeError::WatchSetupFailure`] when neither `path`
    /// nor any of its ancestors is an existing directory, and with
    /// [`WatchtreeError::WatchLimit`] when the OS is out of watch handles.
    pub fn subscribe(&mut self, path: &Path) -> Result<SubscriptionHandle> {
        let mut wanted = self.direct_dirs(path);
        let pending = wanted.is_empty();
        if pending {
            let Some(ancestor) = self.nearest_ancestor(path) else {
                return Err(WatchtreeError::WatchSetupFailure {
                    path: path.to_path_buf(),
                    message: "no existing directory to watch".to_string(),
                });
            };
            debug!(path = ?path, ancestor = ?ancestor, "parent missing; watching nearest ancestor");
            wanted.push(ancestor);
        }

        let mut dirs: Vec<PathBuf> = Vec::with_capacity(wanted.len());
        for dir in wanted {
            if let Err(err) = self.arm(&dir) {
                for armed in &dirs {
                    self.disarm(armed);
                }
                return Err(err);
            }
            dirs.push(dir);
        }

        let id = self.next_id;
        self.next_id += 1;
        debug!(path = ?path, ?dirs, handle = id, pending, "subscribed");
        self.subscriptions.insert(
            id,
            Subscription {
                path: path.to_path_buf(),
                dirs,
                pending,
            },
        );
        Ok(SubscriptionHandle(id))
    }

    /// Stop monitoring. Idempotent.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        let Some(sub) = self.subscriptions.remove(&handle.0) else {
            return;
        };
        for dir in &sub.dirs {
            self.disarm(dir);
        }
        debug!(path = ?sub.path, handle = handle.0, "unsubscribed");
    }

    /// Tear down and re-establish a subscription, e.g. after the watched
    /// path was deleted or recreated. Returns the replacement handle.
    pub fn rearm(&mut self, handle: SubscriptionHandle) -> Result<SubscriptionHandle> {
        let path = match self.subscriptions.get(&handle.0) {
            Some(sub) => sub.path.clone(),
            None => {
                return Err(WatchtreeError::WatchSetupFailure {
                    path: PathBuf::new(),
                    message: format!("subscription {} is not live", handle.0),
                });
            }
        };
        self.unsubscribe(handle);

        // A recreated directory lost its OS watch even if another
        // subscription still holds a reference to it.
        if self.fs.is_dir(&path) && self.armed.contains_key(&path) {
            if let Err(err) = self.backend.watch(&path) {
                warn!(path = ?path, error = %err, "failed to refresh directory watch");
            }
        }

        self.subscribe(&path)
    }

    pub fn is_live(&self, handle: SubscriptionHandle) -> bool {
        self.subscriptions.contains_key(&handle.0)
    }

    /// Whether `handle` is only watching an ancestor of its path.
    pub fn is_pending(&self, handle: SubscriptionHandle) -> bool {
        self.subscriptions
            .get(&handle.0)
            .is_some_and(|sub| sub.pending)
    }

    /// Whether `path` can be watched through its own parent (or itself).
    pub fn can_watch_directly(&self, path: &Path) -> bool {
        !self.direct_dirs(path).is_empty()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Directories currently armed at the OS level, sorted.
    pub fn armed_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.armed.keys().cloned().collect();
        dirs.sort();
        dirs
    }

    /// Release every outstanding subscription.
    pub fn shutdown(&mut self) {
        let handles: Vec<u64> = self.subscriptions.keys().copied().collect();
        for id in handles {
            self.unsubscribe(SubscriptionHandle(id));
        }
    }

    fn direct_dirs(&self, path: &Path) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(parent) = path.parent() {
            if self.fs.is_dir(parent) {
                dirs.push(parent.to_path_buf());
            }
        }
        if self.fs.is_dir(path) {
            dirs.push(path.to_path_buf());
        }
        dirs
    }

    fn nearest_ancestor(&self, path: &Path) -> Option<PathBuf> {
        path.ancestors()
            .skip(1)
            .find(|dir| !dir.as_os_str().is_empty() && self.fs.is_dir(dir))
            .map(Path::to_path_buf)
    }

    fn arm(&mut self, dir: &Path) -> Result<()> {
        if let Some(count) = self.armed.get_mut(dir) {
            *count += 1;
            return Ok(());
        }
        self.backend.watch(dir)?;
        self.armed.insert(dir.to_path_buf(), 1);
        Ok(())
    }

    fn disarm(&mut self, dir: &Path) {
        let Some(count) = self.armed.get_mut(dir) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        self.armed.remove(dir);
        // A deleted directory has already lost its OS watch.
        if let Err(err) = self.backend.unwatch(dir) {
            debug!(dir = ?dir, error = %err, "unwatch failed; ignoring");
        }
    }
}

impl Drop for WatchManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

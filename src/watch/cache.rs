// src/watch/cache.rs

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{ChangeKind, ReaderKind};
use crate::watch::manager::{SubscriptionHandle, WatchManager};

/// Last-read value of a watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceContent {
    Bytes(Vec<u8>),
    Listing(Vec<String>),
}

impl SourceContent {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SourceContent::Bytes(b) => Some(b),
            SourceContent::Listing(_) => None,
        }
    }

    pub fn as_listing(&self) -> Option<&[String]> {
        match self {
            SourceContent::Listing(names) => Some(names),
            SourceContent::Bytes(_) => None,
        }
    }
}

/// Read `path` the way a reader of `kind` sees it.
///
/// Any failure is reported as absence; callers never see I/O errors.
pub fn read_source(fs: &dyn FileSystem, kind: ReaderKind, path: &Path) -> Option<SourceContent> {
    match kind {
        ReaderKind::File => match fs.read(path) {
            Ok(bytes) => Some(SourceContent::Bytes(bytes)),
            Err(err) => {
                debug!(path = ?path, error = %err, "source unavailable");
                None
            }
        },
        ReaderKind::Directory => {
            if !fs.is_dir(path) {
                debug!(path = ?path, "not a directory; no listing");
                return None;
            }
            match fs.list_dir(path) {
                Ok(names) => Some(SourceContent::Listing(names)),
                Err(err) => {
                    debug!(path = ?path, error = %err, "listing unavailable");
                    None
                }
            }
        }
    }
}

/// Live, watched representation of one path's content or listing.
///
/// The cache never clears itself on a failed read (editors briefly remove
/// files during atomic saves). Only an explicit delete, or a rename that
/// leaves nothing at the path, clears it.
#[derive(Debug)]
pub struct CachedSource {
    kind: ReaderKind,
    path: Option<PathBuf>,
    content: Option<SourceContent>,
    handle: Option<SubscriptionHandle>,
    /// The subscription watches an ancestor; the parent directory is gone.
    pending: bool,
}

impl CachedSource {
    pub fn new(kind: ReaderKind) -> Self {
        Self {
            kind,
            path: None,
            content: None,
            handle: None,
            pending: false,
        }
    }

    pub fn kind(&self) -> ReaderKind {
        self.kind
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn content(&self) -> Option<&SourceContent> {
        self.content.as_ref()
    }

    pub fn is_watched(&self) -> bool {
        self.handle.is_some()
    }

    /// Watched only through an ancestor until the parent directory exists.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Point the source at `path`: drop the old subscription, read once
    /// synchronously, then arm the watch.
    ///
    /// Only a fatal watch error is returned; a failed subscription leaves
    /// the source readable but unwatched.
    pub fn set_path(
        &mut self,
        path: impl Into<PathBuf>,
        fs: &dyn FileSystem,
        watches: &mut WatchManager,
    ) -> Result<()> {
        self.release(watches);
        self.content = None;

        let path = path.into();
        self.content = read_source(fs, self.kind, &path);
        self.path = Some(path);
        self.subscribe(watches)
    }

    /// Whether a change at `event_path` concerns this source.
    pub fn matches(&self, event_path: &Path) -> bool {
        let Some(path) = self.path.as_deref() else {
            return false;
        };
        event_path == path
            || (self.kind == ReaderKind::Directory && event_path.parent() == Some(path))
            || (self.pending && path.starts_with(event_path))
    }

    /// Apply one change notification. Returns `true` if the cached content
    /// is now different from before.
    pub fn on_change(
        &mut self,
        event_path: &Path,
        change: ChangeKind,
        fs: &dyn FileSystem,
        watches: &mut WatchManager,
    ) -> Result<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        let targets_self = event_path == path;

        match change {
            ChangeKind::Other => {
                trace!(path = ?event_path, "ignoring unrecognized change");
                return Ok(false);
            }
            _ if self.pending && !targets_self && path.starts_with(event_path) => {
                debug!(path = ?path, dir = ?event_path, "directory above pending source changed");
                self.rearm(watches)?;
                return Ok(self.reread(fs, &path, change));
            }
            ChangeKind::Deleted if targets_self => return self.clear_and_rearm(watches),
            ChangeKind::Renamed if targets_self && !fs.exists(&path) => {
                return self.clear_and_rearm(watches);
            }
            _ => {}
        }

        if self.kind == ReaderKind::Directory && targets_self {
            self.rearm(watches)?;
        }

        Ok(self.reread(fs, &path, change))
    }

    /// Retry a subscription that failed or only reaches an ancestor. When
    /// the path becomes directly watchable the source is re-read, since
    /// changes made in between were never reported. Returns `true` if the
    /// content differs afterwards.
    pub fn refresh_watch(&mut self, fs: &dyn FileSystem, watches: &mut WatchManager) -> Result<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        let retry = match self.handle {
            None => true,
            Some(_) => self.pending && watches.can_watch_directly(&path),
        };
        if !retry {
            return Ok(false);
        }

        self.rearm(watches)?;
        if self.handle.is_none() || self.pending {
            return Ok(false);
        }
        debug!(path = ?path, "watch re-established");
        Ok(self.reread(fs, &path, ChangeKind::Written))
    }

    /// Drop the watch subscription. Idempotent.
    pub fn release(&mut self, watches: &mut WatchManager) {
        self.pending = false;
        if let Some(handle) = self.handle.take() {
            watches.unsubscribe(handle);
        }
    }

    fn reread(&mut self, fs: &dyn FileSystem, path: &Path, change: ChangeKind) -> bool {
        match read_source(fs, self.kind, path) {
            Some(next) => {
                let changed = self.content.as_ref() != Some(&next);
                if changed {
                    debug!(path = ?path, %change, "source content changed");
                } else {
                    trace!(path = ?path, %change, "source content unchanged");
                }
                self.content = Some(next);
                changed
            }
            None => {
                debug!(path = ?path, %change, "re-read failed; keeping previous content");
                false
            }
        }
    }

    fn clear_and_rearm(&mut self, watches: &mut WatchManager) -> Result<bool> {
        let changed = self.content.take().is_some();
        debug!(path = ?self.path, "source deleted; cleared content");
        self.rearm(watches)?;
        Ok(changed)
    }

    fn rearm(&mut self, watches: &mut WatchManager) -> Result<()> {
        self.pending = false;
        let Some(handle) = self.handle.take() else {
            // Never armed (or lost): try again from scratch.
            return self.subscribe(watches);
        };
        match watches.rearm(handle) {
            Ok(next) => {
                self.pending = watches.is_pending(next);
                self.handle = Some(next);
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(path = ?self.path, error = %err, "failed to re-arm watch");
                Ok(())
            }
        }
    }

    fn subscribe(&mut self, watches: &mut WatchManager) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        match watches.subscribe(path) {
            Ok(handle) => {
                self.pending = watches.is_pending(handle);
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(path = ?path, error = %err, "watch setup failed; source stays unwatched");
                Ok(())
            }
        }
    }
}

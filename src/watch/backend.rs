// src/watch/backend.rs

//! Pluggable OS watch backend.
//!
//! The [`WatchManager`](super::WatchManager) arms and disarms directory
//! watches through a `WatchBackend` instead of a raw `notify` watcher. This
//! keeps the evaluation core free of OS resources in tests, which use a
//! recording backend and inject change messages by hand.
//!
//! [`NotifyBackend`] is the production implementation. Its `notify` callback
//! runs on notify's own thread and only forwards raw events over an
//! unbounded channel; a Tokio task normalises them and hands
//! [`RuntimeEvent::PathChanged`] messages to the runtime.

use std::path::Path;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::RuntimeEvent;
use crate::errors::{Result, WatchtreeError};
use crate::watch::events::split_event;

/// Trait abstracting how directories are watched at the OS level.
///
/// Every watch is non-recursive: the manager decides which directories
/// need arming.
pub trait WatchBackend: Send {
    fn watch(&mut self, dir: &Path) -> Result<()>;
    fn unwatch(&mut self, dir: &Path) -> Result<()>;
}

/// Production backend wrapping `notify::RecommendedWatcher`.
///
/// Dropping it stops all OS watches.
pub struct NotifyBackend {
    inner: RecommendedWatcher,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend").finish()
    }
}

impl NotifyBackend {
    /// Create the OS watcher and spawn the forwarding task that turns raw
    /// notify events into runtime messages.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Result<Self> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        // Closure called synchronously by notify whenever an event arrives.
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver only disappears during shutdown.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| WatchtreeError::Other(e.into()))?;

        tokio::spawn(async move {
            while let Some(res) = event_rx.recv().await {
                let event = match res {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = %err, "file watch error");
                        continue;
                    }
                };

                for (path, kind) in split_event(event) {
                    if runtime_tx
                        .send(RuntimeEvent::PathChanged { path, kind })
                        .await
                        .is_err()
                    {
                        debug!("runtime channel closed; stopping watch forwarder");
                        return;
                    }
                }
            }
            debug!("watch forwarder finished");
        });

        Ok(Self { inner })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, dir: &Path) -> Result<()> {
        self.inner
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| map_notify_error(dir, e))
    }

    fn unwatch(&mut self, dir: &Path) -> Result<()> {
        self.inner
            .unwatch(dir)
            .map_err(|e| map_notify_error(dir, e))
    }
}

/// Running out of watch handles is the one fatal case; everything else stays
/// local to the subscription that hit it.
fn map_notify_error(dir: &Path, err: notify::Error) -> WatchtreeError {
    match err.kind {
        notify::ErrorKind::MaxFilesWatch => WatchtreeError::WatchLimit(dir.to_path_buf()),
        _ => WatchtreeError::WatchSetupFailure {
            path: dir.to_path_buf(),
            message: err.to_string(),
        },
    }
}

/// Backend that arms nothing. Used for one-shot builds, where no change
/// will ever be delivered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatchBackend;

impl WatchBackend for NullWatchBackend {
    fn watch(&mut self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    fn unwatch(&mut self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}

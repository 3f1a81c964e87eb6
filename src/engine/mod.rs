// src/engine/mod.rs

//! Evaluation engine for watchtree.
//!
//! This module ties together:
//! - the scheduler (what to re-evaluate when something changes)
//! - the change queue (coalescing bursts of notifications per path)
//! - the main runtime event loop that reacts to:
//!   - file change notifications
//!   - manual rebuild requests
//!   - root context changes
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::path::PathBuf;

use crate::tree::Context;
use crate::types::ChangeKind;

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// If true, exit right after the initial build (used for `--once`).
    pub exit_when_idle: bool,
    /// If true, notifications for the same path that arrive before the
    /// evaluation thread catches up are collapsed into the latest one.
    pub coalesce: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: false,
            coalesce: true,
        }
    }
}

/// Events flowing into the runtime from the watcher, signals, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Path `path` changed on disk.
    PathChanged { path: PathBuf, kind: ChangeKind },
    /// Re-evaluate the whole tree.
    RebuildRequested,
    /// Move the tree to new input/output roots.
    RootsChanged(Context),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod queue;
pub mod runtime;

pub use self::core::{CoreEngine, CoreStep};
pub use queue::ChangeQueue;
pub use runtime::Runtime;

// src/watch/mod.rs

//! File watching and cached sources.
//!
//! This module is responsible for:
//! - Normalising raw `notify` events into [`ChangeKind`](crate::types::ChangeKind)s.
//! - Arming OS watches per subscribed path ([`WatchManager`]).
//! - Holding the last-read content of each watched path ([`CachedSource`]).
//!
//! It does **not** know about the rule tree; the scheduler decides which
//! sources exist and what a content change invalidates.

pub mod backend;
pub mod cache;
pub mod events;
pub mod manager;
pub mod path_utils;

pub use backend::{NotifyBackend, NullWatchBackend, WatchBackend};
pub use cache::{CachedSource, SourceContent, read_source};
pub use events::{normalize_kind, split_event};
pub use manager::{SubscriptionHandle, WatchManager};

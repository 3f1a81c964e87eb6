// src/watch/events.rs

//! Normalisation of raw `notify` events into [`ChangeKind`]s.

use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::{Event, EventKind};
use tracing::trace;

use crate::errors::WatchtreeError;
use crate::types::ChangeKind;

/// Map a raw notify event kind onto the small change-kind enum.
///
/// Creation counts as a write: the path now has content to read. Backends
/// that cannot tell what changed (`Modify(Any)`, polling) are treated as
/// writes too, since re-reading is always safe.
pub fn normalize_kind(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Written,
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Other) => ChangeKind::Written,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::MetadataChanged,
        EventKind::Remove(_) => ChangeKind::Deleted,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => ChangeKind::Other,
    }
}

/// Split a notify event into one `(path, kind)` message per affected path.
///
/// Events whose kind normalises to [`ChangeKind::Other`] are dropped here
/// (logged at trace) so they never reach the evaluation thread.
pub fn split_event(event: Event) -> Vec<(PathBuf, ChangeKind)> {
    let kind = normalize_kind(&event.kind);
    if kind == ChangeKind::Other {
        let err = WatchtreeError::UnrecognizedEvent(format!("{:?}", event.kind));
        trace!(error = %err, paths = ?event.paths, "ignoring notify event");
        return Vec::new();
    }
    event.paths.into_iter().map(|p| (p, kind)).collect()
}

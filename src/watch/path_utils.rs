// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher and context.

use std::path::{Component, Path, PathBuf};

/// Lexically normalise a path: make it absolute against the current working
/// directory, drop `.` components and resolve `..` against the parent.
///
/// Symlinks are not resolved; use [`FileSystem::canonicalize`] for that.
///
/// [`FileSystem::canonicalize`]: crate::fs::FileSystem::canonicalize
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join a relative path onto `base` and normalise the result.
///
/// An empty `relative` yields `base` itself.
pub fn join_normalized(base: &Path, relative: &str) -> PathBuf {
    if relative.is_empty() {
        return normalize(base);
    }
    normalize(&base.join(relative.trim_start_matches('/')))
}

/// True if `path` is `root` or lives underneath it.
pub fn is_within(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}

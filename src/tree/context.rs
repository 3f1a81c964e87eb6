// src/tree/context.rs

use std::path::{Path, PathBuf};

use crate::fs::FileSystem;
use crate::types::AppliesTo;
use crate::watch::path_utils::{join_normalized, normalize};

/// One observable field of a [`Context`]. Nodes record which fields they
/// read so a root change only invalidates the nodes that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextField {
    InputRoot,
    OutputRoot,
}

/// Immutable environment every rule observes: where it reads from and
/// where it writes to.
///
/// Both roots are absolute and normalised. Scopes derive a new context;
/// nothing ever mutates one in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Context {
    input_root: PathBuf,
    output_root: PathBuf,
}

impl Context {
    pub fn new(input_root: impl AsRef<Path>, output_root: impl AsRef<Path>) -> Self {
        Self {
            input_root: normalize(input_root.as_ref()),
            output_root: normalize(output_root.as_ref()),
        }
    }

    /// Like [`Context::new`], but resolves symlinks in roots that already
    /// exist so paths reported by the OS watcher line up with ours.
    pub fn resolve(
        fs: &dyn FileSystem,
        input_root: impl AsRef<Path>,
        output_root: impl AsRef<Path>,
    ) -> Self {
        let canonical = |p: &Path| {
            let p = normalize(p);
            fs.canonicalize(&p).unwrap_or(p)
        };
        Self {
            input_root: canonical(input_root.as_ref()),
            output_root: canonical(output_root.as_ref()),
        }
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Append `segment` to the roots selected by `applies_to`.
    pub fn derive(&self, segment: &str, applies_to: AppliesTo) -> Context {
        let input_root = if applies_to.touches_input() {
            join_normalized(&self.input_root, segment)
        } else {
            self.input_root.clone()
        };
        let output_root = if applies_to.touches_output() {
            join_normalized(&self.output_root, segment)
        } else {
            self.output_root.clone()
        };
        Context {
            input_root,
            output_root,
        }
    }

    /// Effective path of a Read/ReadDirectory node.
    pub fn input_path(&self, relative: &str) -> PathBuf {
        join_normalized(&self.input_root, relative)
    }

    /// Effective path of a Write node.
    pub fn output_path(&self, relative: &str) -> PathBuf {
        join_normalized(&self.output_root, relative)
    }

    /// Fields whose values differ between `self` and `other`.
    pub fn changed_fields(&self, other: &Context) -> Vec<ContextField> {
        let mut fields = Vec::new();
        if self.input_root != other.input_root {
            fields.push(ContextField::InputRoot);
        }
        if self.output_root != other.output_root {
            fields.push(ContextField::OutputRoot);
        }
        fields
    }
}

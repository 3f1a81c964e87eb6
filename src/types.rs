use std::fmt;

/// Which roots of the [`Context`](crate::tree::Context) a scope appends its
/// segment to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AppliesTo {
    Input,
    Output,
    #[default]
    Both,
}

impl AppliesTo {
    pub fn touches_input(self) -> bool {
        matches!(self, AppliesTo::Input | AppliesTo::Both)
    }

    pub fn touches_output(self) -> bool {
        matches!(self, AppliesTo::Output | AppliesTo::Both)
    }
}

/// Normalised filesystem change kind delivered to cached sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Content was written (or the path was created).
    Written,
    Deleted,
    Renamed,
    MetadataChanged,
    /// Anything the normaliser does not understand. Logged and ignored.
    Other,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Written => "written",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
            ChangeKind::MetadataChanged => "metadata-changed",
            ChangeKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// How a cached source interprets its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReaderKind {
    /// Raw file bytes.
    File,
    /// Entry names of a directory.
    Directory,
}

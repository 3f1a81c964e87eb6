// src/tree/rule.rs

//! Declarative rule nodes and the combinators used to author them.
//!
//! A [`Rule`] is pure data until the scheduler evaluates it. Continuations
//! (`read`, `read_directory`, `aggregate`) are plain closures returning the
//! child rules for a given input; they must not perform I/O themselves.

use std::fmt;
use std::sync::Arc;

use crate::types::AppliesTo;

/// Default file name written by [`Rule::write_index`].
pub const DEFAULT_OUTPUT_FILE: &str = "index.html";

pub type BytesContinuation = Arc<dyn Fn(&[u8]) -> Vec<Rule> + Send + Sync>;
pub type ListingContinuation = Arc<dyn Fn(&[String]) -> Vec<Rule> + Send + Sync>;

/// Named byte content destined for an output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Payload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// blake3 digest over name and bytes; two payloads with the same digest
    /// are treated as identical writes.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.name.len() as u64).to_le_bytes());
        hasher.update(self.name.as_bytes());
        hasher.update(&self.bytes);
        hasher.finalize().to_hex().to_string()
    }
}

#[derive(Clone)]
pub enum RuleKind {
    Read {
        path: String,
        make: BytesContinuation,
    },
    /// Lists the directory at the context's input root (plus `path`, which
    /// the public combinator leaves empty).
    ReadDirectory {
        path: String,
        make: ListingContinuation,
    },
    Write {
        path: String,
        payload: Payload,
    },
    Scope {
        segment: String,
        applies_to: AppliesTo,
        children: Vec<Rule>,
    },
    Sequence(Vec<Rule>),
    Aggregate {
        channel: String,
        children: Vec<Rule>,
        make: ListingContinuation,
    },
    Publish {
        channel: String,
        value: String,
    },
}

/// One node of the rule tree.
#[derive(Clone)]
pub struct Rule {
    key: Option<String>,
    kind: RuleKind,
}

impl Rule {
    fn from_kind(kind: RuleKind) -> Self {
        Self { key: None, kind }
    }

    /// Read `path` (relative to the input root) and build children from its
    /// bytes. While the file is absent the node has no children.
    pub fn read<F>(path: impl Into<String>, make: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<Rule> + Send + Sync + 'static,
    {
        Self::from_kind(RuleKind::Read {
            path: path.into(),
            make: Arc::new(make),
        })
    }

    /// List the input root and build children from the entry names, in the
    /// order the filesystem returned them.
    pub fn read_directory<F>(make: F) -> Self
    where
        F: Fn(&[String]) -> Vec<Rule> + Send + Sync + 'static,
    {
        Self::from_kind(RuleKind::ReadDirectory {
            path: String::new(),
            make: Arc::new(make),
        })
    }

    /// [`Rule::read_directory`] with one child per entry, keyed by the entry
    /// name so adding or removing an entry leaves its siblings' identities
    /// untouched.
    pub fn read_directory_each<F>(make: F) -> Self
    where
        F: Fn(&str) -> Rule + Send + Sync + 'static,
    {
        Self::read_directory(move |names| {
            names
                .iter()
                .map(|name| make(name).with_key(name.clone()))
                .collect()
        })
    }

    /// Write `payload` to `path` relative to the output root.
    pub fn write(path: impl Into<String>, payload: Payload) -> Self {
        Self::from_kind(RuleKind::Write {
            path: path.into(),
            payload,
        })
    }

    /// Write `payload` to [`DEFAULT_OUTPUT_FILE`].
    pub fn write_index(payload: Payload) -> Self {
        Self::write(DEFAULT_OUTPUT_FILE, payload)
    }

    pub fn scope(segment: impl Into<String>, applies_to: AppliesTo, children: Vec<Rule>) -> Self {
        Self::from_kind(RuleKind::Scope {
            segment: segment.into(),
            applies_to,
            children,
        })
    }

    pub fn sequence(children: Vec<Rule>) -> Self {
        Self::from_kind(RuleKind::Sequence(children))
    }

    /// Evaluate `children`, collect everything they published on `channel`
    /// (left to right, depth first) and build further children from it.
    pub fn aggregate<F>(channel: impl Into<String>, children: Vec<Rule>, make: F) -> Self
    where
        F: Fn(&[String]) -> Vec<Rule> + Send + Sync + 'static,
    {
        Self::from_kind(RuleKind::Aggregate {
            channel: channel.into(),
            children,
            make: Arc::new(make),
        })
    }

    pub fn publish(channel: impl Into<String>, value: impl Into<String>) -> Self {
        Self::from_kind(RuleKind::Publish {
            channel: channel.into(),
            value: value.into(),
        })
    }

    /// Give this node an explicit identity key among its siblings.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            RuleKind::Read { .. } => "read",
            RuleKind::ReadDirectory { .. } => "read_directory",
            RuleKind::Write { .. } => "write",
            RuleKind::Scope { .. } => "scope",
            RuleKind::Sequence(_) => "sequence",
            RuleKind::Aggregate { .. } => "aggregate",
            RuleKind::Publish { .. } => "publish",
        }
    }
}

impl fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Read { path, .. } => f.debug_struct("Read").field("path", path).finish_non_exhaustive(),
            RuleKind::ReadDirectory { path, .. } => f
                .debug_struct("ReadDirectory")
                .field("path", path)
                .finish_non_exhaustive(),
            RuleKind::Write { path, payload } => f
                .debug_struct("Write")
                .field("path", path)
                .field("payload", &payload.name)
                .field("bytes", &payload.bytes.len())
                .finish(),
            RuleKind::Scope {
                segment,
                applies_to,
                children,
            } => f
                .debug_struct("Scope")
                .field("segment", segment)
                .field("applies_to", applies_to)
                .field("children", children)
                .finish(),
            RuleKind::Sequence(children) => f.debug_tuple("Sequence").field(children).finish(),
            RuleKind::Aggregate {
                channel, children, ..
            } => f
                .debug_struct("Aggregate")
                .field("channel", channel)
                .field("children", children)
                .finish_non_exhaustive(),
            RuleKind::Publish { channel, value } => f
                .debug_struct("Publish")
                .field("channel", channel)
                .field("value", value)
                .finish(),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{key:?} => {:?}", self.kind),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

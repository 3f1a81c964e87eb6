// src/tree/identity.rs

use std::fmt;

/// Which evaluation stage of its parent a node belongs to.
///
/// Aggregate nodes generate a second set of children from what their body
/// published; those live in [`Stage::Derived`] so their keys never collide
/// with body children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Body,
    Derived,
}

/// Position of a child under its parent: explicit key if the rule carries
/// one, positional index otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Index(usize),
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub stage: Stage,
    pub slot: Slot,
}

/// Structural identity of a node, stable across evaluations: the chain of
/// child keys from the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(Vec<NodeKey>);

impl NodeId {
    pub fn root() -> Self {
        NodeId(Vec::new())
    }

    pub fn child(&self, stage: Stage, slot: Slot) -> NodeId {
        let mut keys = self.0.clone();
        keys.push(NodeKey { stage, slot });
        NodeId(keys)
    }

    pub fn parent(&self) -> Option<NodeId> {
        if self.0.is_empty() {
            return None;
        }
        Some(NodeId(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// True if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &NodeId) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    pub fn keys(&self) -> &[NodeKey] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for key in &self.0 {
            f.write_str("/")?;
            if key.stage == Stage::Derived {
                f.write_str("@")?;
            }
            match &key.slot {
                Slot::Index(i) => write!(f, "{i}")?,
                Slot::Named(name) => write!(f, "{name:?}")?,
            }
        }
        Ok(())
    }
}

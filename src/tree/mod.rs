// src/tree/mod.rs

//! The rule tree: a declarative description of what to read, where to
//! write, and how scopes and aggregation shape the result.
//!
//! - [`rule`] holds the node kinds and authoring combinators.
//! - [`context`] holds the immutable input/output roots threaded down the
//!   tree during evaluation.
//! - [`identity`] provides stable node identities across evaluations.

pub mod context;
pub mod identity;
pub mod rule;

pub use context::{Context, ContextField};
pub use identity::{NodeId, NodeKey, Slot, Stage};
pub use rule::{DEFAULT_OUTPUT_FILE, Payload, Rule, RuleKind};

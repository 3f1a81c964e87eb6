// src/eval/mod.rs

//! Rule tree evaluation and incremental re-evaluation.
//!
//! - [`scheduler`] walks the tree, owns the cached sources and decides what
//!   must re-run when a source or the root context changes.
//! - [`node_info`] holds per-node records: dependencies, children and the
//!   last write.
//! - [`aggregate`] implements the upward publication channels.
//! - [`scheduler_step`] defines the report returned by every entry point.

pub mod aggregate;
pub mod node_info;
pub mod scheduler;
pub mod scheduler_step;

pub use aggregate::Publication;
pub use node_info::{Dependency, NodeInfo, SourceKey, WriteStamp};
pub use scheduler::Scheduler;
pub use scheduler_step::{EvaluationStep, FailedWrite};

// src/eval/scheduler_step.rs

use std::path::PathBuf;

use crate::tree::NodeId;

/// A Write that failed. The node stays without a write stamp, so the next
/// evaluation tries again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWrite {
    pub path: PathBuf,
    pub message: String,
}

/// Result of one scheduler entry point (build, change, re-root, rebuild).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationStep {
    /// Nodes whose dependencies changed and that were re-evaluated as roots
    /// of this step.
    pub invalidated: Vec<NodeId>,
    /// Total node evaluations, including descendants.
    pub evaluated: usize,
    /// Output files written, in write order.
    pub written: Vec<PathBuf>,
    /// Writes skipped because destination and payload were unchanged.
    pub skipped_writes: usize,
    pub failed_writes: Vec<FailedWrite>,
    /// Nodes dropped because their parent no longer produces them.
    pub discarded: usize,
}

impl EvaluationStep {
    /// True if nothing was evaluated.
    pub fn is_noop(&self) -> bool {
        self.evaluated == 0 && self.discarded == 0
    }
}

// src/engine/core.rs

//! Pure core engine state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`RuntimeEvent`]s and produces:
//! - an updated scheduler state (and whatever writes that implies)
//! - a [`CoreStep`] telling the IO shell whether to keep going
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - coalescing bursts of change notifications
//! - handling Ctrl+C / shutdown
//!
//! The core has no channels and no Tokio types, so it can be driven
//! directly from tests.

use tracing::{debug, info};

use crate::errors::{Result, WatchtreeError};
use crate::eval::{EvaluationStep, Scheduler};
use crate::engine::{RuntimeEvent, RuntimeOptions};

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// What the scheduler did.
    pub evaluation: EvaluationStep,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

#[derive(Debug)]
pub struct CoreEngine {
    scheduler: Scheduler,
    options: RuntimeOptions,
}

impl CoreEngine {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self { scheduler, options }
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Initial build.
    ///
    /// In `exit_when_idle` mode there is no later evaluation to retry a
    /// failed write, so the first failure is returned as an error.
    pub fn start(&mut self) -> Result<CoreStep> {
        let evaluation = self.scheduler.build()?;
        info!(
            written = evaluation.written.len(),
            failed = evaluation.failed_writes.len(),
            "initial build finished"
        );

        if self.options.exit_when_idle {
            if let Some(failure) = evaluation.failed_writes.first() {
                return Err(WatchtreeError::WriteFailure {
                    path: failure.path.clone(),
                    message: failure.message.clone(),
                });
            }
        }

        Ok(CoreStep {
            evaluation,
            keep_running: !self.options.exit_when_idle,
        })
    }

    /// Handle a single runtime event.
    pub fn step(&mut self, event: RuntimeEvent) -> Result<CoreStep> {
        let evaluation = match event {
            RuntimeEvent::PathChanged { path, kind } => {
                debug!(path = ?path, %kind, "path changed");
                self.scheduler.handle_change(&path, kind)?
            }
            RuntimeEvent::RebuildRequested => {
                info!("rebuild requested");
                self.scheduler.rebuild()?
            }
            RuntimeEvent::RootsChanged(context) => self.scheduler.set_context(context)?,
            RuntimeEvent::ShutdownRequested => {
                return Ok(CoreStep {
                    evaluation: EvaluationStep::default(),
                    keep_running: false,
                });
            }
        };

        Ok(CoreStep {
            evaluation,
            keep_running: true,
        })
    }

    /// Release every watch. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }
}

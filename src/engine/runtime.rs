// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;

use super::core::CoreEngine;
use super::queue::ChangeQueue;
use super::RuntimeEvent;

/// Drives the core engine in response to `RuntimeEvent`s.
///
/// This is a pure IO shell around `CoreEngine`, which owns the evaluation
/// semantics. The shell reads events from the channel, batches whatever is
/// already waiting, coalesces change notifications per path, and feeds the
/// result to the core one event at a time. Nothing else ever touches the
/// scheduler, so evaluation is single-threaded.
pub struct Runtime {
    core: CoreEngine,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    queue: ChangeQueue,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(core: CoreEngine, event_rx: mpsc::Receiver<RuntimeEvent>) -> Self {
        let queue = ChangeQueue::new(core.options().coalesce);
        Self {
            core,
            event_rx,
            queue,
        }
    }

    /// Main event loop.
    ///
    /// - Runs the initial build.
    /// - Consumes `RuntimeEvent`s from `event_rx` until shutdown, channel
    ///   close, or a fatal error.
    /// - Releases every watch on the way out, whatever the outcome.
    pub async fn run(mut self) -> Result<()> {
        info!("watchtree runtime started");

        let result = self.event_loop().await;
        self.core.shutdown();

        info!("runtime exiting");
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        let start = self.core.start()?;
        if !start.keep_running {
            info!("initial build done; exiting");
            return Ok(());
        }

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    return Ok(());
                }
            };

            // Whatever else is already waiting joins this batch.
            let mut batch = vec![event];
            while let Ok(next) = self.event_rx.try_recv() {
                batch.push(next);
            }
            debug!(events = batch.len(), "runtime received batch");

            if !self.process_batch(batch)? {
                info!("core requested exit; stopping runtime");
                return Ok(());
            }
        }
    }

    /// Returns `false` once the core asks to stop.
    fn process_batch(&mut self, batch: Vec<RuntimeEvent>) -> Result<bool> {
        for event in batch {
            match event {
                RuntimeEvent::PathChanged { path, kind } => self.queue.record(path, kind),
                other => {
                    // Anything else is a barrier: changes queued before it
                    // are applied first.
                    self.flush()?;
                    if !self.core.step(other)?.keep_running {
                        return Ok(false);
                    }
                }
            }
        }
        self.flush()?;
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        for (path, kind) in self.queue.drain_pending() {
            self.core.step(RuntimeEvent::PathChanged { path, kind })?;
        }
        Ok(())
    }
}

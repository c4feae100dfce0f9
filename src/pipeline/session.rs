//! The single "current result" slot consumed by a presentation layer.
//!
//! Every run started through a [`PipelineSession`] is tagged with a generation number. Starting
//! a new run (or cancelling) bumps the generation and fires the previous run's cancel signal.
//! State written by a run reaches the slot only while its generation is still current; the
//! check and the write happen under the same lock `start` and `cancel` take, so a superseded
//! run can never overwrite a newer run's state.

use crate::jobs::{CancelSignal, Cancelled};
use crate::metrics::PipelineMetrics;
use crate::pipeline::orchestrator::Pipeline;
use crate::pipeline::types::{
    PipelineObserver, PipelineOutcome, PipelineRequest, PipelineStage, PipelineState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How a session-managed run ended.
#[derive(Clone, Debug, PartialEq)]
pub enum RunResolution {
    /// The run finished while current and its outcome was published to the slot.
    Completed(PipelineOutcome),
    /// The run finished after a newer run replaced it; its outcome was discarded.
    Superseded(PipelineOutcome),
    /// The run was cancelled before finishing.
    Cancelled,
}

/// Owns the current-result slot and the run that is allowed to write it.
pub struct PipelineSession {
    pipeline: Arc<Pipeline>,
    shared: Arc<SessionShared>,
}

struct SessionShared {
    active: Mutex<ActiveRun>,
    slot: watch::Sender<PipelineState>,
    metrics: Arc<PipelineMetrics>,
}

struct ActiveRun {
    generation: u64,
    cancel: CancelSignal,
}

impl SessionShared {
    fn active(&self) -> MutexGuard<'_, ActiveRun> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `state` if `generation` is still current. Returns whether the write happened.
    fn publish(&self, generation: u64, state: &PipelineState) -> bool {
        let active = self.active();
        if active.generation != generation {
            return false;
        }
        self.slot.send_replace(state.clone());
        true
    }
}

/// Handle to a run started by [`PipelineSession::start`].
pub struct RunTicket {
    generation: u64,
    task: JoinHandle<RunResolution>,
}

impl RunTicket {
    /// Generation number assigned to this run.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the run to end.
    pub async fn finish(self) -> RunResolution {
        match self.task.await {
            Ok(resolution) => resolution,
            Err(error) => {
                tracing::error!(generation = self.generation, error = %error, "Pipeline task aborted");
                RunResolution::Cancelled
            }
        }
    }
}

struct SlotWriter {
    generation: u64,
    shared: Arc<SessionShared>,
    terminal_published: AtomicBool,
}

impl PipelineObserver for SlotWriter {
    fn on_state_change(&self, state: &PipelineState) {
        let accepted = self.shared.publish(self.generation, state);
        if !accepted {
            tracing::debug!(generation = self.generation, ?state, "Dropping state from stale run");
        } else if state.is_terminal() {
            self.terminal_published.store(true, Ordering::Release);
        }
    }
}

impl PipelineSession {
    /// Create a session with an `Idle` slot.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let (slot, _) = watch::channel(PipelineState::Idle);
        let metrics = pipeline.metrics();
        Self {
            pipeline,
            shared: Arc::new(SessionShared {
                active: Mutex::new(ActiveRun {
                    generation: 0,
                    cancel: CancelSignal::new(),
                }),
                slot,
                metrics,
            }),
        }
    }

    /// Subscribe to slot updates.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.shared.slot.subscribe()
    }

    /// Current slot contents.
    pub fn state(&self) -> PipelineState {
        self.shared.slot.borrow().clone()
    }

    /// Generation of the run currently allowed to write the slot.
    pub fn current_generation(&self) -> u64 {
        self.shared.active().generation
    }

    /// Start a run for `url`, superseding any run in flight.
    ///
    /// Empty URLs are ignored: no run starts and the slot is left untouched. Otherwise the slot
    /// reads `Running(Extracting)` by the time this returns. Must be called from within a tokio
    /// runtime.
    pub fn start(&self, url: &str) -> Option<RunTicket> {
        let request = PipelineRequest::new(url)?;

        let (generation, cancel) = {
            let mut active = self.shared.active();
            active.cancel.cancel();
            active.generation += 1;
            active.cancel = CancelSignal::new();
            self.shared
                .slot
                .send_replace(PipelineState::Running(PipelineStage::Extracting));
            (active.generation, active.cancel.clone())
        };
        tracing::debug!(generation, url = request.url(), "Session starting run");

        let writer = SlotWriter {
            generation,
            shared: Arc::clone(&self.shared),
            terminal_published: AtomicBool::new(false),
        };
        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::spawn(async move {
            let result = pipeline.run_observed(request, &writer, &cancel).await;
            resolve(result, &writer)
        });

        Some(RunTicket { generation, task })
    }

    /// Cancel the run in flight (if any) and reset the slot to `Idle`.
    pub fn cancel(&self) {
        let mut active = self.shared.active();
        active.cancel.cancel();
        active.generation += 1;
        active.cancel = CancelSignal::new();
        self.shared.slot.send_replace(PipelineState::Idle);
        tracing::debug!(generation = active.generation, "Session cancelled current run");
    }
}

fn resolve(result: Result<PipelineOutcome, Cancelled>, writer: &SlotWriter) -> RunResolution {
    match result {
        Err(Cancelled) => RunResolution::Cancelled,
        Ok(outcome) if writer.terminal_published.load(Ordering::Acquire) => {
            RunResolution::Completed(outcome)
        }
        Ok(outcome) => {
            writer.shared.metrics.record_superseded();
            tracing::info!(generation = writer.generation, "Discarding outcome of superseded run");
            RunResolution::Superseded(outcome)
        }
    }
}

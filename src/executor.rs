use crate::error::{Result, RevoiceError};
use crate::pipeline::{PipelineFailure, PipelineOrchestrator, RunOutcome, RunRequest};
use crate::progress::{CancelFlag, ProgressEvent, RunContext, RunStage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Accepts at most one active run; a second submit is refused until the
/// first one has finished.
#[derive(Debug, Clone, Default)]
pub struct RunExecutor {
    active: Arc<AtomicBool>,
}

/// Clears the executor's busy flag when the run task ends, panics included.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start `request` on a background task.
    pub fn submit(
        &self,
        mut orchestrator: PipelineOrchestrator,
        request: RunRequest,
    ) -> Result<RunHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RevoiceError::RunInProgress);
        }
        let guard = ActiveGuard(self.active.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let ctx = RunContext::begin_run(Some(tx), cancel.clone());

        info!("Starting run for {}", request.input.display());
        let join = tokio::spawn(async move {
            let _guard = guard;
            orchestrator.run(&request, ctx).await
        });

        Ok(RunHandle {
            events: rx,
            cancel,
            join,
            seen: Vec::new(),
        })
    }
}

pub struct RunHandle {
    events: UnboundedReceiver<ProgressEvent>,
    cancel: CancelFlag,
    join: JoinHandle<RunOutcome>,
    /// Every event delivered so far, kept in case the run task dies.
    seen: Vec<ProgressEvent>,
}

impl RunHandle {
    /// Next progress event; `None` once the run has finished emitting.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        let event = self.events.recv().await?;
        self.seen.push(event.clone());
        Some(event)
    }

    /// Ask the run to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Wait for the run to end. A panicking run is reported as a failure
    /// carrying every event it emitted before dying.
    pub async fn wait(mut self) -> RunOutcome {
        let e = match self.join.await {
            Ok(outcome) => return outcome,
            Err(e) => e,
        };
        error!("Run task ended abnormally: {}", e);

        // The sender is gone with the task; pick up whatever was not read yet.
        while let Ok(event) = self.events.try_recv() {
            self.seen.push(event);
        }
        let (stage, percent) = self
            .seen
            .last()
            .map(|last| (last.stage, last.percent))
            .unwrap_or((RunStage::Idle, 0));

        let failure = PipelineFailure {
            stage,
            message: format!("worker stopped unexpectedly: {}", e),
        };
        self.seen.push(ProgressEvent {
            percent,
            label: failure.to_string(),
            stage: RunStage::Failed,
            is_error: true,
        });
        RunOutcome {
            result: Err(failure),
            log: self.seen,
        }
    }
}

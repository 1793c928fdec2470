use crate::error::{Result, RevoiceError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

/// Lifecycle of a single processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    Idle,
    Extracting,
    Recognizing,
    Translating,
    Synthesizing,
    Composing,
    Reconciling,
    Exporting,
    Succeeded,
    Failed,
}

impl RunStage {
    pub fn label(self) -> &'static str {
        match self {
            RunStage::Idle => "idle",
            RunStage::Extracting => "extracting",
            RunStage::Recognizing => "recognizing",
            RunStage::Translating => "translating",
            RunStage::Synthesizing => "synthesizing",
            RunStage::Composing => "composing",
            RunStage::Reconciling => "reconciling",
            RunStage::Exporting => "exporting",
            RunStage::Succeeded => "succeeded",
            RunStage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Succeeded | RunStage::Failed)
    }

    /// Progress percentage reported when the stage is entered.
    pub fn entry_percent(self) -> u8 {
        match self {
            RunStage::Idle => 0,
            RunStage::Extracting => 10,
            RunStage::Recognizing => 20,
            RunStage::Translating => 50,
            RunStage::Synthesizing => 70,
            RunStage::Composing => 85,
            RunStage::Reconciling => 90,
            RunStage::Exporting => 95,
            RunStage::Succeeded => 100,
            // Failure keeps whatever percentage was reached.
            RunStage::Failed => 0,
        }
    }

    /// Whether the machine may move from `self` to `next`.
    ///
    /// Reconciling is optional, and any non-terminal stage may fail.
    pub fn can_transition_to(self, next: RunStage) -> bool {
        use RunStage::*;
        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Extracting)
                | (Extracting, Recognizing)
                | (Recognizing, Translating)
                | (Translating, Synthesizing)
                | (Synthesizing, Composing)
                | (Composing, Reconciling)
                | (Composing, Exporting)
                | (Reconciling, Exporting)
                | (Exporting, Succeeded)
        )
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the progress stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub percent: u8,
    pub label: String,
    pub stage: RunStage,
    pub is_error: bool,
}

/// Percentage range a stage spreads its per-segment events over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    pub start: u8,
    pub end: u8,
}

impl ProgressBand {
    pub const TRANSLATION: ProgressBand = ProgressBand { start: 50, end: 65 };
    pub const SYNTHESIS: ProgressBand = ProgressBand { start: 70, end: 85 };

    /// Percentage after `done` of `total` items.
    pub fn at(&self, done: usize, total: usize) -> u8 {
        if total == 0 {
            return self.end;
        }
        let width = self.end.saturating_sub(self.start) as usize;
        let offset = (width * done.min(total)) / total;
        self.start + offset as u8
    }
}

/// Shared cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Explicit per-run context threaded through every stage.
///
/// Created with [`RunContext::begin_run`], mutated by the orchestrator and
/// closed with [`RunContext::end_run`], which hands back the run log.
#[derive(Debug)]
pub struct RunContext {
    stage: RunStage,
    percent: u8,
    events: Option<UnboundedSender<ProgressEvent>>,
    cancel: CancelFlag,
    log: Vec<ProgressEvent>,
}

impl RunContext {
    pub fn begin_run(events: Option<UnboundedSender<ProgressEvent>>, cancel: CancelFlag) -> Self {
        let mut ctx = Self {
            stage: RunStage::Idle,
            percent: 0,
            events,
            cancel,
            log: Vec::new(),
        };
        ctx.report(5, "Initializing processors...");
        ctx
    }

    /// A context with no listener, mostly for tests and library callers.
    pub fn detached() -> Self {
        Self::begin_run(None, CancelFlag::new())
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn log(&self) -> &[ProgressEvent] {
        &self.log
    }

    /// Move to `next` and emit its entry event.
    pub fn enter(&mut self, next: RunStage, label: impl Into<String>) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(RevoiceError::InvalidTransition {
                from: self.stage.to_string(),
                to: next.to_string(),
            });
        }
        self.stage = next;
        self.report(next.entry_percent(), label);
        Ok(())
    }

    /// Emit a progress event. Percentages never go backwards within a run.
    pub fn report(&mut self, percent: u8, label: impl Into<String>) {
        self.percent = self.percent.max(percent.min(100));
        let event = ProgressEvent {
            percent: self.percent,
            label: label.into(),
            stage: self.stage,
            is_error: false,
        };
        info!("[{:>3}%] {}", event.percent, event.label);
        self.emit(event);
    }

    /// Terminal failure: record the error and move to `Failed`.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("Run failed during {}: {}", self.stage, message);
        if self.stage.can_transition_to(RunStage::Failed) {
            self.stage = RunStage::Failed;
        }
        let event = ProgressEvent {
            percent: self.percent,
            label: message,
            stage: self.stage,
            is_error: true,
        };
        self.emit(event);
    }

    /// Cooperative cancellation point.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(RevoiceError::Cancelled);
        }
        Ok(())
    }

    /// Close the run and return everything it logged.
    pub fn end_run(self) -> Vec<ProgressEvent> {
        self.log
    }

    fn emit(&mut self, event: ProgressEvent) {
        if let Some(tx) = &self.events {
            // Listener may have gone away; the log still keeps the event.
            let _ = tx.send(event.clone());
        }
        self.log.push(event);
    }
}

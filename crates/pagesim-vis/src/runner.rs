//! Paced, cancellable replay of an access sequence.
//!
//! Cancellation is epoch based: every reset or reconfigure advances the
//! epoch, and work started under an older [`Ticket`] is dropped at its next
//! suspension point. A plain stop only ends the run before its next step.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::events::PageId;

/// Delay before each step of a run.
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Lifecycle of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// No run active
    Idle,
    /// A run is stepping through its sequence
    Running,
    /// The last run was stopped, or cancelled by a reset or reconfigure
    Cancelled,
}

/// The epoch a unit of work was started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// What happened to one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Result was committed to state and rendered
    Applied,
    /// Ticket went stale; the result was dropped
    Discarded,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed(GatewayError),
    /// Another run was already active
    Rejected,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub applied_steps: usize,
    pub total_steps: usize,
}

/// Work the runner drives: one baseline configure, then one access per page.
#[async_trait]
pub trait StepTarget: Send + Sync {
    /// Reset to a clean baseline under `ticket`.
    async fn prepare(&self, ticket: Ticket) -> Result<StepOutcome, GatewayError>;

    /// Access one page under `ticket`.
    async fn step(&self, page: PageId, ticket: Ticket) -> Result<StepOutcome, GatewayError>;

    /// Surface a failure to the user. Called once per failed run.
    fn report_failure(&self, error: &GatewayError);
}

#[derive(Debug)]
struct RunnerInner {
    state: RunState,
    active: Option<Ticket>,
    progress: usize,
    total: usize,
}

/// Drives sequence runs, one at a time.
pub struct SequenceRunner {
    epoch: AtomicU64,
    inner: Mutex<RunnerInner>,
    pacing: Duration,
}

impl Default for SequenceRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PACING)
    }
}

impl SequenceRunner {
    pub fn new(pacing: Duration) -> Self {
        Self {
            epoch: AtomicU64::new(0),
            inner: Mutex::new(RunnerInner {
                state: RunState::Idle,
                active: None,
                progress: 0,
                total: 0,
            }),
            pacing,
        }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Ticket for work started now.
    pub fn ticket(&self) -> Ticket {
        Ticket(self.epoch.load(Ordering::SeqCst))
    }

    /// Whether no cancellation happened since `ticket` was issued.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.epoch.load(Ordering::SeqCst) == ticket.0
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Stop an active run before its next step.
    ///
    /// Tickets stay valid, so a step already in flight is still applied.
    /// Returns true if a run was stopped.
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == RunState::Running {
            inner.state = RunState::Cancelled;
            tracing::info!(
                progress = inner.progress,
                total = inner.total,
                "sequence run stopped"
            );
            true
        } else {
            false
        }
    }

    /// Invalidate all outstanding tickets. Returns true if a run was stopped.
    ///
    /// Used by reset and reconfigure: replies to in-flight work are dropped.
    pub fn cancel(&self) -> bool {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        if inner.state == RunState::Running {
            inner.state = RunState::Cancelled;
            tracing::info!(
                progress = inner.progress,
                total = inner.total,
                "sequence run cancelled"
            );
            true
        } else {
            false
        }
    }

    /// Replay `pages` against `target`.
    ///
    /// Steps are strictly sequential: each waits for the pacing delay, then
    /// for the previous step to be fully applied. A gateway error ends the
    /// run and is reported once.
    pub async fn run<T: StepTarget + ?Sized>(&self, target: &T, pages: &[PageId]) -> RunReport {
        let Some(ticket) = self.try_start(pages.len()) else {
            tracing::warn!("sequence run rejected: another run is active");
            return RunReport {
                outcome: RunOutcome::Rejected,
                applied_steps: 0,
                total_steps: pages.len(),
            };
        };

        tracing::info!(steps = pages.len(), "sequence run started");
        let (outcome, applied_steps) = self.drive(target, pages, ticket).await;
        self.finish(ticket);
        tracing::info!(?outcome, applied_steps, "sequence run finished");

        RunReport {
            outcome,
            applied_steps,
            total_steps: pages.len(),
        }
    }

    async fn drive<T: StepTarget + ?Sized>(
        &self,
        target: &T,
        pages: &[PageId],
        ticket: Ticket,
    ) -> (RunOutcome, usize) {
        let mut applied = 0;
        match target.prepare(ticket).await {
            Ok(StepOutcome::Applied) => {}
            Ok(StepOutcome::Discarded) => return (RunOutcome::Cancelled, applied),
            Err(e) => {
                target.report_failure(&e);
                return (RunOutcome::Failed(e), applied);
            }
        }

        for page in pages {
            if !self.should_continue(ticket) {
                return (RunOutcome::Cancelled, applied);
            }
            tokio::time::sleep(self.pacing).await;
            if !self.should_continue(ticket) {
                return (RunOutcome::Cancelled, applied);
            }

            match target.step(*page, ticket).await {
                Ok(StepOutcome::Applied) => {
                    applied += 1;
                    self.record_step(ticket);
                }
                Ok(StepOutcome::Discarded) => return (RunOutcome::Cancelled, applied),
                Err(e) => {
                    target.report_failure(&e);
                    return (RunOutcome::Failed(e), applied);
                }
            }
        }

        (RunOutcome::Completed, applied)
    }

    /// Neither cancelled nor stopped since `ticket` started the run.
    fn should_continue(&self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let inner = self.lock();
        inner.active == Some(ticket) && inner.state == RunState::Running
    }

    fn try_start(&self, total: usize) -> Option<Ticket> {
        let mut inner = self.lock();
        if inner.state == RunState::Running {
            return None;
        }
        let ticket = self.ticket();
        inner.state = RunState::Running;
        inner.active = Some(ticket);
        inner.progress = 0;
        inner.total = total;
        Some(ticket)
    }

    fn record_step(&self, ticket: Ticket) {
        let mut inner = self.lock();
        if inner.active == Some(ticket) {
            inner.progress += 1;
        }
    }

    /// Leave `Running` unless the run was cancelled.
    fn finish(&self, ticket: Ticket) {
        let mut inner = self.lock();
        if inner.active != Some(ticket) {
            // A newer run owns the state already.
            return;
        }
        inner.active = None;
        if inner.state == RunState::Running {
            inner.state = RunState::Idle;
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunnerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runner status for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    pub progress: usize,
    pub total: usize,
    pub pacing_ms: u64,
}

impl From<&SequenceRunner> for RunStatus {
    fn from(runner: &SequenceRunner) -> Self {
        let inner = runner.lock();
        Self {
            state: inner.state,
            progress: inner.progress,
            total: inner.total,
            pacing_ms: runner.pacing.as_millis() as u64,
        }
    }
}

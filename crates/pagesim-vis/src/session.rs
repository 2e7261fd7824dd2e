//! A simulation session: the one owner of state, views and the runner.
//!
//! Round trips are serialized by an async operation lock. State mutation and
//! the render that follows happen under one synchronous lock with no
//! suspension in between, so a half-applied result is never drawn.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::canvas::Canvas;
use crate::error::{Error, GatewayError, Result};
use crate::events::{AccessLogEntry, AlgorithmId, PageId};
use crate::gateway::Gateway;
use crate::runner::{RunReport, RunStatus, SequenceRunner, StepOutcome, StepTarget, Ticket};
use crate::state::{AppliedAccess, SimulationConfig, SimulationState, StateSnapshot};
use crate::view::ViewSynchronizer;

struct Core<C> {
    state: SimulationState,
    view: ViewSynchronizer,
    canvas: C,
}

/// Client session against one simulation service.
pub struct Session<G: Gateway, C: Canvas> {
    gateway: G,
    core: Mutex<Core<C>>,
    op_lock: tokio::sync::Mutex<()>,
    runner: SequenceRunner,
}

impl<G: Gateway, C: Canvas> Session<G, C> {
    /// Create a session and draw the initial, empty surfaces.
    ///
    /// Call [`Session::start`] to bring the service in line with `config`.
    pub fn new(gateway: G, mut canvas: C, config: SimulationConfig, pacing: Duration) -> Self {
        let state = SimulationState::new(config);
        let mut view = ViewSynchronizer::new();
        view.rebuild(&state, &mut canvas);

        Self {
            gateway,
            core: Mutex::new(Core {
                state,
                view,
                canvas,
            }),
            op_lock: tokio::sync::Mutex::new(()),
            runner: SequenceRunner::new(pacing),
        }
    }

    /// Push the current configuration to the service.
    pub async fn start(&self) -> Result<()> {
        let config = self.config();
        self.configure(config.algorithm, config.frame_count).await
    }

    /// Switch algorithm and/or frame count. Cancels any active run.
    pub async fn configure(&self, algorithm: AlgorithmId, frame_count: usize) -> Result<()> {
        self.runner.cancel();
        let ticket = self.runner.ticket();

        let config = SimulationConfig {
            algorithm,
            frame_count,
            ..self.config()
        };
        tracing::info!(algorithm = %config.algorithm, frame_count, "configuring");

        match self.configure_under(config, ticket).await {
            Ok(StepOutcome::Applied) => Ok(()),
            Ok(StepOutcome::Discarded) => {
                tracing::debug!("configure superseded by a newer request");
                Ok(())
            }
            Err(e) => {
                self.notify(&format!("Error setting algorithm: {}", e));
                Err(e.into())
            }
        }
    }

    /// Reset the simulation under its current configuration. Cancels any active run.
    pub async fn reset(&self) -> Result<()> {
        let config = self.config();
        self.configure(config.algorithm, config.frame_count).await
    }

    /// Access one page.
    ///
    /// Rejected while a sequence run is active. Returns `None` if a reset or
    /// reconfigure overtook the request and its reply was dropped.
    pub async fn access(&self, page: PageId) -> Result<Option<AccessLogEntry>> {
        if self.runner.is_running() {
            return Err(Error::RunInProgress);
        }

        let ticket = self.runner.ticket();
        match self.access_under(page, ticket).await {
            Ok(applied) => Ok(applied.map(|a| a.entry)),
            Err(e) => {
                self.report_failure(&e);
                Err(e.into())
            }
        }
    }

    /// Replay a sequence of accesses with pacing. See [`SequenceRunner::run`].
    pub async fn run_sequence(&self, pages: &[PageId]) -> RunReport {
        self.runner.run(self, pages).await
    }

    /// Stop an active run before its next step. A step already in flight is
    /// still applied, so state keeps matching the service. Returns true if a
    /// run was active.
    pub fn cancel_run(&self) -> bool {
        self.runner.stop()
    }

    /// Change the page-table size. Local only; the service is not told.
    pub fn resize_page_table(&self, size: usize) {
        let mut core = self.lock();
        let Core {
            state,
            view,
            canvas,
        } = &mut *core;
        state.resize_page_table(size);
        view.resize_page_table(state, canvas);
        tracing::info!(size, "page table resized");
    }

    /// Show a message on the canvas.
    pub fn notify(&self, message: &str) {
        tracing::warn!("{}", message);
        self.lock().canvas.notify(message);
    }

    pub fn config(&self) -> SimulationConfig {
        self.lock().state.config().clone()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().state.snapshot()
    }

    pub fn run_status(&self) -> RunStatus {
        RunStatus::from(&self.runner)
    }

    /// Page currently highlighted as faulted in the page-table grid.
    pub fn highlighted_page(&self) -> Option<PageId> {
        self.lock().view.highlighted()
    }

    /// Inspect the canvas.
    pub fn with_canvas<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.lock().canvas)
    }

    async fn configure_under(
        &self,
        config: SimulationConfig,
        ticket: Ticket,
    ) -> std::result::Result<StepOutcome, GatewayError> {
        let _op = self.op_lock.lock().await;
        if !self.runner.is_current(ticket) {
            return Ok(StepOutcome::Discarded);
        }

        let reply = self
            .gateway
            .configure(&config.algorithm, config.frame_count)
            .await?;
        if !self.runner.is_current(ticket) {
            tracing::warn!("discarding stale configure reply");
            return Ok(StepOutcome::Discarded);
        }

        let mut core = self.lock();
        let Core {
            state,
            view,
            canvas,
        } = &mut *core;
        state.reconfigure(SimulationConfig {
            algorithm: reply.algorithm,
            ..config
        });
        state.reset(&reply.frames);
        view.rebuild(state, canvas);
        Ok(StepOutcome::Applied)
    }

    async fn access_under(
        &self,
        page: PageId,
        ticket: Ticket,
    ) -> std::result::Result<Option<AppliedAccess>, GatewayError> {
        let _op = self.op_lock.lock().await;
        if !self.runner.is_current(ticket) {
            return Ok(None);
        }

        {
            let mut core = self.lock();
            let Core {
                state,
                view,
                canvas,
            } = &mut *core;
            state.begin_access(page);
            view.sync_counters(state, canvas);
        }

        let reply = self.gateway.access(page).await;
        if !self.runner.is_current(ticket) {
            tracing::warn!(%page, "discarding stale access reply");
            return Ok(None);
        }
        let result = reply?;
        tracing::debug!(%page, fault = result.page_fault_occurred, "access applied");

        let mut core = self.lock();
        let Core {
            state,
            view,
            canvas,
        } = &mut *core;
        let applied = state.apply_access_result(page, result);
        view.sync_access(state, &applied, canvas);
        Ok(Some(applied))
    }

    fn lock(&self) -> MutexGuard<'_, Core<C>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<G: Gateway, C: Canvas> StepTarget for Session<G, C> {
    async fn prepare(&self, ticket: Ticket) -> std::result::Result<StepOutcome, GatewayError> {
        let config = self.config();
        self.configure_under(config, ticket).await
    }

    async fn step(
        &self,
        page: PageId,
        ticket: Ticket,
    ) -> std::result::Result<StepOutcome, GatewayError> {
        Ok(match self.access_under(page, ticket).await? {
            Some(_) => StepOutcome::Applied,
            None => StepOutcome::Discarded,
        })
    }

    fn report_failure(&self, error: &GatewayError) {
        self.notify(&format!("Error accessing page: {}", error));
    }
}

impl<G: Gateway, C: Canvas> Drop for Session<G, C> {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        core.view.teardown(&mut core.canvas);
    }
}

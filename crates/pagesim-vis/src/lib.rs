//! Pagesim Visualization Client
//!
//! Client-side synchronization core for a remote page-replacement
//! simulator. The replacement algorithm runs in the service; this crate keeps
//! one authoritative copy of what the service reported and keeps every
//! rendered surface consistent with it.
//!
//! # Architecture
//!
//! - **State**: frames, page-table residency, counters, fault-rate series, access log
//! - **Gateway**: `configure` / `access` round trips, normalized errors
//! - **Runner**: paced, cancellable replay of an access sequence
//! - **View**: frame strip, page-table grid and charts pushed to a [`Canvas`]
//! - **Controller**: validates raw control input and drives the session
//!
//! # Usage
//!
//! ```ignore
//! let gateway = HttpGateway::new("http://127.0.0.1:5000")?;
//! let canvas = TextCanvas::new(std::io::stdout());
//! let session = Session::new(gateway, canvas, SimulationConfig::default(), DEFAULT_PACING);
//! session.start().await?;
//! session.access(PageId(7)).await?;
//! ```

mod canvas;
mod config;
mod controller;
mod error;
mod events;
mod gateway;
mod runner;
mod session;
mod state;
mod view;

#[cfg(test)]
mod testing;

pub use canvas::{
    Canvas, ChartHandle, ChartKind, ChartOp, ChartSpec, FrameCell, PageCell, RecordedChart,
    RecordingCanvas, StatsLine, TextCanvas,
};
pub use config::ClientConfig;
pub use controller::{parse_page, parse_positive, parse_sequence, Controls, InputController};
pub use error::{Error, GatewayError, Result, ValidationError};
pub use events::{
    AccessLogEntry, AccessResult, AlgorithmId, ConfigureResult, FaultRatePoint, Outcome, PageId,
};
pub use gateway::{Gateway, HttpGateway};
pub use runner::{
    RunOutcome, RunReport, RunState, RunStatus, SequenceRunner, StepOutcome, StepTarget, Ticket,
    DEFAULT_PACING,
};
pub use session::Session;
pub use state::{AppliedAccess, Counters, SimulationConfig, SimulationState, StateSnapshot};
pub use view::ViewSynchronizer;

//! The single authoritative client-side record of the simulation.
//!
//! Everything here is a reflection of what the service reported. The only
//! value the client produces on its own is the optimistic access count.

use serde::{Deserialize, Serialize};

use crate::events::{
    AccessLogEntry, AccessResult, AlgorithmId, FaultRatePoint, Outcome, PageId,
};

/// Configuration of the running simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Replacement algorithm executed by the service
    pub algorithm: AlgorithmId,
    /// Number of physical frames (> 0)
    pub frame_count: usize,
    /// Number of addressable pages (> 0), never sent to the service
    pub page_table_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmId::default(),
            frame_count: 4,
            page_table_size: 16,
        }
    }
}

/// Access and fault counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Counters {
    pub total_accesses: u64,
    pub page_faults: u64,
    pub last_fault_rate: f64,
}

/// What one applied access changed, handed to the view layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAccess {
    pub entry: AccessLogEntry,
    pub point: FaultRatePoint,
}

/// Client-side simulation state.
#[derive(Debug, Clone)]
pub struct SimulationState {
    config: SimulationConfig,
    frames: Vec<Option<PageId>>,
    occupancy: Vec<bool>,
    page_table: Vec<bool>,
    counters: Counters,
    series: Vec<FaultRatePoint>,
    log: Vec<AccessLogEntry>,
    last_page: Option<PageId>,
    faulted_page: Option<PageId>,
}

impl SimulationState {
    /// Create an empty state for the given configuration.
    pub fn new(config: SimulationConfig) -> Self {
        let mut state = Self {
            frames: Vec::new(),
            occupancy: Vec::new(),
            page_table: Vec::new(),
            counters: Counters::default(),
            series: Vec::new(),
            log: Vec::new(),
            last_page: None,
            faulted_page: None,
            config,
        };
        state.reset(&[]);
        state
    }

    /// Count an access before its round trip resolves.
    pub fn begin_access(&mut self, page: PageId) {
        self.counters.total_accesses += 1;
        tracing::trace!(%page, total = self.counters.total_accesses, "access started");
    }

    /// Replace frames, residency and fault counters with a service reply.
    ///
    /// `page_faults` and `last_fault_rate` are copied verbatim; the fault rate
    /// is never derived from local counters.
    pub fn apply_access_result(&mut self, page: PageId, result: AccessResult) -> AppliedAccess {
        self.frames = fit(result.frames, self.config.frame_count, None);
        self.occupancy = fit(result.frame_occupancy, self.config.frame_count, false);
        self.page_table = (0..self.config.page_table_size)
            .map(|i| {
                result
                    .page_table
                    .get(&PageId(i as u32))
                    .copied()
                    .unwrap_or(false)
            })
            .collect();

        self.counters.page_faults = result.total_faults;
        self.counters.last_fault_rate = result.fault_rate;

        let point = FaultRatePoint {
            index: self.series.len() + 1,
            rate: result.fault_rate,
        };
        self.series.push(point);

        let entry = AccessLogEntry {
            page,
            outcome: Outcome::from_fault(result.page_fault_occurred),
            algorithm: self.config.algorithm.clone(),
        };
        self.log.push(entry.clone());

        self.last_page = Some(page);
        self.faulted_page = result.page_fault_occurred.then_some(page);

        AppliedAccess { entry, point }
    }

    /// Zero counters, drop history, and seed frames from `initial_frames`.
    pub fn reset(&mut self, initial_frames: &[Option<PageId>]) {
        self.counters = Counters::default();
        self.series.clear();
        self.log.clear();
        self.last_page = None;
        self.faulted_page = None;

        self.frames = fit(initial_frames.to_vec(), self.config.frame_count, None);
        self.occupancy = self.frames.iter().map(Option::is_some).collect();
        self.page_table = vec![false; self.config.page_table_size];
    }

    /// Swap the configuration. Frames are left for the following `reset`.
    pub fn reconfigure(&mut self, config: SimulationConfig) {
        tracing::debug!(
            algorithm = %config.algorithm,
            frames = config.frame_count,
            pages = config.page_table_size,
            "reconfigured"
        );
        self.config = config;
    }

    /// Change the number of addressable pages, keeping residency of surviving ids.
    pub fn resize_page_table(&mut self, size: usize) {
        self.config.page_table_size = size;
        self.page_table.resize(size, false);
        if self.faulted_page.is_some_and(|p| p.index() >= size) {
            self.faulted_page = None;
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn frames(&self) -> &[Option<PageId>] {
        &self.frames
    }

    pub fn occupancy(&self) -> &[bool] {
        &self.occupancy
    }

    /// Residency bit per page id.
    pub fn page_table(&self) -> &[bool] {
        &self.page_table
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn series(&self) -> &[FaultRatePoint] {
        &self.series
    }

    pub fn log(&self) -> &[AccessLogEntry] {
        &self.log
    }

    pub fn last_page(&self) -> Option<PageId> {
        self.last_page
    }

    /// Page of the latest access, if that access faulted.
    pub fn faulted_page(&self) -> Option<PageId> {
        self.faulted_page
    }

    /// Serializable copy for inspection.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            config: self.config.clone(),
            frames: self.frames.clone(),
            page_table: self.page_table.clone(),
            counters: self.counters,
            series: self.series.clone(),
            log: self.log.iter().map(ToString::to_string).collect(),
            last_page: self.last_page,
        }
    }
}

/// Point-in-time copy of [`SimulationState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub config: SimulationConfig,
    pub frames: Vec<Option<PageId>>,
    pub page_table: Vec<bool>,
    pub counters: Counters,
    pub series: Vec<FaultRatePoint>,
    pub log: Vec<String>,
    pub last_page: Option<PageId>,
}

/// Pad with `fill` or truncate to exactly `len` items.
fn fit<T: Clone>(mut items: Vec<T>, len: usize, fill: T) -> Vec<T> {
    items.resize(len, fill);
    items
}

//! View synchronizer.
//!
//! Derives every visual surface from [`SimulationState`] and pushes it to a
//! [`Canvas`]. Surfaces whose cardinality changes are destroyed and rebuilt,
//! never resized in place.

use crate::canvas::{
    Canvas, ChartHandle, ChartKind, ChartSpec, FrameCell, PageCell, StatsLine,
};
use crate::events::PageId;
use crate::state::{AppliedAccess, SimulationState};

/// A chart surface that owns at most one native chart.
#[derive(Debug)]
struct ChartSurface {
    kind: ChartKind,
    handle: Option<ChartHandle>,
}

impl ChartSurface {
    fn new(kind: ChartKind) -> Self {
        Self { kind, handle: None }
    }

    /// Release the current chart, then acquire a fresh one from `spec`.
    fn rebuild(&mut self, canvas: &mut dyn Canvas, spec: ChartSpec) {
        debug_assert_eq!(spec.kind, self.kind);
        if let Some(old) = self.handle.take() {
            canvas.destroy_chart(old);
        }
        self.handle = Some(canvas.create_chart(&spec));
    }

    fn release(&mut self, canvas: &mut dyn Canvas) {
        if let Some(old) = self.handle.take() {
            canvas.destroy_chart(old);
        }
    }
}

/// Keeps the rendered surfaces in step with the simulation state.
#[derive(Debug)]
pub struct ViewSynchronizer {
    frames: Vec<FrameCell>,
    grid: Vec<PageCell>,
    highlighted: Option<PageId>,
    trend: ChartSurface,
    occupancy: ChartSurface,
    residency: ChartSurface,
}

impl Default for ViewSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewSynchronizer {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            grid: Vec::new(),
            highlighted: None,
            trend: ChartSurface::new(ChartKind::FaultRate),
            occupancy: ChartSurface::new(ChartKind::FrameOccupancy),
            residency: ChartSurface::new(ChartKind::PageResidency),
        }
    }

    /// Tear down and rebuild every surface. Used after reset and reconfigure.
    pub fn rebuild(&mut self, state: &SimulationState, canvas: &mut dyn Canvas) {
        self.frames = frame_cells(state);
        canvas.draw_frames(&self.frames);

        self.rebuild_grid(state, canvas);

        self.trend.rebuild(
            canvas,
            ChartSpec {
                kind: ChartKind::FaultRate,
                title: "rate",
                labels: Vec::new(),
                values: Vec::new(),
                y_max: 100.0,
            },
        );
        self.occupancy.rebuild(canvas, occupancy_spec(state));
        self.residency.rebuild(canvas, residency_spec(state));

        canvas.clear_log();
        canvas.draw_stats(&stats_line(state));
    }

    /// Refresh the counter readout only (optimistic access count).
    pub fn sync_counters(&mut self, state: &SimulationState, canvas: &mut dyn Canvas) {
        canvas.draw_stats(&stats_line(state));
    }

    /// Push the effects of one applied access.
    pub fn sync_access(
        &mut self,
        state: &SimulationState,
        applied: &AppliedAccess,
        canvas: &mut dyn Canvas,
    ) {
        if let Some(handle) = self.trend.handle {
            canvas.push_point(handle, &applied.point.index.to_string(), applied.point.rate);
        }
        if let Some(handle) = self.occupancy.handle {
            canvas.set_values(handle, &bits(state.occupancy()));
        }
        if let Some(handle) = self.residency.handle {
            canvas.set_values(handle, &bits(state.page_table()));
        }

        // Frame count only changes through `rebuild`.
        self.frames = frame_cells(state);
        canvas.draw_frames(&self.frames);

        self.restyle_grid(state, canvas);

        canvas.draw_stats(&stats_line(state));
        canvas.append_log(&applied.entry);
    }

    /// Rebuild the surfaces indexed by page id after the page-table size changed.
    pub fn resize_page_table(&mut self, state: &SimulationState, canvas: &mut dyn Canvas) {
        self.rebuild_grid(state, canvas);
        self.residency.rebuild(canvas, residency_spec(state));
    }

    /// Release every native chart.
    pub fn teardown(&mut self, canvas: &mut dyn Canvas) {
        self.trend.release(canvas);
        self.occupancy.release(canvas);
        self.residency.release(canvas);
    }

    /// Page currently carrying fault emphasis.
    pub fn highlighted(&self) -> Option<PageId> {
        self.highlighted
    }

    pub fn grid(&self) -> &[PageCell] {
        &self.grid
    }

    pub fn frames(&self) -> &[FrameCell] {
        &self.frames
    }

    fn rebuild_grid(&mut self, state: &SimulationState, canvas: &mut dyn Canvas) {
        self.grid = page_cells(state);
        self.highlighted = state.faulted_page().filter(|p| p.index() < self.grid.len());
        canvas.build_page_grid(&self.grid);
    }

    /// Restyle only the cells whose residency or emphasis changed.
    fn restyle_grid(&mut self, state: &SimulationState, canvas: &mut dyn Canvas) {
        if self.grid.len() != state.page_table().len() {
            self.rebuild_grid(state, canvas);
            return;
        }

        let next = page_cells(state);
        let changed: Vec<PageCell> = next
            .iter()
            .zip(&self.grid)
            .filter(|(new, old)| new != old)
            .map(|(new, _)| *new)
            .collect();

        self.grid = next;
        self.highlighted = state.faulted_page().filter(|p| p.index() < self.grid.len());
        if !changed.is_empty() {
            canvas.restyle_page_cells(&changed);
        }
    }
}

fn frame_cells(state: &SimulationState) -> Vec<FrameCell> {
    state
        .frames()
        .iter()
        .enumerate()
        .map(|(slot, page)| FrameCell { slot, page: *page })
        .collect()
}

fn page_cells(state: &SimulationState) -> Vec<PageCell> {
    let faulted = state.faulted_page();
    state
        .page_table()
        .iter()
        .enumerate()
        .map(|(i, loaded)| {
            let page = PageId(i as u32);
            PageCell {
                page,
                loaded: *loaded,
                fault: faulted == Some(page),
            }
        })
        .collect()
}

fn stats_line(state: &SimulationState) -> StatsLine {
    let counters = state.counters();
    StatsLine {
        total_accesses: counters.total_accesses,
        page_faults: counters.page_faults,
        fault_rate: counters.last_fault_rate,
        last_page: state.last_page(),
    }
}

fn occupancy_spec(state: &SimulationState) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::FrameOccupancy,
        title: "memory",
        labels: (0..state.config().frame_count)
            .map(|i| format!("Frame {}", i))
            .collect(),
        values: bits(state.occupancy()),
        y_max: 1.0,
    }
}

fn residency_spec(state: &SimulationState) -> ChartSpec {
    ChartSpec {
        kind: ChartKind::PageResidency,
        title: "loaded",
        labels: (0..state.config().page_table_size)
            .map(|i| format!("Page {}", i))
            .collect(),
        values: bits(state.page_table()),
        y_max: 1.0,
    }
}

fn bits(flags: &[bool]) -> Vec<f64> {
    flags.iter().map(|b| if *b { 1.0 } else { 0.0 }).collect()
}

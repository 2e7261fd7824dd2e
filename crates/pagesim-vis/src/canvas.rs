//! Rendering boundary.
//!
//! A [`Canvas`] is whatever actually draws: a browser page, a terminal, or a
//! recorder in tests. It owns native chart objects and hands out opaque
//! [`ChartHandle`]s for them.

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::events::{AccessLogEntry, PageId};

/// Opaque reference to a chart owned by a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChartHandle(pub u64);

/// The chart surfaces the viewer keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    /// Line chart of cumulative fault rate per access
    FaultRate,
    /// Bar per frame, occupied or free
    FrameOccupancy,
    /// Bar per page, loaded or not
    PageResidency,
}

/// Everything needed to create a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: &'static str,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub y_max: f64,
}

/// A slot of the frame strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCell {
    pub slot: usize,
    pub page: Option<PageId>,
}

impl FrameCell {
    /// Text shown in the cell: the page id or `-`.
    pub fn label(&self) -> String {
        match self.page {
            Some(page) => page.to_string(),
            None => "-".to_string(),
        }
    }
}

/// A cell of the page-table grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCell {
    pub page: PageId,
    pub loaded: bool,
    pub fault: bool,
}

/// Counter readout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsLine {
    pub total_accesses: u64,
    pub page_faults: u64,
    pub fault_rate: f64,
    pub last_page: Option<PageId>,
}

/// Draw target for the view synchronizer.
pub trait Canvas: Send {
    /// Create a chart and return its handle.
    fn create_chart(&mut self, spec: &ChartSpec) -> ChartHandle;

    /// Destroy a chart. The handle is dead afterwards.
    fn destroy_chart(&mut self, handle: ChartHandle);

    /// Append one labelled point to a chart's series.
    fn push_point(&mut self, handle: ChartHandle, label: &str, value: f64);

    /// Replace a chart's whole series.
    fn set_values(&mut self, handle: ChartHandle, values: &[f64]);

    /// Redraw the frame strip.
    fn draw_frames(&mut self, cells: &[FrameCell]);

    /// Discard the page-table grid and build it from `cells`.
    fn build_page_grid(&mut self, cells: &[PageCell]);

    /// Restyle individual grid cells in place.
    fn restyle_page_cells(&mut self, cells: &[PageCell]);

    fn draw_stats(&mut self, stats: &StatsLine);

    fn append_log(&mut self, entry: &AccessLogEntry);

    fn clear_log(&mut self);

    /// Show a user-visible notification.
    fn notify(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq)]
struct TextChart {
    kind: ChartKind,
    title: &'static str,
    labels: Vec<String>,
    values: Vec<f64>,
    y_max: f64,
}

/// Line-oriented canvas for terminals.
pub struct TextCanvas<W: Write + Send> {
    out: W,
    next_handle: u64,
    charts: BTreeMap<ChartHandle, TextChart>,
    grid: Vec<PageCell>,
}

impl<W: Write + Send> TextCanvas<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            next_handle: 0,
            charts: BTreeMap::new(),
            grid: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, tag: &str, body: &str) {
        // best effort
        let _ = writeln!(self.out, "{:<8}{}", tag, body);
    }

    fn draw_grid(&mut self) {
        let body: String = self
            .grid
            .iter()
            .map(|cell| match (cell.fault, cell.loaded) {
                (true, _) => '!',
                (false, true) => '#',
                (false, false) => '.',
            })
            .collect();
        self.line("pages", &body);
    }

    fn draw_chart(&mut self, handle: ChartHandle) {
        let Some(chart) = self.charts.get(&handle) else {
            return;
        };
        let body = match chart.kind {
            ChartKind::FaultRate => match chart.values.last() {
                Some(last) => format!("{} {:.2}%", sparkline(&chart.values, chart.y_max), last),
                None => String::new(),
            },
            ChartKind::FrameOccupancy | ChartKind::PageResidency => {
                let used = chart.values.iter().filter(|v| **v > 0.0).count();
                format!(
                    "{} {}/{}",
                    sparkline(&chart.values, chart.y_max),
                    used,
                    chart.labels.len()
                )
            }
        };
        let tag = chart.title;
        self.line(tag, &body);
    }
}

/// Render values in `0..=max` as block characters.
fn sparkline(values: &[f64], max: f64) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    values
        .iter()
        .map(|v| {
            let ratio = if max > 0.0 { (v / max).clamp(0.0, 1.0) } else { 0.0 };
            BARS[(ratio * (BARS.len() - 1) as f64).round() as usize]
        })
        .collect()
}

impl<W: Write + Send> Canvas for TextCanvas<W> {
    fn create_chart(&mut self, spec: &ChartSpec) -> ChartHandle {
        let handle = ChartHandle(self.next_handle);
        self.next_handle += 1;
        self.charts.insert(
            handle,
            TextChart {
                kind: spec.kind,
                title: spec.title,
                labels: spec.labels.clone(),
                values: spec.values.clone(),
                y_max: spec.y_max,
            },
        );
        handle
    }

    fn destroy_chart(&mut self, handle: ChartHandle) {
        self.charts.remove(&handle);
    }

    fn push_point(&mut self, handle: ChartHandle, label: &str, value: f64) {
        if let Some(chart) = self.charts.get_mut(&handle) {
            chart.labels.push(label.to_string());
            chart.values.push(value);
        }
        self.draw_chart(handle);
    }

    fn set_values(&mut self, handle: ChartHandle, values: &[f64]) {
        if let Some(chart) = self.charts.get_mut(&handle) {
            chart.values = values.to_vec();
        }
        self.draw_chart(handle);
    }

    fn draw_frames(&mut self, cells: &[FrameCell]) {
        let body = cells
            .iter()
            .map(FrameCell::label)
            .collect::<Vec<_>>()
            .join(" | ");
        self.line("frames", &format!("[ {} ]", body));
    }

    fn build_page_grid(&mut self, cells: &[PageCell]) {
        self.grid = cells.to_vec();
        self.draw_grid();
    }

    fn restyle_page_cells(&mut self, cells: &[PageCell]) {
        for cell in cells {
            if let Some(slot) = self.grid.get_mut(cell.page.index()) {
                *slot = *cell;
            }
        }
        self.draw_grid();
    }

    fn draw_stats(&mut self, stats: &StatsLine) {
        let last = stats
            .last_page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let body = format!(
            "accesses={} faults={} rate={}% last={}",
            stats.total_accesses, stats.page_faults, stats.fault_rate, last
        );
        self.line("stats", &body);
    }

    fn append_log(&mut self, entry: &AccessLogEntry) {
        self.line("log", &entry.to_string());
    }

    fn clear_log(&mut self) {
        self.line("log", "(cleared)");
    }

    fn notify(&mut self, message: &str) {
        self.line("!!", message);
    }
}

/// Chart lifecycle call seen by a [`RecordingCanvas`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartOp {
    Created(ChartKind, ChartHandle),
    Destroyed(ChartHandle),
}

/// A chart as last seen by a [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedChart {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Headless canvas that keeps the latest drawn state of every surface.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    next_handle: u64,
    pub charts: BTreeMap<ChartHandle, RecordedChart>,
    pub chart_ops: Vec<ChartOp>,
    pub frames: Vec<FrameCell>,
    pub grid: Vec<PageCell>,
    pub grid_builds: usize,
    pub stats: Option<StatsLine>,
    pub log: Vec<String>,
    pub notifications: Vec<String>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live chart of the given kind, if exactly one exists.
    pub fn chart(&self, kind: ChartKind) -> Option<&RecordedChart> {
        let mut live = self.charts.values().filter(|c| c.kind == kind);
        match (live.next(), live.next()) {
            (Some(chart), None) => Some(chart),
            _ => None,
        }
    }

    /// Number of live charts of the given kind.
    pub fn live_charts(&self, kind: ChartKind) -> usize {
        self.charts.values().filter(|c| c.kind == kind).count()
    }

    /// Grid cells currently carrying fault emphasis.
    pub fn highlighted(&self) -> Vec<PageId> {
        self.grid.iter().filter(|c| c.fault).map(|c| c.page).collect()
    }
}

impl Canvas for RecordingCanvas {
    fn create_chart(&mut self, spec: &ChartSpec) -> ChartHandle {
        let handle = ChartHandle(self.next_handle);
        self.next_handle += 1;
        self.charts.insert(
            handle,
            RecordedChart {
                kind: spec.kind,
                labels: spec.labels.clone(),
                values: spec.values.clone(),
            },
        );
        self.chart_ops.push(ChartOp::Created(spec.kind, handle));
        handle
    }

    fn destroy_chart(&mut self, handle: ChartHandle) {
        self.charts.remove(&handle);
        self.chart_ops.push(ChartOp::Destroyed(handle));
    }

    fn push_point(&mut self, handle: ChartHandle, label: &str, value: f64) {
        if let Some(chart) = self.charts.get_mut(&handle) {
            chart.labels.push(label.to_string());
            chart.values.push(value);
        }
    }

    fn set_values(&mut self, handle: ChartHandle, values: &[f64]) {
        if let Some(chart) = self.charts.get_mut(&handle) {
            chart.values = values.to_vec();
        }
    }

    fn draw_frames(&mut self, cells: &[FrameCell]) {
        self.frames = cells.to_vec();
    }

    fn build_page_grid(&mut self, cells: &[PageCell]) {
        self.grid = cells.to_vec();
        self.grid_builds += 1;
    }

    fn restyle_page_cells(&mut self, cells: &[PageCell]) {
        for cell in cells {
            if let Some(slot) = self.grid.get_mut(cell.page.index()) {
                *slot = *cell;
            }
        }
    }

    fn draw_stats(&mut self, stats: &StatsLine) {
        self.stats = Some(*stats);
    }

    fn append_log(&mut self, entry: &AccessLogEntry) {
        self.log.push(entry.to_string());
    }

    fn clear_log(&mut self) {
        self.log.clear();
    }

    fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AlgorithmId, Outcome};

    fn spec(kind: ChartKind, n: usize) -> ChartSpec {
        ChartSpec {
            kind,
            title: "test",
            labels: (0..n).map(|i| i.to_string()).collect(),
            values: vec![0.0; n],
            y_max: 1.0,
        }
    }

    #[test]
    fn frame_cell_labels() {
        let empty = FrameCell { slot: 0, page: None };
        let full = FrameCell { slot: 1, page: Some(PageId(12)) };
        assert_eq!(empty.label(), "-");
        assert_eq!(full.label(), "12");
    }

    #[test]
    fn sparkline_scales_to_max() {
        assert_eq!(sparkline(&[0.0, 50.0, 100.0], 100.0), "▁▅█");
        assert_eq!(sparkline(&[5.0], 0.0), "▁");
    }

    #[test]
    fn text_canvas_writes_lines() {
        let mut canvas = TextCanvas::new(Vec::new());
        canvas.draw_frames(&[
            FrameCell { slot: 0, page: Some(PageId(7)) },
            FrameCell { slot: 1, page: None },
        ]);
        canvas.build_page_grid(&[
            PageCell { page: PageId(0), loaded: false, fault: false },
            PageCell { page: PageId(1), loaded: true, fault: false },
        ]);
        canvas.restyle_page_cells(&[PageCell { page: PageId(0), loaded: true, fault: true }]);
        canvas.append_log(&AccessLogEntry {
            page: PageId(0),
            outcome: Outcome::Fault,
            algorithm: AlgorithmId::new("FIFO"),
        });

        let text = String::from_utf8(canvas.into_inner()).unwrap();
        assert!(text.contains("frames  [ 7 | - ]"));
        assert!(text.contains("pages   .#"));
        assert!(text.contains("pages   !#"));
        assert!(text.contains("log     Page 0 -> Page Fault (FIFO)"));
    }

    #[test]
    fn text_canvas_forgets_destroyed_charts() {
        let mut canvas = TextCanvas::new(Vec::new());
        let handle = canvas.create_chart(&spec(ChartKind::FaultRate, 0));
        canvas.destroy_chart(handle);
        canvas.push_point(handle, "1", 100.0);
        assert!(canvas.charts.is_empty());
    }

    #[test]
    fn recording_canvas_tracks_lifecycle() {
        let mut canvas = RecordingCanvas::new();
        let first = canvas.create_chart(&spec(ChartKind::FrameOccupancy, 3));
        canvas.destroy_chart(first);
        let second = canvas.create_chart(&spec(ChartKind::FrameOccupancy, 5));

        assert_ne!(first, second);
        assert_eq!(canvas.live_charts(ChartKind::FrameOccupancy), 1);
        assert_eq!(canvas.chart(ChartKind::FrameOccupancy).unwrap().labels.len(), 5);
        assert_eq!(
            canvas.chart_ops,
            vec![
                ChartOp::Created(ChartKind::FrameOccupancy, first),
                ChartOp::Destroyed(first),
                ChartOp::Created(ChartKind::FrameOccupancy, second),
            ]
        );
    }
}

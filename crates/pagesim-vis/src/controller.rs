//! Input controller: raw control values in, session calls out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::error::{Error, Result, ValidationError};
use crate::events::{AccessLogEntry, AlgorithmId, PageId};
use crate::gateway::Gateway;
use crate::runner::RunReport;
use crate::session::Session;
use crate::state::SimulationConfig;

/// What the input controls currently display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    pub algorithm: String,
    pub frame_count: String,
    pub page_table_size: String,
}

impl From<&SimulationConfig> for Controls {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            algorithm: config.algorithm.to_string(),
            frame_count: config.frame_count.to_string(),
            page_table_size: config.page_table_size.to_string(),
        }
    }
}

/// Parse a strictly positive integer.
pub fn parse_positive(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// Parse a single page number.
pub fn parse_page(raw: &str) -> std::result::Result<PageId, ValidationError> {
    raw.trim()
        .parse::<u32>()
        .map(PageId)
        .map_err(|_| ValidationError::Page {
            input: raw.to_string(),
        })
}

/// Parse a comma separated access sequence, dropping tokens that are not page numbers.
pub fn parse_sequence(raw: &str) -> std::result::Result<Vec<PageId>, ValidationError> {
    let mut pages = Vec::new();
    for token in raw.split(',') {
        match token.trim().parse::<u32>() {
            Ok(page) => pages.push(PageId(page)),
            Err(_) if token.trim().is_empty() => {}
            Err(_) => tracing::warn!(token = token.trim(), "ignoring non-numeric sequence entry"),
        }
    }
    if pages.is_empty() {
        return Err(ValidationError::EmptySequence);
    }
    Ok(pages)
}

/// Maps user actions onto a [`Session`].
pub struct InputController<G: Gateway, C: Canvas> {
    session: Arc<Session<G, C>>,
    controls: Mutex<Controls>,
}

impl<G: Gateway, C: Canvas> InputController<G, C> {
    pub fn new(session: Arc<Session<G, C>>) -> Self {
        let controls = Controls::from(&session.config());
        Self {
            session,
            controls: Mutex::new(controls),
        }
    }

    pub fn session(&self) -> &Arc<Session<G, C>> {
        &self.session
    }

    /// Current control values.
    pub fn controls(&self) -> Controls {
        self.lock().clone()
    }

    /// Frame-count control changed.
    pub async fn frame_count_changed(&self, raw: &str) -> Result<()> {
        self.lock().frame_count = raw.to_string();
        let Some(frame_count) = parse_positive(raw) else {
            return Err(self.reject(ValidationError::FrameCount {
                input: raw.to_string(),
            }));
        };

        let algorithm = self.session.config().algorithm;
        let outcome = self.session.configure(algorithm, frame_count).await;
        self.sync_controls();
        outcome
    }

    /// Algorithm selector changed.
    pub async fn algorithm_changed(&self, raw: &str) -> Result<()> {
        self.lock().algorithm = raw.to_string();
        if raw.trim().is_empty() {
            return Err(self.reject(ValidationError::Algorithm));
        }

        let frame_count = self.session.config().frame_count;
        let outcome = self
            .session
            .configure(AlgorithmId::new(raw), frame_count)
            .await;
        self.sync_controls();
        outcome
    }

    /// Page-table size control changed.
    pub fn page_table_size_changed(&self, raw: &str) -> Result<()> {
        self.lock().page_table_size = raw.to_string();
        let Some(size) = parse_positive(raw) else {
            return Err(self.reject(ValidationError::PageTableSize {
                input: raw.to_string(),
            }));
        };

        self.session.resize_page_table(size);
        self.sync_controls();
        Ok(())
    }

    /// "Access" button with the page input's value.
    pub async fn access_clicked(&self, raw: &str) -> Result<Option<AccessLogEntry>> {
        let page = parse_page(raw).map_err(|e| self.reject(e))?;
        match self.session.access(page).await {
            Err(Error::RunInProgress) => {
                self.session
                    .notify("A sequence run is in progress; wait for it or reset first.");
                Err(Error::RunInProgress)
            }
            other => other,
        }
    }

    /// "Run sequence" button with the sequence input's value.
    pub async fn run_clicked(&self, raw: &str) -> Result<RunReport> {
        let pages = parse_sequence(raw).map_err(|e| self.reject(e))?;
        Ok(self.session.run_sequence(&pages).await)
    }

    /// "Reset" button.
    pub async fn reset_clicked(&self) -> Result<()> {
        self.session.reset().await
    }

    /// Notify, put the controls back to the last good values, and wrap the error.
    fn reject(&self, error: ValidationError) -> Error {
        tracing::debug!(%error, "input rejected");
        self.session.notify(&error.to_string());
        self.sync_controls();
        Error::Validation(error)
    }

    fn sync_controls(&self) {
        let controls = Controls::from(&self.session.config());
        *self.lock() = controls;
    }

    fn lock(&self) -> MutexGuard<'_, Controls> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::canvas::RecordingCanvas;
    use crate::runner::RunOutcome;
    use crate::testing::FakeGateway;

    type TestController = InputController<Arc<FakeGateway>, RecordingCanvas>;

    async fn controller(gateway: &Arc<FakeGateway>) -> TestController {
        let session = Session::new(
            Arc::clone(gateway),
            RecordingCanvas::new(),
            SimulationConfig::default(),
            Duration::from_millis(500),
        );
        session.start().await.unwrap();
        InputController::new(Arc::new(session))
    }

    #[test]
    fn positive_parsing() {
        assert_eq!(parse_positive(" 4 "), Some(4));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("-3"), None);
        assert_eq!(parse_positive("four"), None);
        assert_eq!(parse_positive(""), None);
    }

    #[test]
    fn page_parsing() {
        assert_eq!(parse_page("7"), Ok(PageId(7)));
        assert!(matches!(parse_page("x"), Err(ValidationError::Page { .. })));
        assert!(matches!(parse_page("-1"), Err(ValidationError::Page { .. })));
    }

    #[test]
    fn sequence_parsing_drops_junk() {
        let pages = parse_sequence("1, 2,x, 3 ,,1").unwrap();
        assert_eq!(pages, vec![PageId(1), PageId(2), PageId(3), PageId(1)]);
        assert_eq!(parse_sequence("a, b"), Err(ValidationError::EmptySequence));
        assert_eq!(parse_sequence(""), Err(ValidationError::EmptySequence));
    }

    #[tokio::test]
    async fn bad_frame_count_reverts_control_without_network() {
        let gateway = Arc::new(FakeGateway::new());
        let controller = controller(&gateway).await;
        let calls = gateway.configure_calls();

        let err = controller.frame_count_changed("abc").await.unwrap_err();

        assert!(matches!(err, Error::Validation(ValidationError::FrameCount { .. })));
        assert_eq!(gateway.configure_calls(), calls);
        assert_eq!(controller.controls().frame_count, "4");
        controller.session().with_canvas(|c| assert_eq!(c.notifications.len(), 1));
    }

    #[tokio::test]
    async fn frame_count_change_reconfigures() {
        let gateway = Arc::new(FakeGateway::new());
        let controller = controller(&gateway).await;

        controller.frame_count_changed(" 6").await.unwrap();

        assert_eq!(controller.controls().frame_count, "6");
        assert_eq!(controller.session().snapshot().frames, vec![None; 6]);
    }

    #[tokio::test]
    async fn failed_reconfigure_reverts_control() {
        let gateway = Arc::new(FakeGateway::new());
        let controller = controller(&gateway).await;
        *gateway.fail_configure.lock().unwrap() = true;

        let err = controller.algorithm_changed("BOGUS").await.unwrap_err();

        assert!(matches!(err, Error::Gateway(_)));
        assert_eq!(controller.controls().algorithm, "FIFO");
    }

    #[tokio::test]
    async fn bad_page_never_reaches_gateway() {
        let gateway = Arc::new(FakeGateway::new());
        let controller = controller(&gateway).await;

        let err = controller.access_clicked("seven").await.unwrap_err();

        assert!(matches!(err, Error::Validation(ValidationError::Page { .. })));
        assert_eq!(gateway.access_calls(), 0);
        assert_eq!(controller.session().snapshot().counters.total_accesses, 0);
    }

    #[tokio::test]
    async fn page_table_size_change_is_local() {
        let gateway = Arc::new(FakeGateway::new());
        let controller = controller(&gateway).await;
        let calls = gateway.configure_calls();

        controller.page_table_size_changed("32").unwrap();
        assert_eq!(controller.session().config().page_table_size, 32);
        assert_eq!(gateway.configure_calls(), calls);

        controller.page_table_size_changed("0").unwrap_err();
        assert_eq!(controller.controls().page_table_size, "32");
    }

    #[tokio::test(start_paused = true)]
    async fn run_button_replays_sequence() {
        let gateway = Arc::new(FakeGateway::new());
        let controller = controller(&gateway).await;

        let report = controller.run_clicked("1,2,1").await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.applied_steps, 3);
        controller.session().with_canvas(|c| {
            assert_eq!(c.log.last().map(String::as_str), Some("Page 1 -> Hit (FIFO)"));
        });
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let gateway = Arc::new(FakeGateway::new());
        let controller = controller(&gateway).await;
        controller.access_clicked("3").await.unwrap();

        controller.reset_clicked().await.unwrap();

        let snap = controller.session().snapshot();
        assert_eq!(snap.counters.total_accesses, 0);
        assert!(snap.log.is_empty());
        assert_eq!(snap.last_page, None);
    }
}

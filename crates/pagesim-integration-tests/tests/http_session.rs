//! End-to-end tests: client session against the in-process service over HTTP.

use std::sync::Arc;
use std::time::Duration;

use pagesim_integration_tests::MockService;
use pagesim_vis::{
    AlgorithmId, Error, Gateway, HttpGateway, InputController, PageId, RecordingCanvas,
    RunOutcome, Session, SimulationConfig,
};

type HttpSession = Session<HttpGateway, RecordingCanvas>;

async fn session(service: &MockService, frames: usize, pacing: Duration) -> HttpSession {
    pagesim_logging::init(pagesim_logging::DEFAULT_DIRECTIVES);
    let session = Session::new(
        HttpGateway::new(&service.url()).unwrap(),
        RecordingCanvas::new(),
        SimulationConfig {
            algorithm: AlgorithmId::new("FIFO"),
            frame_count: frames,
            page_table_size: 16,
        },
        pacing,
    );
    session.start().await.unwrap();
    session
}

#[tokio::test]
async fn first_access_faults() {
    let service = MockService::spawn().await.unwrap();
    let session = session(&service, 3, Duration::ZERO).await;

    let entry = session.access(PageId(7)).await.unwrap().unwrap();
    assert_eq!(entry.to_string(), "Page 7 -> Page Fault (FIFO)");

    let snap = session.snapshot();
    assert_eq!(snap.frames, vec![Some(PageId(7)), None, None]);
    assert_eq!(snap.counters.total_accesses, 1);
    assert_eq!(snap.counters.page_faults, 1);
    assert_eq!(snap.series.len(), 1);
    assert_eq!(snap.series[0].rate, 100.0);
    assert!(snap.page_table[7]);
    assert_eq!(session.highlighted_page(), Some(PageId(7)));
}

#[tokio::test]
async fn sequence_produces_fifo_log() {
    let service = MockService::spawn().await.unwrap();
    let session = session(&service, 2, Duration::from_millis(5)).await;

    let pages = [1, 2, 3, 1].map(PageId);
    let report = session.run_sequence(&pages).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.applied_steps, 4);
    let snap = session.snapshot();
    assert_eq!(
        snap.log,
        vec![
            "Page 1 -> Page Fault (FIFO)",
            "Page 2 -> Page Fault (FIFO)",
            "Page 3 -> Page Fault (FIFO)",
            "Page 1 -> Page Fault (FIFO)",
        ]
    );
    assert_eq!(snap.frames, vec![Some(PageId(3)), Some(PageId(1))]);
    assert_eq!(snap.counters.page_faults, 4);
    assert_eq!(service.metrics().total_accesses, 4);
}

#[tokio::test]
async fn reconfigure_cancels_running_sequence() {
    let service = MockService::spawn().await.unwrap();
    let session = Arc::new(session(&service, 3, Duration::from_millis(50)).await);

    let runner = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            let pages = [1, 2, 3, 4, 5].map(PageId);
            session.run_sequence(&pages).await
        })
    };

    while session.snapshot().counters.total_accesses < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    session.configure(AlgorithmId::new("LIFO"), 2).await.unwrap();

    let report = runner.await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(service.access_calls() < 5);

    let snap = session.snapshot();
    assert_eq!(snap.config.algorithm.as_str(), "LIFO");
    assert_eq!(snap.frames, vec![None, None]);
    assert_eq!(snap.counters.total_accesses, 0);
    assert!(snap.log.is_empty());
}

#[tokio::test]
async fn service_error_field_surfaces() {
    let service = MockService::spawn().await.unwrap();
    let session = session(&service, 3, Duration::ZERO).await;

    let err = session.access(PageId(99)).await.unwrap_err();
    match err {
        Error::Gateway(e) => assert_eq!(e.message, "Page 99 out of range"),
        other => panic!("unexpected error: {:?}", other),
    }
    session.with_canvas(|c| {
        assert_eq!(
            c.notifications.last().map(String::as_str),
            Some("Error accessing page: Page 99 out of range")
        );
    });
}

#[tokio::test]
async fn unknown_algorithm_keeps_config() {
    let service = MockService::spawn().await.unwrap();
    let session = Arc::new(session(&service, 3, Duration::ZERO).await);
    let controller = InputController::new(Arc::clone(&session));

    let err = controller.algorithm_changed("LRU").await.unwrap_err();

    assert!(matches!(err, Error::Gateway(_)));
    assert_eq!(session.config().algorithm.as_str(), "FIFO");
    assert_eq!(controller.controls().algorithm, "FIFO");
}

#[tokio::test]
async fn non_json_failure_is_gateway_error() {
    let service = MockService::spawn().await.unwrap();
    let gateway = HttpGateway::new(&service.url()).unwrap();
    service.set_broken(true);

    let err = gateway.access(PageId(1)).await.unwrap_err();
    assert_eq!(err.message, "HTTP 500 Internal Server Error");
}

#[tokio::test]
async fn unreachable_service_is_gateway_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = HttpGateway::new(&format!("http://{}", addr)).unwrap();
    let err = gateway
        .configure(&AlgorithmId::new("FIFO"), 3)
        .await
        .unwrap_err();
    assert!(err.message.starts_with("Network error"), "{}", err.message);
}

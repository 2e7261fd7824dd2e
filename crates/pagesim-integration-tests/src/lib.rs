//! In-process page-replacement simulation service.
//!
//! Speaks the same two endpoints as the real service so the client can be
//! exercised end to end over HTTP:
//!
//! - `POST /set_algorithm` resets the simulation with a new algorithm and frame count
//! - `POST /access` accesses one page and returns the full metrics state
//!
//! Errors are reported as `{"error": "..."}` with status 400.

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Pages the service tracks in its page table.
pub const PAGE_TABLE_SIZE: u32 = 16;

/// Frame count before the first `/set_algorithm`.
pub const DEFAULT_FRAME_COUNT: usize = 4;

/// Replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Evict the page loaded first
    Fifo,
    /// Evict the page loaded last
    Lifo,
}

impl Policy {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "FIFO" => Some(Self::Fifo),
            "LIFO" => Some(Self::Lifo),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fifo => "FIFO",
            Self::Lifo => "LIFO",
        }
    }
}

/// Metrics returned by both endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub algorithm: &'static str,
    pub page_table: BTreeMap<u32, u8>,
    pub frames: Vec<Option<u32>>,
    pub frame_occupancy: Vec<u8>,
    pub last_fault: bool,
    pub total_accesses: u64,
    pub total_faults: u64,
    pub fault_rate: f64,
}

/// Memory model behind the service.
#[derive(Debug)]
pub struct MemoryModel {
    policy: Policy,
    frames: Vec<Option<u32>>,
    load_order: VecDeque<u32>,
    last_fault: bool,
    total_accesses: u64,
    total_faults: u64,
}

impl MemoryModel {
    pub fn new(policy: Policy, frame_count: usize) -> Self {
        Self {
            policy,
            frames: vec![None; frame_count],
            load_order: VecDeque::new(),
            last_fault: false,
            total_accesses: 0,
            total_faults: 0,
        }
    }

    /// Access a page, loading it on a fault.
    pub fn access(&mut self, page: u32) {
        self.total_accesses += 1;
        self.last_fault = !self.frames.contains(&Some(page));
        if !self.last_fault {
            return;
        }
        self.total_faults += 1;

        let slot = match self.frames.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                let victim = match self.policy {
                    Policy::Fifo => self.load_order.pop_front(),
                    Policy::Lifo => self.load_order.pop_back(),
                };
                match victim.and_then(|v| self.frames.iter().position(|f| *f == Some(v))) {
                    Some(slot) => slot,
                    // zero frames: nothing can be loaded
                    None => return,
                }
            }
        };
        self.frames[slot] = Some(page);
        self.load_order.push_back(page);
    }

    pub fn metrics(&self) -> Metrics {
        let fault_rate = if self.total_accesses == 0 {
            0.0
        } else {
            let rate = self.total_faults as f64 / self.total_accesses as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        };

        Metrics {
            algorithm: self.policy.name(),
            page_table: (0..PAGE_TABLE_SIZE)
                .map(|p| (p, u8::from(self.frames.contains(&Some(p)))))
                .collect(),
            frames: self.frames.clone(),
            frame_occupancy: self.frames.iter().map(|f| u8::from(f.is_some())).collect(),
            last_fault: self.last_fault,
            total_accesses: self.total_accesses,
            total_faults: self.total_faults,
            fault_rate,
        }
    }
}

#[derive(Debug)]
struct ServiceState {
    model: MemoryModel,
    broken: bool,
    configure_calls: usize,
    access_calls: usize,
}

/// Handle to a running service.
#[derive(Clone)]
pub struct MockService {
    addr: SocketAddr,
    state: Arc<Mutex<ServiceState>>,
}

impl MockService {
    /// Serve on an ephemeral localhost port.
    pub async fn spawn() -> std::io::Result<Self> {
        let state = Arc::new(Mutex::new(ServiceState {
            model: MemoryModel::new(Policy::Fifo, DEFAULT_FRAME_COUNT),
            broken: false,
            configure_calls: 0,
            access_calls: 0,
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = build_router(Arc::clone(&state));

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("mock service stopped: {}", e);
            }
        });

        tracing::debug!(%addr, "mock simulation service listening");
        Ok(Self { addr, state })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer every request with a bare 500 and a non-JSON body.
    pub fn set_broken(&self, broken: bool) {
        self.lock().broken = broken;
    }

    pub fn configure_calls(&self) -> usize {
        self.lock().configure_calls
    }

    pub fn access_calls(&self) -> usize {
        self.lock().access_calls
    }

    pub fn metrics(&self) -> Metrics {
        self.lock().model.metrics()
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type AppState = Arc<Mutex<ServiceState>>;

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/set_algorithm", post(set_algorithm))
        .route("/access", post(access))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SetAlgorithmRequest {
    #[serde(default)]
    algorithm: String,
    frame_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct AccessRequest {
    page: i64,
}

fn error_reply(message: String) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn broken_reply() -> axum::response::Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
}

async fn set_algorithm(
    State(state): State<AppState>,
    Json(req): Json<SetAlgorithmRequest>,
) -> axum::response::Response {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    state.configure_calls += 1;
    if state.broken {
        return broken_reply();
    }

    let Some(policy) = Policy::parse(&req.algorithm) else {
        return error_reply(format!("Unknown algorithm: {}", req.algorithm));
    };
    let frame_count = req.frame_count.unwrap_or(state.model.frames.len());
    state.model = MemoryModel::new(policy, frame_count);

    let metrics = state.model.metrics();
    Json(json!({
        "status": "ok",
        "message": format!("Algorithm switched to {}.", policy.name()),
        "algorithm": policy.name(),
        "metrics": metrics,
    }))
    .into_response()
}

async fn access(
    State(state): State<AppState>,
    Json(req): Json<AccessRequest>,
) -> axum::response::Response {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    state.access_calls += 1;
    if state.broken {
        return broken_reply();
    }

    let page = match u32::try_from(req.page) {
        Ok(page) if page < PAGE_TABLE_SIZE => page,
        _ => return error_reply(format!("Page {} out of range", req.page)),
    };
    state.model.access(page);
    Json(state.model.metrics()).into_response()
}

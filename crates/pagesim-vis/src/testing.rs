//! In-memory gateway double for unit tests.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::events::{AccessResult, AlgorithmId, ConfigureResult, PageId};
use crate::gateway::Gateway;

/// Answers like a FIFO service with a 16-page table.
#[derive(Default)]
pub(crate) struct FakeGateway {
    inner: Mutex<FakeState>,
    pub configure_calls: AtomicUsize,
    pub access_calls: AtomicUsize,
    pub fail_pages: Mutex<Vec<PageId>>,
    pub fail_configure: Mutex<bool>,
    access_delay: Duration,
}

#[derive(Default)]
struct FakeState {
    frame_count: usize,
    resident: VecDeque<PageId>,
    frames: Vec<Option<PageId>>,
    accesses: u64,
    faults: u64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(pages: &[u32]) -> Self {
        let gateway = Self::default();
        *gateway.fail_pages.lock().unwrap() = pages.iter().copied().map(PageId).collect();
        gateway
    }

    /// Answer every access only after `delay`.
    pub fn with_access_delay(delay: Duration) -> Self {
        Self {
            access_delay: delay,
            ..Self::default()
        }
    }

    pub fn access_calls(&self) -> usize {
        self.access_calls.load(Ordering::SeqCst)
    }

    pub fn configure_calls(&self) -> usize {
        self.configure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn configure(
        &self,
        algorithm: &AlgorithmId,
        frame_count: usize,
    ) -> Result<ConfigureResult, GatewayError> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_configure.lock().unwrap() {
            return Err(GatewayError::new("Unknown algorithm"));
        }

        let mut state = self.inner.lock().unwrap();
        *state = FakeState {
            frame_count,
            frames: vec![None; frame_count],
            ..Default::default()
        };
        Ok(ConfigureResult {
            algorithm: AlgorithmId::new(algorithm.as_str().to_uppercase()),
            frames: state.frames.clone(),
        })
    }

    async fn access(&self, page: PageId) -> Result<AccessResult, GatewayError> {
        self.access_calls.fetch_add(1, Ordering::SeqCst);
        if !self.access_delay.is_zero() {
            tokio::time::sleep(self.access_delay).await;
        }
        if self.fail_pages.lock().unwrap().contains(&page) {
            return Err(GatewayError::new(format!("Page {} out of range", page)));
        }

        let mut state = self.inner.lock().unwrap();
        state.accesses += 1;
        let fault = !state.resident.contains(&page);
        if fault {
            state.faults += 1;
            let slot = if state.resident.len() < state.frame_count {
                state.frames.iter().position(Option::is_none)
            } else {
                let evicted = state.resident.pop_front();
                state.frames.iter().position(|f| *f == evicted)
            };
            if let Some(slot) = slot {
                state.frames[slot] = Some(page);
                state.resident.push_back(page);
            }
        }

        let page_table: BTreeMap<_, _> = (0..16)
            .map(|i| (PageId(i), state.resident.contains(&PageId(i))))
            .collect();
        let rate = state.faults as f64 / state.accesses as f64 * 100.0;

        Ok(AccessResult {
            frames: state.frames.clone(),
            page_fault_occurred: fault,
            total_faults: state.faults,
            fault_rate: (rate * 100.0).round() / 100.0,
            frame_occupancy: state.frames.iter().map(Option::is_some).collect(),
            page_table,
        })
    }
}

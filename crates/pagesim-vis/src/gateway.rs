//! Remote simulation gateway.
//!
//! The replacement algorithm lives behind two JSON endpoints:
//!
//! - `POST /set_algorithm` `{ algorithm, frame_count }`
//! - `POST /access` `{ page }`
//!
//! Replies are normalized into [`ConfigureResult`] / [`AccessResult`]. Every
//! call is attempted exactly once.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::events::{AccessResult, AlgorithmId, ConfigureResult, PageId};

/// The two operations the simulation service offers.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Select an algorithm and frame count, resetting the remote simulation.
    async fn configure(
        &self,
        algorithm: &AlgorithmId,
        frame_count: usize,
    ) -> Result<ConfigureResult, GatewayError>;

    /// Access one page.
    async fn access(&self, page: PageId) -> Result<AccessResult, GatewayError>;
}

#[async_trait]
impl<T: Gateway + ?Sized> Gateway for Arc<T> {
    async fn configure(
        &self,
        algorithm: &AlgorithmId,
        frame_count: usize,
    ) -> Result<ConfigureResult, GatewayError> {
        (**self).configure(algorithm, frame_count).await
    }

    async fn access(&self, page: PageId) -> Result<AccessResult, GatewayError> {
        (**self).access(page).await
    }
}

#[derive(Debug, Serialize)]
struct SetAlgorithmRequest<'a> {
    algorithm: &'a str,
    frame_count: usize,
}

#[derive(Debug, Deserialize)]
struct SetAlgorithmResponse {
    #[serde(default)]
    algorithm: Option<String>,
    #[serde(default)]
    metrics: Option<Metrics>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Metrics {
    #[serde(default)]
    frames: Vec<Option<u32>>,
}

#[derive(Debug, Serialize)]
struct AccessRequest {
    page: u32,
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    #[serde(default)]
    frames: Option<Vec<Option<u32>>>,
    #[serde(default)]
    last_fault: Option<bool>,
    #[serde(default)]
    total_faults: Option<u64>,
    #[serde(default)]
    fault_rate: Option<f64>,
    #[serde(default)]
    frame_occupancy: Vec<u8>,
    #[serde(default)]
    page_table: BTreeMap<u32, u8>,
    #[serde(default)]
    error: Option<String>,
}

/// Reply bodies that may carry an application-level `error` field.
trait ServiceReply: DeserializeOwned {
    fn error(&self) -> Option<&str>;
}

impl ServiceReply for SetAlgorithmResponse {
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl ServiceReply for AccessResponse {
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl SetAlgorithmResponse {
    fn normalize(self, requested: &AlgorithmId) -> ConfigureResult {
        ConfigureResult {
            algorithm: self
                .algorithm
                .map(AlgorithmId::new)
                .unwrap_or_else(|| requested.clone()),
            frames: self
                .metrics
                .map(|m| m.frames.into_iter().map(|f| f.map(PageId)).collect())
                .unwrap_or_default(),
        }
    }
}

impl AccessResponse {
    fn normalize(self) -> Result<AccessResult, GatewayError> {
        let missing = |field: &str| GatewayError::new(format!("access reply is missing `{}`", field));
        Ok(AccessResult {
            frames: self
                .frames
                .ok_or_else(|| missing("frames"))?
                .into_iter()
                .map(|f| f.map(PageId))
                .collect(),
            page_fault_occurred: self.last_fault.ok_or_else(|| missing("last_fault"))?,
            total_faults: self.total_faults.ok_or_else(|| missing("total_faults"))?,
            fault_rate: self.fault_rate.ok_or_else(|| missing("fault_rate"))?,
            frame_occupancy: self.frame_occupancy.into_iter().map(|bit| bit != 0).collect(),
            page_table: self
                .page_table
                .into_iter()
                .map(|(page, bit)| (PageId(page), bit != 0))
                .collect(),
        })
    }
}

/// [`Gateway`] over HTTP.
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway for the service rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GatewayError::new(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, GatewayError>
    where
        Req: Serialize + Sync,
        Resp: ServiceReply + Send,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::new(format!("Network error: {}", e)))?;

        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<Resp>(&text) {
            Ok(reply) => {
                if let Some(message) = reply.error().filter(|m| !m.is_empty()) {
                    return Err(GatewayError::new(message));
                }
                if !status.is_success() {
                    return Err(GatewayError::new(format!("HTTP {}", status)));
                }
                Ok(reply)
            }
            Err(_) if !status.is_success() => Err(GatewayError::new(format!("HTTP {}", status))),
            Err(e) => Err(GatewayError::new(format!("Invalid response: {}", e))),
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn configure(
        &self,
        algorithm: &AlgorithmId,
        frame_count: usize,
    ) -> Result<ConfigureResult, GatewayError> {
        let request = SetAlgorithmRequest {
            algorithm: algorithm.as_str(),
            frame_count,
        };
        let reply: SetAlgorithmResponse = self.post("/set_algorithm", &request).await?;
        Ok(reply.normalize(algorithm))
    }

    async fn access(&self, page: PageId) -> Result<AccessResult, GatewayError> {
        let reply: AccessResponse = self.post("/access", &AccessRequest { page: page.0 }).await?;
        reply.normalize()
    }
}

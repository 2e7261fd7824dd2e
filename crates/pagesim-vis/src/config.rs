//! Client configuration from the environment.

use std::time::Duration;

use crate::controller::parse_positive;
use crate::error::{Error, Result};
use crate::events::AlgorithmId;
use crate::runner::DEFAULT_PACING;
use crate::state::SimulationConfig;

pub const ENV_SERVER_URL: &str = "PAGESIM_SERVER_URL";
pub const ENV_ALGORITHM: &str = "PAGESIM_ALGORITHM";
pub const ENV_FRAME_COUNT: &str = "PAGESIM_FRAME_COUNT";
pub const ENV_PAGE_TABLE_SIZE: &str = "PAGESIM_PAGE_TABLE_SIZE";
pub const ENV_PACING_MS: &str = "PAGESIM_PACING_MS";

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Configuration for a client session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the simulation service
    pub server_url: String,
    /// Initial simulation settings
    pub simulation: SimulationConfig,
    /// Delay before each step of a sequence run
    pub pacing: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            simulation: SimulationConfig::default(),
            pacing: DEFAULT_PACING,
        }
    }
}

impl ClientConfig {
    /// Read configuration from `PAGESIM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let server_url = lookup(ENV_SERVER_URL).unwrap_or(defaults.server_url);

        let algorithm = match lookup(ENV_ALGORITHM) {
            Some(name) if name.trim().is_empty() => {
                return Err(Error::Config(format!("{} must not be empty", ENV_ALGORITHM)))
            }
            Some(name) => AlgorithmId::new(name),
            None => defaults.simulation.algorithm,
        };

        let frame_count = positive(&lookup, ENV_FRAME_COUNT)?
            .unwrap_or(defaults.simulation.frame_count);
        let page_table_size = positive(&lookup, ENV_PAGE_TABLE_SIZE)?
            .unwrap_or(defaults.simulation.page_table_size);

        let pacing = match lookup(ENV_PACING_MS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| Error::Config(format!("Invalid {}: {:?}", ENV_PACING_MS, raw)))?,
            None => defaults.pacing,
        };

        Ok(Self {
            server_url,
            simulation: SimulationConfig {
                algorithm,
                frame_count,
                page_table_size,
            },
            pacing,
        })
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>> {
    match lookup(key) {
        Some(raw) => parse_positive(&raw)
            .map(Some)
            .ok_or_else(|| Error::Config(format!("Invalid {}: {:?}", key, raw))),
        None => Ok(None),
    }
}

//! Domain vocabulary shared by the state, gateway and view layers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A virtual page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u32);

impl PageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a replacement algorithm understood by the service (`FIFO`, `LIFO`, ...).
///
/// The client does not know the set of valid names; it only forwards them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmId(String);

impl AlgorithmId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AlgorithmId {
    fn default() -> Self {
        Self::new("FIFO")
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an access hit a resident page or faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Hit,
    Fault,
}

impl Outcome {
    pub fn from_fault(fault: bool) -> Self {
        if fault {
            Outcome::Fault
        } else {
            Outcome::Hit
        }
    }

    pub fn is_fault(self) -> bool {
        matches!(self, Outcome::Fault)
    }
}

/// One line of the access log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub page: PageId,
    pub outcome: Outcome,
    pub algorithm: AlgorithmId,
}

impl fmt::Display for AccessLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            Outcome::Fault => "Page Fault",
            Outcome::Hit => "Hit",
        };
        write!(f, "Page {} -> {} ({})", self.page, outcome, self.algorithm)
    }
}

/// A point on the fault-rate trend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultRatePoint {
    /// 1-based position of the access since the last reset
    pub index: usize,
    /// Cumulative fault rate in percent, as reported by the service
    pub rate: f64,
}

/// Normalized reply to a configure call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureResult {
    /// Algorithm name the service accepted
    pub algorithm: AlgorithmId,
    /// Freshly reset frames
    pub frames: Vec<Option<PageId>>,
}

/// Normalized reply to an access call.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessResult {
    pub frames: Vec<Option<PageId>>,
    pub page_fault_occurred: bool,
    pub total_faults: u64,
    pub fault_rate: f64,
    pub frame_occupancy: Vec<bool>,
    pub page_table: BTreeMap<PageId, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_display() {
        let fault = AccessLogEntry {
            page: PageId(7),
            outcome: Outcome::Fault,
            algorithm: AlgorithmId::new("FIFO"),
        };
        assert_eq!(fault.to_string(), "Page 7 -> Page Fault (FIFO)");

        let hit = AccessLogEntry {
            outcome: Outcome::Hit,
            ..fault
        };
        assert_eq!(hit.to_string(), "Page 7 -> Hit (FIFO)");
    }

    #[test]
    fn algorithm_name_is_trimmed() {
        assert_eq!(AlgorithmId::new("  LIFO ").as_str(), "LIFO");
    }

    #[test]
    fn page_id_serializes_as_number() {
        let json = serde_json::to_string(&PageId(42)).unwrap();
        assert_eq!(json, "42");

        let parsed: PageId = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, PageId(3));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion quality counters for a single reporting interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetric {
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
    pub accepted: u64,
    pub duplicate: u64,
    pub rejected: u64,
    pub late_dropped: u64,
}

impl QualityMetric {
    /// Number of frames that went through validation during the interval.
    pub fn total(&self) -> u64 {
        self.accepted + self.rejected
    }

    pub fn valid_percentage(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.accepted as f64 / total as f64 * 100.0,
        }
    }
}

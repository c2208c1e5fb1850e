use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Distance, Mmsi, Speed};

/// Aggregated metadata maintained as a side effect of persisting reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vessel {
    pub mmsi: Mmsi,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub report_count: u64,
}

impl Vessel {
    /// Folds a set of newly persisted report timestamps into the vessel, keeping
    /// `first_seen` as the minimum and `last_seen` as the maximum ever observed.
    pub fn absorb(&mut self, first_seen: DateTime<Utc>, last_seen: DateTime<Utc>, count: u64) {
        self.first_seen = self.first_seen.min(first_seen);
        self.last_seen = self.last_seen.max(last_seen);
        self.report_count += count;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselStatistics {
    pub mmsi: Mmsi,
    pub report_count: usize,
    pub distance: Distance,
    pub first_report: Option<DateTime<Utc>>,
    pub last_report: Option<DateTime<Utc>>,
    /// Mean of the reported speed over ground, ignoring reports without one.
    pub mean_reported_speed: Option<Speed>,
    pub max_reported_speed: Option<Speed>,
}

impl VesselStatistics {
    pub fn duration(&self) -> Duration {
        match (self.first_report, self.last_report) {
            (Some(first), Some(last)) => last - first,
            _ => Duration::zero(),
        }
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::*;

/// Result of persisting a batch of reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Reports that did not exist in the store before.
    pub inserted: u64,
    /// Reports whose `(mmsi, timestamp)` was already stored and were left untouched.
    pub ignored: u64,
}

/// Write side of the position store.
///
/// `add_positions` is idempotent on `(mmsi, timestamp)` and applies a batch atomically, either
/// every report is stored (or ignored as already present) or none of them are.
#[async_trait]
pub trait PositionInbound: Send + Sync + 'static {
    async fn add_positions(&self, reports: &[PositionReport]) -> CoreResult<InsertOutcome>;
    async fn add_quality_metric(&self, metric: &QualityMetric) -> CoreResult<()>;
}

/// Read side of the position store.
#[async_trait]
pub trait PositionOutbound: Send + Sync + 'static {
    async fn position(
        &self,
        mmsi: Mmsi,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<PositionReport>>;
    /// Reports of `mmsi` within `range`, in ascending timestamp order.
    async fn positions(&self, mmsi: Mmsi, range: &DateRange) -> CoreResult<Vec<PositionReport>>;
    async fn vessel(&self, mmsi: Mmsi) -> CoreResult<Option<Vessel>>;
    async fn vessels(&self) -> CoreResult<Vec<Vessel>>;
    async fn vessels_in_region(
        &self,
        bbox: &BoundingBox,
        range: &DateRange,
    ) -> CoreResult<Vec<Mmsi>>;
    /// The most recent report of each vessel, most recently seen vessels first.
    async fn latest_positions(&self, limit: usize) -> CoreResult<Vec<PositionReport>>;
    async fn quality_metrics(&self, range: &DateRange) -> CoreResult<Vec<QualityMetric>>;
}

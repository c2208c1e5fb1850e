use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use snafu::ResultExt;
use tracing::instrument;

use crate::{
    query_error::{InvalidRangeSnafu, NotFoundSnafu, StoreUnavailableSnafu},
    *,
};

pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Trajectory and movement analytics served from the store.
///
/// Queries are read only and never retried, a failing store surfaces as
/// [`QueryError::StoreUnavailable`] on the first attempt.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn PositionOutbound>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn PositionOutbound>) -> Self {
        Self { store }
    }

    /// Reports of `mmsi` with `timestamp` in `[start, end]`, ascending.
    ///
    /// An empty range yields an empty track, only a vessel without any reports at all is
    /// `NotFound`.
    #[instrument(skip(self))]
    pub async fn get_track(
        &self,
        mmsi: Mmsi,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<Vec<PositionReport>> {
        let range = inclusive_range(start, end)?;
        self.track(mmsi, &range).await
    }

    /// Sum of the great-circle distances between consecutive reports of the track.
    #[instrument(skip(self))]
    pub async fn get_distance(
        &self,
        mmsi: Mmsi,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<Distance> {
        let range = inclusive_range(start, end)?;
        let track = self.track(mmsi, &range).await?;
        Ok(track_distance(&track))
    }

    /// Distance covered divided by the length of the queried interval, not by the time
    /// between the first and last report.
    #[instrument(skip(self))]
    pub async fn get_average_speed(
        &self,
        mmsi: Mmsi,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<Speed> {
        if end <= start {
            return InvalidRangeSnafu { start, end }.fail();
        }
        let distance = self.get_distance(mmsi, start, end).await?;
        Speed::from_distance_over(distance, end - start)
            .ok_or_else(|| InvalidRangeSnafu { start, end }.build())
    }

    #[instrument(skip(self))]
    pub async fn get_vessels_in_region(
        &self,
        bbox: BoundingBox,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<BTreeSet<Mmsi>> {
        let range = inclusive_range(start, end)?;
        let mmsis = self
            .store
            .vessels_in_region(&bbox, &range)
            .await
            .context(StoreUnavailableSnafu)?;
        Ok(mmsis.into_iter().collect())
    }

    /// Every known vessel, most recently seen first.
    #[instrument(skip(self))]
    pub async fn vessels(&self) -> QueryResult<Vec<Vessel>> {
        let mut vessels = self.store.vessels().await.context(StoreUnavailableSnafu)?;
        vessels.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.mmsi.cmp(&b.mmsi)));
        Ok(vessels)
    }

    #[instrument(skip(self))]
    pub async fn get_vessel_statistics(
        &self,
        mmsi: Mmsi,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<VesselStatistics> {
        let range = inclusive_range(start, end)?;
        let track = self.track(mmsi, &range).await?;

        let speeds = track
            .iter()
            .filter_map(|r| r.speed_over_ground)
            .collect::<Vec<_>>();
        let mean_reported_speed = match speeds.len() {
            0 => None,
            n => Some(Speed::from_knots(speeds.iter().sum::<f64>() / n as f64)),
        };
        let max_reported_speed = speeds
            .iter()
            .copied()
            .max_by(f64::total_cmp)
            .map(Speed::from_knots);

        Ok(VesselStatistics {
            mmsi,
            report_count: track.len(),
            distance: track_distance(&track),
            first_report: track.first().map(|r| r.timestamp),
            last_report: track.last().map(|r| r.timestamp),
            mean_reported_speed,
            max_reported_speed,
        })
    }

    /// The newest report of each vessel, newest first.
    #[instrument(skip(self))]
    pub async fn get_latest_positions(&self, limit: usize) -> QueryResult<Vec<PositionReport>> {
        let positions = self
            .store
            .latest_positions(limit)
            .await
            .context(StoreUnavailableSnafu)?;
        Ok(positions
            .into_iter()
            .sorted_by(|a, b| b.timestamp.cmp(&a.timestamp))
            .take(limit)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_quality_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> QueryResult<Vec<QualityMetric>> {
        let range = inclusive_range(start, end)?;
        self.store
            .quality_metrics(&range)
            .await
            .context(StoreUnavailableSnafu)
    }

    async fn track(&self, mmsi: Mmsi, range: &DateRange) -> QueryResult<Vec<PositionReport>> {
        let track = self
            .store
            .positions(mmsi, range)
            .await
            .context(StoreUnavailableSnafu)?;

        if track.is_empty() {
            let vessel = self.store.vessel(mmsi).await.context(StoreUnavailableSnafu)?;
            if vessel.is_none() {
                return NotFoundSnafu { mmsi }.fail();
            }
        }

        Ok(track)
    }
}

fn inclusive_range(start: DateTime<Utc>, end: DateTime<Utc>) -> QueryResult<DateRange> {
    DateRange::new(start, end).map_err(|_| InvalidRangeSnafu { start, end }.build())
}

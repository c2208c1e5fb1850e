use ais_core::Mmsi;
use chrono::{DateTime, Utc};
use snafu::ResultExt;

use crate::error::{Error, error::DataConversionSnafu};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PositionReport {
    pub mmsi: i32,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_over_ground: Option<f64>,
    pub course: Option<f64>,
    pub heading: Option<i32>,
    pub source_payload: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Vessel {
    pub mmsi: i32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub report_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QualityMetric {
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
    pub accepted: i64,
    pub duplicate: i64,
    pub rejected: i64,
    pub late_dropped: i64,
}

impl TryFrom<PositionReport> for ais_core::PositionReport {
    type Error = Error;

    fn try_from(value: PositionReport) -> Result<Self, Self::Error> {
        Ok(ais_core::PositionReport {
            mmsi: Mmsi::try_from(value.mmsi).context(DataConversionSnafu)?,
            timestamp: value.timestamp,
            latitude: value.latitude,
            longitude: value.longitude,
            speed_over_ground: value.speed_over_ground,
            course: value.course,
            heading: value.heading,
            source_payload: value.source_payload,
        })
    }
}

impl TryFrom<Vessel> for ais_core::Vessel {
    type Error = Error;

    fn try_from(value: Vessel) -> Result<Self, Self::Error> {
        Ok(ais_core::Vessel {
            mmsi: Mmsi::try_from(value.mmsi).context(DataConversionSnafu)?,
            first_seen: value.first_seen,
            last_seen: value.last_seen,
            report_count: value.report_count.max(0) as u64,
        })
    }
}

impl From<QualityMetric> for ais_core::QualityMetric {
    fn from(value: QualityMetric) -> Self {
        ais_core::QualityMetric {
            interval_start: value.interval_start,
            interval_end: value.interval_end,
            accepted: value.accepted.max(0) as u64,
            duplicate: value.duplicate.max(0) as u64,
            rejected: value.rejected.max(0) as u64,
            late_dropped: value.late_dropped.max(0) as u64,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::Mmsi;

/// A frame as received from the stream, before any parsing has taken place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(payload: impl Into<String>, received_at: DateTime<Utc>) -> RawFrame {
        RawFrame {
            payload: payload.into(),
            received_at,
        }
    }
}

/// A validated and normalized position report.
///
/// Reports are identified by `(mmsi, timestamp)` and are never mutated after validation.
/// Timestamps carry at most microsecond precision so they survive a round trip through
/// the store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub mmsi: Mmsi,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Knots.
    pub speed_over_ground: Option<f64>,
    /// Course over ground in degrees, `[0, 360)`.
    pub course: Option<f64>,
    /// True heading in whole degrees, `[0, 359]`.
    pub heading: Option<i32>,
    pub source_payload: Option<String>,
}

impl PositionReport {
    pub fn key(&self) -> (Mmsi, DateTime<Utc>) {
        (self.mmsi, self.timestamp)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumCount,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    /// The frame is not a decodable position message.
    MalformedFrame,
    MissingField,
    InvalidMmsi,
    InvalidTimestamp,
    LatitudeOutOfBounds,
    LongitudeOutOfBounds,
    /// The timestamp lies further in the future than the clock-skew tolerance allows.
    FutureTimestamp,
    InvalidKinematics,
}

impl RejectReason {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Diagnostic record of a frame that failed validation, never persisted with the reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedMessage {
    pub raw_payload: String,
    pub reason: RejectReason,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(feature = "test")]
mod test {
    use super::*;

    impl PositionReport {
        pub fn test_default(mmsi: Mmsi, timestamp: DateTime<Utc>) -> Self {
            Self {
                mmsi,
                timestamp,
                latitude: 62.4722,
                longitude: 6.1495,
                speed_over_ground: Some(10.5),
                course: Some(182.3),
                heading: Some(180),
                source_payload: Some("!AIVDM,1,1,,A,13u?etPv2;0n:dDPwUM1U1Cb069D,0*24".into()),
            }
        }

        pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
            self.latitude = latitude;
            self.longitude = longitude;
            self
        }
    }
}

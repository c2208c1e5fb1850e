use std::sync::Arc;

use ais_core::{Metrics, Mmsi, PositionReport, RawFrame, RejectReason, RejectedMessage};
use async_channel::{Receiver, Sender};
use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeDelta, Utc};
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use tracing::{instrument, warn};

use crate::models::{IngestedReport, Payload, PositionFrame};

/// AIS "not available" values.
const SPEED_NOT_AVAILABLE: f64 = 102.3;
const COURSE_NOT_AVAILABLE: f64 = 360.0;
const HEADING_NOT_AVAILABLE: f64 = 511.0;

#[derive(Debug, Snafu)]
enum Invalid {
    #[snafu(display("frame is not a position object: {source}"))]
    Malformed { source: serde_json::Error },
    #[snafu(display("missing field '{field}'"))]
    Missing { field: &'static str },
    #[snafu(display("'{value}' is not a valid mmsi"))]
    InvalidMmsi { value: String },
    #[snafu(display("'{value}' is not a valid timestamp"))]
    InvalidTimestamp { value: String },
    #[snafu(display("latitude {value} is outside [-90, 90]"))]
    Latitude { value: f64 },
    #[snafu(display("longitude {value} is outside [-180, 180]"))]
    Longitude { value: f64 },
    #[snafu(display("timestamp {timestamp} is ahead of arrival time {received_at} by more than {tolerance}"))]
    Future {
        timestamp: DateTime<Utc>,
        received_at: DateTime<Utc>,
        tolerance: TimeDelta,
    },
    #[snafu(display("{field} {value} is outside its domain"))]
    Kinematics { field: &'static str, value: f64 },
}

impl Invalid {
    fn reason(&self) -> RejectReason {
        match self {
            Invalid::Malformed { .. } => RejectReason::MalformedFrame,
            Invalid::Missing { .. } => RejectReason::MissingField,
            Invalid::InvalidMmsi { .. } => RejectReason::InvalidMmsi,
            Invalid::InvalidTimestamp { .. } => RejectReason::InvalidTimestamp,
            Invalid::Latitude { .. } => RejectReason::LatitudeOutOfBounds,
            Invalid::Longitude { .. } => RejectReason::LongitudeOutOfBounds,
            Invalid::Future { .. } => RejectReason::FutureTimestamp,
            Invalid::Kinematics { .. } => RejectReason::InvalidKinematics,
        }
    }
}

/// Parses and normalizes a single frame.
///
/// Timestamps are truncated to microseconds and AIS "not available" sentinels become `None`.
/// A report is rejected when its timestamp lies more than `max_clock_skew` after the frame
/// arrived.
pub fn validate(
    raw: &RawFrame,
    max_clock_skew: TimeDelta,
) -> Result<PositionReport, RejectedMessage> {
    parse(raw, max_clock_skew).map_err(|e| RejectedMessage {
        raw_payload: raw.payload.clone(),
        reason: e.reason(),
        detail: e.to_string(),
        timestamp: raw.received_at,
    })
}

fn parse(raw: &RawFrame, max_clock_skew: TimeDelta) -> Result<PositionReport, Invalid> {
    let frame: PositionFrame = serde_json::from_str(&raw.payload).context(MalformedSnafu)?;

    let mmsi = parse_mmsi(frame.mmsi.as_ref().ok_or(Invalid::Missing { field: "mmsi" })?)?;
    let timestamp = parse_timestamp(
        frame
            .timestamp
            .as_ref()
            .ok_or(Invalid::Missing { field: "timestamp" })?,
    )?;
    let latitude = frame.latitude.ok_or(Invalid::Missing { field: "latitude" })?;
    let longitude = frame.longitude.ok_or(Invalid::Missing { field: "longitude" })?;

    if !(-90.0..=90.0).contains(&latitude) {
        return LatitudeSnafu { value: latitude }.fail();
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return LongitudeSnafu { value: longitude }.fail();
    }

    if raw
        .received_at
        .checked_add_signed(max_clock_skew)
        .is_some_and(|limit| timestamp > limit)
    {
        return FutureSnafu {
            timestamp,
            received_at: raw.received_at,
            tolerance: max_clock_skew,
        }
        .fail();
    }

    Ok(PositionReport {
        mmsi,
        timestamp,
        latitude,
        longitude,
        speed_over_ground: speed_over_ground(frame.speed_over_ground)?,
        course: course(frame.course)?,
        heading: heading(frame.heading)?,
        source_payload: frame.payload.and_then(Payload::into_source_payload),
    })
}

fn parse_mmsi(value: &Value) -> Result<Mmsi, Invalid> {
    let number = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    number
        .and_then(|n| Mmsi::new(n).ok())
        .ok_or_else(|| Invalid::InvalidMmsi {
            value: value.to_string(),
        })
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, Invalid> {
    let parsed = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                    .into_iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                    .map(|t| t.and_utc())
            }),
        Value::Number(n) => match n.as_i64() {
            Some(seconds) => DateTime::from_timestamp(seconds, 0),
            None => n
                .as_f64()
                .and_then(|seconds| DateTime::from_timestamp_micros((seconds * 1e6).round() as i64)),
        },
        _ => None,
    };

    parsed
        .map(|t| t.trunc_subsecs(6))
        .ok_or_else(|| Invalid::InvalidTimestamp {
            value: value.to_string(),
        })
}

fn speed_over_ground(value: Option<f64>) -> Result<Option<f64>, Invalid> {
    match value {
        None => Ok(None),
        Some(v) if (v - SPEED_NOT_AVAILABLE).abs() < 1e-6 => Ok(None),
        Some(v) if (0.0..SPEED_NOT_AVAILABLE).contains(&v) => Ok(Some(v)),
        Some(value) => KinematicsSnafu {
            field: "speed_over_ground",
            value,
        }
        .fail(),
    }
}

fn course(value: Option<f64>) -> Result<Option<f64>, Invalid> {
    match value {
        None => Ok(None),
        Some(v) if v == COURSE_NOT_AVAILABLE => Ok(None),
        Some(v) if (0.0..COURSE_NOT_AVAILABLE).contains(&v) => Ok(Some(v)),
        Some(value) => KinematicsSnafu {
            field: "course",
            value,
        }
        .fail(),
    }
}

fn heading(value: Option<f64>) -> Result<Option<i32>, Invalid> {
    match value {
        None => Ok(None),
        Some(v) if v == HEADING_NOT_AVAILABLE => Ok(None),
        Some(v) if v.fract() == 0.0 && (0.0..=359.0).contains(&v) => Ok(Some(v as i32)),
        Some(value) => KinematicsSnafu {
            field: "heading",
            value,
        }
        .fail(),
    }
}

/// Pipeline stage turning raw frames into reports, rejects are counted and logged.
pub struct Validator {
    max_clock_skew: TimeDelta,
    metrics: Arc<Metrics>,
}

impl Validator {
    pub fn new(max_clock_skew: std::time::Duration, metrics: Arc<Metrics>) -> Validator {
        Validator {
            max_clock_skew: TimeDelta::from_std(max_clock_skew).unwrap_or(TimeDelta::MAX),
            metrics,
        }
    }

    /// Runs until the frame queue is closed and drained.
    #[instrument(skip_all)]
    pub async fn run(self, receiver: Receiver<RawFrame>, sender: Sender<IngestedReport>) {
        while let Ok(raw) = receiver.recv().await {
            match validate(&raw, self.max_clock_skew) {
                Ok(report) => {
                    self.metrics.report_accepted();
                    let report = IngestedReport {
                        report,
                        received_at: raw.received_at,
                    };
                    if sender.send(report).await.is_err() {
                        warn!("ordering queue closed, stopping validation");
                        return;
                    }
                }
                Err(rejected) => {
                    self.metrics.report_rejected(rejected.reason);
                    warn!(
                        app.reason = %rejected.reason,
                        "rejected frame: {}, payload: {}",
                        rejected.detail,
                        rejected.raw_payload,
                    );
                }
            }
        }
    }
}

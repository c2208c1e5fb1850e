use ais_core::PositionReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position report as it appears on the wire, one JSON object per frame.
///
/// Every field is optional so a missing field can be told apart from a malformed frame.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PositionFrame {
    /// Number or numeric string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmsi: Option<serde_json::Value>,
    /// RFC 3339 string, ISO 8601 without offset (UTC) or epoch seconds.
    #[serde(alias = "msgtime", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Value>,
    #[serde(alias = "lat", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(alias = "lon", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(
        alias = "speedOverGround",
        alias = "sog",
        skip_serializing_if = "Option::is_none"
    )]
    pub speed_over_ground: Option<f64>,
    #[serde(
        alias = "courseOverGround",
        alias = "cog",
        skip_serializing_if = "Option::is_none"
    )]
    pub course: Option<f64>,
    #[serde(alias = "trueHeading", skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

/// Raw NMEA sentence(s) the frame was decoded from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Sentence(String),
    /// Multi-part messages.
    Sentences(Vec<String>),
}

impl Payload {
    pub fn into_source_payload(self) -> Option<String> {
        match self {
            Payload::Sentence(s) => Some(s),
            Payload::Sentences(v) if v.is_empty() => None,
            Payload::Sentences(v) => Some(v.join("\n")),
        }
    }
}

/// A validated report together with the time its frame arrived, used for latency accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedReport {
    pub report: PositionReport,
    pub received_at: DateTime<Utc>,
}

#[cfg(feature = "test")]
mod test {
    use super::*;

    impl PositionFrame {
        pub fn test_default(mmsi: i64, timestamp: DateTime<Utc>) -> PositionFrame {
            PositionFrame {
                mmsi: Some(mmsi.into()),
                timestamp: Some(timestamp.to_rfc3339().into()),
                latitude: Some(62.4722),
                longitude: Some(6.1495),
                speed_over_ground: Some(10.5),
                course: Some(182.3),
                heading: Some(180.0),
                payload: Some(Payload::Sentence(
                    "!AIVDM,1,1,,A,13u?etPv2;0n:dDPwUM1U1Cb069D,0*24".into(),
                )),
            }
        }

        pub fn with_position(mut self, latitude: f64, longitude: f64) -> PositionFrame {
            self.latitude = Some(latitude);
            self.longitude = Some(longitude);
            self
        }

        pub fn to_line(&self) -> String {
            serde_json::to_string(self).unwrap()
        }
    }
}

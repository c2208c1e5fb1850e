use chrono::{DateTime, Utc};
use snafu::{Location, Snafu};

use crate::Mmsi;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

pub type CoreResult<T> = std::result::Result<T, Error>;

/// Errors surfaced by storage adapters through the ports.
#[derive(Snafu, Debug)]
#[snafu(module(core_error), visibility(pub))]
pub enum Error {
    #[snafu(display("The store is unavailable"))]
    Unavailable {
        #[snafu(implicit)]
        location: Location,
        source: BoxedError,
    },
    #[snafu(display("An unexpected store error occurred"))]
    Unexpected {
        #[snafu(implicit)]
        location: Location,
        source: BoxedError,
    },
}

impl Error {
    #[track_caller]
    pub fn unavailable(error: impl Into<BoxedError>) -> Self {
        use snafu::IntoError;
        core_error::UnavailableSnafu.into_error(error.into())
    }

    #[track_caller]
    pub fn unexpected(error: impl Into<BoxedError>) -> Self {
        use snafu::IntoError;
        core_error::UnexpectedSnafu.into_error(error.into())
    }

    /// Transient errors are worth retrying, everything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Unavailable { .. })
    }
}

#[derive(Snafu, Debug)]
#[snafu(module, visibility(pub))]
pub enum QueryError {
    #[snafu(display("No reports exist for vessel '{mmsi}'"))]
    NotFound {
        #[snafu(implicit)]
        location: Location,
        mmsi: Mmsi,
    },
    #[snafu(display("Invalid time range, start: '{start}', end: '{end}'"))]
    InvalidRange {
        #[snafu(implicit)]
        location: Location,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[snafu(display("The store could not serve the query"))]
    StoreUnavailable {
        #[snafu(implicit)]
        location: Location,
        source: Error,
    },
}

#[derive(Snafu, Debug, Clone, PartialEq)]
#[snafu(module, visibility(pub))]
pub enum DateRangeError {
    #[snafu(display("Start '{start}' is after end '{end}'"))]
    Ordering {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

#[derive(Snafu, Debug, Clone, PartialEq)]
#[snafu(module, visibility(pub))]
pub enum MmsiError {
    #[snafu(display("'{value}' is not a valid mmsi"))]
    OutOfRange { value: i64 },
}

#[derive(Snafu, Debug, Clone, PartialEq)]
#[snafu(module, visibility(pub))]
pub enum BoundingBoxError {
    #[snafu(display("Latitude '{value}' is outside [-90, 90]"))]
    Latitude { value: f64 },
    #[snafu(display("Longitude '{value}' is outside [-180, 180]"))]
    Longitude { value: f64 },
    #[snafu(display("Minimum latitude '{min}' is above maximum latitude '{max}'"))]
    LatitudeOrdering { min: f64, max: f64 },
}

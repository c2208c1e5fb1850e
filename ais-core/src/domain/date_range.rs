use chrono::{DateTime, Duration, Utc};

use crate::{DateRangeError, date_range_error::OrderingSnafu};

/// An inclusive time interval, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<DateRange, DateRangeError> {
        if start > end {
            OrderingSnafu { start, end }.fail()
        } else {
            Ok(DateRange { start, end })
        }
    }

    pub fn contains(&self, val: DateTime<Utc>) -> bool {
        val >= self.start && val <= self.end
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

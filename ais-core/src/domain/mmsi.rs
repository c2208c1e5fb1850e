use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MmsiError, mmsi_error::OutOfRangeSnafu};

/// Maritime Mobile Service Identity, at most nine digits and never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct Mmsi(i32);

impl Mmsi {
    pub const MAX: i32 = 999_999_999;

    pub fn new(value: i64) -> Result<Mmsi, MmsiError> {
        if value > 0 && value <= Self::MAX as i64 {
            Ok(Mmsi(value as i32))
        } else {
            OutOfRangeSnafu { value }.fail()
        }
    }

    pub fn into_inner(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for Mmsi {
    type Error = MmsiError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Mmsi::new(value)
    }
}

impl TryFrom<i32> for Mmsi {
    type Error = MmsiError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Mmsi::new(value as i64)
    }
}

impl From<Mmsi> for i32 {
    fn from(value: Mmsi) -> Self {
        value.0
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

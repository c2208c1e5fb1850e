use std::{iter::Sum, ops::Add};

use chrono::Duration;
use geoutils::Location;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::PositionReport;

pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

static SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Distance {
    meters: f64,
}

impl Distance {
    pub const ZERO: Distance = Distance { meters: 0.0 };

    pub fn from_meters(meters: f64) -> Distance {
        Distance { meters }
    }

    pub fn from_nautical_miles(nautical_miles: f64) -> Distance {
        Distance {
            meters: nautical_miles * METERS_PER_NAUTICAL_MILE,
        }
    }

    pub fn meters(&self) -> f64 {
        self.meters
    }

    pub fn kilometers(&self) -> f64 {
        self.meters / 1000.0
    }

    pub fn nautical_miles(&self) -> f64 {
        self.meters / METERS_PER_NAUTICAL_MILE
    }
}

impl Add for Distance {
    type Output = Distance;

    fn add(self, rhs: Self) -> Self::Output {
        Distance::from_meters(self.meters + rhs.meters)
    }
}

impl Sum for Distance {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Distance::ZERO, Add::add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Speed {
    knots: f64,
}

impl Speed {
    pub fn from_knots(knots: f64) -> Speed {
        Speed { knots }
    }

    /// Average speed needed to cover `distance` in `elapsed`, `None` for a non-positive duration.
    pub fn from_distance_over(distance: Distance, elapsed: Duration) -> Option<Speed> {
        let micros = elapsed.num_microseconds()?;
        if micros <= 0 {
            return None;
        }
        let hours = micros as f64 / 1_000_000.0 / SECONDS_PER_HOUR;
        Some(Speed::from_knots(distance.nautical_miles() / hours))
    }

    pub fn knots(&self) -> f64 {
        self.knots
    }

    pub fn meters_per_second(&self) -> f64 {
        self.knots * METERS_PER_NAUTICAL_MILE / SECONDS_PER_HOUR
    }
}

pub fn great_circle_distance(from: (f64, f64), to: (f64, f64)) -> Distance {
    let from = Location::new(from.0, from.1);
    let to = Location::new(to.0, to.1);
    Distance::from_meters(from.haversine_distance_to(&to).meters())
}

/// Sum of the great-circle distances between consecutive reports.
///
/// `reports` must already be ordered by timestamp.
pub fn track_distance(reports: &[PositionReport]) -> Distance {
    reports
        .iter()
        .tuple_windows()
        .map(|(a, b)| great_circle_distance((a.latitude, a.longitude), (b.latitude, b.longitude)))
        .sum()
}

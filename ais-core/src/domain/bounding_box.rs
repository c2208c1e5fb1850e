use serde::{Deserialize, Serialize};

use crate::{
    BoundingBoxError,
    bounding_box_error::{LatitudeOrderingSnafu, LatitudeSnafu, LongitudeSnafu},
};

/// A geographic rectangle given by its south-west and north-east corners.
///
/// When `min_longitude > max_longitude` the box wraps across the antimeridian, e.g.
/// `min_longitude = 170, max_longitude = -170` covers the 20 degrees around ±180.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    min_latitude: f64,
    min_longitude: f64,
    max_latitude: f64,
    max_longitude: f64,
}

impl BoundingBox {
    pub fn new(
        min_latitude: f64,
        min_longitude: f64,
        max_latitude: f64,
        max_longitude: f64,
    ) -> Result<BoundingBox, BoundingBoxError> {
        for value in [min_latitude, max_latitude] {
            if !(-90.0..=90.0).contains(&value) {
                return LatitudeSnafu { value }.fail();
            }
        }
        for value in [min_longitude, max_longitude] {
            if !(-180.0..=180.0).contains(&value) {
                return LongitudeSnafu { value }.fail();
            }
        }
        if min_latitude > max_latitude {
            return LatitudeOrderingSnafu {
                min: min_latitude,
                max: max_latitude,
            }
            .fail();
        }

        Ok(BoundingBox {
            min_latitude,
            min_longitude,
            max_latitude,
            max_longitude,
        })
    }

    pub fn min_latitude(&self) -> f64 {
        self.min_latitude
    }

    pub fn max_latitude(&self) -> f64 {
        self.max_latitude
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_longitude > self.max_longitude
    }

    /// The non-wrapping longitude intervals covered by the box, one or two of them.
    pub fn longitude_spans(&self) -> Vec<(f64, f64)> {
        if self.crosses_antimeridian() {
            vec![(self.min_longitude, 180.0), (-180.0, self.max_longitude)]
        } else {
            vec![(self.min_longitude, self.max_longitude)]
        }
    }

    /// Edges are inclusive.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && self
                .longitude_spans()
                .into_iter()
                .any(|(min, max)| (min..=max).contains(&longitude))
    }
}

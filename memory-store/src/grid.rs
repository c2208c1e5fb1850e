use std::collections::{BTreeMap, BTreeSet, HashMap};

use ais_core::{BoundingBox, DateRange, Mmsi, PositionReport};
use chrono::{DateTime, Utc};

/// One degree by one degree square, identified by the floor of its south-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    latitude: i32,
    longitude: i32,
}

impl Cell {
    pub fn of(latitude: f64, longitude: f64) -> Cell {
        Cell {
            latitude: latitude.floor() as i32,
            longitude: longitude.floor() as i32,
        }
    }

    /// Every cell overlapping `bbox`, including both halves of a box wrapping the antimeridian.
    pub fn covering(bbox: &BoundingBox) -> Vec<Cell> {
        let latitudes = Cell::of(bbox.min_latitude(), 0.0).latitude
            ..=Cell::of(bbox.max_latitude(), 0.0).latitude;

        bbox.longitude_spans()
            .into_iter()
            .flat_map(|(min, max)| {
                let longitudes = Cell::of(0.0, min).longitude..=Cell::of(0.0, max).longitude;
                latitudes.clone().flat_map(move |latitude| {
                    longitudes
                        .clone()
                        .map(move |longitude| Cell { latitude, longitude })
                })
            })
            .collect()
    }
}

/// Coarse spatial index, candidates still need an exact bounding box check.
#[derive(Debug, Default)]
pub struct GridIndex {
    cells: HashMap<Cell, BTreeMap<DateTime<Utc>, BTreeSet<Mmsi>>>,
}

impl GridIndex {
    pub fn insert(&mut self, report: &PositionReport) {
        self.cells
            .entry(Cell::of(report.latitude, report.longitude))
            .or_default()
            .entry(report.timestamp)
            .or_default()
            .insert(report.mmsi);
    }

    pub fn within(
        &self,
        cell: Cell,
        range: &DateRange,
    ) -> impl Iterator<Item = (Mmsi, DateTime<Utc>)> + '_ {
        let (start, end) = (range.start(), range.end());
        self.cells
            .get(&cell)
            .into_iter()
            .flat_map(move |times| times.range(start..=end))
            .flat_map(|(timestamp, mmsis)| mmsis.iter().map(move |m| (*m, *timestamp)))
    }
}

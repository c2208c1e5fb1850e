#![deny(rust_2018_idioms)]

//! In-process implementation of the position store ports, used for local runs and tests.

mod grid;

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use ais_core::{
    BoundingBox, CoreResult, DateRange, InsertOutcome, Mmsi, PositionInbound, PositionOutbound,
    PositionReport, QualityMetric, Vessel,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grid::{Cell, GridIndex};
use parking_lot::RwLock;
use tracing::instrument;

#[cfg(feature = "test")]
mod fault;

#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    inner: Arc<RwLock<Inner>>,
    #[cfg(feature = "test")]
    faults: Arc<parking_lot::Mutex<fault::Faults>>,
}

#[derive(Debug, Default)]
struct Inner {
    reports: BTreeMap<(Mmsi, DateTime<Utc>), PositionReport>,
    vessels: HashMap<Mmsi, Vessel>,
    grid: GridIndex,
    quality_metrics: Vec<QualityMetric>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_positions(&self) -> usize {
        self.inner.read().reports.len()
    }

    /// Every stored report ordered by `(mmsi, timestamp)`.
    pub fn all_positions(&self) -> Vec<PositionReport> {
        self.inner.read().reports.values().cloned().collect()
    }
}

impl Inner {
    fn insert(&mut self, reports: &[PositionReport]) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();
        let mut touched: HashMap<Mmsi, (DateTime<Utc>, DateTime<Utc>, u64)> = HashMap::new();

        for r in reports {
            if self.reports.contains_key(&r.key()) {
                outcome.ignored += 1;
                continue;
            }
            self.reports.insert(r.key(), r.clone());
            self.grid.insert(r);
            outcome.inserted += 1;

            touched
                .entry(r.mmsi)
                .and_modify(|(first, last, count)| {
                    *first = (*first).min(r.timestamp);
                    *last = (*last).max(r.timestamp);
                    *count += 1;
                })
                .or_insert((r.timestamp, r.timestamp, 1));
        }

        for (mmsi, (first, last, count)) in touched {
            self.vessels
                .entry(mmsi)
                .and_modify(|v| v.absorb(first, last, count))
                .or_insert(Vessel {
                    mmsi,
                    first_seen: first,
                    last_seen: last,
                    report_count: count,
                });
        }

        outcome
    }
}

#[async_trait]
impl PositionInbound for MemoryAdapter {
    #[instrument(skip_all, fields(app.num_reports = reports.len()))]
    async fn add_positions(&self, reports: &[PositionReport]) -> CoreResult<InsertOutcome> {
        #[cfg(feature = "test")]
        self.faults.lock().check()?;

        Ok(self.inner.write().insert(reports))
    }

    async fn add_quality_metric(&self, metric: &QualityMetric) -> CoreResult<()> {
        self.inner.write().quality_metrics.push(metric.clone());
        Ok(())
    }
}

#[async_trait]
impl PositionOutbound for MemoryAdapter {
    async fn position(
        &self,
        mmsi: Mmsi,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<PositionReport>> {
        Ok(self.inner.read().reports.get(&(mmsi, timestamp)).cloned())
    }

    async fn positions(&self, mmsi: Mmsi, range: &DateRange) -> CoreResult<Vec<PositionReport>> {
        Ok(self
            .inner
            .read()
            .reports
            .range((mmsi, range.start())..=(mmsi, range.end()))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn vessel(&self, mmsi: Mmsi) -> CoreResult<Option<Vessel>> {
        Ok(self.inner.read().vessels.get(&mmsi).cloned())
    }

    async fn vessels(&self) -> CoreResult<Vec<Vessel>> {
        let mut vessels = self
            .inner
            .read()
            .vessels
            .values()
            .cloned()
            .collect::<Vec<_>>();
        vessels.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.mmsi.cmp(&b.mmsi)));
        Ok(vessels)
    }

    async fn vessels_in_region(
        &self,
        bbox: &BoundingBox,
        range: &DateRange,
    ) -> CoreResult<Vec<Mmsi>> {
        let inner = self.inner.read();
        let mut found = BTreeSet::new();

        for cell in Cell::covering(bbox) {
            for (mmsi, timestamp) in inner.grid.within(cell, range) {
                if found.contains(&mmsi) {
                    continue;
                }
                if let Some(r) = inner.reports.get(&(mmsi, timestamp)) {
                    if bbox.contains(r.latitude, r.longitude) {
                        found.insert(mmsi);
                    }
                }
            }
        }

        Ok(found.into_iter().collect())
    }

    async fn latest_positions(&self, limit: usize) -> CoreResult<Vec<PositionReport>> {
        let inner = self.inner.read();
        let mut vessels = inner.vessels.values().collect::<Vec<_>>();
        vessels.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.mmsi.cmp(&b.mmsi)));

        Ok(vessels
            .into_iter()
            .filter_map(|v| inner.reports.get(&(v.mmsi, v.last_seen)).cloned())
            .take(limit)
            .collect())
    }

    async fn quality_metrics(&self, range: &DateRange) -> CoreResult<Vec<QualityMetric>> {
        Ok(self
            .inner
            .read()
            .quality_metrics
            .iter()
            .filter(|m| range.contains(m.interval_end))
            .cloned()
            .collect())
    }
}

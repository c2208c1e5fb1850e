use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    hash::{DefaultHasher, Hash, Hasher},
    sync::Arc,
    time::Duration,
};

use ais_core::{Metrics, Mmsi};
use async_channel::{Receiver, Sender};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

use crate::{models::IngestedReport, settings::OrderingSettings};

/// Per vessel reordering window with duplicate and late arrival detection.
///
/// Each vessel has a watermark, the timestamp of the last report it released. Reports are
/// released in ascending timestamp order when the vessel's window overflows, when a held report
/// has waited `max_delay`, or when the vessel has been idle for `vessel_idle_timeout`.
/// Anything arriving at or below the watermark is never released again: it is a duplicate if
/// its timestamp was released within `dedup_horizon`, otherwise a late arrival. Evicting an
/// idle vessel frees its window but keeps its watermark.
pub struct OrderingBuffer {
    shards: Box<[Mutex<Shard>]>,
    window_size: usize,
    max_delay: Duration,
    dedup_horizon: TimeDelta,
    vessel_idle_timeout: Duration,
    metrics: Arc<Metrics>,
}

#[derive(Debug, Default)]
struct Shard {
    vessels: HashMap<Mmsi, VesselWindow>,
    /// Watermarks of evicted idle vessels, restored when they are heard from again.
    retired: HashMap<Mmsi, DateTime<Utc>>,
}

#[derive(Debug)]
struct VesselWindow {
    holding: BTreeMap<DateTime<Utc>, Held>,
    released: BTreeSet<DateTime<Utc>>,
    watermark: Option<DateTime<Utc>>,
    last_arrival: Instant,
}

#[derive(Debug)]
struct Held {
    report: IngestedReport,
    arrived: Instant,
}

/// What happened to a report handed to [`OrderingBuffer::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Held,
    Duplicate,
    Late,
}

impl VesselWindow {
    fn new(now: Instant) -> VesselWindow {
        VesselWindow {
            holding: BTreeMap::new(),
            released: BTreeSet::new(),
            watermark: None,
            last_arrival: now,
        }
    }

    fn resume(now: Instant, watermark: Option<DateTime<Utc>>) -> VesselWindow {
        let mut window = VesselWindow::new(now);
        window.watermark = watermark;
        window.released.extend(watermark);
        window
    }

    /// Releases every held report with a timestamp at or below `up_to`.
    fn release_through(
        &mut self,
        up_to: DateTime<Utc>,
        dedup_horizon: TimeDelta,
        out: &mut Vec<IngestedReport>,
    ) {
        while let Some(entry) = self.holding.first_entry() {
            if *entry.key() > up_to {
                break;
            }
            let (timestamp, held) = entry.remove_entry();
            self.released.insert(timestamp);
            self.watermark = Some(timestamp);
            out.push(held.report);
        }
        self.forget_old(dedup_horizon);
    }

    fn forget_old(&mut self, dedup_horizon: TimeDelta) {
        let Some(horizon) = self
            .watermark
            .and_then(|w| w.checked_sub_signed(dedup_horizon))
        else {
            return;
        };
        self.released = self.released.split_off(&horizon);
    }
}

impl OrderingBuffer {
    pub fn new(settings: &OrderingSettings, metrics: Arc<Metrics>) -> OrderingBuffer {
        OrderingBuffer {
            shards: (0..settings.num_shards.max(1))
                .map(|_| Mutex::new(Shard::default()))
                .collect(),
            window_size: settings.window_size.max(1),
            max_delay: settings.max_delay,
            dedup_horizon: TimeDelta::from_std(settings.dedup_horizon).unwrap_or(TimeDelta::MAX),
            vessel_idle_timeout: settings.vessel_idle_timeout,
            metrics,
        }
    }

    fn shard(&self, mmsi: Mmsi) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        mmsi.hash(&mut hasher);
        &self.shards[(hasher.finish() % self.shards.len() as u64) as usize]
    }

    /// Admits `report` arriving at `now`, reports forced out by a full window are appended to
    /// `released` in ascending timestamp order.
    pub fn insert(
        &self,
        report: IngestedReport,
        now: Instant,
        released: &mut Vec<IngestedReport>,
    ) -> Admission {
        let mmsi = report.report.mmsi;
        let timestamp = report.report.timestamp;

        let mut shard = self.shard(mmsi).lock();
        let Shard { vessels, retired } = &mut *shard;
        let window = vessels
            .entry(mmsi)
            .or_insert_with(|| VesselWindow::resume(now, retired.remove(&mmsi)));
        window.last_arrival = now;

        if window.holding.contains_key(&timestamp) || window.released.contains(&timestamp) {
            self.metrics.duplicate_dropped();
            debug!(app.mmsi = %mmsi, "dropped duplicate report at {timestamp}");
            return Admission::Duplicate;
        }
        if window.watermark.is_some_and(|w| timestamp < w) {
            self.metrics.late_dropped();
            debug!(app.mmsi = %mmsi, "dropped late report at {timestamp}");
            return Admission::Late;
        }

        window.holding.insert(
            timestamp,
            Held {
                report,
                arrived: now,
            },
        );

        if window.holding.len() > self.window_size {
            let overflow = window.holding.len() - self.window_size;
            if let Some(up_to) = window.holding.keys().nth(overflow - 1).copied() {
                window.release_through(up_to, self.dedup_horizon, released);
            }
        }

        Admission::Held
    }

    /// Releases reports that have been held for `max_delay` and evicts idle vessels, one shard
    /// at a time.
    pub fn sweep(&self, now: Instant) -> Vec<IngestedReport> {
        let mut released = Vec::new();

        for shard in self.shards.iter() {
            let mut shard = shard.lock();
            let Shard { vessels, retired } = &mut *shard;

            vessels.retain(|mmsi, window| {
                let expired = window
                    .holding
                    .iter()
                    .filter(|(_, held)| {
                        now.saturating_duration_since(held.arrived) >= self.max_delay
                    })
                    .map(|(timestamp, _)| *timestamp)
                    .next_back();

                if let Some(up_to) = expired {
                    window.release_through(up_to, self.dedup_horizon, &mut released);
                }

                if now.saturating_duration_since(window.last_arrival) >= self.vessel_idle_timeout {
                    let held = std::mem::take(&mut window.holding);
                    if let Some((timestamp, _)) = held.last_key_value() {
                        window.watermark = Some(*timestamp);
                    }
                    released.extend(held.into_values().map(|h| h.report));
                    if let Some(watermark) = window.watermark {
                        retired.insert(*mmsi, watermark);
                    }
                    false
                } else {
                    true
                }
            });
        }

        released
    }

    /// Releases every held report and forgets all vessel state.
    pub fn drain(&self) -> Vec<IngestedReport> {
        let mut released = Vec::new();
        for shard in self.shards.iter() {
            for (_, window) in shard.lock().vessels.drain() {
                released.extend(window.holding.into_values().map(|h| h.report));
            }
        }
        released
    }

    pub fn num_held(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().vessels.values().map(|w| w.holding.len()).sum::<usize>())
            .sum()
    }
}

/// Pipeline stage feeding validated reports through the [`OrderingBuffer`].
///
/// A single task inserts and sweeps so releases of one vessel can never overtake each other on
/// the way to the writer.
pub struct Orderer {
    buffer: OrderingBuffer,
    sweep_interval: Duration,
    metrics: Arc<Metrics>,
}

impl Orderer {
    pub fn new(settings: &OrderingSettings, metrics: Arc<Metrics>) -> Orderer {
        Orderer {
            buffer: OrderingBuffer::new(settings, metrics.clone()),
            sweep_interval: settings.sweep_interval,
            metrics,
        }
    }

    /// Runs until the validated report queue is closed and drained, then releases everything
    /// still held.
    #[instrument(skip_all)]
    pub async fn run(self, receiver: Receiver<IngestedReport>, sender: Sender<IngestedReport>) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut released = Vec::new();

        loop {
            tokio::select! {
                report = receiver.recv() => match report {
                    Ok(report) => {
                        self.buffer.insert(report, Instant::now(), &mut released);
                    }
                    Err(_) => break,
                },
                _ = sweep.tick() => {
                    released = self.buffer.sweep(Instant::now());
                }
            }

            if !self.forward(&mut released, &sender).await {
                return;
            }
        }

        released = self.buffer.drain();
        debug!("releasing {} held reports on shutdown", released.len());
        self.forward(&mut released, &sender).await;
    }

    async fn forward(
        &self,
        released: &mut Vec<IngestedReport>,
        sender: &Sender<IngestedReport>,
    ) -> bool {
        if released.is_empty() {
            return true;
        }
        self.metrics.reports_released(released.len());

        for report in released.drain(..) {
            if sender.send(report).await.is_err() {
                warn!("writer queue closed, dropping released reports");
                return false;
            }
        }
        true
    }
}

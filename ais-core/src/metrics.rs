use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use strum::{EnumCount, IntoEnumIterator};

use crate::{QualityMetric, RejectReason};

/// Process-wide pipeline counters.
///
/// Every stage holds an `Arc<Metrics>` and updates it with relaxed atomics, nothing in the
/// pipeline ever reads them back to make a decision.
#[derive(Debug)]
pub struct Metrics {
    started: Instant,

    frames_received: AtomicU64,
    framing_errors: AtomicU64,
    connections: AtomicU64,
    disconnects: AtomicU64,
    connect_failures: AtomicU64,
    connected: AtomicBool,

    accepted: AtomicU64,
    rejected: [AtomicU64; RejectReason::COUNT],
    duplicates: AtomicU64,
    late_dropped: AtomicU64,
    released: AtomicU64,

    persisted: AtomicU64,
    already_present: AtomicU64,
    flush_failures: AtomicU64,
    dead_lettered_batches: AtomicU64,
    dead_lettered_reports: AtomicU64,

    latency_total_micros: AtomicU64,
    latency_count: AtomicU64,
    latency_max_micros: AtomicU64,

    interval: IntervalCounters,
}

#[derive(Debug)]
struct IntervalCounters {
    start: Mutex<DateTime<Utc>>,
    accepted: AtomicU64,
    duplicate: AtomicU64,
    rejected: AtomicU64,
    late_dropped: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub connected: bool,
    pub connections: u64,
    pub disconnects: u64,
    pub connect_failures: u64,
    pub frames_received: u64,
    pub framing_errors: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub rejected_by_reason: BTreeMap<RejectReason, u64>,
    pub duplicates: u64,
    pub late_dropped: u64,
    pub released: u64,
    pub persisted: u64,
    pub already_present: u64,
    pub flush_failures: u64,
    pub dead_lettered_batches: u64,
    pub dead_lettered_reports: u64,
    /// Accepted reports per second since start.
    pub ingestion_rate: f64,
    /// Share of validated frames that were rejected.
    pub reject_rate: f64,
    /// Share of accepted reports that were duplicates.
    pub duplicate_rate: f64,
    /// Share of accepted reports that arrived too late.
    pub late_drop_rate: f64,
    pub mean_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
}

impl MetricsSnapshot {
    pub fn rejected_for(&self, reason: RejectReason) -> u64 {
        self.rejected_by_reason.get(&reason).copied().unwrap_or_default()
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    match denominator {
        0 => 0.0,
        d => numerator as f64 / d as f64,
    }
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

fn incr(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

impl Metrics {
    pub fn new() -> Metrics {
        Metrics {
            started: Instant::now(),
            frames_received: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            rejected: std::array::from_fn(|_| AtomicU64::new(0)),
            duplicates: AtomicU64::new(0),
            late_dropped: AtomicU64::new(0),
            released: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
            already_present: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            dead_lettered_batches: AtomicU64::new(0),
            dead_lettered_reports: AtomicU64::new(0),
            latency_total_micros: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            latency_max_micros: AtomicU64::new(0),
            interval: IntervalCounters {
                start: Mutex::new(Utc::now()),
                accepted: AtomicU64::new(0),
                duplicate: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                late_dropped: AtomicU64::new(0),
            },
        }
    }

    pub fn connection_established(&self) {
        incr(&self.connections, 1);
        self.connected.store(true, Ordering::Relaxed);
    }

    pub fn connection_lost(&self) {
        incr(&self.disconnects, 1);
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn connect_failed(&self) {
        incr(&self.connect_failures, 1);
    }

    pub fn frame_received(&self) {
        incr(&self.frames_received, 1);
    }

    pub fn framing_error(&self) {
        incr(&self.framing_errors, 1);
    }

    pub fn report_accepted(&self) {
        incr(&self.accepted, 1);
        incr(&self.interval.accepted, 1);
    }

    pub fn report_rejected(&self, reason: RejectReason) {
        incr(&self.rejected[reason.index()], 1);
        incr(&self.interval.rejected, 1);
    }

    pub fn duplicate_dropped(&self) {
        incr(&self.duplicates, 1);
        incr(&self.interval.duplicate, 1);
    }

    pub fn late_dropped(&self) {
        incr(&self.late_dropped, 1);
        incr(&self.interval.late_dropped, 1);
    }

    pub fn reports_released(&self, n: usize) {
        incr(&self.released, n as u64);
    }

    pub fn batch_persisted(&self, inserted: u64, ignored: u64) {
        incr(&self.persisted, inserted);
        incr(&self.already_present, ignored);
    }

    pub fn flush_failed(&self) {
        incr(&self.flush_failures, 1);
    }

    pub fn batch_dead_lettered(&self, reports: usize) {
        incr(&self.dead_lettered_batches, 1);
        incr(&self.dead_lettered_reports, reports as u64);
    }

    /// Records the arrival-to-persisted latency of a single report.
    pub fn observe_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        incr(&self.latency_total_micros, micros);
        incr(&self.latency_count, 1);
        self.latency_max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    /// Closes the current reporting interval at `now` and returns its counters, the next
    /// interval starts at `now` with every counter at zero.
    pub fn take_quality_metric(&self, now: DateTime<Utc>) -> QualityMetric {
        let interval_start = std::mem::replace(&mut *self.interval.start.lock(), now);
        QualityMetric {
            interval_start,
            interval_end: now,
            accepted: self.interval.accepted.swap(0, Ordering::Relaxed),
            duplicate: self.interval.duplicate.swap(0, Ordering::Relaxed),
            rejected: self.interval.rejected.swap(0, Ordering::Relaxed),
            late_dropped: self.interval.late_dropped.swap(0, Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self.started.elapsed();
        let accepted = load(&self.accepted);
        let rejected_by_reason: BTreeMap<RejectReason, u64> = RejectReason::iter()
            .map(|r| (r, load(&self.rejected[r.index()])))
            .collect();
        let rejected = rejected_by_reason.values().sum();
        let duplicates = load(&self.duplicates);
        let late_dropped = load(&self.late_dropped);

        let latency_count = load(&self.latency_count);
        let (mean_latency_ms, max_latency_ms) = match latency_count {
            0 => (None, None),
            n => (
                Some(load(&self.latency_total_micros) as f64 / n as f64 / 1000.0),
                Some(load(&self.latency_max_micros) as f64 / 1000.0),
            ),
        };

        MetricsSnapshot {
            uptime,
            connected: self.connected.load(Ordering::Relaxed),
            connections: load(&self.connections),
            disconnects: load(&self.disconnects),
            connect_failures: load(&self.connect_failures),
            frames_received: load(&self.frames_received),
            framing_errors: load(&self.framing_errors),
            accepted,
            rejected,
            rejected_by_reason,
            duplicates,
            late_dropped,
            released: load(&self.released),
            persisted: load(&self.persisted),
            already_present: load(&self.already_present),
            flush_failures: load(&self.flush_failures),
            dead_lettered_batches: load(&self.dead_lettered_batches),
            dead_lettered_reports: load(&self.dead_lettered_reports),
            ingestion_rate: match uptime.as_secs_f64() {
                s if s > 0.0 => accepted as f64 / s,
                _ => 0.0,
            },
            reject_rate: ratio(rejected, accepted + rejected),
            duplicate_rate: ratio(duplicates, accepted),
            late_drop_rate: ratio(late_dropped, accepted),
            mean_latency_ms,
            max_latency_ms,
        }
    }
}

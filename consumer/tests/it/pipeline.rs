use std::time::Duration;

use ais_consumer::{
    dead_letter::{DeadLetter, DeadLetterQueue},
    error::error::FrameTooLongSnafu,
    models::PositionFrame,
};
use ais_core::{DateRange, Mmsi, PositionOutbound, PositionReport, RejectReason};
use chrono::{DateTime, TimeZone, Utc};

use crate::helper::{test, test_with_settings};

fn t(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
}

fn mmsi(value: i64) -> Mmsi {
    Mmsi::new(value).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_position_frames_are_persisted() {
    test(|mut helper| async move {
        let feed = helper.source.connect().await;
        for s in [0, 10, 20] {
            feed.send(&PositionFrame::test_default(257000001, t(s))).await;
        }

        helper
            .wait_for("reports to be stored", |h| h.store.num_positions() == 3)
            .await;

        let vessel = helper.store.vessel(mmsi(257000001)).await.unwrap().unwrap();
        assert_eq!(vessel.first_seen, t(0));
        assert_eq!(vessel.last_seen, t(20));
        assert_eq!(vessel.report_count, 3);

        helper.shutdown().await;
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_same_report_twice_is_one_row_and_one_duplicate() {
    test(|mut helper| async move {
        let feed = helper.source.connect().await;
        let frame = PositionFrame::test_default(1, t(0));
        feed.send(&frame).await;
        feed.send(&frame).await;

        helper
            .wait_for("duplicate to be counted", |h| {
                h.metrics.snapshot().duplicates == 1
            })
            .await;
        helper.shutdown().await;

        assert_eq!(helper.store.num_positions(), 1);
        let snapshot = helper.metrics.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.duplicates, 1);
        assert_eq!(snapshot.persisted, 1);
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_out_of_bounds_latitude_is_rejected_and_never_stored() {
    test(|mut helper| async move {
        let feed = helper.source.connect().await;
        feed.send(&PositionFrame::test_default(2, t(0)).with_position(95.0, 5.0))
            .await;
        feed.send(&PositionFrame::test_default(3, t(0))).await;

        helper
            .wait_for("valid report to be stored", |h| h.store.num_positions() == 1)
            .await;
        helper.shutdown().await;

        let snapshot = helper.metrics.snapshot();
        assert_eq!(snapshot.rejected_for(RejectReason::LatitudeOutOfBounds), 1);
        assert!(helper.store.vessel(mmsi(2)).await.unwrap().is_none());
        assert_eq!(helper.store.all_positions()[0].mmsi, mmsi(3));
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_garbage_frames_are_rejected_without_dropping_connection() {
    test(|mut helper| async move {
        let feed = helper.source.connect().await;
        feed.send_line("definitely not json").await;
        feed.send_line("").await;
        feed.send_error(FrameTooLongSnafu { max_length: 4096usize }.build())
            .await;
        feed.send(&PositionFrame::test_default(4, t(0))).await;

        helper
            .wait_for("report to be stored", |h| h.store.num_positions() == 1)
            .await;
        helper.shutdown().await;

        let snapshot = helper.metrics.snapshot();
        assert_eq!(snapshot.rejected_for(RejectReason::MalformedFrame), 1);
        assert_eq!(snapshot.framing_errors, 1);
        assert_eq!(snapshot.frames_received, 2);
        assert_eq!(snapshot.connections, 1);
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_report_below_watermark_is_late_dropped() {
    test_with_settings(
        |settings| settings.ordering.window_size = 1,
        |mut helper| async move {
            let feed = helper.source.connect().await;
            feed.send(&PositionFrame::test_default(5, t(60))).await;
            feed.send(&PositionFrame::test_default(5, t(100))).await;
            feed.send(&PositionFrame::test_default(5, t(50))).await;

            helper
                .wait_for("late arrival to be counted", |h| {
                    h.metrics.snapshot().late_dropped == 1
                })
                .await;
            helper.shutdown().await;

            let stored = helper
                .store
                .all_positions()
                .into_iter()
                .map(|r| r.timestamp)
                .collect::<Vec<_>>();
            assert_eq!(stored, vec![t(60), t(100)]);
        },
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_out_of_order_reports_within_window_are_all_stored() {
    test(|mut helper| async move {
        let feed = helper.source.connect().await;
        for s in [30, 10, 50, 20, 40] {
            feed.send(&PositionFrame::test_default(6, t(s))).await;
        }

        helper
            .wait_for("reports to be stored", |h| h.store.num_positions() == 5)
            .await;
        helper.shutdown().await;

        assert_eq!(helper.metrics.snapshot().late_dropped, 0);
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ingestion_resumes_after_disconnect() {
    test(|mut helper| async move {
        let feed = helper.source.connect().await;
        feed.send(&PositionFrame::test_default(7, t(0))).await;
        helper
            .wait_for("first report to be stored", |h| h.store.num_positions() == 1)
            .await;
        drop(feed);

        helper.source.refuse().await;
        let feed = helper.source.connect().await;
        feed.send(&PositionFrame::test_default(7, t(10))).await;

        helper
            .wait_for("second report to be stored", |h| h.store.num_positions() == 2)
            .await;
        helper.shutdown().await;

        let snapshot = helper.metrics.snapshot();
        assert_eq!(snapshot.connections, 2);
        assert_eq!(snapshot.connect_failures, 1);
        assert!(snapshot.disconnects >= 1);
        assert!(helper.source.attempts() >= 3);
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_batch_is_dead_lettered_after_exhausting_retries() {
    test(|mut helper| async move {
        helper.store.fail_next_inserts(3, true);

        let feed = helper.source.connect().await;
        feed.send(&PositionFrame::test_default(8, t(0))).await;
        helper
            .wait_for("batch to be dead-lettered", |h| h.dead_letters.len() == 1)
            .await;

        feed.send(&PositionFrame::test_default(8, t(10))).await;
        helper
            .wait_for("next batch to be stored", |h| h.store.num_positions() == 1)
            .await;
        helper.shutdown().await;

        let letters = helper.dead_letters.snapshot();
        assert_eq!(letters[0].attempts, 3);
        assert_eq!(letters[0].reports[0].timestamp, t(0));

        let snapshot = helper.metrics.snapshot();
        assert_eq!(snapshot.flush_failures, 1);
        assert_eq!(snapshot.dead_lettered_reports, 1);
        assert_eq!(helper.store.all_positions()[0].timestamp, t(10));
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_flushes_held_and_batched_reports() {
    test_with_settings(
        |settings| {
            settings.ordering.max_delay = Duration::from_secs(3600);
            settings.writer.flush_interval = Duration::from_secs(3600);
            settings.writer.batch_size = 1000;
        },
        |mut helper| async move {
            let feed = helper.source.connect().await;
            for s in 0..4 {
                feed.send(&PositionFrame::test_default(9, t(s))).await;
            }

            helper
                .wait_for("reports to be validated", |h| {
                    h.metrics.snapshot().accepted == 4
                })
                .await;
            assert_eq!(helper.store.num_positions(), 0);

            helper.shutdown().await;
            assert_eq!(helper.store.num_positions(), 4);
        },
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_final_quality_metric_is_persisted_on_shutdown() {
    test(|mut helper| async move {
        let started = Utc::now();
        let feed = helper.source.connect().await;
        feed.send(&PositionFrame::test_default(10, t(0))).await;
        feed.send(&PositionFrame::test_default(10, t(0))).await;
        feed.send_line(r#"{"mmsi":10}"#).await;

        helper
            .wait_for("frames to be processed", |h| {
                let snapshot = h.metrics.snapshot();
                snapshot.duplicates == 1 && snapshot.rejected == 1
            })
            .await;
        helper.shutdown().await;

        let range = DateRange::new(started, Utc::now()).unwrap();
        let metrics = helper.store.quality_metrics(&range).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].accepted, 2);
        assert_eq!(metrics[0].duplicate, 1);
        assert_eq!(metrics[0].rejected, 1);
        assert_eq!(
            helper.metrics.snapshot().rejected_for(RejectReason::MissingField),
            1
        );
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dead_letters_left_by_a_previous_run_are_replayed_on_startup() {
    let path = std::env::temp_dir().join(format!(
        "ais-consumer-startup-{}-{}.jsonl",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let previous_run = DeadLetterQueue::new(1, Some(path.clone()));
    previous_run
        .push(DeadLetter {
            failed_at: t(0),
            attempts: 5,
            error: "store unavailable".into(),
            reports: vec![PositionReport::test_default(mmsi(11), t(0))],
        })
        .await;

    let settings_path = path.to_string_lossy().into_owned();
    test_with_settings(
        move |settings| settings.writer.dead_letter_path = Some(settings_path),
        |mut helper| async move {
            helper
                .wait_for("dead letter to be replayed", |h| h.store.num_positions() == 1)
                .await;
            helper.shutdown().await;

            assert_eq!(helper.store.all_positions()[0].mmsi, mmsi(11));
            assert!(helper.dead_letters.is_empty());
        },
    )
    .await;

    assert!(!tokio::fs::try_exists(&path).await.unwrap());
}

use ais_consumer::models::PositionFrame;
use ais_core::{BoundingBox, Mmsi, QueryError};
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::helper::{TestHelper, test};

const MMSI: i64 = 123456789;

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn mmsi() -> Mmsi {
    Mmsi::new(MMSI).unwrap()
}

/// Three reports ten minutes apart in total, one nautical mile north per hop.
async fn ingest_track(helper: &TestHelper) {
    let feed = helper.source.connect().await;
    for (i, minutes) in [0, 5, 10].into_iter().enumerate() {
        let latitude = 60.0 + i as f64 / 60.0;
        feed.send(&PositionFrame::test_default(MMSI, t(minutes)).with_position(latitude, 5.0))
            .await;
    }
    feed.send(&PositionFrame::test_default(987654321, t(5)).with_position(-33.9, 18.4))
        .await;

    helper
        .wait_for("track to be stored", |h| h.store.num_positions() == 4)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_track_distance_and_speed_from_ingested_reports() {
    test(|mut helper| async move {
        ingest_track(&helper).await;

        let track = helper.queries.get_track(mmsi(), t(0), t(10)).await.unwrap();
        assert_eq!(
            track.iter().map(|r| r.timestamp).collect::<Vec<_>>(),
            vec![t(0), t(5), t(10)]
        );

        let distance = helper.queries.get_distance(mmsi(), t(0), t(10)).await.unwrap();
        assert!((distance.nautical_miles() - 2.0).abs() < 0.01);

        let speed = helper
            .queries
            .get_average_speed(mmsi(), t(0), t(10))
            .await
            .unwrap();
        assert!((speed.knots() - 12.0).abs() < 0.1);

        // Same distance spread over twice the interval.
        let speed = helper
            .queries
            .get_average_speed(mmsi(), t(0), t(20))
            .await
            .unwrap();
        assert!((speed.knots() - 6.0).abs() < 0.1);

        helper.shutdown().await;
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_vessels_in_region() {
    test(|mut helper| async move {
        ingest_track(&helper).await;

        let north_sea = BoundingBox::new(59.0, 4.0, 61.0, 6.0).unwrap();
        let found = helper
            .queries
            .get_vessels_in_region(north_sea, t(0), t(10))
            .await
            .unwrap();
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![mmsi()]);

        let found = helper
            .queries
            .get_vessels_in_region(north_sea, t(11), t(20))
            .await
            .unwrap();
        assert!(found.is_empty());

        helper.shutdown().await;
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_track_edge_cases() {
    test(|mut helper| async move {
        ingest_track(&helper).await;

        let empty = helper.queries.get_track(mmsi(), t(60), t(70)).await.unwrap();
        assert!(empty.is_empty());

        let distance = helper.queries.get_distance(mmsi(), t(5), t(5)).await.unwrap();
        assert_eq!(distance.meters(), 0.0);

        let unknown = Mmsi::new(111111111).unwrap();
        let err = helper.queries.get_track(unknown, t(0), t(10)).await.unwrap_err();
        assert!(matches!(err, QueryError::NotFound { .. }));

        let err = helper.queries.get_track(mmsi(), t(10), t(0)).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { .. }));

        let err = helper
            .queries
            .get_average_speed(mmsi(), t(5), t(5))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { .. }));

        helper.shutdown().await;
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_vessel_listing_and_statistics() {
    test(|mut helper| async move {
        ingest_track(&helper).await;

        let vessels = helper.queries.vessels().await.unwrap();
        assert_eq!(vessels.len(), 2);
        assert_eq!(vessels[0].mmsi, mmsi());
        assert_eq!(vessels[0].report_count, 3);

        let stats = helper
            .queries
            .get_vessel_statistics(mmsi(), t(0), t(10))
            .await
            .unwrap();
        assert_eq!(stats.report_count, 3);
        assert_eq!(stats.first_report, Some(t(0)));
        assert_eq!(stats.last_report, Some(t(10)));
        assert_eq!(stats.mean_reported_speed.map(|s| s.knots()), Some(10.5));

        let latest = helper.queries.get_latest_positions(10).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].timestamp, t(10));

        helper.shutdown().await;
    })
    .await;
}

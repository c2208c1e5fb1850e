use ais_core::{
    BoundingBox, DateRange, InsertOutcome, PositionInbound, PositionOutbound, PositionReport,
};
use chrono::{DateTime, Duration, DurationRound, TimeZone, Utc};

use crate::helper::test;

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn all_time() -> DateRange {
    DateRange::new(t(-100_000), t(100_000)).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a database, see AIS_TRACKER_TEST_DATABASE_URL"]
async fn test_reapplying_a_batch_is_a_no_op() {
    test(|helper| async move {
        let mmsi = helper.mmsi();
        let batch = vec![
            PositionReport::test_default(mmsi, t(0)),
            PositionReport::test_default(mmsi, t(5)),
        ];

        let first = helper.db.add_positions(&batch).await.unwrap();
        let second = helper.db.add_positions(&batch).await.unwrap();

        assert_eq!(
            first,
            InsertOutcome {
                inserted: 2,
                ignored: 0
            }
        );
        assert_eq!(
            second,
            InsertOutcome {
                inserted: 0,
                ignored: 2
            }
        );
        assert_eq!(helper.db.positions(mmsi, &all_time()).await.unwrap(), batch);

        let vessel = helper.db.vessel(mmsi).await.unwrap().unwrap();
        assert_eq!(vessel.report_count, 2);
        assert_eq!(vessel.first_seen, t(0));
        assert_eq!(vessel.last_seen, t(5));
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a database, see AIS_TRACKER_TEST_DATABASE_URL"]
async fn test_duplicate_keys_within_a_batch_store_one_row() {
    test(|helper| async move {
        let mmsi = helper.mmsi();
        let report = PositionReport::test_default(mmsi, t(0));

        let outcome = helper
            .db
            .add_positions(&[report.clone(), report.clone()])
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.ignored, 1);
        assert_eq!(
            helper.db.positions(mmsi, &all_time()).await.unwrap(),
            vec![report]
        );
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a database, see AIS_TRACKER_TEST_DATABASE_URL"]
async fn test_last_seen_never_moves_backwards() {
    test(|helper| async move {
        let mmsi = helper.mmsi();
        helper
            .db
            .add_positions(&[PositionReport::test_default(mmsi, t(10))])
            .await
            .unwrap();
        helper
            .db
            .add_positions(&[PositionReport::test_default(mmsi, t(2))])
            .await
            .unwrap();

        let vessel = helper.db.vessel(mmsi).await.unwrap().unwrap();
        assert_eq!(vessel.first_seen, t(2));
        assert_eq!(vessel.last_seen, t(10));
        assert_eq!(vessel.report_count, 2);
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a database, see AIS_TRACKER_TEST_DATABASE_URL"]
async fn test_positions_are_ascending_and_range_is_inclusive() {
    test(|helper| async move {
        let mmsi = helper.mmsi();
        let batch = vec![
            PositionReport::test_default(mmsi, t(10)),
            PositionReport::test_default(mmsi, t(0)),
            PositionReport::test_default(mmsi, t(5)),
            PositionReport::test_default(mmsi, t(15)),
        ];
        helper.db.add_positions(&batch).await.unwrap();

        let range = DateRange::new(t(0), t(10)).unwrap();
        let timestamps = helper
            .db
            .positions(mmsi, &range)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.timestamp)
            .collect::<Vec<_>>();

        assert_eq!(timestamps, vec![t(0), t(5), t(10)]);
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a database, see AIS_TRACKER_TEST_DATABASE_URL"]
async fn test_point_lookup() {
    test(|helper| async move {
        let mmsi = helper.mmsi();
        let now = Utc::now().duration_trunc(Duration::microseconds(1)).unwrap();
        let report = PositionReport::test_default(mmsi, now);
        helper.db.add_positions(&[report.clone()]).await.unwrap();

        assert_eq!(helper.db.position(mmsi, now).await.unwrap(), Some(report));
        assert_eq!(
            helper
                .db
                .position(mmsi, now + Duration::seconds(1))
                .await
                .unwrap(),
            None
        );
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a database, see AIS_TRACKER_TEST_DATABASE_URL"]
async fn test_vessels_in_region_across_antimeridian() {
    test(|helper| async move {
        let east = helper.mmsi();
        let west = helper.mmsi();
        let outside = helper.mmsi();
        helper
            .db
            .add_positions(&[
                PositionReport::test_default(east, t(0)).with_position(-40.0, 179.5),
                PositionReport::test_default(west, t(0)).with_position(-40.0, -179.5),
                PositionReport::test_default(outside, t(0)).with_position(-40.0, 0.0),
            ])
            .await
            .unwrap();

        let bbox = BoundingBox::new(-41.0, 179.0, -39.0, -179.0).unwrap();
        let range = DateRange::new(t(-1), t(1)).unwrap();
        let found = helper.db.vessels_in_region(&bbox, &range).await.unwrap();

        assert!(found.contains(&east));
        assert!(found.contains(&west));
        assert!(!found.contains(&outside));
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a database, see AIS_TRACKER_TEST_DATABASE_URL"]
async fn test_latest_positions_contain_newest_report_of_vessel() {
    test(|helper| async move {
        let mmsi = helper.mmsi();
        let far_future = Utc.with_ymd_and_hms(2090, 1, 1, 0, 0, 0).unwrap()
            + Duration::seconds(rand::random_range(0..1_000_000));
        let newest = PositionReport::test_default(mmsi, far_future);
        helper
            .db
            .add_positions(&[
                PositionReport::test_default(mmsi, far_future - Duration::minutes(1)),
                newest.clone(),
            ])
            .await
            .unwrap();

        let latest = helper.db.latest_positions(100_000).await.unwrap();
        let of_vessel = latest.into_iter().filter(|r| r.mmsi == mmsi).collect::<Vec<_>>();

        assert_eq!(of_vessel, vec![newest]);
    })
    .await;
}

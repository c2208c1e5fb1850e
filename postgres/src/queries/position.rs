use std::collections::BTreeSet;

use ais_core::{BoundingBox, DateRange, InsertOutcome, Mmsi, PositionReport};
use chrono::{DateTime, Utc};
use snafu::ResultExt;
use tracing::instrument;

use crate::{
    PostgresAdapter,
    error::{Result, error::DataConversionSnafu},
    models,
};

impl PostgresAdapter {
    /// Inserts the batch and folds the newly inserted rows into `vessels` in a single statement,
    /// rows already present are left untouched and do not count towards `report_count`.
    #[instrument(skip_all, fields(app.num_reports = reports.len()))]
    pub(crate) async fn add_positions_impl(
        &self,
        reports: &[PositionReport],
    ) -> Result<InsertOutcome> {
        if reports.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let len = reports.len();
        let mut mmsi = Vec::with_capacity(len);
        let mut timestamp = Vec::with_capacity(len);
        let mut latitude = Vec::with_capacity(len);
        let mut longitude = Vec::with_capacity(len);
        let mut speed_over_ground = Vec::with_capacity(len);
        let mut course = Vec::with_capacity(len);
        let mut heading = Vec::with_capacity(len);
        let mut source_payload = Vec::with_capacity(len);

        for r in reports {
            mmsi.push(r.mmsi.into_inner());
            timestamp.push(r.timestamp);
            latitude.push(r.latitude);
            longitude.push(r.longitude);
            speed_over_ground.push(r.speed_over_ground);
            course.push(r.course);
            heading.push(r.heading);
            source_payload.push(r.source_payload.clone());
        }

        let inserted: i64 = sqlx::query_scalar(
            r#"
WITH
    inserted AS (
        INSERT INTO
            position_reports (
                mmsi,
                timestamp,
                latitude,
                longitude,
                speed_over_ground,
                course,
                heading,
                source_payload
            )
        SELECT
            *
        FROM
            UNNEST(
                $1::INT[],
                $2::TIMESTAMPTZ[],
                $3::DOUBLE PRECISION[],
                $4::DOUBLE PRECISION[],
                $5::DOUBLE PRECISION[],
                $6::DOUBLE PRECISION[],
                $7::INT[],
                $8::TEXT[]
            )
        ON CONFLICT (mmsi, timestamp) DO NOTHING
        RETURNING
            mmsi,
            timestamp
    ),
    vessel_updates AS (
        INSERT INTO
            vessels (mmsi, first_seen, last_seen, report_count)
        SELECT
            mmsi,
            MIN(timestamp),
            MAX(timestamp),
            COUNT(*)
        FROM
            inserted
        GROUP BY
            mmsi
        ON CONFLICT (mmsi) DO UPDATE
        SET
            first_seen = LEAST(vessels.first_seen, EXCLUDED.first_seen),
            last_seen = GREATEST(vessels.last_seen, EXCLUDED.last_seen),
            report_count = vessels.report_count + EXCLUDED.report_count
        RETURNING
            mmsi
    )
SELECT
    COUNT(*)
FROM
    inserted
            "#,
        )
        .bind(&mmsi)
        .bind(&timestamp)
        .bind(&latitude)
        .bind(&longitude)
        .bind(&speed_over_ground)
        .bind(&course)
        .bind(&heading)
        .bind(&source_payload)
        .fetch_one(&self.pool)
        .await?;

        let inserted = inserted.max(0) as u64;
        Ok(InsertOutcome {
            inserted,
            ignored: len as u64 - inserted.min(len as u64),
        })
    }

    pub(crate) async fn position_impl(
        &self,
        mmsi: Mmsi,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<PositionReport>> {
        sqlx::query_as::<_, models::PositionReport>(
            r#"
SELECT
    mmsi,
    timestamp,
    latitude,
    longitude,
    speed_over_ground,
    course,
    heading,
    source_payload
FROM
    position_reports
WHERE
    mmsi = $1
    AND timestamp = $2
            "#,
        )
        .bind(mmsi.into_inner())
        .bind(timestamp)
        .fetch_optional(&self.pool)
        .await?
        .map(PositionReport::try_from)
        .transpose()
    }

    pub(crate) async fn positions_impl(
        &self,
        mmsi: Mmsi,
        range: &DateRange,
    ) -> Result<Vec<PositionReport>> {
        sqlx::query_as::<_, models::PositionReport>(
            r#"
SELECT
    mmsi,
    timestamp,
    latitude,
    longitude,
    speed_over_ground,
    course,
    heading,
    source_payload
FROM
    position_reports
WHERE
    mmsi = $1
    AND timestamp BETWEEN $2 AND $3
ORDER BY
    timestamp ASC
            "#,
        )
        .bind(mmsi.into_inner())
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PositionReport::try_from)
        .collect()
    }

    /// Runs one indexed box lookup per longitude span so boxes wrapping the antimeridian stay
    /// index friendly.
    pub(crate) async fn vessels_in_region_impl(
        &self,
        bbox: &BoundingBox,
        range: &DateRange,
    ) -> Result<Vec<Mmsi>> {
        let mut mmsis = BTreeSet::new();

        for (min_longitude, max_longitude) in bbox.longitude_spans() {
            let rows: Vec<i32> = sqlx::query_scalar(
                r#"
SELECT DISTINCT
    mmsi
FROM
    position_reports
WHERE
    point(longitude, latitude) <@ box(point($1, $2), point($3, $4))
    AND timestamp BETWEEN $5 AND $6
                "#,
            )
            .bind(min_longitude)
            .bind(bbox.min_latitude())
            .bind(max_longitude)
            .bind(bbox.max_latitude())
            .bind(range.start())
            .bind(range.end())
            .fetch_all(&self.pool)
            .await?;

            for m in rows {
                mmsis.insert(Mmsi::try_from(m).context(DataConversionSnafu)?);
            }
        }

        Ok(mmsis.into_iter().collect())
    }

    pub(crate) async fn latest_positions_impl(&self, limit: usize) -> Result<Vec<PositionReport>> {
        sqlx::query_as::<_, models::PositionReport>(
            r#"
SELECT
    p.mmsi,
    p.timestamp,
    p.latitude,
    p.longitude,
    p.speed_over_ground,
    p.course,
    p.heading,
    p.source_payload
FROM
    vessels v
    INNER JOIN position_reports p ON p.mmsi = v.mmsi
    AND p.timestamp = v.last_seen
ORDER BY
    v.last_seen DESC,
    v.mmsi ASC
LIMIT
    $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PositionReport::try_from)
        .collect()
    }
}

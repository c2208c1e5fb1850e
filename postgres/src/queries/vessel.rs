use ais_core::{Mmsi, Vessel};

use crate::{PostgresAdapter, error::Result, models};

impl PostgresAdapter {
    pub(crate) async fn vessel_impl(&self, mmsi: Mmsi) -> Result<Option<Vessel>> {
        sqlx::query_as::<_, models::Vessel>(
            r#"
SELECT
    mmsi,
    first_seen,
    last_seen,
    report_count
FROM
    vessels
WHERE
    mmsi = $1
            "#,
        )
        .bind(mmsi.into_inner())
        .fetch_optional(&self.pool)
        .await?
        .map(Vessel::try_from)
        .transpose()
    }

    pub(crate) async fn vessels_impl(&self) -> Result<Vec<Vessel>> {
        sqlx::query_as::<_, models::Vessel>(
            r#"
SELECT
    mmsi,
    first_seen,
    last_seen,
    report_count
FROM
    vessels
ORDER BY
    last_seen DESC,
    mmsi ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Vessel::try_from)
        .collect()
    }
}

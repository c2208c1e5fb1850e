use ais_core::{DateRange, QualityMetric};
use snafu::OptionExt;

use crate::{
    PostgresAdapter,
    error::{Result, error::CounterOverflowSnafu},
    models,
};

fn to_bigint(value: u64) -> Result<i64> {
    i64::try_from(value)
        .ok()
        .context(CounterOverflowSnafu { value })
}

impl PostgresAdapter {
    pub(crate) async fn add_quality_metric_impl(&self, metric: &QualityMetric) -> Result<()> {
        sqlx::query(
            r#"
INSERT INTO
    data_quality_metrics (
        interval_start,
        interval_end,
        accepted,
        duplicate,
        rejected,
        late_dropped,
        total,
        valid_percentage
    )
VALUES
    ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(metric.interval_start)
        .bind(metric.interval_end)
        .bind(to_bigint(metric.accepted)?)
        .bind(to_bigint(metric.duplicate)?)
        .bind(to_bigint(metric.rejected)?)
        .bind(to_bigint(metric.late_dropped)?)
        .bind(to_bigint(metric.total())?)
        .bind(metric.valid_percentage())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub(crate) async fn quality_metrics_impl(&self, range: &DateRange) -> Result<Vec<QualityMetric>> {
        let metrics = sqlx::query_as::<_, models::QualityMetric>(
            r#"
SELECT
    interval_start,
    interval_end,
    accepted,
    duplicate,
    rejected,
    late_dropped
FROM
    data_quality_metrics
WHERE
    interval_end BETWEEN $1 AND $2
ORDER BY
    interval_end ASC
            "#,
        )
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&self.pool)
        .await?;

        Ok(metrics.into_iter().map(QualityMetric::from).collect())
    }
}

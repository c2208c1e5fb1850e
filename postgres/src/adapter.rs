use ais_core::{
    BoundingBox, CoreResult, DateRange, InsertOutcome, Mmsi, PositionInbound, PositionOutbound,
    PositionReport, QualityMetric, Vessel,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    ConnectOptions, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};
use tracing::{info, instrument};

use crate::{
    error::Result,
    settings::{PsqlLogStatements, PsqlSettings},
};

#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
}

impl PostgresAdapter {
    /// Connects eagerly so an unreachable database fails at startup rather than on the first
    /// flush.
    pub async fn new(settings: &PsqlSettings) -> Result<PostgresAdapter> {
        let mut opts = PgConnectOptions::new()
            .username(&settings.username)
            .host(&settings.ip)
            .port(settings.port)
            .options([
                ("plan_cache_mode", "force_custom_plan".to_string()),
                (
                    "statement_timeout",
                    settings.statement_timeout.as_millis().to_string(),
                ),
            ]);

        if let Some(password) = &settings.password {
            opts = opts.password(password);
        }

        if let Some(db_name) = &settings.db_name {
            opts = opts.database(db_name);
        }

        if let Some(root_cert_path) = &settings.root_cert {
            opts = opts
                .ssl_root_cert(root_cert_path)
                .ssl_mode(PgSslMode::VerifyFull);
        }

        match settings.log_statements {
            PsqlLogStatements::Enable => (),
            PsqlLogStatements::Disable => {
                opts = opts.disable_statement_logging();
            }
        }

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.max(1))
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(opts)
            .await?;

        Ok(PostgresAdapter { pool })
    }

    /// Connects with explicit options, e.g. parsed from a database url.
    pub async fn connect_with(opts: PgConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;
        Ok(PostgresAdapter { pool })
    }

    #[instrument(skip(self))]
    pub async fn do_migrations(&self) -> Result<()> {
        sqlx::migrate!().set_ignore_missing(true).run(&self.pool).await?;
        info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl PositionInbound for PostgresAdapter {
    async fn add_positions(&self, reports: &[PositionReport]) -> CoreResult<InsertOutcome> {
        Ok(self.add_positions_impl(reports).await?)
    }

    async fn add_quality_metric(&self, metric: &QualityMetric) -> CoreResult<()> {
        Ok(self.add_quality_metric_impl(metric).await?)
    }
}

#[async_trait]
impl PositionOutbound for PostgresAdapter {
    async fn position(
        &self,
        mmsi: Mmsi,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Option<PositionReport>> {
        Ok(self.position_impl(mmsi, timestamp).await?)
    }

    async fn positions(&self, mmsi: Mmsi, range: &DateRange) -> CoreResult<Vec<PositionReport>> {
        Ok(self.positions_impl(mmsi, range).await?)
    }

    async fn vessel(&self, mmsi: Mmsi) -> CoreResult<Option<Vessel>> {
        Ok(self.vessel_impl(mmsi).await?)
    }

    async fn vessels(&self) -> CoreResult<Vec<Vessel>> {
        Ok(self.vessels_impl().await?)
    }

    async fn vessels_in_region(
        &self,
        bbox: &BoundingBox,
        range: &DateRange,
    ) -> CoreResult<Vec<Mmsi>> {
        Ok(self.vessels_in_region_impl(bbox, range).await?)
    }

    async fn latest_positions(&self, limit: usize) -> CoreResult<Vec<PositionReport>> {
        Ok(self.latest_positions_impl(limit).await?)
    }

    async fn quality_metrics(&self, range: &DateRange) -> CoreResult<Vec<QualityMetric>> {
        Ok(self.quality_metrics_impl(range).await?)
    }
}

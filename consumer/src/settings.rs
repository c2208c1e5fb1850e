use std::time::Duration;

use config::{Config, File};
use postgres::PsqlSettings;
use serde::Deserialize;
use snafu::ResultExt;
use strum::{AsRefStr, EnumString};
use tracing_subscriber::EnvFilter;

use crate::error::{
    Result,
    error::{InvalidSettingSnafu, TracingSnafu},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum Environment {
    #[serde(alias = "local")]
    Local,
    #[serde(alias = "test")]
    Test,
    #[serde(alias = "development")]
    Development,
    #[serde(alias = "production")]
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub store: StoreSettings,
    pub source: SourceSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub ordering: OrderingSettings,
    #[serde(default)]
    pub writer: WriterSettings,
    /// Capacity of each queue between two pipeline stages.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(with = "humantime_serde", default = "default_quality_report_interval")]
    pub quality_report_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub postgres: Option<PsqlSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Newline delimited frames over a long lived http response.
    Http,
    /// One frame per websocket text message.
    WebSocket,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub transport: Transport,
    pub url: String,
    #[serde(default)]
    pub backoff: BackoffSettings,
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Silence on an established connection after which it is considered dead.
    #[serde(with = "humantime_serde", default = "default_read_timeout")]
    pub read_timeout: Duration,
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// How far ahead of the arrival time a report timestamp may lie.
    #[serde(with = "humantime_serde")]
    pub max_clock_skew: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderingSettings {
    pub num_shards: usize,
    /// Reports held per vessel before the oldest are forced out.
    pub window_size: usize,
    /// Longest time a report is held before it is released.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// How far behind the watermark released timestamps are remembered for duplicate detection.
    #[serde(with = "humantime_serde")]
    pub dedup_horizon: Duration,
    #[serde(with = "humantime_serde")]
    pub vessel_idle_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    pub batch_size: usize,
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Attempts per batch including the first one.
    pub max_attempts: usize,
    #[serde(with = "humantime_serde")]
    pub retry_min_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,
    /// Upper bound for a single store call.
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    pub dead_letter_capacity: usize,
    pub dead_letter_path: Option<String>,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_clock_skew: Duration::from_secs(30),
        }
    }
}

impl Default for OrderingSettings {
    fn default() -> Self {
        Self {
            num_shards: 16,
            window_size: 32,
            max_delay: Duration::from_secs(10),
            dedup_horizon: Duration::from_secs(10 * 60),
            vessel_idle_timeout: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            flush_interval: Duration::from_secs(5),
            max_attempts: 5,
            retry_min_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(5),
            store_timeout: Duration::from_secs(30),
            dead_letter_capacity: 64,
            dead_letter_path: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_channel_capacity() -> usize {
    10_000
}

fn default_quality_report_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_frame_length() -> usize {
    4096
}

impl Settings {
    /// Loads `config/{APP_ENVIRONMENT}.yml` with `AIS_CONSUMER__*` environment overrides.
    pub fn new() -> Result<Settings> {
        let environment = match std::env::var("APP_ENVIRONMENT") {
            Ok(value) => value.parse::<Environment>().map_err(|e| {
                InvalidSettingSnafu {
                    setting: "APP_ENVIRONMENT",
                    reason: format!("'{value}': {e}"),
                }
                .build()
            })?,
            Err(_) => Environment::Local,
        };

        let settings = Config::builder()
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    environment.as_ref().to_lowercase()
                ))
                .required(true),
            )
            .add_source(
                config::Environment::with_prefix("AIS_CONSUMER")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("environment", environment.as_ref())?
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Rejects configurations the pipeline cannot run with, these are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        fn invalid(setting: &'static str, reason: &str) -> Result<()> {
            InvalidSettingSnafu { setting, reason }.fail()
        }

        let positive = [
            ("channel_capacity", self.channel_capacity),
            ("source.max_frame_length", self.source.max_frame_length),
            ("ordering.num_shards", self.ordering.num_shards),
            ("ordering.window_size", self.ordering.window_size),
            ("writer.batch_size", self.writer.batch_size),
            ("writer.max_attempts", self.writer.max_attempts),
        ];
        for (setting, value) in positive {
            if value == 0 {
                return invalid(setting, "must be greater than zero");
            }
        }

        let non_zero_durations = [
            ("quality_report_interval", self.quality_report_interval),
            ("source.backoff.min_delay", self.source.backoff.min_delay),
            ("source.connect_timeout", self.source.connect_timeout),
            ("source.read_timeout", self.source.read_timeout),
            ("ordering.max_delay", self.ordering.max_delay),
            ("ordering.sweep_interval", self.ordering.sweep_interval),
            ("writer.flush_interval", self.writer.flush_interval),
            ("writer.store_timeout", self.writer.store_timeout),
        ];
        for (setting, value) in non_zero_durations {
            if value.is_zero() {
                return invalid(setting, "must be a non-zero duration");
            }
        }

        if self.source.backoff.min_delay > self.source.backoff.max_delay {
            return invalid("source.backoff", "min_delay is above max_delay");
        }
        if self.writer.retry_min_delay > self.writer.retry_max_delay {
            return invalid("writer", "retry_min_delay is above retry_max_delay");
        }
        if self.ordering.vessel_idle_timeout < self.ordering.max_delay {
            return invalid("ordering.vessel_idle_timeout", "must be at least max_delay");
        }
        if chrono::Duration::from_std(self.validation.max_clock_skew).is_err() {
            return invalid("validation.max_clock_skew", "out of range");
        }
        if chrono::Duration::from_std(self.ordering.dedup_horizon).is_err() {
            return invalid("ordering.dedup_horizon", "out of range");
        }
        if reqwest::Url::parse(&self.source.url).is_err() {
            return invalid("source.url", "not a valid url");
        }
        if self.store.kind == StoreKind::Postgres && self.store.postgres.is_none() {
            return invalid("store.postgres", "required when store.kind is postgres");
        }

        Ok(())
    }

    /// Installs the global `tracing` subscriber, `RUST_LOG` takes precedence over `log_level`.
    pub fn init_tracer(&self) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .map_err(|e| Box::new(e) as _)
            .context(TracingSnafu)?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .context(TracingSnafu)
    }
}

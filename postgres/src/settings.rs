use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum PsqlLogStatements {
    Enable,
    #[default]
    Disable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PsqlSettings {
    pub ip: String,
    pub port: u16,
    pub db_name: Option<String>,
    pub username: String,
    pub password: Option<String>,
    pub max_connections: u32,
    pub root_cert: Option<String>,
    #[serde(default)]
    pub log_statements: PsqlLogStatements,
    /// How long to wait for a pooled connection before giving up.
    #[serde(with = "humantime_serde", default = "default_acquire_timeout")]
    pub acquire_timeout: Duration,
    /// Server side upper bound for any single statement.
    #[serde(with = "humantime_serde", default = "default_statement_timeout")]
    pub statement_timeout: Duration,
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_statement_timeout() -> Duration {
    Duration::from_secs(30)
}

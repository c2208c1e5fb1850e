#![deny(rust_2018_idioms)]

use ais_consumer::settings::{Settings, StoreKind, Transport};
use config::{Config, File};

pub mod helper;
pub mod pipeline;
pub mod queries;

fn load(environment: &str) -> Settings {
    Config::builder()
        .add_source(
            File::with_name(&format!("config/{}.yml", environment.to_lowercase())).required(true),
        )
        .set_override("environment", environment)
        .unwrap()
        .build()
        .unwrap()
        .try_deserialize::<Settings>()
        .unwrap()
}

#[test]
fn test_local_settings_are_valid() {
    let settings = load("Local");
    settings.validate().unwrap();
    assert_eq!(settings.store.kind, StoreKind::Postgres);
}

#[test]
fn test_test_settings_are_valid() {
    let settings = load("Test");
    settings.validate().unwrap();
    assert_eq!(settings.store.kind, StoreKind::Memory);
    assert_eq!(settings.ordering.window_size, 8);
}

#[test]
fn test_development_settings_are_valid() {
    let settings = load("Development");
    settings.validate().unwrap();
    assert_eq!(settings.source.transport, Transport::WebSocket);
}

#[test]
fn test_production_settings_are_valid() {
    load("Production").validate().unwrap();
}

#[test]
fn test_unset_settings_use_documented_defaults() {
    let settings = load("Development");

    assert_eq!(settings.channel_capacity, 10_000);
    assert_eq!(settings.validation.max_clock_skew.as_secs(), 30);
    assert_eq!(settings.ordering.num_shards, 16);
    assert_eq!(settings.ordering.window_size, 32);
    assert_eq!(settings.ordering.max_delay.as_secs(), 10);
    assert_eq!(settings.writer.batch_size, 500);
    assert_eq!(settings.writer.max_attempts, 5);
    assert_eq!(settings.source.max_frame_length, 4096);
}

#[test]
fn test_invalid_settings_are_rejected() {
    let mut settings = helper::test_settings();
    settings.writer.batch_size = 0;
    assert!(settings.validate().is_err());

    let mut settings = helper::test_settings();
    settings.store.kind = StoreKind::Postgres;
    assert!(settings.validate().is_err());

    let mut settings = helper::test_settings();
    settings.source.backoff.min_delay = settings.source.backoff.max_delay * 2;
    assert!(settings.validate().is_err());
}

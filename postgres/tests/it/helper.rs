use std::{future::Future, str::FromStr};

use ais_core::Mmsi;
use postgres::PostgresAdapter;
use sqlx::postgres::PgConnectOptions;

pub const TEST_DATABASE_URL: &str = "AIS_TRACKER_TEST_DATABASE_URL";

pub struct TestHelper {
    pub db: PostgresAdapter,
}

impl TestHelper {
    /// A random mmsi, tests share one database so every test works on its own vessels.
    pub fn mmsi(&self) -> Mmsi {
        Mmsi::new(rand::random_range(100_000_000..=999_999_999)).unwrap()
    }
}

/// Runs `test_closure` against the database named by `AIS_TRACKER_TEST_DATABASE_URL`.
///
/// The tests using this are `#[ignore]`d, run them with `cargo test -- --ignored` once the
/// variable points at a database.
pub async fn test<T, Fut>(test_closure: T)
where
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    let url = std::env::var(TEST_DATABASE_URL)
        .unwrap_or_else(|_| panic!("{TEST_DATABASE_URL} must point at a test database"));

    let opts = PgConnectOptions::from_str(&url).unwrap();
    let db = PostgresAdapter::connect_with(opts, 2).await.unwrap();
    db.do_migrations().await.unwrap();

    test_closure(TestHelper { db }).await;
}

use ais_core::MmsiError;
use snafu::{Location, Snafu};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Snafu, Debug)]
#[snafu(module, visibility(pub))]
pub enum Error {
    #[snafu(display("A database operation failed"))]
    Database {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: sqlx::Error,
    },
    #[snafu(display("Failed to run migrations"))]
    Migrate {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: sqlx::migrate::MigrateError,
    },
    #[snafu(display("Stored mmsi could not be converted"))]
    DataConversion {
        #[snafu(implicit)]
        location: Location,
        source: MmsiError,
    },
    #[snafu(display("Counter value '{value}' does not fit the column type"))]
    CounterOverflow {
        #[snafu(implicit)]
        location: Location,
        value: u64,
    },
}

impl Error {
    /// Whether the failure is likely to go away by itself, lost connections, pool exhaustion,
    /// timeouts, serialization failures and the server shutting down.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database { error, .. } => is_transient_sqlx(error),
            Error::Migrate { .. } | Error::DataConversion { .. } | Error::CounterOverflow { .. } => {
                false
            }
        }
    }
}

fn is_transient_sqlx(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(e) => e.code().is_some_and(|code| {
            // connection_exception, serialization_failure, deadlock_detected,
            // operator_intervention, too_many_connections
            code.starts_with("08")
                || code.starts_with("57P")
                || matches!(code.as_ref(), "40001" | "40P01" | "53300")
        }),
        _ => false,
    }
}

impl From<sqlx::Error> for Error {
    #[track_caller]
    fn from(value: sqlx::Error) -> Self {
        let location = std::panic::Location::caller();
        Error::Database {
            location: Location::new(location.file(), location.line(), location.column()),
            error: value,
        }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    #[track_caller]
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        let location = std::panic::Location::caller();
        Error::Migrate {
            location: Location::new(location.file(), location.line(), location.column()),
            error: value,
        }
    }
}

impl From<Error> for ais_core::Error {
    #[track_caller]
    fn from(value: Error) -> Self {
        if value.is_transient() {
            ais_core::Error::unavailable(value)
        } else {
            ais_core::Error::unexpected(value)
        }
    }
}

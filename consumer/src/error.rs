use ais_core::BoxedError;
use snafu::{Location, Snafu};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Snafu, Debug)]
#[snafu(module, visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to load configuration"))]
    Config {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: config::ConfigError,
    },
    #[snafu(display("Invalid setting '{setting}': {reason}"))]
    InvalidSetting {
        #[snafu(implicit)]
        location: Location,
        setting: &'static str,
        reason: String,
    },
    #[snafu(display("Failed to initialize the store"))]
    Store {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: postgres::Error,
    },
    #[snafu(display("Failed to initialize tracing"))]
    Tracing {
        #[snafu(implicit)]
        location: Location,
        source: BoxedError,
    },
    #[snafu(display("IO error"))]
    Io {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: std::io::Error,
    },
    #[snafu(display("A pipeline task panicked or was aborted"))]
    Join {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: tokio::task::JoinError,
    },
    #[snafu(display("Failed to connect to '{url}'"))]
    Connect {
        #[snafu(implicit)]
        location: Location,
        url: String,
        source: BoxedError,
    },
    #[snafu(display("Stream source '{url}' responded with status '{status}', body: '{body}'"))]
    FailedRequest {
        #[snafu(implicit)]
        location: Location,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[snafu(display("Http error"))]
    Http {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: reqwest::Error,
    },
    #[snafu(display("Websocket error"))]
    WebSocket {
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        error: Box<tokio_tungstenite::tungstenite::Error>,
    },
    #[snafu(display("Frame exceeded the maximum length of {max_length} bytes"))]
    FrameTooLong {
        #[snafu(implicit)]
        location: Location,
        max_length: usize,
    },
    #[snafu(display("Frame is not valid utf-8"))]
    InvalidUtf8 {
        #[snafu(implicit)]
        location: Location,
    },
}

impl Error {
    /// Broken framing of a single frame, the connection itself is still usable.
    pub fn is_framing(&self) -> bool {
        matches!(self, Error::FrameTooLong { .. } | Error::InvalidUtf8 { .. })
    }
}

impl From<config::ConfigError> for Error {
    #[track_caller]
    fn from(value: config::ConfigError) -> Self {
        let location = std::panic::Location::caller();
        Error::Config {
            location: Location::new(location.file(), location.line(), location.column()),
            error: value,
        }
    }
}

impl From<postgres::Error> for Error {
    #[track_caller]
    fn from(value: postgres::Error) -> Self {
        let location = std::panic::Location::caller();
        Error::Store {
            location: Location::new(location.file(), location.line(), location.column()),
            error: value,
        }
    }
}

impl From<reqwest::Error> for Error {
    #[track_caller]
    fn from(value: reqwest::Error) -> Self {
        let location = std::panic::Location::caller();
        Error::Http {
            location: Location::new(location.file(), location.line(), location.column()),
            error: value,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    #[track_caller]
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        let location = std::panic::Location::caller();
        Error::WebSocket {
            location: Location::new(location.file(), location.line(), location.column()),
            error: Box::new(value),
        }
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(value: std::io::Error) -> Self {
        let location = std::panic::Location::caller();
        Error::Io {
            location: Location::new(location.file(), location.line(), location.column()),
            error: value,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    #[track_caller]
    fn from(value: tokio::task::JoinError) -> Self {
        let location = std::panic::Location::caller();
        Error::Join {
            location: Location::new(location.file(), location.line(), location.column()),
            error: value,
        }
    }
}

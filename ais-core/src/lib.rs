#![deny(rust_2018_idioms)]

mod domain;
mod error;
mod geodesy;
mod metrics;
mod ports;
mod queries;

pub use domain::*;
pub use error::*;
pub use geodesy::*;
pub use metrics::*;
pub use ports::*;
pub use queries::*;

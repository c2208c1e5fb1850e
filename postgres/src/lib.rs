#![deny(rust_2018_idioms)]

mod adapter;
mod error;
mod models;
mod queries;
mod settings;

pub use adapter::*;
pub use error::*;
pub use settings::*;

#![deny(rust_2018_idioms)]

pub mod dead_letter;
pub mod error;
pub mod ingestor;
pub mod models;
pub mod ordering;
pub mod quality;
pub mod retry;
pub mod settings;
pub mod source;
pub mod startup;
pub mod validator;
pub mod writer;

//! Enrich a JSON dataset of cities with indicator series pulled from public
//! APIs (air quality, GDP per capita, population, country metadata).
//!
//! Every pipeline is the same linear pass: load the record store, fetch one
//! series per record, normalise it over a fixed period set, merge it into the
//! record and persist the whole store once at the end.

pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod store;

pub use config::Config;
pub use error::{FetchError, StoreError};
pub use store::{Record, RecordStore};

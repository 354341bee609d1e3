//! Hourly and daily rollups of timestamped kWh readings.
//!
//! Two ways to use it:
//! - batch: [`aggregate_raw`] a JSON document and write the CSV reports with
//!   [`report::save_reports`];
//! - service: keep readings in a [`Store`] and let a [`Scheduler`] refresh the
//!   current hourly and daily buckets in the background while [`routes`]
//!   serves them over HTTP.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod store;
pub mod window;

pub use aggregate::{aggregate, aggregate_raw, Aggregation, Totals};
pub use config::Config;
pub use error::{ParseError, StoreError};
pub use models::{load_raw_readings, parse_readings, parse_timestamp, Bucket, RawReading, Reading};
pub use scheduler::{Clock, Scheduler, SystemClock};
pub use store::Store;
pub use window::{Granularity, Window};

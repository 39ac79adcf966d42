//! # Barry Price - hourly electricity prices from Barry Energy
//!
//! Polls the Barry Energy JSON-RPC API for the total kWh price of each hour,
//! keeps an hour-keyed cache covering today and (once published) tomorrow,
//! and presents it as a price sensor.
//!
//! ## Features
//!
//! - **Incremental refresh**: only missing hours are fetched, a bounded batch
//!   per cycle, with the current hour always refreshed first
//! - **Local days**: day boundaries and hour keys follow the configured time
//!   zone, DST included
//! - **Stale data over no data**: a failed refresh keeps the last good cache
//! - **Web Interface**: REST API for the sensor, prices and refresh status
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `clock`: Time source and local-day helpers
//! - `cache`: Hour-keyed price cache and missing-hour selection
//! - `source`: Price source abstraction
//! - `barry`: Barry Energy JSON-RPC client
//! - `coordinator`: Batch fetching and the price refresh cycle
//! - `scheduler`: Periodic single-flight refresh with stale-data retention
//! - `sensor`: Sensor state and attributes
//! - `setup`: Token check and metering point selection
//! - `persistence`: Stored entry
//! - `web`: HTTP server and REST API

pub mod barry;
pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod scheduler;
pub mod sensor;
pub mod setup;
pub mod source;
#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used types
pub use cache::{PriceCache, PricePoint};
pub use config::Config;
pub use error::{BarryError, Result};

//! Price source capability
//!
//! Anything that can quote the price of one hour for a metering point and
//! list the account's metering points. The Barry JSON-RPC client is the
//! production implementation; tests plug in scripted sources.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A metering point on the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeteringPoint {
    pub mpid: String,
    /// First address line
    pub address: String,
    /// Price code, used as the price zone
    pub price_code: String,
    /// ISO country code, e.g. "DK"
    pub country: Option<String>,
}

#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    /// Total price (currency/kWh) for `[start, end)` at `mpid`
    async fn fetch_price(&self, start: DateTime<Utc>, end: DateTime<Utc>, mpid: &str)
    -> Result<f64>;

    async fn metering_points(&self) -> Result<Vec<MeteringPoint>>;
}

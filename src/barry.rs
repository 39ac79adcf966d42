//! Barry Energy API integration
//!
//! JSON-RPC client for the Barry open API: metering point discovery and
//! per-hour total kWh prices.

pub mod client;
pub mod types;

pub use client::{BarryClient, parse_metering_points, parse_rpc_result, parse_total_price};

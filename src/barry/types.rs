use crate::source::MeteringPoint;
use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// One entry of `getTotalKwHPrice`
#[derive(Debug, Clone, Deserialize)]
pub struct TotalPriceEntry {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    pub value: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireAddress {
    #[serde(default)]
    pub line1: Option<String>,
}

/// One entry of `getMeteringPoints`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMeteringPoint {
    pub mpid: String,
    #[serde(default)]
    pub address: Option<WireAddress>,
    #[serde(default)]
    pub price_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl From<WireMeteringPoint> for MeteringPoint {
    fn from(wire: WireMeteringPoint) -> Self {
        Self {
            mpid: wire.mpid,
            address: wire
                .address
                .and_then(|a| a.line1)
                .unwrap_or_default(),
            price_code: wire.price_code.unwrap_or_default(),
            country: wire.country,
        }
    }
}

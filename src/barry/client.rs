use crate::barry::types::{
    RpcError, RpcRequest, RpcResponse, TotalPriceEntry, WireMeteringPoint,
};
use crate::config::BarryConfig;
use crate::error::{BarryError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::source::{MeteringPoint, PriceSource};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const METHOD_PREFIX: &str = "co.getbarry.api.v1.OpenApiController";

/// JSON-RPC error code the API uses for a rejected token
const RPC_UNAUTHORIZED: i64 = -32001;

/// Barry JSON-RPC client
pub struct BarryClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: String,
    next_id: AtomicU64,
    logger: StructuredLogger,
}

impl BarryClient {
    pub fn new(access_token: &str, endpoint: &str, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            access_token: access_token.trim().to_string(),
            next_id: AtomicU64::new(0),
            logger: get_logger("barry"),
        })
    }

    pub fn from_config(cfg: &BarryConfig) -> Result<Self> {
        Self::new(
            &cfg.api_token,
            &cfg.endpoint,
            Duration::from_secs(cfg.request_timeout_seconds.max(1)),
        )
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<String> {
        let full_method = format!("{}.{}", METHOD_PREFIX, method);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: &full_method,
            params,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("barry-price/", env!("APP_VERSION")))
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.logger
                .error(&format!("Barry API rejected the token: {}", status));
            return Err(BarryError::auth(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            self.logger
                .error(&format!("Barry API error on {}: {}", method, status));
            return Err(BarryError::api(format!("HTTP {} from {}", status, method)));
        }

        Ok(resp.text().await?)
    }
}

#[async_trait::async_trait]
impl PriceSource for BarryClient {
    async fn fetch_price(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        mpid: &str,
    ) -> Result<f64> {
        self.logger.trace(&format!("Fetching total price for {}", start));
        let params = serde_json::json!([
            mpid,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        ]);
        let body = self.call("getTotalKwHPrice", params).await?;
        parse_total_price(&body, start)
    }

    async fn metering_points(&self) -> Result<Vec<MeteringPoint>> {
        let body = self
            .call("getMeteringPoints", serde_json::json!([]))
            .await?;
        parse_metering_points(&body)
    }
}

fn rpc_error_to_barry(err: RpcError) -> BarryError {
    if err.code == RPC_UNAUTHORIZED {
        BarryError::auth(err.message)
    } else {
        BarryError::api(format!("JSON-RPC error {}: {}", err.code, err.message))
    }
}

/// Unwrap a JSON-RPC response body into its `result`
pub fn parse_rpc_result<T: DeserializeOwned>(body: &str) -> Result<T> {
    let response: RpcResponse<T> = serde_json::from_str(body)?;
    if let Some(err) = response.error {
        return Err(rpc_error_to_barry(err));
    }
    response
        .result
        .ok_or_else(|| BarryError::api("JSON-RPC response without result"))
}

/// Price for the hour starting at `hour` from a `getTotalKwHPrice` body.
///
/// Only the entry starting exactly at `hour` counts; prices of other hours
/// are never filed under it.
pub fn parse_total_price(body: &str, hour: DateTime<Utc>) -> Result<f64> {
    let entries: Vec<TotalPriceEntry> = parse_rpc_result(body)?;
    let entry = entries
        .iter()
        .find(|e| {
            DateTime::parse_from_rfc3339(&e.start)
                .map(|t| t.with_timezone(&Utc) == hour)
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            BarryError::api(format!(
                "No price published for {} ({} other entries)",
                hour,
                entries.len()
            ))
        })?;
    if !entry.value.is_finite() {
        return Err(BarryError::api(format!(
            "Non-finite price for {}",
            entry.start
        )));
    }
    Ok(entry.value)
}

/// Metering points from a `getMeteringPoints` body
pub fn parse_metering_points(body: &str) -> Result<Vec<MeteringPoint>> {
    let wire: Vec<WireMeteringPoint> = parse_rpc_result(body)?;
    Ok(wire.into_iter().map(MeteringPoint::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn total_price_prefers_matching_hour() {
        let body = r#"{"jsonrpc":"2.0","id":0,"result":[
            {"start":"2024-01-01T09:00:00.000Z","end":"2024-01-01T10:00:00.000Z","value":0.11,"currency":"DKK"},
            {"start":"2024-01-01T10:00:00.000Z","end":"2024-01-01T11:00:00.000Z","value":0.12,"currency":"DKK"}
        ]}"#;
        let price = parse_total_price(body, utc("2024-01-01T10:00:00Z")).unwrap();
        assert!((price - 0.12).abs() < 1e-9);
    }

    #[test]
    fn total_price_matches_offset_starts() {
        let body = r#"{"jsonrpc":"2.0","id":0,"result":[
            {"start":"2024-01-01T11:00:00+01:00","value":0.5}
        ]}"#;
        let price = parse_total_price(body, utc("2024-01-01T10:00:00Z")).unwrap();
        assert!((price - 0.5).abs() < 1e-9);
    }

    #[test]
    fn price_of_another_hour_is_rejected() {
        let body = r#"{"jsonrpc":"2.0","id":0,"result":[
            {"start":"2024-01-01T03:00:00Z","value":9.99},
            {"start":"2024-01-01T10:00:00+01:00","value":0.5}
        ]}"#;
        let err = parse_total_price(body, utc("2024-01-01T10:00:00Z")).unwrap_err();
        assert!(matches!(err, BarryError::Api { .. }));
    }

    #[test]
    fn response_without_result_is_api_error() {
        let body = r#"{"jsonrpc":"2.0","id":0}"#;
        let err = parse_total_price(body, utc("2024-01-01T10:00:00Z")).unwrap_err();
        assert!(matches!(err, BarryError::Api { .. }));
    }

    #[test]
    fn empty_result_is_api_error() {
        let body = r#"{"jsonrpc":"2.0","id":0,"result":[]}"#;
        let err = parse_total_price(body, utc("2024-01-01T10:00:00Z")).unwrap_err();
        assert!(matches!(err, BarryError::Api { .. }));
    }

    #[test]
    fn rpc_error_classification() {
        let body = r#"{"jsonrpc":"2.0","id":0,"error":{"code":-32001,"message":"Unauthorized"}}"#;
        let err = parse_metering_points(body).unwrap_err();
        assert!(matches!(err, BarryError::Auth { .. }));

        let body = r#"{"jsonrpc":"2.0","id":0,"error":{"code":-32602,"message":"Invalid params"}}"#;
        let err = parse_metering_points(body).unwrap_err();
        assert!(matches!(err, BarryError::Api { .. }));

        // Only the code decides; the wording of the message does not
        let body = r#"{"jsonrpc":"2.0","id":0,"error":{"code":-32602,"message":"invalid token for mpid parameter"}}"#;
        let err = parse_metering_points(body).unwrap_err();
        assert!(matches!(err, BarryError::Api { .. }));
    }

    #[test]
    fn garbage_body_is_serialization_error() {
        let err = parse_metering_points("<html>").unwrap_err();
        assert!(matches!(err, BarryError::Serialization { .. }));
    }

    #[test]
    fn metering_points_are_flattened() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":[
            {"mpid":"571313100000000001","address":{"line1":"Vesterbrogade 1","city":"Kobenhavn"},
             "priceCode":"DK_NORDPOOL_SPOT_DK2","country":"DK"},
            {"mpid":"ES0000000000000001","priceCode":"ES_OMIE"}
        ]}"#;
        let points = parse_metering_points(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].address, "Vesterbrogade 1");
        assert_eq!(points[0].price_code, "DK_NORDPOOL_SPOT_DK2");
        assert_eq!(points[0].country.as_deref(), Some("DK"));
        assert_eq!(points[1].address, "");
        assert_eq!(points[1].country, None);
    }
}

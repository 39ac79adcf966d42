use axum::{Json, Router, http::HeaderMap, http::StatusCode, response::IntoResponse, routing::post};
use barry_price::barry::BarryClient;
use barry_price::error::BarryError;
use barry_price::source::PriceSource;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use std::time::Duration as StdDuration;

const TOKEN: &str = "test-token";

async fn rpc(headers: HeaderMap, Json(req): Json<Value>) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
    }

    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default();
    let result = if method.ends_with(".getMeteringPoints") {
        json!([{
            "mpid": "571313100000000001",
            "address": {"line1": "Vej 1"},
            "priceCode": "DK1",
            "country": "DK"
        }])
    } else if method.ends_with(".getTotalKwHPrice") {
        let start = req["params"][1].as_str().unwrap_or_default();
        if start.starts_with("2030") {
            json!([])
        } else {
            json!([{"start": start, "end": req["params"][2], "value": 1.25, "currency": "DKK"}])
        }
    } else {
        return Json(json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "Method not found"}}))
            .into_response();
    };
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
}

async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().route("/json-rpc", post(rpc)))
            .await
            .unwrap();
    });
    format!("http://{}/json-rpc", addr)
}

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[tokio::test]
async fn fetches_price_and_metering_points() {
    let endpoint = spawn_server().await;
    let client = BarryClient::new(TOKEN, &endpoint, StdDuration::from_secs(5)).unwrap();

    let points = client.metering_points().await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].address, "Vej 1");
    assert_eq!(points[0].price_code, "DK1");

    let start = utc("2024-01-01T10:00:00Z");
    let price = client
        .fetch_price(start, start + Duration::hours(1), "571313100000000001")
        .await
        .unwrap();
    assert!((price - 1.25).abs() < f64::EPSILON);
}

#[tokio::test]
async fn empty_price_list_is_an_api_error() {
    let endpoint = spawn_server().await;
    let client = BarryClient::new(TOKEN, &endpoint, StdDuration::from_secs(5)).unwrap();
    let start = utc("2030-01-01T10:00:00Z");
    let err = client
        .fetch_price(start, start + Duration::hours(1), "571313100000000001")
        .await
        .unwrap_err();
    assert!(matches!(err, BarryError::Api { .. }));
}

#[tokio::test]
async fn wrong_token_is_auth_error() {
    let endpoint = spawn_server().await;
    let client = BarryClient::new("nope", &endpoint, StdDuration::from_secs(5)).unwrap();
    let err = client.metering_points().await.unwrap_err();
    assert!(matches!(err, BarryError::Auth { .. }));
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = BarryClient::new(TOKEN, &format!("http://{}/json-rpc", addr), StdDuration::from_secs(5))
        .unwrap();
    let err = client.metering_points().await.unwrap_err();
    assert!(matches!(err, BarryError::Network { .. }));
}

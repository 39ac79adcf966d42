//! Axum HTTP server exposing the price sensor

use crate::cache::PriceCache;
use crate::clock::Clock;
use crate::scheduler::UpdateState;
use crate::sensor::PriceSensor;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono_tz::Tz;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub updates: watch::Receiver<Arc<UpdateState<PriceCache>>>,
    pub sensor: Arc<PriceSensor>,
    pub clock: Arc<dyn Clock>,
    pub tz: Tz,
}

impl AppState {
    fn snapshot(&self) -> Arc<UpdateState<PriceCache>> {
        self.updates.borrow().clone()
    }
}

#[derive(Debug, Serialize)]
pub struct PriceEntry {
    pub start: String,
    pub local_start: String,
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub last_update_success: bool,
    pub last_error: Option<String>,
    pub last_refresh: Option<String>,
    pub success_count: u64,
    pub failure_count: u64,
    pub cached_hours: usize,
}

fn not_ready() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({"error": "no price data yet"})),
    )
        .into_response()
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn sensor(State(state): State<AppState>) -> Response {
    let snapshot = state.snapshot();
    let Some(cache) = snapshot.data.as_deref() else {
        return not_ready();
    };
    Json(state.sensor.render(cache, state.clock.now())).into_response()
}

pub async fn prices(State(state): State<AppState>) -> Response {
    let snapshot = state.snapshot();
    let Some(cache) = snapshot.data.as_deref() else {
        return not_ready();
    };
    let entries: Vec<PriceEntry> = cache
        .iter()
        .map(|p| PriceEntry {
            start: p.start.to_rfc3339(),
            local_start: p.start.with_timezone(&state.tz).to_rfc3339(),
            price: p.price,
        })
        .collect();
    Json(entries).into_response()
}

pub async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let snapshot = state.snapshot();
    Json(StatusBody {
        last_update_success: snapshot.last_update_success,
        last_error: snapshot.last_error.clone(),
        last_refresh: snapshot.last_refresh.map(|t| t.to_rfc3339()),
        success_count: snapshot.success_count,
        failure_count: snapshot.failure_count,
        cached_hours: snapshot.data.as_ref().map_or(0, |c| c.len()),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sensor", get(sensor))
        .route("/api/prices", get(prices))
        .route("/api/status", get(status))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{}",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}

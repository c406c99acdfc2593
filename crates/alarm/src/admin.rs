//! Administrative HTTP surface.
//!
//! `POST /simulate` sets the simulated reading (testing mode only) and
//! `GET /api/govee/devices` lists the devices the credential can control.
//! Neither route touches the alarm engine.

use crate::{notifier::DeviceDirectory, source::SimulatedSource};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("failed to bind admin server: {0}")]
    Bind(std::io::Error),
    #[error("admin server failed: {0}")]
    Serve(std::io::Error),
}

#[derive(Clone)]
pub struct AdminState {
    devices: Arc<dyn DeviceDirectory>,
    /// Present only in testing mode.
    simulation: Option<SimulatedSource>,
}

impl AdminState {
    pub fn new(devices: Arc<dyn DeviceDirectory>, simulation: Option<SimulatedSource>) -> Self {
        Self {
            devices,
            simulation,
        }
    }
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/simulate", post(handle_simulate))
        .route("/api/govee/devices", get(handle_list_devices))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    state: AdminState,
    shutdown: CancellationToken,
) -> Result<(), AdminError> {
    let listener = TcpListener::bind(addr).await.map_err(AdminError::Bind)?;
    info!("Starting admin HTTP server at {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(AdminError::Serve)
}

#[derive(Debug, Deserialize)]
struct SimulateRequest {
    #[serde(default)]
    value: Value,
}

async fn handle_simulate(State(state): State<AdminState>, body: String) -> Response {
    let Some(simulation) = state.simulation else {
        return (
            StatusCode::FORBIDDEN,
            "Simulation only available in testing mode.",
        )
            .into_response();
    };

    let value = serde_json::from_str::<SimulateRequest>(&body)
        .ok()
        .and_then(|request| simulated_value(&request.value));
    let Some(value) = value else {
        return (StatusCode::BAD_REQUEST, "Invalid value").into_response();
    };

    simulation.set(value);
    info!(value, "simulated glucose updated");
    Json(json!({ "success": true, "value": value })).into_response()
}

/// Accepts a JSON number or a numeric string.
fn simulated_value(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

async fn handle_list_devices(State(state): State<AdminState>) -> Response {
    match state.devices.list_devices().await {
        Ok(devices) => Json(devices).into_response(),
        Err(error) => {
            warn!(error = %error, "failed to list govee devices");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Govee API unreachable" })),
            )
                .into_response()
        }
    }
}

// ── Admin HTTP API ──
//
// CRUD over stored device definitions. Every successful change is also
// pushed onto the fleet's event feed so sessions follow the store.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ocstream_core::{
    CoreError, DeviceConfig, DeviceStore, FleetEvent, FleetManager, GrpcDialer, SessionInfo,
    StoreError,
};

#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn DeviceStore>,
    pub events: mpsc::UnboundedSender<FleetEvent>,
    pub fleet: FleetManager<GrpcDialer>,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/v1/devices", get(list_devices))
        .route("/v1/device", axum::routing::post(put_device).put(put_device))
        .route("/v1/device/:id", delete(delete_device))
        .route("/v1/sessions", get(list_sessions))
        .with_state(state)
}

/// Serve until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "admin API listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

// ── Errors ──────────────────────────────────────────────────────────

enum AdminError {
    BadRequest(String),
    NotFound(String),
    Store(StoreError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(id) => (StatusCode::NOT_FOUND, format!("device '{id}' not found")),
            Self::Store(e) => {
                warn!(error = %e, "device store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

// ── Handlers ────────────────────────────────────────────────────────

async fn list_devices(
    State(state): State<AdminState>,
) -> Result<Json<Vec<DeviceConfig>>, AdminError> {
    let devices = state.store.list()?;
    Ok(Json(devices.iter().map(DeviceConfig::redacted).collect()))
}

async fn put_device(
    State(state): State<AdminState>,
    Json(device): Json<DeviceConfig>,
) -> Result<(StatusCode, Json<DeviceConfig>), AdminError> {
    let device = device.normalized();
    device.validate().map_err(|e| match e {
        CoreError::ValidationFailed { message } => AdminError::BadRequest(message),
        other => AdminError::BadRequest(other.to_string()),
    })?;

    let stored = state.store.upsert(device)?;
    info!(device = %stored.id, host = %stored.host, "device stored");
    let reply = stored.redacted();
    if state.events.send(FleetEvent::Added(stored)).is_err() {
        warn!("fleet event feed closed, change applies on next start");
    }
    Ok((StatusCode::OK, Json(reply)))
}

async fn delete_device(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    if !state.store.remove(&id)? {
        return Err(AdminError::NotFound(id));
    }
    info!(device = %id, "device deleted");
    if state.events.send(FleetEvent::Removed(id)).is_err() {
        warn!("fleet event feed closed, change applies on next start");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sessions(State(state): State<AdminState>) -> Json<Vec<SessionInfo>> {
    Json(state.fleet.sessions())
}

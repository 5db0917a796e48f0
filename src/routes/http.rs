// GET/POST handlers: device snapshots, inverter telemetry, history, guide, device commands

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Local;

use super::AppState;
use crate::error::HubError;
use crate::hub::DeviceGroup;
use crate::models::{
    BucketView, DeviceOutcome, GuideEntry, InverterParams, Reading, StatsReport, WorkMode,
    WorkType,
};

/// Service name (from Cargo.toml).
const NAME: &str = env!("CARGO_PKG_NAME");
/// Service version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Device index from the path; anything else is "unknown id".
fn device_id(raw: &str) -> Result<usize, HubError> {
    raw.parse::<usize>()
        .map_err(|_| HubError::validation("unknown id"))
}

/// GET /version: service name and version, baked in at build time.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/sockets: latest complete socket poll.
pub(super) async fn sockets_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.services.latest(DeviceGroup::Sockets))
}

pub(super) async fn socket_on_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<String, HubError> {
    state.services.socket_command(device_id(&id)?, true).await
}

pub(super) async fn socket_off_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<String, HubError> {
    state.services.socket_command(device_id(&id)?, false).await
}

/// GET /api/lights: latest complete light controller poll.
pub(super) async fn lights_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.services.latest(DeviceGroup::Lights))
}

pub(super) async fn light_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceOutcome>, HubError> {
    let id = device_id(&id)?;
    state
        .services
        .latest(DeviceGroup::Lights)
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| HubError::validation("unknown id"))
}

/// POST /api/lights/{id}/{command}: body is forwarded to the controller untouched.
pub(super) async fn light_command_handler(
    State(state): State<AppState>,
    Path((id, command)): Path<(String, String)>,
    body: String,
) -> Result<String, HubError> {
    state
        .services
        .light_command(device_id(&id)?, &command, body)
        .await
}

pub(super) async fn params_handler(
    State(state): State<AppState>,
) -> Json<Reading<InverterParams>> {
    Json(Reading::from_result(state.services.inverter.params().await))
}

pub(super) async fn stats_handler(State(state): State<AppState>) -> Json<Reading<StatsReport>> {
    let stats = state
        .services
        .inverter
        .stats(Local::now().date_naive())
        .await;
    Json(Reading::from_result(stats.map(StatsReport::from)))
}

pub(super) async fn worktype_handler(State(state): State<AppState>) -> Json<Reading<WorkType>> {
    let mode = state.services.inverter.work_mode().await;
    Json(Reading::from_result(mode.map(WorkType::from)))
}

/// GET /api/sub: raw inverter answer; success is an ACK inside it.
pub(super) async fn sub_handler(State(state): State<AppState>) -> Result<String, HubError> {
    state.services.inverter.set_work_mode(WorkMode::Sub).await
}

/// GET /api/sbu: raw inverter answer; success is an ACK inside it.
pub(super) async fn sbu_handler(State(state): State<AppState>) -> Result<String, HubError> {
    state.services.inverter.set_work_mode(WorkMode::Sbu).await
}

pub(super) async fn history_days_handler(State(state): State<AppState>) -> Json<Vec<BucketView>> {
    Json(state.services.day_history.views().await)
}

pub(super) async fn history_months_handler(
    State(state): State<AppState>,
) -> Json<Vec<BucketView>> {
    Json(state.services.month_history.views().await)
}

/// GET /epg/{slot}: programmes starting within the hour slot YYYYMMDDHH.
pub(super) async fn epg_handler(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> Result<Json<Vec<GuideEntry>>, HubError> {
    state.services.guide.lookup(&slot).await.map(Json)
}

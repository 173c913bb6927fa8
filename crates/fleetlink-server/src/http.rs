//! # Request surface (§6's synchronous alternate to the subscriber channel)
//!
//! Thin axum handlers: authenticate, delegate to [`fleetlink_hub::commands`] (the same
//! functions the websocket handler calls), shape the result as JSON. Input and error shapes
//! mirror the channel vocabulary per spec.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use fleetlink_core::{DroneId, MessageTarget, Principal, Uin};
use fleetlink_hub::{commands, HubError};

use crate::app::SharedState;

pub struct ApiError(HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody { error: self.0.wire_message() })).into_response()
    }
}

async fn authenticate(state: &SharedState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(HubError::NotAuthenticated)?;
    state
        .auth
        .verify(bearer)
        .await
        .map_err(|_| HubError::NotAuthenticated.into())
}

fn target_or_owned(drone_id: Option<u64>) -> Option<DroneId> {
    drone_id.map(DroneId)
}

#[derive(Deserialize)]
pub struct ConnectRequest {
    drone_id: Option<u64>,
    #[allow(dead_code)]
    connection_string: Option<String>,
}

pub async fn drone_connect(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<ConnectRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    let drone_id = commands::resolve_target(&state.manager, principal.user_id, target_or_owned(req.drone_id))?;
    commands::connect(&state.manager, drone_id).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct DroneIdBody {
    drone_id: Option<u64>,
}

pub async fn drone_disconnect(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<DroneIdBody>,
) -> Result<StatusCode, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    let drone_id = commands::resolve_target(&state.manager, principal.user_id, target_or_owned(req.drone_id))?;
    commands::disconnect(&state.manager, drone_id)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct StatusQuery {
    drone_id: Option<u64>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    drone_id: DroneId,
    status: fleetlink_core::LinkStatus,
    snapshot: Option<fleetlink_core::TelemetrySnapshot>,
}

pub async fn drone_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    let drone_id = commands::resolve_target(&state.manager, principal.user_id, target_or_owned(query.drone_id))?;
    let status = state.manager.status_of(drone_id).ok_or(HubError::NotFound(drone_id))?;
    let snapshot = state.manager.snapshot_of(drone_id);
    Ok(Json(StatusResponse { drone_id, status, snapshot }))
}

pub async fn drone_arm(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<DroneIdBody>,
) -> Result<StatusCode, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    let drone_id = commands::resolve_target(&state.manager, principal.user_id, target_or_owned(req.drone_id))?;
    commands::arm(&state.manager, drone_id)?;
    Ok(StatusCode::OK)
}

pub async fn drone_disarm(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<DroneIdBody>,
) -> Result<StatusCode, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    let drone_id = commands::resolve_target(&state.manager, principal.user_id, target_or_owned(req.drone_id))?;
    commands::disarm(&state.manager, drone_id)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct SetModeRequest {
    drone_id: Option<u64>,
    mode: String,
}

pub async fn drone_set_mode(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<SetModeRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    let drone_id = commands::resolve_target(&state.manager, principal.user_id, target_or_owned(req.drone_id))?;
    commands::set_mode(&state.manager, drone_id, &req.mode)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    name: String,
    uin: String,
    connection_string: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    drone_id: DroneId,
}

pub async fn user_drone_register(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    let endpoint = commands::parse_connection_string(&req.connection_string)?;
    let drone_id = state
        .manager
        .register(principal.user_id, req.name, Uin(req.uin), endpoint, None)?;
    Ok(Json(RegisterResponse { drone_id }))
}

#[derive(Serialize)]
pub struct DroneListResponse {
    drones: Vec<fleetlink_core::DroneSummary>,
}

pub async fn admin_drones(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<DroneListResponse>, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    if !principal.is_admin {
        return Err(HubError::NotAuthenticated.into());
    }
    Ok(Json(DroneListResponse { drones: state.manager.list_all() }))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    drone_id: Option<u64>,
    text: String,
    #[serde(default = "default_importance")]
    importance: String,
}

fn default_importance() -> String {
    "normal".to_string()
}

pub async fn admin_message_send(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<StatusCode, ApiError> {
    let principal = authenticate(&state, &headers).await?;
    if !principal.is_admin {
        return Err(HubError::NotAuthenticated.into());
    }
    let target = match req.drone_id {
        Some(id) => MessageTarget::Drone(DroneId(id)),
        None => MessageTarget::AllConnected,
    };
    commands::send_message(&state.manager, req.text, &req.importance, target);
    Ok(StatusCode::OK)
}

impl From<fleetlink_core::ManagerError> for ApiError {
    fn from(err: fleetlink_core::ManagerError) -> Self {
        ApiError(HubError::from(err))
    }
}

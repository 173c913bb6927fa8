//! # Shared process state and router assembly

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use fleetlink_core::{AuthProvider, DroneManager};
use fleetlink_hub::SubscriberHub;
use fleetlink_session::SessionEngineHandle;

use crate::{http, ws};

/// Everything a request or subscriber-channel handler needs, shared behind `Arc`s so axum
/// can clone it cheaply per connection.
pub struct AppState {
    pub manager: Arc<DroneManager>,
    pub hub: Arc<SubscriberHub>,
    pub auth: Arc<dyn AuthProvider>,
    pub session: SessionEngineHandle,
}

pub type SharedState = Arc<AppState>;

/// Builds the full router: the subscriber channel at `/ws/drone` (§6) plus the request
/// surface (§6's alternate synchronous endpoint set).
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/ws/drone", get(ws::upgrade))
        .route("/drone/connect", post(http::drone_connect))
        .route("/drone/disconnect", post(http::drone_disconnect))
        .route("/drone/status", get(http::drone_status))
        .route("/drone/arm", post(http::drone_arm))
        .route("/drone/disarm", post(http::drone_disarm))
        .route("/drone/set-mode", post(http::drone_set_mode))
        .route("/user/drone/register", post(http::user_drone_register))
        .route("/user/drone/disconnect", post(http::drone_disconnect))
        .route("/admin/drones", get(http::admin_drones))
        .route("/admin/message/send", post(http::admin_message_send))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

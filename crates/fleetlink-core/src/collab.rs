//! # External collaborator interfaces (C8)
//!
//! Auth (token verification) and storage (row persistence) are out of scope per §1 — they
//! are consumed through these two `async_trait` interfaces, so the rest of the core depends
//! only on shapes, never on a concrete database or identity provider.

use async_trait::async_trait;

use crate::domain::Event;
use crate::ids::{DroneId, UserId};

/// The authenticated caller behind a bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub is_admin: bool,
}

/// Errors the auth collaborator can raise.
#[derive(Clone, Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("auth collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Verifies bearer tokens against the external auth collaborator.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify(&self, bearer: &str) -> Result<Principal, AuthError>;
}

/// A row-level view of vehicle status, as written to the `Drone` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DroneStatusRow {
    Offline,
    Connected,
    Flying,
}

/// Errors the storage collaborator can raise. Per §7, `Transient` is swallowed by the
/// session engine; `Permanent` aborts the writer task.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StorageError {
    #[error("transient storage failure: {0}")]
    Transient(String),
    #[error("permanent storage failure: {0}")]
    Permanent(String),
}

/// A session row as it exists the moment it is opened.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub session_id: crate::ids::SessionId,
    pub user_id: UserId,
    pub drone_id: DroneId,
    pub mission_id: Option<String>,
    pub started_at_epoch_ms: u64,
    pub start_battery: u8,
    pub start_point: Option<crate::domain::GeoPoint>,
}

/// The fields a session row gains when it closes.
#[derive(Clone, Debug)]
pub struct SessionEnd {
    pub ended_at_epoch_ms: u64,
    pub end_battery: Option<u8>,
    pub end_point: Option<crate::domain::GeoPoint>,
    pub max_altitude_m: f32,
    pub max_speed_mps: f32,
    pub avg_speed_mps: f32,
    pub total_distance_m: f64,
    pub status: crate::domain::SessionStatus,
}

/// Opaque persistence for drone status, sessions, and events (§6's `User`/`Drone`/
/// `DroneSession`/`DroneEvent` tables). Only uniqueness and foreign-key relationships
/// matter to the core; row shape beyond that is the storage collaborator's concern.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upsert_drone_status(
        &self,
        drone_id: DroneId,
        status: DroneStatusRow,
    ) -> Result<(), StorageError>;

    async fn start_session(&self, session: &NewSession) -> Result<(), StorageError>;

    async fn end_session(
        &self,
        session_id: crate::ids::SessionId,
        end: &SessionEnd,
    ) -> Result<(), StorageError>;

    async fn record_event(&self, event: &Event) -> Result<(), StorageError>;

    /// Startup recovery (§6): sets any `Drone.status ∈ {connected, flying}` to `offline`
    /// before the core accepts traffic, since no live links exist yet on process start.
    async fn mark_all_offline(&self) -> Result<(), StorageError>;
}

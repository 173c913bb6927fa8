//! # Session and event data model (§3)
//!
//! These are the append-only records the session/event engine (C5) produces and the
//! storage collaborator (C8) persists. Kept here, rather than in the session engine crate,
//! so the hub (C6) can reference them without a dependency cycle.

use serde::{Deserialize, Serialize};

use crate::ids::{DroneId, SessionId, UserId};

/// A point on the earth's surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Session status, per §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Aborted,
}

/// Discrete, debounced lifecycle observation derived from the telemetry stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    SessionStarted,
    SessionEnded,
    Takeoff,
    Landing,
    ModeChange,
    BatteryLow,
    ZoneViolation,
}

/// An append-only event, attributed to an active session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub drone_id: DroneId,
    pub mission_id: Option<String>,
    pub timestamp_epoch_ms: u64,
    pub kind: EventKind,
    pub point: Option<GeoPoint>,
    pub altitude_m: Option<f32>,
    pub battery_pct: Option<u8>,
    pub speed_mps: Option<f32>,
    pub mode: Option<String>,
    pub message: String,
}

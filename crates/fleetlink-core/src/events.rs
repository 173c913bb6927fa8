//! # Typed event channels
//!
//! The source wires its components together with name-based publish/subscribe on string
//! topics. This core replaces that with three typed broadcast channels, each consumed by
//! whichever of C5/C6 needs it — no dynamic topic discovery, no stringly-typed dispatch.

use crate::ids::{DroneId, Uin, UserId};
use crate::snapshot::TelemetrySnapshot;

/// A vehicle's lifecycle status, per §3's `registered → connecting → connected ↔
/// reconnecting → disconnected` state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LinkStatus {
    Registered,
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

/// Published whenever a vehicle link's status changes.
#[derive(Clone, Debug)]
pub struct LinkStatusEvent {
    pub drone_id: DroneId,
    pub user_id: UserId,
    pub status: LinkStatus,
    /// Set when the transition was caused by an error (`HeartbeatTimeout`, `BindFailed`, …).
    pub reason: Option<String>,
}

/// Published by a vehicle link on every decoded telemetry-bearing frame; consumed by both
/// the session/event engine (C5) and the subscriber hub (C6).
#[derive(Clone, Debug)]
pub struct TelemetryUpdate {
    pub drone_id: DroneId,
    pub user_id: UserId,
    pub uin: Uin,
    pub name: String,
    pub snapshot: TelemetrySnapshot,
}

/// Operator message importance. Invalid wire values clamp to `Normal` (§4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    #[default]
    Normal,
    Important,
    Warning,
    Critical,
}

impl Importance {
    /// Parses an importance value, clamping anything unrecognised to `Normal` rather than
    /// rejecting the message.
    pub fn parse_or_normal(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "important" => Self::Important,
            "warning" => Self::Warning,
            "critical" => Self::Critical,
            "normal" => Self::Normal,
            _ => Self::Normal,
        }
    }
}

/// Recipient selector for an operator message.
#[derive(Clone, Debug)]
pub enum MessageTarget {
    Drone(DroneId),
    AllConnected,
}

/// A message an operator (or the system) broadcasts to one or all connected subscribers.
#[derive(Clone, Debug)]
pub struct OperatorMessage {
    pub text: String,
    pub importance: Importance,
    pub target: MessageTarget,
}

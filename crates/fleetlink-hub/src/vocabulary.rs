//! # Subscriber channel message vocabulary (§4.6, §6)
//!
//! Every message on the wire is `{ "type": string, "data"?: object, "timestamp"?: number_ms }`.
//! [`Inbound`] and [`Outbound`] are the typed shapes either side of that envelope decodes
//! into; `serde`'s externally-tagged enum representation gives us the `type`/`data` split
//! for free once paired with [`Envelope`].

use serde::{Deserialize, Serialize};

use fleetlink_core::{DroneId, Importance, TelemetrySnapshot};

/// Client → server messages (§4.6's inbound vocabulary).
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Inbound {
    Auth { user_id: String, is_admin: bool, bearer: String },
    Connect { connection_string: String },
    Disconnect,
    Arm,
    Disarm,
    #[serde(rename = "set_mode")]
    SetMode { mode: String },
    Ping,
}

/// Server → client messages (§4.6's outbound vocabulary).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Outbound {
    Status { requires_auth: bool },
    Telemetry {
        drone_id: DroneId,
        name: String,
        snapshot: TelemetrySnapshot,
    },
    Connected { message: String },
    Disconnected { message: String },
    Message { text: String, importance: Importance },
    Error { message: String },
}

impl Outbound {
    /// Whether this variant must never be dropped by the subscriber queue's overflow policy
    /// (§5: "operator messages, connected/disconnected, and error frames are never
    /// dropped"). Only bare telemetry frames are droppable.
    pub fn is_critical(&self) -> bool {
        !matches!(self, Outbound::Telemetry { .. })
    }
}

/// An outbound message with the wire's optional `timestamp` field attached, per §6's
/// `{ "type", "data"?, "timestamp"? }` envelope shape.
#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    #[serde(flatten)]
    pub message: Outbound,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl Frame {
    pub fn new(message: Outbound) -> Self {
        Self {
            message,
            timestamp: Some(fleetlink_core::now_epoch_ms()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_message_deserializes_from_envelope_shape() {
        let raw = r#"{"type":"auth","data":{"user_id":"u1","is_admin":false,"bearer":"tok"}}"#;
        let msg: Inbound = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, Inbound::Auth { bearer, .. } if bearer == "tok"));
    }

    #[test]
    fn ping_has_no_data_payload() {
        let raw = r#"{"type":"ping"}"#;
        let msg: Inbound = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, Inbound::Ping));
    }

    #[test]
    fn frame_serializes_type_data_timestamp_envelope() {
        let frame = Frame::new(Outbound::Error { message: "boom".into() });
        let value: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["message"], "boom");
        assert!(value["timestamp"].is_number());
    }

    #[test]
    fn telemetry_is_the_only_droppable_outbound_kind() {
        assert!(!Outbound::Telemetry {
            drone_id: DroneId(1),
            name: "rover".into(),
            snapshot: TelemetrySnapshot::default(),
        }
        .is_critical());
        assert!(Outbound::Error { message: "x".into() }.is_critical());
        assert!(Outbound::Connected { message: "x".into() }.is_critical());
    }
}

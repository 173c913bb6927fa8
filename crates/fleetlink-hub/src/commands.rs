//! # Command surface (C7)
//!
//! Thin handlers shared by both the subscriber channel and any synchronous request surface:
//! authenticate (left to the caller, since both surfaces gate differently), validate, then
//! delegate to [`DroneManager`]. Validation mirrors §4.7 exactly, hand-rolled rather than
//! pulled in via `regex` since nothing else in this workspace needs that crate.

use fleetlink_core::{DroneId, DroneManager, Endpoint, Importance, MessageTarget, Protocol, UserId};

use crate::error::HubError;

/// Parses a connection string against `^(tcp|udp|udpin):[^:]+:[0-9]+$` (§4.7) into an
/// [`Endpoint`]. The host segment may be anything but a colon; the port must be a bare
/// decimal `u16`.
pub fn parse_connection_string(raw: &str) -> Result<Endpoint, HubError> {
    let mut parts = raw.splitn(3, ':');
    let (scheme, host, port) = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(host), Some(port)) => (scheme, host, port),
        _ => return Err(HubError::InvalidConnectionString(raw.to_string())),
    };

    let protocol = Protocol::parse(scheme)
        .ok_or_else(|| HubError::InvalidConnectionString(raw.to_string()))?;

    if host.is_empty() {
        return Err(HubError::InvalidConnectionString(raw.to_string()));
    }

    let bind_port: u16 = port
        .parse()
        .map_err(|_| HubError::InvalidConnectionString(raw.to_string()))?;

    Ok(Endpoint {
        protocol,
        bind_host: host.to_string(),
        bind_port,
    })
}

/// Resolves a request's target drone: an explicit `drone_id` if given, otherwise the
/// caller's single connected drone via [`DroneManager::resolve_by_owner`].
pub fn resolve_target(
    manager: &DroneManager,
    user_id: UserId,
    drone_id: Option<DroneId>,
) -> Result<DroneId, HubError> {
    match drone_id {
        Some(id) => Ok(id),
        None => manager
            .resolve_by_owner(user_id)
            .ok_or(HubError::NoConnectedDrone),
    }
}

pub fn arm(manager: &DroneManager, drone_id: DroneId) -> Result<(), HubError> {
    manager.arm(drone_id).map_err(HubError::from)
}

pub fn disarm(manager: &DroneManager, drone_id: DroneId) -> Result<(), HubError> {
    manager.disarm(drone_id).map_err(HubError::from)
}

pub fn set_mode(manager: &DroneManager, drone_id: DroneId, mode_name: &str) -> Result<(), HubError> {
    manager
        .set_mode(drone_id, mode_name)
        .map_err(HubError::from)
}

pub async fn connect(manager: &DroneManager, drone_id: DroneId) -> Result<(), HubError> {
    manager.connect(drone_id).await.map_err(HubError::from)
}

pub fn disconnect(manager: &DroneManager, drone_id: DroneId) -> Result<(), HubError> {
    manager.disconnect(drone_id).map_err(HubError::from)
}

/// Broadcasts an operator message to one drone's owner or to every authenticated channel
/// (§4.6's fan-out filter for operator messages).
pub fn send_message(manager: &DroneManager, text: String, importance_raw: &str, target: MessageTarget) {
    let importance = Importance::parse_or_normal(importance_raw);
    manager.send_operator_message(text, importance, target);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_each_supported_scheme() {
        for scheme in ["tcp", "udp", "udpin"] {
            let raw = format!("{scheme}:127.0.0.1:14550");
            let endpoint = parse_connection_string(&raw).unwrap();
            assert_eq!(endpoint.bind_port, 14550);
            assert_eq!(endpoint.bind_host, "127.0.0.1");
        }
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(parse_connection_string("ftp:127.0.0.1:14550").is_err());
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(parse_connection_string("udp:127.0.0.1:not-a-port").is_err());
    }

    #[test]
    fn rejects_missing_segment() {
        assert!(parse_connection_string("udp:127.0.0.1").is_err());
    }

    #[test]
    fn rejects_empty_host() {
        assert!(parse_connection_string("udp::14550").is_err());
    }
}

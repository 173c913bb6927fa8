//! # Hub and command-surface errors

use fleetlink_core::{DroneId, ManagerError};

/// Errors the subscriber hub and command surface can raise (§7).
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("drone {0} not found")]
    NotFound(DroneId),

    #[error("caller has no connected drone and named none")]
    NoConnectedDrone,

    #[error("no registered drone matches connection string {0}")]
    NoMatchingDrone(String),

    #[error("connection string is malformed: {0}")]
    InvalidConnectionString(String),

    #[error("unknown flight mode: {0}")]
    UnknownMode(String),

    #[error("subscriber outbound queue is saturated")]
    Backpressure,

    #[error(transparent)]
    Manager(#[from] ManagerError),
}

impl HubError {
    /// Stable text sent on the outbound `error` frame, independent of the request-surface
    /// status code mapping in [`HubError::status_code`].
    pub fn wire_message(&self) -> String {
        self.to_string()
    }

    /// Request-surface status code mapping (§7): `400` for validation, `401` for
    /// unauthenticated callers, `404` for missing drones, `409` for a UIN conflict, `500`
    /// for everything else.
    pub fn status_code(&self) -> u16 {
        match self {
            HubError::InvalidConnectionString(_) | HubError::UnknownMode(_) => 400,
            HubError::Manager(ManagerError::InvalidConnectionString(_))
            | HubError::Manager(ManagerError::UnknownMode(_)) => 400,
            HubError::NotAuthenticated => 401,
            HubError::NotFound(_)
            | HubError::NoConnectedDrone
            | HubError::NoMatchingDrone(_)
            | HubError::Manager(ManagerError::NotFound(_)) => 404,
            HubError::Manager(ManagerError::UinConflict(_)) => 409,
            _ => 500,
        }
    }
}

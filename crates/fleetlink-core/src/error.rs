//! # Core errors

use crate::ids::{DroneId, Uin};

/// Errors a single vehicle link can raise.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("unsupported transport protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("no heartbeat received within the watchdog timeout")]
    HeartbeatTimeout,

    #[error("peer address is not yet known")]
    PeerUnknown,

    #[error("frame codec error: {0}")]
    Codec(#[from] fleetlink_proto::CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors the drone manager can raise.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("uin {0} is already registered")]
    UinConflict(Uin),

    #[error("drone {0} is not registered")]
    NotFound(DroneId),

    #[error("drone {0} is not connected")]
    NotConnected(DroneId),

    #[error("peer address for drone {0} is not yet known")]
    PeerUnknown(DroneId),

    #[error("connection string is malformed: {0}")]
    InvalidConnectionString(String),

    #[error("unknown flight mode: {0}")]
    UnknownMode(String),

    #[error(transparent)]
    Link(#[from] LinkError),
}

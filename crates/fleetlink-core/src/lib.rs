//! # fleetlink-core
//!
//! Vehicle links (C2), the telemetry snapshot contract (C3), the multi-drone connection
//! manager (C4), and the auth/storage collaborator interfaces (C8).

mod collab;
mod commands;
mod consts;
mod domain;
mod error;
mod events;
mod ids;
mod link;
mod manager;
mod snapshot;

pub use collab::{AuthError, AuthProvider, DroneStatusRow, NewSession, Principal, SessionEnd, Storage, StorageError};
pub use consts::{BATTERY_LOW_PCT, EVENT_CHAN_CAPACITY, EVENT_COOLDOWN, HEARTBEAT_TIMEOUT, RECONNECT_BACKOFF, RECV_BUF_SIZE};
pub use domain::{Event, EventKind, GeoPoint, SessionStatus};
pub use error::{LinkError, ManagerError};
pub use events::{Importance, LinkStatus, LinkStatusEvent, MessageTarget, OperatorMessage, TelemetryUpdate};
pub use fleetlink_proto::FlightMode;
pub use ids::{DroneId, SessionId, Uin, UserId};
pub use link::{Endpoint, Protocol, VehicleLink};
pub use manager::{DroneManager, DroneSummary, VehicleRecord};
pub use snapshot::{now_epoch_ms, SnapshotCell, TelemetrySnapshot};

/// Common imports for code that drives or consumes the manager.
pub mod prelude {
    pub use crate::{
        AuthProvider, DroneId, DroneManager, Endpoint, Event, Importance, LinkStatus,
        LinkStatusEvent, ManagerError, MessageTarget, OperatorMessage, Principal, Protocol,
        SessionId, Storage, TelemetrySnapshot, TelemetryUpdate, Uin, UserId,
    };
}

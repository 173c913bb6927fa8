//! # Timeouts and capacities (§5)

use std::time::Duration;

/// No `HEARTBEAT` within this window moves a link to `disconnected` (§4.2).
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed reconnect backoff after an unexpected socket loss (§4.2).
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Per-`(session_id, kind)` event persistence cooldown (§4.5).
pub const EVENT_COOLDOWN: Duration = Duration::from_secs(3);

/// `battery_pct` below this threshold triggers a `battery_low` event (§4.5).
pub const BATTERY_LOW_PCT: u8 = 20;

/// Capacity of the broadcast channels fanning telemetry and lifecycle events out to C5/C6.
pub const EVENT_CHAN_CAPACITY: usize = 1024;

/// Receive buffer size for a vehicle link's UDP socket; comfortably larger than any single
/// MAVLink v2 frame (max 280-ish bytes signed).
pub const RECV_BUF_SIZE: usize = 2048;

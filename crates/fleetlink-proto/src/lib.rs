//! # fleetlink-proto
//!
//! MAVLink v1/v2 frame codec for the fixed dialect subset this ground station speaks:
//! framing and resync, CRC-16/MCRF4XX with per-message CRC_EXTRA, and encode/decode for
//! `HEARTBEAT`, `SYS_STATUS`, `GPS_RAW_INT`, `GLOBAL_POSITION_INT`, `VFR_HUD`,
//! `BATTERY_STATUS`, `SET_MODE`, `COMMAND_LONG`, and `COMMAND_ACK`. Everything else decodes
//! to [`Message::Unknown`] rather than failing.
//!
//! See <https://mavlink.io/en/guide/serialization.html> for the wire format this module
//! implements a deliberately small slice of.

mod crc;
mod error;
mod frame;
mod header;
mod message;

pub use crc::{checksum, crc_extra};
pub use error::{CodecError, Result};
pub use frame::{decode_one, DecodedFrame, Decoder, Encoder, GCS_COMPID, GCS_SYSID};
pub use header::{Header, Version, INCOMPAT_SIGNED, MAGIC_V1, MAGIC_V2};
pub use message::{
    id, nominal_len, BatteryStatus, CommandAck, CommandLong, FlightMode, GlobalPositionInt,
    GpsRawInt, Heartbeat, Message, SetMode, SysStatus, VfrHud, MAV_CMD_COMPONENT_ARM_DISARM,
};

/// Common imports for code that builds or consumes frames.
pub mod prelude {
    pub use crate::{
        CodecError, CommandLong, DecodedFrame, Decoder, Encoder, FlightMode, Heartbeat, Message,
        Result, SetMode, MAV_CMD_COMPONENT_ARM_DISARM,
    };
}

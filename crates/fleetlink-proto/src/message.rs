//! # Dialect messages
//!
//! This core understands a fixed, small subset of the MAVLink common/ardupilotmega
//! dialects — just enough to track vehicle state and issue arm/disarm/mode commands.
//! Every other message id decodes to [`Message::Unknown`] rather than failing, so an
//! unrecognised id never takes down a vehicle link.

use crate::error::{CodecError, Result};

/// Message ids this core has a typed representation for.
pub mod id {
    /// `HEARTBEAT`
    pub const HEARTBEAT: u32 = 0;
    /// `SYS_STATUS`
    pub const SYS_STATUS: u32 = 1;
    /// `GPS_RAW_INT`
    pub const GPS_RAW_INT: u32 = 24;
    /// `GLOBAL_POSITION_INT`
    pub const GLOBAL_POSITION_INT: u32 = 33;
    /// `SET_MODE`
    pub const SET_MODE: u32 = 11;
    /// `VFR_HUD`
    pub const VFR_HUD: u32 = 74;
    /// `COMMAND_LONG`
    pub const COMMAND_LONG: u32 = 76;
    /// `COMMAND_ACK`
    pub const COMMAND_ACK: u32 = 77;
    /// `BATTERY_STATUS`
    pub const BATTERY_STATUS: u32 = 147;
}

/// Nominal (untruncated) payload length for a known message id.
///
/// The decoder zero-pads any shorter, trailing-zero-truncated wire payload out to this
/// length before slicing fields; the encoder always emits the full nominal length.
pub fn nominal_len(msg_id: u32) -> Option<usize> {
    Some(match msg_id {
        id::HEARTBEAT => 9,
        id::SYS_STATUS => 31,
        id::GPS_RAW_INT => 30,
        id::GLOBAL_POSITION_INT => 28,
        id::SET_MODE => 6,
        id::VFR_HUD => 20,
        id::COMMAND_LONG => 33,
        id::COMMAND_ACK => 3,
        id::BATTERY_STATUS => 36,
        _ => return None,
    })
}

/// Named ArduPilot flight modes this core recognises by `custom_mode`.
///
/// An unrecognised numeric mode surfaces as [`FlightMode::Other`] carrying the raw value,
/// displayed as `MODE_<n>`, rather than being rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlightMode {
    Stabilize,
    Acro,
    AltHold,
    Auto,
    Guided,
    Loiter,
    Rtl,
    Circle,
    Land,
    PosHold,
    Brake,
    /// Any `custom_mode` not in the known table, carried verbatim.
    Other(u32),
}

impl FlightMode {
    /// Maps a raw `custom_mode` value to a named mode.
    pub fn from_custom_mode(custom_mode: u32) -> Self {
        match custom_mode {
            0 => Self::Stabilize,
            1 => Self::Acro,
            2 => Self::AltHold,
            3 => Self::Auto,
            4 => Self::Guided,
            5 => Self::Loiter,
            6 => Self::Rtl,
            7 => Self::Circle,
            9 => Self::Land,
            16 => Self::PosHold,
            17 => Self::Brake,
            n => Self::Other(n),
        }
    }

    /// The `custom_mode` value that round-trips back into this variant.
    pub fn custom_mode(self) -> u32 {
        match self {
            Self::Stabilize => 0,
            Self::Acro => 1,
            Self::AltHold => 2,
            Self::Auto => 3,
            Self::Guided => 4,
            Self::Loiter => 5,
            Self::Rtl => 6,
            Self::Circle => 7,
            Self::Land => 9,
            Self::PosHold => 16,
            Self::Brake => 17,
            Self::Other(n) => n,
        }
    }

    /// Case-insensitive lookup by name, as used by the command surface's mode validation.
    pub fn from_name(name: &str) -> Option<Self> {
        let mode = match name.to_ascii_uppercase().as_str() {
            "STABILIZE" => Self::Stabilize,
            "ACRO" => Self::Acro,
            "ALT_HOLD" => Self::AltHold,
            "AUTO" => Self::Auto,
            "GUIDED" => Self::Guided,
            "LOITER" => Self::Loiter,
            "RTL" => Self::Rtl,
            "CIRCLE" => Self::Circle,
            "LAND" => Self::Land,
            "POSHOLD" => Self::PosHold,
            "BRAKE" => Self::Brake,
            _ => return None,
        };
        Some(mode)
    }
}

impl std::fmt::Display for FlightMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stabilize => write!(f, "STABILIZE"),
            Self::Acro => write!(f, "ACRO"),
            Self::AltHold => write!(f, "ALT_HOLD"),
            Self::Auto => write!(f, "AUTO"),
            Self::Guided => write!(f, "GUIDED"),
            Self::Loiter => write!(f, "LOITER"),
            Self::Rtl => write!(f, "RTL"),
            Self::Circle => write!(f, "CIRCLE"),
            Self::Land => write!(f, "LAND"),
            Self::PosHold => write!(f, "POSHOLD"),
            Self::Brake => write!(f, "BRAKE"),
            Self::Other(n) => write!(f, "MODE_{n}"),
        }
    }
}

/// `HEARTBEAT` (msg 0).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Heartbeat {
    pub custom_mode: u32,
    pub type_: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub system_status: u8,
    pub mavlink_version: u8,
}

impl Heartbeat {
    /// `base_mode & 0x80 != 0`, MAVLink's `MAV_MODE_FLAG_SAFETY_ARMED`.
    pub fn armed(&self) -> bool {
        self.base_mode & 0x80 != 0
    }

    /// Named flight mode for this heartbeat's `custom_mode`.
    pub fn mode(&self) -> FlightMode {
        FlightMode::from_custom_mode(self.custom_mode)
    }
}

/// `GLOBAL_POSITION_INT` (msg 33), already unit-converted to engineering units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalPositionInt {
    pub time_boot_ms: u32,
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_msl_m: f32,
    pub relative_alt_m: f32,
    pub vx_mps: f32,
    pub vy_mps: f32,
    pub vz_mps: f32,
    pub heading_deg: f32,
}

/// `VFR_HUD` (msg 74).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VfrHud {
    pub airspeed_mps: f32,
    pub groundspeed_mps: f32,
    pub alt_m: f32,
    pub climb_mps: f32,
    pub heading_deg: i16,
    pub throttle_pct: u16,
}

/// `GPS_RAW_INT` (msg 24), trimmed to the field this core consumes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GpsRawInt {
    pub satellites_visible: u8,
}

/// `BATTERY_STATUS` (msg 147), trimmed to the field this core consumes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatteryStatus {
    /// Signed remaining-percent; `-1` means unknown.
    pub battery_remaining: i8,
}

/// `SYS_STATUS` (msg 1), trimmed to the field this core consumes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SysStatus {
    pub battery_remaining: i8,
}

/// `SET_MODE` (msg 11).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetMode {
    pub custom_mode: u32,
    pub target_system: u8,
    pub base_mode: u8,
}

/// `COMMAND_LONG` (msg 76).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommandLong {
    pub params: [f32; 7],
    pub command: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub confirmation: u8,
}

/// MAVLink command `MAV_CMD_COMPONENT_ARM_DISARM`.
pub const MAV_CMD_COMPONENT_ARM_DISARM: u16 = 400;

/// `COMMAND_ACK` (msg 77).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommandAck {
    pub command: u16,
    pub result: u8,
}

/// A decoded MAVLink message, tagged by id.
///
/// Ids outside this core's fixed dialect subset decode to [`Message::Unknown`] so that
/// consumers can skip them without treating the frame as malformed.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Heartbeat(Heartbeat),
    SysStatus(SysStatus),
    GpsRawInt(GpsRawInt),
    GlobalPositionInt(GlobalPositionInt),
    VfrHud(VfrHud),
    BatteryStatus(BatteryStatus),
    SetMode(SetMode),
    CommandLong(CommandLong),
    CommandAck(CommandAck),
    /// An id this core has no typed representation for, carried verbatim.
    Unknown { id: u32, bytes: Vec<u8> },
}

impl Message {
    /// The message id this value was decoded from or will be encoded as.
    pub fn id(&self) -> u32 {
        match self {
            Self::Heartbeat(_) => id::HEARTBEAT,
            Self::SysStatus(_) => id::SYS_STATUS,
            Self::GpsRawInt(_) => id::GPS_RAW_INT,
            Self::GlobalPositionInt(_) => id::GLOBAL_POSITION_INT,
            Self::VfrHud(_) => id::VFR_HUD,
            Self::BatteryStatus(_) => id::BATTERY_STATUS,
            Self::SetMode(_) => id::SET_MODE,
            Self::CommandLong(_) => id::COMMAND_LONG,
            Self::CommandAck(_) => id::COMMAND_ACK,
            Self::Unknown { id, .. } => *id,
        }
    }

    /// Decodes a payload already zero-padded to `nominal_len(msg_id)` (or of arbitrary
    /// length for unknown ids).
    pub fn decode(msg_id: u32, payload: &[u8]) -> Result<Self> {
        Ok(match msg_id {
            id::HEARTBEAT => Self::Heartbeat(Heartbeat {
                custom_mode: le_u32(payload, 0),
                type_: payload[4],
                autopilot: payload[5],
                base_mode: payload[6],
                system_status: payload[7],
                mavlink_version: payload[8],
            }),
            id::SYS_STATUS => Self::SysStatus(SysStatus {
                battery_remaining: payload[30] as i8,
            }),
            id::GPS_RAW_INT => Self::GpsRawInt(GpsRawInt {
                satellites_visible: payload[29],
            }),
            id::GLOBAL_POSITION_INT => Self::GlobalPositionInt(GlobalPositionInt {
                time_boot_ms: le_u32(payload, 0),
                lat_deg: le_i32(payload, 4) as f64 / 1e7,
                lon_deg: le_i32(payload, 8) as f64 / 1e7,
                alt_msl_m: le_i32(payload, 12) as f32 / 1000.0,
                relative_alt_m: le_i32(payload, 16) as f32 / 1000.0,
                vx_mps: le_i16(payload, 20) as f32 / 100.0,
                vy_mps: le_i16(payload, 22) as f32 / 100.0,
                vz_mps: le_i16(payload, 24) as f32 / 100.0,
                heading_deg: le_u16(payload, 26) as f32 / 100.0,
            }),
            id::VFR_HUD => Self::VfrHud(VfrHud {
                airspeed_mps: le_f32(payload, 0),
                groundspeed_mps: le_f32(payload, 4),
                alt_m: le_f32(payload, 8),
                climb_mps: le_f32(payload, 12),
                heading_deg: le_i16(payload, 16),
                throttle_pct: le_u16(payload, 18),
            }),
            id::BATTERY_STATUS => Self::BatteryStatus(BatteryStatus {
                battery_remaining: payload[35] as i8,
            }),
            id::SET_MODE => Self::SetMode(SetMode {
                custom_mode: le_u32(payload, 0),
                target_system: payload[4],
                base_mode: payload[5],
            }),
            id::COMMAND_LONG => Self::CommandLong(CommandLong {
                params: [
                    le_f32(payload, 0),
                    le_f32(payload, 4),
                    le_f32(payload, 8),
                    le_f32(payload, 12),
                    le_f32(payload, 16),
                    le_f32(payload, 20),
                    le_f32(payload, 24),
                ],
                command: le_u16(payload, 28),
                target_system: payload[30],
                target_component: payload[31],
                confirmation: payload[32],
            }),
            id::COMMAND_ACK => Self::CommandAck(CommandAck {
                command: le_u16(payload, 0),
                result: payload[2],
            }),
            other => Self::Unknown {
                id: other,
                bytes: payload.to_vec(),
            },
        })
    }

    /// Encodes this message's payload, trailing-zero-truncation permitted but not applied
    /// here — the frame encoder truncates if it chooses to.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Heartbeat(m) => {
                let mut buf = vec![0u8; nominal_len(id::HEARTBEAT).unwrap()];
                buf[0..4].copy_from_slice(&m.custom_mode.to_le_bytes());
                buf[4] = m.type_;
                buf[5] = m.autopilot;
                buf[6] = m.base_mode;
                buf[7] = m.system_status;
                buf[8] = m.mavlink_version;
                buf
            }
            Self::SetMode(m) => {
                let mut buf = vec![0u8; nominal_len(id::SET_MODE).unwrap()];
                buf[0..4].copy_from_slice(&m.custom_mode.to_le_bytes());
                buf[4] = m.target_system;
                buf[5] = m.base_mode;
                buf
            }
            Self::CommandLong(m) => {
                let mut buf = vec![0u8; nominal_len(id::COMMAND_LONG).unwrap()];
                for (i, p) in m.params.iter().enumerate() {
                    buf[i * 4..i * 4 + 4].copy_from_slice(&p.to_le_bytes());
                }
                buf[28..30].copy_from_slice(&m.command.to_le_bytes());
                buf[30] = m.target_system;
                buf[31] = m.target_component;
                buf[32] = m.confirmation;
                buf
            }
            Self::CommandAck(m) => {
                let mut buf = vec![0u8; nominal_len(id::COMMAND_ACK).unwrap()];
                buf[0..2].copy_from_slice(&m.command.to_le_bytes());
                buf[2] = m.result;
                buf
            }
            Self::Unknown { bytes, .. } => bytes.clone(),
            // Inbound-only messages; this core never constructs them for sending.
            Self::SysStatus(_)
            | Self::GpsRawInt(_)
            | Self::GlobalPositionInt(_)
            | Self::VfrHud(_)
            | Self::BatteryStatus(_) => Vec::new(),
        }
    }
}

/// Zero-pads `payload` up to `nominal` bytes, per MAVLink's trailing-zero truncation rule.
///
/// No-op (and never truncates) when `payload` is already `>= nominal`; a payload longer
/// than the message's nominal length is an encoder bug, caught by [`CodecError::PayloadTooLong`]
/// at the frame layer rather than here.
pub fn zero_pad(payload: &[u8], nominal: usize) -> Vec<u8> {
    if payload.len() >= nominal {
        return payload.to_vec();
    }
    let mut buf = vec![0u8; nominal];
    buf[..payload.len()].copy_from_slice(payload);
    buf
}

pub(crate) fn check_fits(msg_id: u32, payload_len: usize) -> Result<()> {
    if let Some(nominal) = nominal_len(msg_id) {
        if payload_len > nominal {
            return Err(CodecError::PayloadTooLong {
                msg_id,
                nominal,
                got: payload_len,
            });
        }
    }
    Ok(())
}

fn le_u16(b: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([b[off], b[off + 1]])
}
fn le_i16(b: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([b[off], b[off + 1]])
}
fn le_u32(b: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}
fn le_i32(b: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}
fn le_f32(b: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_mode_and_armed_decode() {
        let hb = Heartbeat {
            custom_mode: 9,
            type_: 2,
            autopilot: 3,
            base_mode: 0x81,
            system_status: 4,
            mavlink_version: 3,
        };
        assert!(hb.armed());
        assert_eq!(hb.mode(), FlightMode::Land);
    }

    #[test]
    fn unknown_mode_formats_as_mode_n() {
        assert_eq!(FlightMode::from_custom_mode(42).to_string(), "MODE_42");
    }

    #[test]
    fn mode_name_lookup_is_case_insensitive() {
        assert_eq!(FlightMode::from_name("guided"), Some(FlightMode::Guided));
        assert_eq!(FlightMode::from_name("GUIDED"), Some(FlightMode::Guided));
        assert_eq!(FlightMode::from_name("nope"), None);
    }

    #[test]
    fn global_position_int_scaling() {
        let mut payload = vec![0u8; 28];
        payload[4..8].copy_from_slice(&(123_456_789i32).to_le_bytes());
        let msg = Message::decode(id::GLOBAL_POSITION_INT, &payload).unwrap();
        match msg {
            Message::GlobalPositionInt(gpi) => {
                assert!((gpi.lat_deg - 12.3456789).abs() < 1e-9);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn command_long_round_trips_arm() {
        let arm = CommandLong {
            params: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            command: MAV_CMD_COMPONENT_ARM_DISARM,
            target_system: 1,
            target_component: 1,
            confirmation: 0,
        };
        let bytes = Message::CommandLong(arm).encode();
        let decoded = Message::decode(id::COMMAND_LONG, &bytes).unwrap();
        assert_eq!(decoded, Message::CommandLong(arm));
    }

    #[test]
    fn unknown_id_is_carried_verbatim() {
        let bytes = vec![1, 2, 3];
        let msg = Message::decode(9999, &bytes).unwrap();
        assert_eq!(
            msg,
            Message::Unknown {
                id: 9999,
                bytes: vec![1, 2, 3]
            }
        );
    }
}

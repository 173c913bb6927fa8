//! # CRC-16/MCRF4XX with per-message CRC_EXTRA
//!
//! MAVLink appends a checksum computed over every header/payload byte after the magic,
//! plus one additional "CRC_EXTRA" byte that depends on the message id. This lets decoders
//! of mismatched dialects fail closed instead of silently misinterpreting a payload.
//!
//! See <https://mavlink.io/en/guide/serialization.html#checksum>.

use crc_any::CRCu16;

/// Computes the MAVLink checksum over `data` (magic excluded) for message `msg_id`.
///
/// Returns `None` if `msg_id` has no known CRC_EXTRA in [`crc_extra`] — callers should treat
/// an unknown id as undecodable rather than guess an extra byte.
pub fn checksum(data: &[u8], msg_id: u32) -> Option<u16> {
    let extra = crc_extra(msg_id)?;
    let mut crc = CRCu16::crc16mcrf4cc();
    crc.digest(data);
    crc.digest(&[extra]);
    Some(crc.get_crc())
}

/// CRC_EXTRA byte for a given message id, per the fixed dialect subset this core supports.
///
/// Implementations MUST ship the full table; a missing entry here means the decoder cannot
/// validate that message id at all and will discard it rather than risk silent corruption.
pub fn crc_extra(msg_id: u32) -> Option<u8> {
    Some(match msg_id {
        0 => 50,   // HEARTBEAT
        1 => 124,  // SYS_STATUS
        24 => 24,  // GPS_RAW_INT
        33 => 104, // GLOBAL_POSITION_INT
        11 => 89,  // SET_MODE
        74 => 20,  // VFR_HUD
        76 => 152, // COMMAND_LONG
        77 => 143, // COMMAND_ACK
        147 => 154, // BATTERY_STATUS
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_extra_is_50() {
        assert_eq!(crc_extra(0), Some(50));
    }

    #[test]
    fn unknown_message_has_no_extra() {
        assert_eq!(crc_extra(9999), None);
    }

    #[test]
    fn checksum_is_deterministic() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let a = checksum(&data, 0).unwrap();
        let b = checksum(&data, 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_differs_per_message_id() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let heartbeat = checksum(&data, 0).unwrap();
        let sys_status = checksum(&data, 1).unwrap();
        assert_ne!(heartbeat, sys_status);
    }
}

//! # Outbound command construction (§4.1, scenario 1)

use fleetlink_proto::{CommandLong, FlightMode, Message, SetMode, MAV_CMD_COMPONENT_ARM_DISARM};

/// Builds an arm/disarm `COMMAND_LONG`, targeting the flight controller's own observed
/// `(sysid, compid)` when known, falling back to `(1, 1)` before any frame has arrived —
/// the send still fails with `PeerUnknown` at the link layer in that case, so this fallback
/// never actually reaches the wire.
pub fn arm_disarm(remote_ids: Option<(u8, u8)>, arm: bool) -> Message {
    let (target_system, target_component) = remote_ids.unwrap_or((1, 1));
    Message::CommandLong(CommandLong {
        params: [if arm { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        command: MAV_CMD_COMPONENT_ARM_DISARM,
        target_system,
        target_component,
        confirmation: 0,
    })
}

/// Builds a `SET_MODE` frame for the given named mode.
pub fn set_mode(remote_ids: Option<(u8, u8)>, mode: FlightMode) -> Message {
    let (target_system, _) = remote_ids.unwrap_or((1, 1));
    Message::SetMode(SetMode {
        custom_mode: mode.custom_mode(),
        target_system,
        base_mode: 0x01, // MAV_MODE_FLAG_CUSTOM_MODE_ENABLED
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_uses_observed_ids() {
        let msg = arm_disarm(Some((7, 42)), true);
        match msg {
            Message::CommandLong(cmd) => {
                assert_eq!(cmd.target_system, 7);
                assert_eq!(cmd.target_component, 42);
                assert_eq!(cmd.params[0], 1.0);
            }
            _ => panic!("expected CommandLong"),
        }
    }

    #[test]
    fn disarm_sets_param1_zero() {
        let msg = arm_disarm(None, false);
        match msg {
            Message::CommandLong(cmd) => assert_eq!(cmd.params[0], 0.0),
            _ => panic!("expected CommandLong"),
        }
    }
}

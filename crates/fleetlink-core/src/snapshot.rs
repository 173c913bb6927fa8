//! # Telemetry snapshot (C3)
//!
//! One snapshot per vehicle, overwritten in place by its link's receive task. Readers never
//! observe a torn value: every update replaces the whole struct under a short write lock,
//! so a concurrent read either sees the value from before or after the update, never a mix
//! of old and new fields.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use fleetlink_proto::FlightMode;
use serde::{Deserialize, Serialize};

/// Current vehicle telemetry, as derived from the most recent decoded MAVLink messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub armed: bool,
    pub mode: FlightMode,
    pub lat: f64,
    pub lon: f64,
    pub alt_msl_m: f32,
    pub alt_rel_m: f32,
    pub ground_speed_mps: f32,
    pub air_speed_mps: f32,
    pub heading_deg: i16,
    pub throttle_pct: u16,
    pub battery_pct: u8,
    pub satellites: u8,
    pub last_update_epoch_ms: u64,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            armed: false,
            mode: FlightMode::Other(0),
            lat: 0.0,
            lon: 0.0,
            alt_msl_m: 0.0,
            alt_rel_m: 0.0,
            ground_speed_mps: 0.0,
            air_speed_mps: 0.0,
            heading_deg: 0,
            throttle_pct: 0,
            battery_pct: 0,
            satellites: 0,
            last_update_epoch_ms: 0,
        }
    }
}

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Shared, lock-guarded snapshot cell.
///
/// Cloning a `SnapshotCell` (via its `Arc`) gives every reader (C5, C6) its own handle onto
/// the same underlying value; only the owning link ever calls [`SnapshotCell::update`].
#[derive(Clone, Debug)]
pub struct SnapshotCell(Arc<RwLock<TelemetrySnapshot>>);

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(TelemetrySnapshot::default())
    }
}

impl SnapshotCell {
    pub fn new(initial: TelemetrySnapshot) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    /// Returns a consistent copy of the current snapshot.
    pub fn get(&self) -> TelemetrySnapshot {
        self.0.read().expect("snapshot lock poisoned").clone()
    }

    /// Applies `mutate` to the snapshot under a single write lock, so readers never observe
    /// a partially-updated value.
    pub fn update(&self, mutate: impl FnOnce(&mut TelemetrySnapshot)) {
        let mut guard = self.0.write().expect("snapshot lock poisoned");
        mutate(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_is_visible_as_a_whole() {
        let cell = SnapshotCell::default();
        cell.update(|s| {
            s.armed = true;
            s.battery_pct = 42;
        });
        let snap = cell.get();
        assert!(snap.armed);
        assert_eq!(snap.battery_pct, 42);
    }
}

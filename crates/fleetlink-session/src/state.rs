//! # Per-drone active session state
//!
//! One [`ActiveSession`] lives per `drone_id` with a session currently open, held in the
//! engine's own `HashMap` (§5: "session-aggregator task... may be inlined in the manager" —
//! here it's inlined in the single engine task instead, so state needs no lock: the engine
//! task is its sole reader and writer).

use std::time::{Duration, Instant};

use fleetlink_core::{DroneId, EventKind, GeoPoint, SessionId, TelemetrySnapshot, UserId};

const TRACKED_KINDS: usize = 7;

fn kind_index(kind: EventKind) -> usize {
    match kind {
        EventKind::SessionStarted => 0,
        EventKind::SessionEnded => 1,
        EventKind::Takeoff => 2,
        EventKind::Landing => 3,
        EventKind::ModeChange => 4,
        EventKind::BatteryLow => 5,
        EventKind::ZoneViolation => 6,
    }
}

pub(crate) struct ActiveSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub drone_id: DroneId,
    pub mission_id: Option<String>,
    pub started_at_epoch_ms: u64,
    pub start_battery: u8,
    pub start_point: Option<GeoPoint>,
    pub prior_snapshot: Option<TelemetrySnapshot>,
    pub max_altitude_m: f32,
    pub max_speed_mps: f32,
    pub landed_cleanly: bool,
    speed_sum_mps: f64,
    speed_samples: u64,
    total_distance_m: f64,
    last_persisted: [Option<Instant>; TRACKED_KINDS],
}

impl ActiveSession {
    pub fn new(drone_id: DroneId, user_id: UserId, snapshot: &TelemetrySnapshot, now_ms: u64) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id,
            drone_id,
            mission_id: None,
            started_at_epoch_ms: now_ms,
            start_battery: snapshot.battery_pct,
            start_point: Some(GeoPoint { lat: snapshot.lat, lon: snapshot.lon }),
            prior_snapshot: None,
            max_altitude_m: snapshot.alt_rel_m,
            max_speed_mps: snapshot.ground_speed_mps,
            landed_cleanly: false,
            speed_sum_mps: 0.0,
            speed_samples: 0,
            total_distance_m: 0.0,
            last_persisted: [None; TRACKED_KINDS],
        }
    }

    /// Folds a new fix into the running aggregates (§4.5). `prior_snapshot` must already
    /// hold the value from before this update when called.
    pub fn accumulate(&mut self, snapshot: &TelemetrySnapshot) {
        self.max_altitude_m = self.max_altitude_m.max(snapshot.alt_rel_m);
        self.max_speed_mps = self.max_speed_mps.max(snapshot.ground_speed_mps);
        self.speed_sum_mps += snapshot.ground_speed_mps as f64;
        self.speed_samples += 1;

        if let Some(prior) = &self.prior_snapshot {
            let a = GeoPoint { lat: prior.lat, lon: prior.lon };
            let b = GeoPoint { lat: snapshot.lat, lon: snapshot.lon };
            let dt_s = (snapshot
                .last_update_epoch_ms
                .saturating_sub(prior.last_update_epoch_ms) as f64)
                / 1000.0;
            let dist = crate::geo::haversine_m(a, b);
            let implied_speed = if dt_s > 0.0 { dist / dt_s } else { 0.0 };
            if implied_speed <= 100.0 {
                self.total_distance_m += dist;
            }
        }
    }

    pub fn avg_speed_mps(&self) -> f32 {
        if self.speed_samples == 0 {
            0.0
        } else {
            (self.speed_sum_mps / self.speed_samples as f64) as f32
        }
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    /// Whether `kind` is outside its cooldown for this session — i.e. due for persistence.
    /// Marks the kind as just-persisted when it returns `true`.
    pub fn due_for_persistence(&mut self, kind: EventKind, now: Instant, cooldown: Duration) -> bool {
        let idx = kind_index(kind);
        let due = self.last_persisted[idx]
            .map(|t| now.duration_since(t) >= cooldown)
            .unwrap_or(true);
        if due {
            self.last_persisted[idx] = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(lat: f64, lon: f64, alt: f32, speed: f32, t_ms: u64) -> TelemetrySnapshot {
        let mut s = TelemetrySnapshot::default();
        s.lat = lat;
        s.lon = lon;
        s.alt_rel_m = alt;
        s.ground_speed_mps = speed;
        s.last_update_epoch_ms = t_ms;
        s
    }

    #[test]
    fn debounce_suppresses_within_cooldown_and_allows_after() {
        let mut session = ActiveSession::new(DroneId(1), UserId(uuid::Uuid::new_v4()), &snap(0.0, 0.0, 0.0, 0.0, 0), 0);
        let t0 = Instant::now();
        let cooldown = Duration::from_secs(3);
        assert!(session.due_for_persistence(EventKind::Takeoff, t0, cooldown));
        assert!(!session.due_for_persistence(EventKind::Takeoff, t0 + Duration::from_millis(500), cooldown));
        assert!(session.due_for_persistence(EventKind::Takeoff, t0 + Duration::from_secs(4), cooldown));
    }

    #[test]
    fn gps_glitch_jump_is_excluded_from_distance() {
        let mut session = ActiveSession::new(DroneId(1), UserId(uuid::Uuid::new_v4()), &snap(0.0, 0.0, 0.0, 0.0, 0), 0);
        session.prior_snapshot = Some(snap(0.0, 0.0, 0.0, 0.0, 0));
        // ~111km in 1 second implies >100 m/s: a GPS glitch, must not count.
        session.accumulate(&snap(1.0, 0.0, 0.0, 0.0, 1_000));
        assert_eq!(session.total_distance_m(), 0.0);
    }

    #[test]
    fn plausible_motion_accumulates_distance() {
        let mut session = ActiveSession::new(DroneId(1), UserId(uuid::Uuid::new_v4()), &snap(0.0, 0.0, 0.0, 0.0, 0), 0);
        session.prior_snapshot = Some(snap(0.0, 0.0, 0.0, 0.0, 0));
        // ~11m in 1 second: 11 m/s, plausible.
        session.accumulate(&snap(0.0001, 0.0, 0.0, 11.0, 1_000));
        assert!(session.total_distance_m() > 0.0);
    }
}
